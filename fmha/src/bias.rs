use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum BiasType {
    #[default]
    NoBias,
    /// Additive tensor in the element type, one value per (query, key).
    Elementwise,
    /// Per-head f32 slopes; the kernel adds `-slope * |distance|` to the logits.
    Alibi,
}

impl BiasType {
    pub const ALL: [BiasType; 3] = [BiasType::NoBias, BiasType::Elementwise, BiasType::Alibi];

    pub const fn short_name(&self) -> &'static str {
        match self {
            BiasType::NoBias => "nbias",
            BiasType::Elementwise => "bias",
            BiasType::Alibi => "alibi",
        }
    }
}

impl fmt::Display for BiasType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for BiasType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "n" | "0" | "no" | "none" => Ok(BiasType::NoBias),
            "e" | "1" | "elementwise" => Ok(BiasType::Elementwise),
            "a" | "2" | "alibi" => Ok(BiasType::Alibi),
            other => Err(ParseError::UnknownBias(other.to_string())),
        }
    }
}
