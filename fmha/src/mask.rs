use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MaskType {
    NoMask,
    CausalTopLeft,
    CausalBottomRight,
    WindowGeneric,
}

impl MaskType {
    pub const ALL: [MaskType; 4] =
        [MaskType::NoMask, MaskType::CausalTopLeft, MaskType::CausalBottomRight, MaskType::WindowGeneric];

    pub const fn short_name(&self) -> &'static str {
        match self {
            MaskType::NoMask => "nmask",
            MaskType::CausalTopLeft => "mask_tl",
            MaskType::CausalBottomRight => "mask_br",
            MaskType::WindowGeneric => "mask_window",
        }
    }
}

/// Mask descriptor forwarded to kernels.
///
/// `left` and `right` are window sizes in keys around the query's diagonal,
/// `-1` meaning unbounded. Causal kinds always close the window on the right
/// at the diagonal. Top-left kinds place the diagonal at `col == row`; the
/// bottom-right and generic kinds shift it by `seqlen_k - seqlen_q`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaskInfo {
    pub mask_type: MaskType,
    pub left: i32,
    pub right: i32,
}

impl MaskInfo {
    pub const fn no_mask() -> Self {
        Self {
            mask_type: MaskType::NoMask,
            left: -1,
            right: -1,
        }
    }

    pub const fn causal_top_left() -> Self {
        Self {
            mask_type: MaskType::CausalTopLeft,
            left: -1,
            right: 0,
        }
    }

    pub const fn causal_bottom_right() -> Self {
        Self {
            mask_type: MaskType::CausalBottomRight,
            left: -1,
            right: 0,
        }
    }

    pub const fn window(
        left: i32,
        right: i32,
    ) -> Self {
        Self {
            mask_type: MaskType::WindowGeneric,
            left,
            right,
        }
    }

    pub fn is_visible(
        &self,
        row: usize,
        col: usize,
        seqlen_q: usize,
        seqlen_k: usize,
    ) -> bool {
        let diagonal = match self.mask_type {
            MaskType::NoMask => return true,
            MaskType::CausalTopLeft => row as i64,
            MaskType::CausalBottomRight | MaskType::WindowGeneric => {
                row as i64 + seqlen_k as i64 - seqlen_q as i64
            },
        };
        let right = match self.mask_type {
            MaskType::WindowGeneric => self.right,
            _ => 0,
        };
        let col = col as i64;
        let left_ok = self.left < 0 || col >= diagonal - self.left as i64;
        let right_ok = right < 0 || col <= diagonal + right as i64;
        left_ok && right_ok
    }
}

impl Default for MaskInfo {
    fn default() -> Self {
        Self::no_mask()
    }
}

impl fmt::Display for MaskInfo {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self.mask_type {
            MaskType::NoMask => write!(f, "n"),
            MaskType::CausalTopLeft => write!(f, "t:{},0", self.left),
            MaskType::CausalBottomRight => write!(f, "b:{},0", self.left),
            MaskType::WindowGeneric => write!(f, "g:{},{}", self.left, self.right),
        }
    }
}

fn parse_window(
    source: &str,
    window: &str,
) -> Result<(i32, i32), ParseError> {
    let invalid = || ParseError::InvalidMask(source.to_string());
    let (left, right) = window.split_once(',').ok_or_else(invalid)?;
    let left = left.trim().parse::<i32>().map_err(|_| invalid())?;
    let right = right.trim().parse::<i32>().map_err(|_| invalid())?;
    if left < -1 || right < -1 {
        return Err(invalid());
    }
    Ok((left, right))
}

impl FromStr for MaskInfo {
    type Err = ParseError;

    /// Decodes `0|n`, `1|t`, `2|b`, `t:l,r`, `b:l,r` and `g:l,r`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "0" | "n" => return Ok(Self::no_mask()),
            "1" | "t" => return Ok(Self::causal_top_left()),
            "2" | "b" => return Ok(Self::causal_bottom_right()),
            _ => {},
        }

        let (kind, window) = s.split_once(':').ok_or_else(|| ParseError::InvalidMask(s.to_string()))?;
        let (left, right) = parse_window(s, window)?;
        if left == -1 && right == -1 {
            return Ok(Self::no_mask());
        }
        match kind {
            "t" if right == 0 => Ok(Self {
                mask_type: MaskType::CausalTopLeft,
                left,
                right: 0,
            }),
            "b" if right == 0 => Ok(Self {
                mask_type: MaskType::CausalBottomRight,
                left,
                right: 0,
            }),
            "b" | "g" => Ok(Self::window(left, right)),
            _ => Err(ParseError::InvalidMask(s.to_string())),
        }
    }
}
