use std::{fmt, str::FromStr};

use bytemuck::Pod;
use half::{bf16, f16};
use num_traits::NumCast;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Element formats named by the kernel library's dtype vocabulary.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Copy, Clone, Serialize, Deserialize)]
pub enum DataType {
    F16,
    BF16,
    F32,
    FP8,
    BF8,
}

impl DataType {
    pub const ALL: [DataType; 5] = [DataType::F16, DataType::BF16, DataType::F32, DataType::FP8, DataType::BF8];

    pub const fn size_in_bits(&self) -> usize {
        match self {
            DataType::FP8 | DataType::BF8 => 8,
            DataType::F16 | DataType::BF16 => 16,
            DataType::F32 => 32,
        }
    }

    pub const fn size_in_bytes(&self) -> usize {
        self.size_in_bits().div_ceil(8)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            DataType::F16 => "fp16",
            DataType::BF16 => "bf16",
            DataType::F32 => "fp32",
            DataType::FP8 => "fp8",
            DataType::BF8 => "bf8",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataType::ALL
            .into_iter()
            .find(|data_type| data_type.as_str() == s)
            .ok_or_else(|| ParseError::UnknownDataType(s.to_string()))
    }
}

/// Host element types that can be stored in and read back from kernel buffers.
pub trait ArrayElement: NumCast + Pod {
    fn data_type() -> DataType;
}

macro_rules! impl_array_element {
    ($($type:ty => $variant:ident),+ $(,)?) => {
        $(
            impl ArrayElement for $type {
                fn data_type() -> DataType {
                    DataType::$variant
                }
            }
        )+
    };
}

impl_array_element! {
    f16 => F16,
    bf16 => BF16,
    f32 => F32,
}
