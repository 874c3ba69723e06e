use thiserror::Error;

use crate::{DataType, MaskInfo};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CpuError {
    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(DataType),
    #[error("Missing {0} buffer")]
    MissingBuffer(&'static str),
    #[error("{buffer} buffer too small: index {index} out of {length} elements")]
    OutOfBounds {
        buffer: &'static str,
        index: usize,
        length: usize,
    },
    #[error("Invalid sequence offsets in {0}")]
    InvalidOffsets(&'static str),
    #[error("Query heads ({nhead_q}) are not a multiple of key heads ({nhead_k})")]
    HeadMismatch {
        nhead_q: usize,
        nhead_k: usize,
    },
    #[error("Head dimensions {hdim_q}x{hdim_v} do not match kernel {kernel}")]
    HeadDimMismatch {
        hdim_q: usize,
        hdim_v: usize,
        kernel: String,
    },
    #[error("Sequence layout does not match kernel mode: {0}")]
    ModeMismatch(String),
    #[error("Mask {mask} does not match kernel {kernel}")]
    MaskMismatch {
        mask: MaskInfo,
        kernel: String,
    },
    #[error("Query length {seqlen_q} exceeds max_seqlen_q {max_seqlen_q}")]
    SeqlenExceedsMax {
        seqlen_q: usize,
        max_seqlen_q: usize,
    },
    #[error("Invalid split count: {0}")]
    InvalidSplitCount(usize),
    #[error("Invalid dropout probability: {0}")]
    InvalidDropout(f32),
    #[error("Invalid page block size: {0}")]
    InvalidPageBlockSize(usize),
    #[error("Event was never recorded")]
    EventNotRecorded,
}
