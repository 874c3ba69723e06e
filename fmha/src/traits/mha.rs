use std::{fmt, ops::Deref};

use serde::{Deserialize, Serialize};

use super::{FmhaFwdSplitKvTraits, FmhaFwdTraits};
use crate::{BiasType, DataType, MaskInfo};

/// Forward traits with V fixed row-major and static FP8 quantization off.
///
/// Only the parameters the facade lets callers choose are exposed by the
/// constructor; the fixed fields cannot be requested any other way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MhaFwdTraits {
    inner: FmhaFwdTraits,
}

impl MhaFwdTraits {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        hdim_q: usize,
        hdim_v: usize,
        data_type: DataType,
        is_group_mode: bool,
        has_logits_soft_cap: bool,
        mask: &MaskInfo,
        bias_type: BiasType,
        has_lse: bool,
        has_dropout: bool,
    ) -> Self {
        Self {
            inner: FmhaFwdTraits {
                hdim_q,
                hdim_v,
                data_type,
                is_group_mode,
                is_v_rowmajor: true,
                has_logits_soft_cap,
                mask_type: mask.mask_type,
                bias_type,
                has_lse,
                has_dropout,
                do_fp8_static_quant: false,
            },
        }
    }
}

impl Deref for MhaFwdTraits {
    type Target = FmhaFwdTraits;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl From<MhaFwdTraits> for FmhaFwdTraits {
    fn from(traits: MhaFwdTraits) -> Self {
        traits.inner
    }
}

impl fmt::Display for MhaFwdTraits {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

/// Split-KV counterpart of [`MhaFwdTraits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MhaFwdSplitKvTraits {
    inner: FmhaFwdSplitKvTraits,
}

impl MhaFwdSplitKvTraits {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        hdim_q: usize,
        hdim_v: usize,
        data_type: DataType,
        is_group_mode: bool,
        has_logits_soft_cap: bool,
        mask: &MaskInfo,
        bias_type: BiasType,
        has_lse: bool,
    ) -> Self {
        Self {
            inner: FmhaFwdSplitKvTraits {
                hdim_q,
                hdim_v,
                data_type,
                is_group_mode,
                is_v_rowmajor: true,
                has_logits_soft_cap,
                mask_type: mask.mask_type,
                bias_type,
                has_lse,
                do_fp8_static_quant: false,
            },
        }
    }
}

impl Deref for MhaFwdSplitKvTraits {
    type Target = FmhaFwdSplitKvTraits;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl From<MhaFwdSplitKvTraits> for FmhaFwdSplitKvTraits {
    fn from(traits: MhaFwdSplitKvTraits) -> Self {
        traits.inner
    }
}

impl fmt::Display for MhaFwdSplitKvTraits {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}
