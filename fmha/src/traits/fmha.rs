use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{BiasType, DataType, MaskType};

/// Full specialization key of a monolithic forward kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FmhaFwdTraits {
    pub hdim_q: usize,
    pub hdim_v: usize,
    pub data_type: DataType,
    pub is_group_mode: bool,
    pub is_v_rowmajor: bool,
    pub has_logits_soft_cap: bool,
    pub mask_type: MaskType,
    pub bias_type: BiasType,
    pub has_lse: bool,
    pub has_dropout: bool,
    pub do_fp8_static_quant: bool,
}

/// Full specialization key of a split-KV forward kernel. Split-KV never applies dropout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FmhaFwdSplitKvTraits {
    pub hdim_q: usize,
    pub hdim_v: usize,
    pub data_type: DataType,
    pub is_group_mode: bool,
    pub is_v_rowmajor: bool,
    pub has_logits_soft_cap: bool,
    pub mask_type: MaskType,
    pub bias_type: BiasType,
    pub has_lse: bool,
    pub do_fp8_static_quant: bool,
}

fn flag(
    value: bool,
    name: &str,
) -> String {
    if value {
        name.to_string()
    } else {
        format!("n{name}")
    }
}

fn head_dims(
    hdim_q: usize,
    hdim_v: usize,
) -> String {
    if hdim_q == hdim_v {
        format!("d{hdim_q}")
    } else {
        format!("d{hdim_q}x{hdim_v}")
    }
}

fn mode(is_group_mode: bool) -> &'static str {
    if is_group_mode {
        "group"
    } else {
        "batch"
    }
}

fn v_layout(is_v_rowmajor: bool) -> &'static str {
    if is_v_rowmajor {
        "vr"
    } else {
        "vc"
    }
}

impl fmt::Display for FmhaFwdTraits {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "fmha_fwd_{}_{}_{}_{}_{}_{}_{}_{}_{}_{}",
            head_dims(self.hdim_q, self.hdim_v),
            self.data_type,
            mode(self.is_group_mode),
            v_layout(self.is_v_rowmajor),
            flag(self.has_logits_soft_cap, "logits"),
            self.mask_type.short_name(),
            self.bias_type.short_name(),
            flag(self.has_lse, "lse"),
            flag(self.has_dropout, "dropout"),
            flag(self.do_fp8_static_quant, "squant"),
        )
    }
}

impl fmt::Display for FmhaFwdSplitKvTraits {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "fmha_fwd_splitkv_{}_{}_{}_{}_{}_{}_{}_{}_{}",
            head_dims(self.hdim_q, self.hdim_v),
            self.data_type,
            mode(self.is_group_mode),
            v_layout(self.is_v_rowmajor),
            flag(self.has_logits_soft_cap, "logits"),
            self.mask_type.short_name(),
            self.bias_type.short_name(),
            flag(self.has_lse, "lse"),
            flag(self.do_fp8_static_quant, "squant"),
        )
    }
}
