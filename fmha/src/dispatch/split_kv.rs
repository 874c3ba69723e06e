use super::{dispatch, parse_data_type};
use crate::{
    BiasType, MaskInfo,
    arguments::SplitKvArguments,
    backends::common::{Backend, Kernels, SplitKvKernel},
    error::DispatchResult,
    stream_config::StreamConfig,
    traits::MhaFwdSplitKvTraits,
};

/// Split-KV forward attention. The split count travels in the arguments and
/// is used as given.
#[allow(clippy::too_many_arguments)]
pub fn forward_split_kv<K: Kernels>(
    kernels: &K,
    arguments: &SplitKvArguments<K::Backend>,
    stream_config: &StreamConfig<<K::Backend as Backend>::Stream>,
    q_dtype: &str,
    is_group_mode: bool,
    mask: &MaskInfo,
    bias_type: BiasType,
    has_lse: bool,
) -> DispatchResult {
    let data_type = parse_data_type(q_dtype)?;
    let traits = MhaFwdSplitKvTraits::new(
        arguments.attention.hdim_q,
        arguments.attention.hdim_v,
        data_type,
        is_group_mode,
        arguments.attention.has_logits_soft_cap(),
        mask,
        bias_type,
        has_lse,
    );
    dispatch("split-kv", kernels.split_kv(), &traits, stream_config, |kernel, stream| {
        kernel.launch(arguments, mask, stream)
    })
}
