use super::{dispatch, parse_data_type};
use crate::{
    BiasType, MaskInfo,
    arguments::BatchPrefillArguments,
    backends::common::{Backend, BatchPrefillKernel, Kernels},
    error::DispatchResult,
    stream_config::StreamConfig,
    traits::MhaFwdTraits,
};

#[allow(clippy::too_many_arguments)]
pub fn batch_prefill<K: Kernels>(
    kernels: &K,
    arguments: &BatchPrefillArguments<K::Backend>,
    stream_config: &StreamConfig<<K::Backend as Backend>::Stream>,
    q_dtype: &str,
    is_group_mode: bool,
    mask: &MaskInfo,
    bias_type: BiasType,
    has_lse: bool,
) -> DispatchResult {
    let data_type = parse_data_type(q_dtype)?;
    let traits = MhaFwdTraits::new(
        arguments.hdim_q,
        arguments.hdim_v,
        data_type,
        is_group_mode,
        arguments.has_logits_soft_cap(),
        mask,
        bias_type,
        has_lse,
        arguments.has_dropout(),
    );
    dispatch("batch-prefill", kernels.batch_prefill(), &traits, stream_config, |kernel, stream| {
        kernel.launch(arguments, mask, stream)
    })
}
