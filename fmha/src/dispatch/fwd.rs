use super::{dispatch, parse_data_type};
use crate::{
    BiasType, MaskInfo,
    arguments::FwdArguments,
    backends::common::{Backend, ForwardKernel, Kernels},
    error::DispatchResult,
    stream_config::StreamConfig,
    traits::MhaFwdTraits,
};

/// Monolithic forward attention.
///
/// Dropout and the logits soft cap are selected from the arguments
/// (`p_drop > 0`, `logits_soft_cap > 0`); everything else comes from the
/// caller's parameters.
#[allow(clippy::too_many_arguments)]
pub fn forward<K: Kernels>(
    kernels: &K,
    arguments: &FwdArguments<K::Backend>,
    stream_config: &StreamConfig<<K::Backend as Backend>::Stream>,
    q_dtype: &str,
    is_group_mode: bool,
    mask: &MaskInfo,
    bias_type: BiasType,
    has_lse: bool,
) -> DispatchResult {
    let data_type = parse_data_type(q_dtype)?;
    let traits = MhaFwdTraits::new(
        arguments.attention.hdim_q,
        arguments.attention.hdim_v,
        data_type,
        is_group_mode,
        arguments.attention.has_logits_soft_cap(),
        mask,
        bias_type,
        has_lse,
        arguments.has_dropout(),
    );
    dispatch("forward", kernels.forward(), &traits, stream_config, |kernel, stream| {
        kernel.launch(arguments, mask, stream)
    })
}
