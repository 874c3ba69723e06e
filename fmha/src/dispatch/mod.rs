mod batch_prefill;
mod fwd;
mod split_kv;

use std::{fmt::Display, hash::Hash};

pub use batch_prefill::batch_prefill;
pub use fwd::forward;
pub use split_kv::forward_split_kv;

use crate::{
    DataType,
    backends::common::Stream,
    error::{DispatchError, DispatchResult},
    registry::Registry,
    stream_config::StreamConfig,
    timing::launch_kernel,
};

pub(crate) fn parse_data_type(q_dtype: &str) -> Result<DataType, DispatchError> {
    q_dtype.parse::<DataType>().map_err(|_| {
        log::warn!("no specialization for data type `{q_dtype}`");
        DispatchError::UnknownDataType(q_dtype.to_string())
    })
}

/// Resolves `traits` in `registry` and submits the matching kernel.
///
/// A miss returns before anything touches the stream.
pub(crate) fn dispatch<T, K, S>(
    family: &'static str,
    registry: &Registry<T, K>,
    traits: &T,
    stream_config: &StreamConfig<S>,
    launch: impl Fn(&K, &S),
) -> DispatchResult
where
    T: Eq + Hash + Display,
    S: Stream,
{
    let Some(kernel) = registry.get(traits) else {
        log::warn!("no {family} specialization for {traits}");
        return Err(DispatchError::NoSpecialization {
            family,
            request: traits.to_string(),
        });
    };
    log::debug!("launching {family} specialization {traits} on stream {}", stream_config.stream.id());
    launch_kernel(stream_config, |stream| launch(kernel, stream))
}
