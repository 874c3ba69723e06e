use crate::{
    backends::common::{Event, Stream},
    error::DispatchError,
    stream_config::StreamConfig,
};

fn timing_error(error: impl std::fmt::Display) -> DispatchError {
    DispatchError::Timing(error.to_string())
}

/// Submits `launch` to the configured stream and measures it when timing is on.
///
/// Untimed calls submit exactly once and return `0.0` without recording
/// events or synchronizing. Timed calls run the warmup launches, bracket
/// `nrepeat` launches with events, wait for the stop event and return the
/// mean device time in milliseconds.
pub fn launch_kernel<S: Stream>(
    config: &StreamConfig<S>,
    launch: impl Fn(&S),
) -> Result<f32, DispatchError> {
    let stream = config.stream;
    if !config.time_kernel {
        launch(stream);
        return Ok(0.0);
    }

    let start = stream.create_event().map_err(timing_error)?;
    let stop = stream.create_event().map_err(timing_error)?;

    for _ in 0..config.cold_niters {
        launch(stream);
    }

    let nrepeat = config.nrepeat.max(1);
    stream.record_event(&start);
    for _ in 0..nrepeat {
        launch(stream);
    }
    stream.record_event(&stop);

    stop.synchronize().map_err(timing_error)?;
    let total_ms = start.elapsed_ms(&stop).map_err(timing_error)?;
    let mean_ms = total_ms / nrepeat as f32;
    log::trace!("timed {nrepeat} launches after {} warmups: {mean_ms:.4} ms", config.cold_niters);
    Ok(mean_ms)
}
