use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

use crate::backends::{
    common::Stream,
    cpu::{backend::Cpu, error::CpuError, event::CpuEvent},
};

static NEXT_STREAM_ID: AtomicUsize = AtomicUsize::new(1);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
pub(crate) struct StreamState {
    launches: Mutex<Vec<String>>,
    synchronizations: AtomicUsize,
    recorded_events: AtomicUsize,
    error: Mutex<Option<CpuError>>,
}

impl StreamState {
    pub(crate) fn note_synchronization(&self) {
        self.synchronizations.fetch_add(1, Ordering::Relaxed);
    }
}

/// In-order host stream. Work runs at submission time; the first failure is
/// kept until the next [`Stream::synchronize`].
#[derive(Debug)]
pub struct CpuStream {
    id: usize,
    state: Arc<StreamState>,
}

impl CpuStream {
    pub fn new() -> Self {
        Self {
            id: NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed),
            state: Arc::new(StreamState::default()),
        }
    }

    pub fn submit(
        &self,
        kernel_name: &str,
        work: impl FnOnce() -> Result<(), CpuError>,
    ) {
        lock(&self.state.launches).push(kernel_name.to_string());
        if let Err(error) = work() {
            log::debug!("{kernel_name} failed on stream {}: {error}", self.id);
            lock(&self.state.error).get_or_insert(error);
        }
    }

    /// Names of every kernel submitted so far, in submission order.
    pub fn launches(&self) -> Vec<String> {
        lock(&self.state.launches).clone()
    }

    pub fn launch_count(&self) -> usize {
        lock(&self.state.launches).len()
    }

    pub fn synchronization_count(&self) -> usize {
        self.state.synchronizations.load(Ordering::Relaxed)
    }

    pub fn recorded_event_count(&self) -> usize {
        self.state.recorded_events.load(Ordering::Relaxed)
    }
}

impl Default for CpuStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Stream for CpuStream {
    type Backend = Cpu;

    fn id(&self) -> usize {
        self.id
    }

    fn create_event(&self) -> Result<CpuEvent, CpuError> {
        Ok(CpuEvent::new(self.state.clone()))
    }

    fn record_event(
        &self,
        event: &CpuEvent,
    ) {
        self.state.recorded_events.fetch_add(1, Ordering::Relaxed);
        event.record();
    }

    fn synchronize(&self) -> Result<(), CpuError> {
        self.state.note_synchronization();
        match lock(&self.state.error).take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
