use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Instant,
};

use crate::backends::{
    common::Event,
    cpu::{backend::Cpu, error::CpuError, stream::StreamState},
};

#[derive(Debug)]
pub struct CpuEvent {
    stream: Arc<StreamState>,
    timestamp: Mutex<Option<Instant>>,
}

impl CpuEvent {
    pub(crate) fn new(stream: Arc<StreamState>) -> Self {
        Self {
            stream,
            timestamp: Mutex::new(None),
        }
    }

    pub(crate) fn record(&self) {
        *self.timestamp.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }

    fn timestamp(&self) -> Result<Instant, CpuError> {
        self.timestamp.lock().unwrap_or_else(PoisonError::into_inner).ok_or(CpuError::EventNotRecorded)
    }
}

impl Event for CpuEvent {
    type Backend = Cpu;

    fn synchronize(&self) -> Result<(), CpuError> {
        self.stream.note_synchronization();
        self.timestamp().map(|_| ())
    }

    fn elapsed_ms(
        &self,
        end: &Self,
    ) -> Result<f32, CpuError> {
        let start = self.timestamp()?;
        let end = end.timestamp()?;
        Ok(end.saturating_duration_since(start).as_secs_f32() * 1000.0)
    }
}
