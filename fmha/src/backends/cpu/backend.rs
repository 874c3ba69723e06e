use crate::backends::{
    common::Backend,
    cpu::{buffer::CpuBuffer, error::CpuError, event::CpuEvent, stream::CpuStream},
};

/// Host-memory reference backend.
#[derive(Debug, Clone)]
pub struct Cpu;

impl Backend for Cpu {
    type NativeBuffer = CpuBuffer;
    type Stream = CpuStream;
    type Event = CpuEvent;
    type Error = CpuError;
}
