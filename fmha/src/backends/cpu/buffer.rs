use std::sync::{
    PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
    atomic::{AtomicUsize, Ordering},
};

use bytemuck::Pod;

use crate::{
    ArrayElement,
    backends::{common::NativeBuffer, cpu::backend::Cpu},
};

static NEXT_BUFFER_ID: AtomicUsize = AtomicUsize::new(1);

/// Byte buffer in host memory.
#[derive(Debug)]
pub struct CpuBuffer {
    id: usize,
    bytes: RwLock<Vec<u8>>,
}

impl CpuBuffer {
    pub fn new(size: usize) -> Self {
        Self::from_bytes(vec![0u8; size])
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            id: NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
            bytes: RwLock::new(bytes),
        }
    }

    pub fn from_slice<T: Pod>(values: &[T]) -> Self {
        Self::from_bytes(bytemuck::cast_slice(values).to_vec())
    }

    pub fn filled<T: Pod>(
        value: T,
        count: usize,
    ) -> Self {
        Self::from_slice(&vec![value; count])
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.read().clone()
    }

    pub fn to_vec<T: Pod>(&self) -> Vec<T> {
        bytemuck::pod_collect_to_vec::<u8, T>(&self.read())
    }

    /// Widens the buffer's elements to `f32`; unrepresentable values become NaN.
    pub fn to_f32_vec<T: ArrayElement>(&self) -> Vec<f32> {
        self.to_vec::<T>().into_iter().map(|value| value.to_f32().unwrap_or(f32::NAN)).collect()
    }

    /// Overwrites the leading elements with `values`.
    pub fn write<T: Pod>(
        &self,
        values: &[T],
    ) {
        let source: &[u8] = bytemuck::cast_slice(values);
        let mut bytes = self.write_guard();
        let count = source.len().min(bytes.len());
        bytes[..count].copy_from_slice(&source[..count]);
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Vec<u8>> {
        self.bytes.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write_guard(&self) -> RwLockWriteGuard<'_, Vec<u8>> {
        self.bytes.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NativeBuffer for CpuBuffer {
    type Backend = Cpu;

    fn length(&self) -> usize {
        self.read().len()
    }

    fn id(&self) -> usize {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use half::f16;

    use super::*;

    #[test]
    fn round_trips_elements() {
        let values = [f16::from_f32(1.5), f16::from_f32(-2.0)];
        let buffer = CpuBuffer::from_slice(&values);
        assert_eq!(buffer.length(), 4);
        assert_eq!(buffer.to_vec::<f16>(), values);
        assert_eq!(buffer.to_f32_vec::<f16>(), vec![1.5, -2.0]);
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(CpuBuffer::new(4).id(), CpuBuffer::new(4).id());
    }

    #[test]
    fn write_truncates_to_capacity() {
        let buffer = CpuBuffer::new(8);
        buffer.write(&[1.0f32, 2.0, 3.0]);
        assert_eq!(buffer.to_vec::<f32>(), vec![1.0, 2.0]);
    }
}
