//! Host reference kernels, one entry per built specialization.

mod attention;
mod batch_prefill;
mod dropout;
mod element;
mod fwd;
mod operands;
pub mod specializations;
mod split_kv;

use std::sync::LazyLock;

pub use batch_prefill::CpuBatchPrefillKernel;
pub use fwd::CpuForwardKernel;
pub use split_kv::CpuSplitKvKernel;

use crate::{
    backends::{common::Kernels, cpu::backend::Cpu},
    error::RegistryError,
    registry::Registry,
    traits::{MhaFwdSplitKvTraits, MhaFwdTraits},
};

static SHARED: LazyLock<Result<CpuKernels, RegistryError>> = LazyLock::new(CpuKernels::new);

#[derive(Debug)]
pub struct CpuKernels {
    forward: Registry<MhaFwdTraits, CpuForwardKernel>,
    split_kv: Registry<MhaFwdSplitKvTraits, CpuSplitKvKernel>,
    batch_prefill: Registry<MhaFwdTraits, CpuBatchPrefillKernel>,
}

impl CpuKernels {
    pub fn new() -> Result<Self, RegistryError> {
        let forward = Registry::from_entries(
            specializations::forward().into_iter().map(|traits| (traits, CpuForwardKernel::new(traits))),
        )?;
        let split_kv = Registry::from_entries(
            specializations::split_kv().into_iter().map(|traits| (traits, CpuSplitKvKernel::new(traits))),
        )?;
        let batch_prefill = Registry::from_entries(
            specializations::batch_prefill().into_iter().map(|traits| (traits, CpuBatchPrefillKernel::new(traits))),
        )?;
        log::debug!(
            "built {} forward, {} split-kv and {} batch-prefill specializations",
            forward.len(),
            split_kv.len(),
            batch_prefill.len()
        );
        Ok(Self {
            forward,
            split_kv,
            batch_prefill,
        })
    }

    /// Process-wide tables, built on first use.
    pub fn shared() -> Result<&'static Self, RegistryError> {
        SHARED.as_ref().map_err(Clone::clone)
    }
}

impl Kernels for CpuKernels {
    type Backend = Cpu;
    type ForwardKernel = CpuForwardKernel;
    type SplitKvKernel = CpuSplitKvKernel;
    type BatchPrefillKernel = CpuBatchPrefillKernel;

    fn forward(&self) -> &Registry<MhaFwdTraits, CpuForwardKernel> {
        &self.forward
    }

    fn split_kv(&self) -> &Registry<MhaFwdSplitKvTraits, CpuSplitKvKernel> {
        &self.split_kv
    }

    fn batch_prefill(&self) -> &Registry<MhaFwdTraits, CpuBatchPrefillKernel> {
        &self.batch_prefill
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::common::BatchPrefillKernel;

    #[test]
    fn shared_tables_match_specializations() {
        let kernels = CpuKernels::shared().unwrap();
        assert_eq!(kernels.forward().len(), specializations::forward().len());
        assert_eq!(kernels.split_kv().len(), specializations::split_kv().len());
        assert_eq!(kernels.batch_prefill().len(), specializations::batch_prefill().len());
        assert!(std::ptr::eq(kernels, CpuKernels::shared().unwrap()));
    }

    #[test]
    fn entries_carry_their_traits() {
        let kernels = CpuKernels::shared().unwrap();
        for (traits, kernel) in kernels.forward().iter() {
            assert_eq!(kernel.traits(), traits);
        }
        for (traits, kernel) in kernels.batch_prefill().iter() {
            assert_eq!(kernel.traits(), traits);
            assert!(kernel.name().starts_with("fmha_batch_prefill_"));
        }
    }
}
