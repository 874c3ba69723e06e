use super::Backend;
use crate::{
    MaskInfo,
    arguments::{BatchPrefillArguments, FwdArguments, SplitKvArguments},
    registry::Registry,
    traits::{MhaFwdSplitKvTraits, MhaFwdTraits},
};

/// A compiled monolithic forward specialization.
///
/// The mask handed to `launch` has the specialization's mask kind and carries
/// the window sizes.
pub trait ForwardKernel: Send + Sync {
    type Backend: Backend;

    fn name(&self) -> &str;

    fn launch(
        &self,
        arguments: &FwdArguments<Self::Backend>,
        mask: &MaskInfo,
        stream: &<Self::Backend as Backend>::Stream,
    );
}

/// A compiled split-KV specialization: partial attention per split, then reduction.
pub trait SplitKvKernel: Send + Sync {
    type Backend: Backend;

    fn name(&self) -> &str;

    fn launch(
        &self,
        arguments: &SplitKvArguments<Self::Backend>,
        mask: &MaskInfo,
        stream: &<Self::Backend as Backend>::Stream,
    );
}

/// A compiled batch-prefill specialization.
pub trait BatchPrefillKernel: Send + Sync {
    type Backend: Backend;

    fn name(&self) -> &str;

    fn launch(
        &self,
        arguments: &BatchPrefillArguments<Self::Backend>,
        mask: &MaskInfo,
        stream: &<Self::Backend as Backend>::Stream,
    );
}

/// A kernel library: the specialization tables the dispatch facade looks up.
pub trait Kernels: Send + Sync {
    type Backend: Backend;
    type ForwardKernel: ForwardKernel<Backend = Self::Backend>;
    type SplitKvKernel: SplitKvKernel<Backend = Self::Backend>;
    type BatchPrefillKernel: BatchPrefillKernel<Backend = Self::Backend>;

    fn forward(&self) -> &Registry<MhaFwdTraits, Self::ForwardKernel>;

    fn split_kv(&self) -> &Registry<MhaFwdSplitKvTraits, Self::SplitKvKernel>;

    fn batch_prefill(&self) -> &Registry<MhaFwdTraits, Self::BatchPrefillKernel>;
}
