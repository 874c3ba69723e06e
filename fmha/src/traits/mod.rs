mod fmha;
mod mha;

pub use fmha::{FmhaFwdSplitKvTraits, FmhaFwdTraits};
pub use mha::{MhaFwdSplitKvTraits, MhaFwdTraits};
