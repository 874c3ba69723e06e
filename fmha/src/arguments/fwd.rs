use super::{AttentionArguments, Strides};
use crate::backends::common::Backend;

pub struct FwdArguments<'a, B: Backend> {
    pub attention: AttentionArguments<'a, B>,
    /// Optional `u8` store of the dropout random values, one per `(batch, head, row, key)`.
    pub rand_val: Option<&'a B::NativeBuffer>,
    pub rand_val_strides: Strides,
    /// Softmax dropout probability; `0.0` selects kernels without dropout.
    pub p_drop: f32,
    pub drop_seed: u64,
    pub drop_offset: u64,
}

impl<B: Backend> FwdArguments<'_, B> {
    pub fn has_dropout(&self) -> bool {
        self.p_drop > 0.0
    }
}
