use crate::backends::common::Backend;

/// Element strides of a `[batch, head, row, column]` tensor; columns are contiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Strides {
    pub row: usize,
    pub head: usize,
    pub batch: usize,
}

impl Strides {
    /// `[batch, seqlen, nhead, dim]` layout.
    pub fn bshd(
        nhead: usize,
        dim: usize,
        seqlen: usize,
    ) -> Self {
        Self {
            row: nhead * dim,
            head: dim,
            batch: seqlen * nhead * dim,
        }
    }

    /// `[batch, nhead, seqlen, dim]` layout.
    pub fn bhsd(
        nhead: usize,
        dim: usize,
        seqlen: usize,
    ) -> Self {
        Self {
            row: dim,
            head: seqlen * dim,
            batch: nhead * seqlen * dim,
        }
    }

    /// Element offset of `(batch, head, row)`. Group-mode tensors are packed
    /// along the row axis, so their batch stride is ignored.
    pub fn offset(
        &self,
        batch: usize,
        head: usize,
        row: usize,
        is_group_mode: bool,
    ) -> usize {
        let batch_offset = if is_group_mode {
            0
        } else {
            batch * self.batch
        };
        batch_offset + head * self.head + row * self.row
    }
}

/// How per-request sequence lengths reach the kernel.
pub enum SequenceLayout<'a, B: Backend> {
    /// Every request has the same lengths.
    Batch {
        seqlen_q: usize,
        seqlen_k: usize,
    },
    /// Packed variable-length requests. `seqstart_q`/`seqstart_k` are `i32`
    /// cumulative offsets of length `batch + 1`; `seqlen_k`, when present,
    /// overrides the key length of each request (padded KV caches).
    Group {
        seqstart_q: &'a B::NativeBuffer,
        seqstart_k: &'a B::NativeBuffer,
        seqlen_k: Option<&'a B::NativeBuffer>,
        max_seqlen_q: usize,
    },
}

impl<B: Backend> SequenceLayout<'_, B> {
    pub fn is_group_mode(&self) -> bool {
        matches!(self, SequenceLayout::Group { .. })
    }
}

/// Buffers and shapes shared by the monolithic and split-KV forward kernels.
///
/// Bias interpretation depends on the requested bias type: an elementwise
/// bias is a `[batch, head, seqlen_q, seqlen_k]` tensor in the element type
/// addressed through `bias_strides`; ALiBi slopes are `f32` values at
/// `batch * bias_strides.batch + head`.
pub struct AttentionArguments<'a, B: Backend> {
    pub q: &'a B::NativeBuffer,
    pub k: &'a B::NativeBuffer,
    pub v: &'a B::NativeBuffer,
    pub o: &'a B::NativeBuffer,
    pub bias: Option<&'a B::NativeBuffer>,
    /// `f32` log-sum-exp per `(batch, head, row)`.
    pub lse: Option<&'a B::NativeBuffer>,
    pub sequence: SequenceLayout<'a, B>,
    pub batch: usize,
    pub nhead_q: usize,
    pub nhead_k: usize,
    pub hdim_q: usize,
    pub hdim_v: usize,
    pub q_strides: Strides,
    pub k_strides: Strides,
    pub v_strides: Strides,
    pub o_strides: Strides,
    pub bias_strides: Strides,
    pub lse_strides: Strides,
    pub scale_s: f32,
    /// Soft cap applied as `cap * tanh(logit / cap)`; `0.0` disables it.
    pub logits_soft_cap: f32,
}

impl<B: Backend> AttentionArguments<'_, B> {
    pub fn has_logits_soft_cap(&self) -> bool {
        self.logits_soft_cap > 0.0
    }

    pub fn is_group_mode(&self) -> bool {
        self.sequence.is_group_mode()
    }
}
