use super::Strides;
use crate::backends::common::Backend;

/// Key/value storage consumed by batch prefill.
pub enum KvCache<'a, B: Backend> {
    /// Packed keys and values; `seqstart_k` holds `i32` cumulative offsets.
    Contiguous {
        k: &'a B::NativeBuffer,
        v: &'a B::NativeBuffer,
        seqstart_k: &'a B::NativeBuffer,
        k_strides: Strides,
        v_strides: Strides,
    },
    /// Paged cache laid out `[page, token_in_page, head, dim]`; the strides'
    /// `batch` field is the page stride.
    ///
    /// Request `b` owns pages `kv_page_indices[kv_indptr[b]..kv_indptr[b + 1]]`
    /// and its last page holds `kv_last_page_lens[b]` tokens. All three are `i32`.
    Paged {
        k: &'a B::NativeBuffer,
        v: &'a B::NativeBuffer,
        kv_indptr: &'a B::NativeBuffer,
        kv_page_indices: &'a B::NativeBuffer,
        kv_last_page_lens: &'a B::NativeBuffer,
        page_block_size: usize,
        k_strides: Strides,
        v_strides: Strides,
    },
}

impl<B: Backend> KvCache<'_, B> {
    pub fn is_paged(&self) -> bool {
        matches!(self, KvCache::Paged { .. })
    }
}

/// Prefill over packed variable-length queries; `seqstart_q` holds `i32`
/// cumulative offsets of length `batch + 1`.
pub struct BatchPrefillArguments<'a, B: Backend> {
    pub q: &'a B::NativeBuffer,
    pub o: &'a B::NativeBuffer,
    pub kv: KvCache<'a, B>,
    pub seqstart_q: &'a B::NativeBuffer,
    /// ALiBi slopes (`f32`, `batch * bias_strides.batch + head`) or an elementwise bias.
    pub bias: Option<&'a B::NativeBuffer>,
    pub lse: Option<&'a B::NativeBuffer>,
    pub batch: usize,
    pub nhead_q: usize,
    pub nhead_k: usize,
    pub hdim_q: usize,
    pub hdim_v: usize,
    pub max_seqlen_q: usize,
    pub q_strides: Strides,
    pub o_strides: Strides,
    pub bias_strides: Strides,
    pub lse_strides: Strides,
    pub scale_s: f32,
    pub logits_soft_cap: f32,
    /// Requests dropout; prefill kernels are built without it, so a non-zero
    /// probability makes dispatch miss.
    pub p_drop: f32,
}

impl<B: Backend> BatchPrefillArguments<'_, B> {
    pub fn has_dropout(&self) -> bool {
        self.p_drop > 0.0
    }

    pub fn has_logits_soft_cap(&self) -> bool {
        self.logits_soft_cap > 0.0
    }
}
