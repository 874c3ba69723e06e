#![allow(dead_code)]

use fmha::{
    DataType, MaskInfo, MaskType,
    arguments::{AttentionArguments, FwdArguments, SequenceLayout, Strides},
    backends::cpu::{Cpu, CpuBuffer},
};
use half::{bf16, f16};
use ndarray::{Array2, Array3, ArrayView3, s};
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Rounds `value` to what `data_type` can hold.
pub fn quantize(
    value: f32,
    data_type: DataType,
) -> f32 {
    match data_type {
        DataType::F16 => f16::from_f32(value).to_f32(),
        DataType::BF16 => bf16::from_f32(value).to_f32(),
        _ => value,
    }
}

/// `[nhead, seqlen, dim]` values drawn from `-range..range`, already rounded to `data_type`.
pub fn random_heads(
    rng: &mut StdRng,
    nhead: usize,
    seqlen: usize,
    dim: usize,
    range: f32,
    data_type: DataType,
) -> Array3<f32> {
    Array3::from_shape_fn((nhead, seqlen, dim), |_| quantize(rng.random_range(-range..range), data_type))
}

/// Packs per-request `[nhead, seqlen, dim]` tensors into one `[token, nhead, dim]` slab.
pub fn pack_bshd(requests: &[Array3<f32>]) -> Vec<f32> {
    let mut packed = Vec::new();
    for request in requests {
        let (nhead, seqlen, _) = request.dim();
        for row in 0..seqlen {
            for head in 0..nhead {
                packed.extend(request.slice(s![head, row, ..]).iter().copied());
            }
        }
    }
    packed
}

/// Inverse of [`pack_bshd`].
pub fn unpack_bshd(
    values: &[f32],
    nhead: usize,
    dim: usize,
    seqlens: &[usize],
) -> Vec<Array3<f32>> {
    let mut offset = 0;
    seqlens
        .iter()
        .map(|&seqlen| {
            let request = Array3::from_shape_fn((nhead, seqlen, dim), |(head, row, d)| {
                values[offset + (row * nhead + head) * dim + d]
            });
            offset += seqlen * nhead * dim;
            request
        })
        .collect()
}

pub fn element_buffer(
    values: &[f32],
    data_type: DataType,
) -> CpuBuffer {
    match data_type {
        DataType::F16 => CpuBuffer::from_slice(&values.iter().map(|&v| f16::from_f32(v)).collect::<Vec<f16>>()),
        DataType::BF16 => CpuBuffer::from_slice(&values.iter().map(|&v| bf16::from_f32(v)).collect::<Vec<bf16>>()),
        _ => CpuBuffer::from_slice(values),
    }
}

pub fn element_values(
    buffer: &CpuBuffer,
    data_type: DataType,
) -> Vec<f32> {
    match data_type {
        DataType::F16 => buffer.to_f32_vec::<f16>(),
        DataType::BF16 => buffer.to_f32_vec::<bf16>(),
        _ => buffer.to_vec::<f32>(),
    }
}

pub fn seqstarts(seqlens: &[usize]) -> Vec<i32> {
    let mut starts = vec![0i32];
    for &seqlen in seqlens {
        starts.push(starts[starts.len() - 1] + seqlen as i32);
    }
    starts
}

pub fn compare_outputs(
    expected: &[f32],
    actual: &[f32],
    rtol: f32,
    atol: f32,
) -> (bool, f32) {
    assert_eq!(expected.len(), actual.len(), "length mismatch");
    let mut max_diff = 0.0f32;
    let mut all_close = true;

    for (i, (&exp, &act)) in expected.iter().zip(actual.iter()).enumerate() {
        if exp == act {
            continue;
        }
        let diff = (exp - act).abs();
        let rel_diff = diff / (exp.abs() + 1e-8);

        if !(diff <= atol || rel_diff <= rtol) {
            if all_close {
                eprintln!("First mismatch at index {}: expected {}, got {} (diff={}, rel={})", i, exp, act, diff, rel_diff);
            }
            all_close = false;
        }
        if diff.is_finite() {
            max_diff = max_diff.max(diff);
        }
    }

    (all_close, max_diff)
}

pub enum ReferenceBias<'a> {
    None,
    /// `[nhead, seqlen_q, seqlen_k]`
    Elementwise(&'a Array3<f32>),
    /// One slope per query head.
    Alibi(&'a [f32]),
}

pub struct ReferenceParams<'a> {
    pub scale: f32,
    pub soft_cap: Option<f32>,
    pub mask: MaskInfo,
    pub bias: ReferenceBias<'a>,
    /// Random bytes `[nhead, seqlen_q, seqlen_k]` and the drop probability.
    pub dropout: Option<(&'a Array3<u8>, f32)>,
}

impl ReferenceParams<'_> {
    pub fn plain(
        scale: f32,
        mask: MaskInfo,
    ) -> Self {
        Self {
            scale,
            soft_cap: None,
            mask,
            bias: ReferenceBias::None,
            dropout: None,
        }
    }
}

/// `[seqlen_q, seqlen_k]` pattern of the keys each query attends to.
///
/// Query `i` sits on key column `i` (top-left) or `i + seqlen_k - seqlen_q`
/// (bottom-right and generic). Each row keeps the band from `left` keys before
/// that column to `right` keys after it; causal kinds stop at the column.
pub fn reference_mask(
    mask: &MaskInfo,
    seqlen_q: usize,
    seqlen_k: usize,
) -> Array2<bool> {
    if mask.mask_type == MaskType::NoMask {
        return Array2::from_elem((seqlen_q, seqlen_k), true);
    }
    let width = seqlen_k as i64;
    let shift = match mask.mask_type {
        MaskType::CausalTopLeft => 0,
        _ => width - seqlen_q as i64,
    };
    let before = if mask.left < 0 {
        width
    } else {
        mask.left as i64
    };
    let after = match mask.mask_type {
        MaskType::WindowGeneric if mask.right < 0 => width,
        MaskType::WindowGeneric => mask.right as i64,
        _ => 0,
    };

    let mut pattern = Array2::from_elem((seqlen_q, seqlen_k), false);
    for (i, mut row) in pattern.outer_iter_mut().enumerate() {
        let column = i as i64 + shift;
        let first = (column - before).clamp(0, width) as usize;
        let end = (column + after + 1).clamp(0, width) as usize;
        if first < end {
            row.slice_mut(s![first..end]).fill(true);
        }
    }
    pattern
}

/// Scaled dot-product attention of one request.
///
/// `q` is `[nhead_q, seqlen_q, hdim_q]`, `k`/`v` are `[nhead_k, seqlen_k, dim]`.
/// Returns the output `[nhead_q, seqlen_q, hdim_v]` and the log-sum-exp
/// `[nhead_q, seqlen_q]`.
pub fn reference_attention(
    q: ArrayView3<f32>,
    k: ArrayView3<f32>,
    v: ArrayView3<f32>,
    params: &ReferenceParams,
) -> (Array3<f32>, Array2<f32>) {
    let (nhead_q, seqlen_q, hdim_q) = q.dim();
    let (nhead_k, seqlen_k, _) = k.dim();
    let hdim_v = v.dim().2;
    let group = nhead_q / nhead_k;

    let mut output = Array3::zeros((nhead_q, seqlen_q, hdim_v));
    let mut lse = Array2::from_elem((nhead_q, seqlen_q), f32::NEG_INFINITY);
    let pattern = reference_mask(&params.mask, seqlen_q, seqlen_k);

    for h in 0..nhead_q {
        let kv_head = h / group;
        for i in 0..seqlen_q {
            let mut scores = vec![f32::NEG_INFINITY; seqlen_k];
            for j in 0..seqlen_k {
                if !pattern[[i, j]] {
                    continue;
                }
                let mut score = 0.0f32;
                for d in 0..hdim_q {
                    score += q[[h, i, d]] * k[[kv_head, j, d]];
                }
                score *= params.scale;
                if let Some(cap) = params.soft_cap {
                    score = cap * (score / cap).tanh();
                }
                score += match params.bias {
                    ReferenceBias::None => 0.0,
                    ReferenceBias::Elementwise(bias) => bias[[h, i, j]],
                    ReferenceBias::Alibi(slopes) => {
                        let distance = (i as i64 + seqlen_k as i64 - seqlen_q as i64 - j as i64).abs();
                        -slopes[h] * distance as f32
                    },
                };
                scores[j] = score;
            }

            let max_score = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            if max_score == f32::NEG_INFINITY {
                continue;
            }
            let mut sum_exp = 0.0f32;
            for score in scores.iter_mut() {
                *score = (*score - max_score).exp();
                sum_exp += *score;
            }
            lse[[h, i]] = max_score + sum_exp.ln();

            for j in 0..seqlen_k {
                let mut probability = scores[j] / sum_exp;
                if let Some((random, p_drop)) = params.dropout {
                    let threshold = ((1.0 - p_drop) * 255.0).floor() as u8;
                    probability = if random[[h, i, j]] <= threshold {
                        probability / (1.0 - p_drop)
                    } else {
                        0.0
                    };
                }
                if probability == 0.0 {
                    continue;
                }
                for d in 0..hdim_v {
                    output[[h, i, d]] += probability * v[[kv_head, j, d]];
                }
            }
        }
    }

    (output, lse)
}

/// Random attention operands, one `[nhead, seqlen, dim]` tensor per request.
pub struct Problem {
    pub data_type: DataType,
    pub nhead_q: usize,
    pub nhead_k: usize,
    pub hdim_q: usize,
    pub hdim_v: usize,
    pub seqlens_q: Vec<usize>,
    pub seqlens_k: Vec<usize>,
    pub q: Vec<Array3<f32>>,
    pub k: Vec<Array3<f32>>,
    pub v: Vec<Array3<f32>>,
}

impl Problem {
    #[allow(clippy::too_many_arguments)]
    pub fn random(
        seed: u64,
        data_type: DataType,
        nhead_q: usize,
        nhead_k: usize,
        (hdim_q, hdim_v): (usize, usize),
        seqlens_q: &[usize],
        seqlens_k: &[usize],
        range: f32,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let q = seqlens_q.iter().map(|&seqlen| random_heads(&mut rng, nhead_q, seqlen, hdim_q, range, data_type)).collect();
        let k = seqlens_k.iter().map(|&seqlen| random_heads(&mut rng, nhead_k, seqlen, hdim_q, range, data_type)).collect();
        let v = seqlens_k.iter().map(|&seqlen| random_heads(&mut rng, nhead_k, seqlen, hdim_v, range, data_type)).collect();
        Self {
            data_type,
            nhead_q,
            nhead_k,
            hdim_q,
            hdim_v,
            seqlens_q: seqlens_q.to_vec(),
            seqlens_k: seqlens_k.to_vec(),
            q,
            k,
            v,
        }
    }

    pub fn batch(&self) -> usize {
        self.seqlens_q.len()
    }

    pub fn total_q(&self) -> usize {
        self.seqlens_q.iter().sum()
    }

    pub fn max_seqlen_q(&self) -> usize {
        self.seqlens_q.iter().copied().max().unwrap_or(0)
    }

    /// Reference output and log-sum-exp of every request.
    pub fn reference<'p>(
        &self,
        params: impl Fn(usize) -> ReferenceParams<'p>,
    ) -> (Vec<Array3<f32>>, Vec<Array2<f32>>) {
        (0..self.batch())
            .map(|b| reference_attention(self.q[b].view(), self.k[b].view(), self.v[b].view(), &params(b)))
            .unzip()
    }

    pub fn q_strides(&self) -> Strides {
        Strides::bshd(self.nhead_q, self.hdim_q, self.seqlens_q[0])
    }

    pub fn k_strides(&self) -> Strides {
        Strides::bshd(self.nhead_k, self.hdim_q, self.seqlens_k[0])
    }

    pub fn v_strides(&self) -> Strides {
        Strides::bshd(self.nhead_k, self.hdim_v, self.seqlens_k[0])
    }

    pub fn o_strides(&self) -> Strides {
        Strides::bshd(self.nhead_q, self.hdim_v, self.seqlens_q[0])
    }

    /// `[nhead, total_q]` log-sum-exp layout, valid in both modes.
    pub fn lse_strides(&self) -> Strides {
        Strides {
            row: 1,
            head: self.total_q(),
            batch: self.seqlens_q[0],
        }
    }

    /// Reads a `[nhead, total_q]` log-sum-exp buffer back per request.
    pub fn unpack_lse(
        &self,
        values: &[f32],
    ) -> Vec<Array2<f32>> {
        let total_q = self.total_q();
        let mut start = 0;
        self.seqlens_q
            .iter()
            .map(|&seqlen| {
                let lse = Array2::from_shape_fn((self.nhead_q, seqlen), |(head, row)| values[head * total_q + start + row]);
                start += seqlen;
                lse
            })
            .collect()
    }

    pub fn buffers(&self) -> Buffers {
        Buffers {
            q: element_buffer(&pack_bshd(&self.q), self.data_type),
            k: element_buffer(&pack_bshd(&self.k), self.data_type),
            v: element_buffer(&pack_bshd(&self.v), self.data_type),
            o: CpuBuffer::new(self.total_q() * self.nhead_q * self.hdim_v * self.data_type.size_in_bytes()),
            lse: CpuBuffer::filled(0.0f32, self.total_q() * self.nhead_q),
            seqstart_q: CpuBuffer::from_slice(&seqstarts(&self.seqlens_q)),
            seqstart_k: CpuBuffer::from_slice(&seqstarts(&self.seqlens_k)),
        }
    }

    /// Arguments without bias or soft cap; `lse` is attached.
    pub fn attention_arguments<'a>(
        &self,
        buffers: &'a Buffers,
        is_group_mode: bool,
    ) -> AttentionArguments<'a, Cpu> {
        let sequence = if is_group_mode {
            SequenceLayout::Group {
                seqstart_q: &buffers.seqstart_q,
                seqstart_k: &buffers.seqstart_k,
                seqlen_k: None,
                max_seqlen_q: self.max_seqlen_q(),
            }
        } else {
            SequenceLayout::Batch {
                seqlen_q: self.seqlens_q[0],
                seqlen_k: self.seqlens_k[0],
            }
        };
        AttentionArguments {
            q: &buffers.q,
            k: &buffers.k,
            v: &buffers.v,
            o: &buffers.o,
            bias: None,
            lse: Some(&buffers.lse),
            sequence,
            batch: self.batch(),
            nhead_q: self.nhead_q,
            nhead_k: self.nhead_k,
            hdim_q: self.hdim_q,
            hdim_v: self.hdim_v,
            q_strides: self.q_strides(),
            k_strides: self.k_strides(),
            v_strides: self.v_strides(),
            o_strides: self.o_strides(),
            bias_strides: Strides::default(),
            lse_strides: self.lse_strides(),
            scale_s: 1.0 / (self.hdim_q as f32).sqrt(),
            logits_soft_cap: 0.0,
        }
    }
}

pub struct Buffers {
    pub q: CpuBuffer,
    pub k: CpuBuffer,
    pub v: CpuBuffer,
    pub o: CpuBuffer,
    pub lse: CpuBuffer,
    pub seqstart_q: CpuBuffer,
    pub seqstart_k: CpuBuffer,
}

pub fn fwd_arguments(attention: AttentionArguments<'_, Cpu>) -> FwdArguments<'_, Cpu> {
    FwdArguments {
        attention,
        rand_val: None,
        rand_val_strides: Strides::default(),
        p_drop: 0.0,
        drop_seed: 0,
        drop_offset: 0,
    }
}

pub fn assert_close(
    expected: &[f32],
    actual: &[f32],
    tolerance: f32,
) {
    let (close, max_diff) = compare_outputs(expected, actual, tolerance, tolerance);
    assert!(close, "outputs differ, max diff {max_diff}");
}
