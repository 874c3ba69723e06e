use std::ops::Range;

use crate::MaskInfo;

/// Dense per-head operands: `q` is `seqlen_q x hdim_q`, `k` is
/// `seqlen_k x hdim_q`, `v` is `seqlen_k x hdim_v`, all row-major.
pub(super) struct HeadView {
    pub q: Vec<f32>,
    pub k: Vec<f32>,
    pub v: Vec<f32>,
    pub seqlen_q: usize,
    pub seqlen_k: usize,
    pub hdim_q: usize,
    pub hdim_v: usize,
}

pub(super) enum HeadBias {
    None,
    /// `seqlen_q x seqlen_k` additive values.
    Elementwise(Vec<f32>),
    Alibi(f32),
}

impl HeadBias {
    /// ALiBi distances are measured from the bottom-right aligned diagonal.
    fn at(
        &self,
        row: usize,
        col: usize,
        seqlen_q: usize,
        seqlen_k: usize,
    ) -> f32 {
        match self {
            HeadBias::None => 0.0,
            HeadBias::Elementwise(values) => values[row * seqlen_k + col],
            HeadBias::Alibi(slope) => {
                let diagonal = row as i64 + seqlen_k as i64 - seqlen_q as i64;
                -slope * (diagonal - col as i64).abs() as f32
            },
        }
    }
}

pub(super) struct LogitsParams {
    pub scale_s: f32,
    pub logits_soft_cap: Option<f32>,
    pub mask: MaskInfo,
    pub bias: HeadBias,
}

/// Dropout decisions of one query row, one per key.
pub(super) struct RowDropout<'a> {
    pub keep: &'a [bool],
    pub rescale: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct RowOutput {
    pub o: Vec<f32>,
    /// `-inf` when no key in range is visible.
    pub lse: f32,
}

impl RowOutput {
    fn empty(hdim_v: usize) -> Self {
        Self {
            o: vec![0.0; hdim_v],
            lse: f32::NEG_INFINITY,
        }
    }
}

fn logit(
    head: &HeadView,
    params: &LogitsParams,
    row: usize,
    col: usize,
) -> f32 {
    let q = &head.q[row * head.hdim_q..(row + 1) * head.hdim_q];
    let k = &head.k[col * head.hdim_q..(col + 1) * head.hdim_q];
    let mut score = q.iter().zip(k).map(|(q, k)| q * k).sum::<f32>() * params.scale_s;
    if let Some(cap) = params.logits_soft_cap {
        score = cap * (score / cap).tanh();
    }
    score + params.bias.at(row, col, head.seqlen_q, head.seqlen_k)
}

/// Softmax attention of query `row` over the keys in `keys`.
///
/// The output is normalized over `keys` only, so partial results over
/// disjoint key ranges can be merged with [`combine`].
pub(super) fn attend_row(
    head: &HeadView,
    params: &LogitsParams,
    row: usize,
    keys: Range<usize>,
    dropout: Option<&RowDropout>,
) -> RowOutput {
    let scores = keys
        .clone()
        .filter(|&col| params.mask.is_visible(row, col, head.seqlen_q, head.seqlen_k))
        .map(|col| (col, logit(head, params, row, col)))
        .collect::<Vec<(usize, f32)>>();

    let max_score = scores.iter().map(|&(_, score)| score).fold(f32::NEG_INFINITY, f32::max);
    if scores.is_empty() || max_score == f32::NEG_INFINITY {
        return RowOutput::empty(head.hdim_v);
    }

    let weights = scores.iter().map(|&(col, score)| (col, (score - max_score).exp())).collect::<Vec<(usize, f32)>>();
    let sum = weights.iter().map(|&(_, weight)| weight).sum::<f32>();

    let mut o = vec![0.0f32; head.hdim_v];
    for &(col, weight) in &weights {
        let mut probability = weight / sum;
        if let Some(dropout) = dropout {
            probability = if dropout.keep[col] {
                probability * dropout.rescale
            } else {
                0.0
            };
        }
        let v = &head.v[col * head.hdim_v..(col + 1) * head.hdim_v];
        for (acc, value) in o.iter_mut().zip(v) {
            *acc += probability * value;
        }
    }

    RowOutput {
        o,
        lse: max_score + sum.ln(),
    }
}

/// Merges partial results over disjoint key ranges by their log-sum-exp.
pub(super) fn combine(
    partials: &[RowOutput],
    hdim_v: usize,
) -> RowOutput {
    let max_lse = partials.iter().map(|partial| partial.lse).fold(f32::NEG_INFINITY, f32::max);
    if max_lse == f32::NEG_INFINITY {
        return RowOutput::empty(hdim_v);
    }
    let sum = partials.iter().map(|partial| (partial.lse - max_lse).exp()).sum::<f32>();
    let lse = max_lse + sum.ln();

    let mut o = vec![0.0f32; hdim_v];
    for partial in partials {
        let weight = (partial.lse - lse).exp();
        if weight == 0.0 {
            continue;
        }
        for (acc, value) in o.iter_mut().zip(&partial.o) {
            *acc += weight * value;
        }
    }
    RowOutput {
        o,
        lse,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head() -> HeadView {
        HeadView {
            q: vec![1.0, 0.0, 0.0, 1.0],
            k: vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            v: vec![1.0, 2.0, 3.0],
            seqlen_q: 2,
            seqlen_k: 3,
            hdim_q: 2,
            hdim_v: 1,
        }
    }

    fn params(mask: MaskInfo) -> LogitsParams {
        LogitsParams {
            scale_s: 1.0,
            logits_soft_cap: None,
            mask,
            bias: HeadBias::None,
        }
    }

    #[test]
    fn single_visible_key_copies_its_value() {
        let output = attend_row(&head(), &params(MaskInfo::causal_top_left()), 0, 0..3, None);
        assert_eq!(output.o, vec![1.0]);
        assert_eq!(output.lse, 1.0);
    }

    #[test]
    fn fully_masked_row_is_empty() {
        let output = attend_row(&head(), &params(MaskInfo::causal_top_left()), 0, 1..3, None);
        assert_eq!(output, RowOutput::empty(1));
    }

    #[test]
    fn combining_splits_matches_one_pass() {
        let head = head();
        let params = params(MaskInfo::no_mask());
        let whole = attend_row(&head, &params, 1, 0..3, None);
        let parts = [attend_row(&head, &params, 1, 0..2, None), attend_row(&head, &params, 1, 2..3, None)];
        let merged = combine(&parts, 1);
        assert!((whole.o[0] - merged.o[0]).abs() < 1e-6);
        assert!((whole.lse - merged.lse).abs() < 1e-6);
    }

    #[test]
    fn dropout_zeroes_dropped_keys() {
        let keep = [true, false, true];
        let dropout = RowDropout {
            keep: &keep,
            rescale: 2.0,
        };
        let plain = attend_row(&head(), &params(MaskInfo::no_mask()), 1, 0..3, None);
        let dropped = attend_row(&head(), &params(MaskInfo::no_mask()), 1, 0..3, Some(&dropout));
        assert_eq!(plain.lse, dropped.lse);
        assert_ne!(plain.o, dropped.o);
    }
}
