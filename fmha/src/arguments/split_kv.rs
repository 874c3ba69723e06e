use super::{AttentionArguments, Strides};
use crate::backends::common::Backend;

/// Largest split count a split-KV kernel accepts.
pub const MAX_SPLITS: usize = 128;

pub struct SplitKvArguments<'a, B: Backend> {
    pub attention: AttentionArguments<'a, B>,
    pub num_splits: usize,
    /// `f32` partial log-sum-exp per `(split, batch, head, row)`.
    pub lse_acc: &'a B::NativeBuffer,
    pub lse_acc_strides: Strides,
    pub lse_acc_split_stride: usize,
    /// `f32` partial output per `(split, batch, head, row, dim_v)`.
    pub o_acc: &'a B::NativeBuffer,
    pub o_acc_strides: Strides,
    pub o_acc_split_stride: usize,
}

fn ceil_div(
    a: usize,
    b: usize,
) -> usize {
    a.div_ceil(b)
}

/// Picks the split count that best fills `num_sms` compute units.
///
/// Splitting only pays off while `batch_nhead_mblocks` leaves units idle, and
/// split counts that produce the same number of key blocks per split as the
/// previous count are skipped. Returns the smallest count within 85% of the
/// best wave efficiency.
pub fn num_splits_heuristic(
    batch_nhead_mblocks: usize,
    num_sms: usize,
    num_n_blocks: usize,
    max_splits: usize,
) -> usize {
    if num_sms == 0 || num_n_blocks == 0 {
        return 1;
    }
    if batch_nhead_mblocks as f32 >= 0.8 * num_sms as f32 {
        return 1;
    }
    let max_splits = max_splits.min(num_sms).min(num_n_blocks).min(MAX_SPLITS);
    let is_split_eligible = |num_splits: usize| {
        num_splits == 1 || ceil_div(num_n_blocks, num_splits) != ceil_div(num_n_blocks, num_splits - 1)
    };

    let efficiency = (1..=max_splits)
        .map(|num_splits| {
            if !is_split_eligible(num_splits) {
                return 0.0f32;
            }
            let waves = (batch_nhead_mblocks * num_splits) as f32 / num_sms as f32;
            waves / waves.ceil()
        })
        .collect::<Vec<f32>>();
    let max_efficiency = efficiency.iter().copied().fold(0.0f32, f32::max);

    (1..=max_splits)
        .filter(|&num_splits| is_split_eligible(num_splits))
        .find(|&num_splits| efficiency[num_splits - 1] >= 0.85 * max_efficiency)
        .unwrap_or(1)
}
