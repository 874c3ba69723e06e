use itertools::iproduct;

use crate::{
    BiasType, DataType, MaskInfo, MaskType,
    traits::{MhaFwdSplitKvTraits, MhaFwdTraits},
};

const FORWARD_HEAD_SIZES: [(usize, usize); 7] =
    [(32, 32), (64, 64), (96, 128), (128, 128), (192, 128), (192, 192), (256, 256)];
const SPLIT_KV_HEAD_SIZES: [(usize, usize); 3] = [(64, 64), (128, 128), (256, 256)];
const BATCH_PREFILL_HEAD_SIZES: [(usize, usize); 2] = [(64, 64), (128, 128)];
const DATA_TYPES: [DataType; 2] = [DataType::F16, DataType::BF16];
const FLAGS: [bool; 2] = [false, true];

fn mask_of(mask_type: MaskType) -> MaskInfo {
    MaskInfo {
        mask_type,
        left: -1,
        right: -1,
    }
}

/// The logits soft cap is only built for kernels without bias.
fn is_built(
    bias_type: BiasType,
    has_logits_soft_cap: bool,
) -> bool {
    !has_logits_soft_cap || bias_type == BiasType::NoBias
}

pub fn forward() -> Vec<MhaFwdTraits> {
    iproduct!(FORWARD_HEAD_SIZES, DATA_TYPES, FLAGS, FLAGS, MaskType::ALL, BiasType::ALL, FLAGS, FLAGS)
        .filter(|&(_, _, _, has_logits_soft_cap, _, bias_type, _, _)| is_built(bias_type, has_logits_soft_cap))
        .map(
            |((hdim_q, hdim_v), data_type, is_group_mode, has_logits_soft_cap, mask_type, bias_type, has_lse, has_dropout)| {
                MhaFwdTraits::new(
                    hdim_q,
                    hdim_v,
                    data_type,
                    is_group_mode,
                    has_logits_soft_cap,
                    &mask_of(mask_type),
                    bias_type,
                    has_lse,
                    has_dropout,
                )
            },
        )
        .collect()
}

pub fn split_kv() -> Vec<MhaFwdSplitKvTraits> {
    iproduct!(SPLIT_KV_HEAD_SIZES, DATA_TYPES, FLAGS, FLAGS, MaskType::ALL, BiasType::ALL, FLAGS)
        .filter(|&(_, _, _, has_logits_soft_cap, _, bias_type, _)| is_built(bias_type, has_logits_soft_cap))
        .map(|((hdim_q, hdim_v), data_type, is_group_mode, has_logits_soft_cap, mask_type, bias_type, has_lse)| {
            MhaFwdSplitKvTraits::new(
                hdim_q,
                hdim_v,
                data_type,
                is_group_mode,
                has_logits_soft_cap,
                &mask_of(mask_type),
                bias_type,
                has_lse,
            )
        })
        .collect()
}

/// Group mode only, without dropout, with either no bias or ALiBi.
pub fn batch_prefill() -> Vec<MhaFwdTraits> {
    iproduct!(BATCH_PREFILL_HEAD_SIZES, DATA_TYPES, FLAGS, MaskType::ALL, [BiasType::NoBias, BiasType::Alibi], FLAGS)
        .filter(|&(_, _, has_logits_soft_cap, _, bias_type, _)| is_built(bias_type, has_logits_soft_cap))
        .map(|((hdim_q, hdim_v), data_type, has_logits_soft_cap, mask_type, bias_type, has_lse)| {
            MhaFwdTraits::new(
                hdim_q,
                hdim_v,
                data_type,
                true,
                has_logits_soft_cap,
                &mask_of(mask_type),
                bias_type,
                has_lse,
                false,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn tables_have_no_duplicates() {
        assert_eq!(forward().into_iter().collect::<HashSet<_>>().len(), forward().len());
        assert_eq!(split_kv().into_iter().collect::<HashSet<_>>().len(), split_kv().len());
        assert_eq!(batch_prefill().into_iter().collect::<HashSet<_>>().len(), batch_prefill().len());
    }

    #[test]
    fn table_sizes() {
        // 7 head sizes x 2 dtypes x 2 modes x 4 masks x 2 lse x 2 dropout x (3 + 1) bias/soft-cap pairs
        assert_eq!(forward().len(), 7 * 2 * 2 * 4 * 2 * 2 * 4);
        assert_eq!(split_kv().len(), 3 * 2 * 2 * 4 * 2 * 4);
        assert_eq!(batch_prefill().len(), 2 * 2 * 4 * 2 * 3);
    }

    #[test]
    fn soft_cap_requires_no_bias() {
        assert!(forward().iter().all(|traits| !traits.has_logits_soft_cap || traits.bias_type == BiasType::NoBias));
        assert!(batch_prefill().iter().all(|traits| traits.is_group_mode && !traits.has_dropout));
    }
}
