use super::{
    attention::{LogitsParams, attend_row},
    operands::{
        HeadResult, Operands, OutputTarget, check_heads, check_mask, check_max_seqlen_q, group_requests,
        paged_requests, read_bias, snapshot,
    },
};
use crate::{
    BiasType, DataType, MaskInfo,
    arguments::{BatchPrefillArguments, KvCache, Strides},
    backends::{
        common::BatchPrefillKernel,
        cpu::{backend::Cpu, buffer::CpuBuffer, error::CpuError, stream::CpuStream},
    },
    traits::MhaFwdTraits,
};

/// Reference batch-prefill kernel over a contiguous or paged KV cache.
///
/// Prefill specializations are built without dropout.
#[derive(Debug, Clone)]
pub struct CpuBatchPrefillKernel {
    name: String,
    traits: MhaFwdTraits,
}

impl CpuBatchPrefillKernel {
    pub fn new(traits: MhaFwdTraits) -> Self {
        Self {
            name: traits.to_string().replacen("fmha_fwd_", "fmha_batch_prefill_", 1),
            traits,
        }
    }

    pub fn traits(&self) -> &MhaFwdTraits {
        &self.traits
    }

    fn run(
        &self,
        arguments: &BatchPrefillArguments<Cpu>,
        mask: &MaskInfo,
    ) -> Result<(), CpuError> {
        let traits = &self.traits;
        check_heads(
            &self.name,
            (traits.hdim_q, traits.hdim_v),
            arguments.hdim_q,
            arguments.hdim_v,
            arguments.nhead_q,
            arguments.nhead_k,
        )?;
        check_mask(&self.name, mask, traits.mask_type)?;
        let lse = match (traits.has_lse, arguments.lse) {
            (true, Some(lse)) => Some((lse, arguments.lse_strides)),
            (true, None) => return Err(CpuError::MissingBuffer("lse")),
            (false, _) => None,
        };

        let (k, v, k_strides, v_strides) = match &arguments.kv {
            KvCache::Contiguous {
                k,
                v,
                k_strides,
                v_strides,
                ..
            }
            | KvCache::Paged {
                k,
                v,
                k_strides,
                v_strides,
                ..
            } => (*k, *v, *k_strides, *v_strides),
        };
        let requests = match &arguments.kv {
            KvCache::Contiguous {
                seqstart_k,
                ..
            } => group_requests(arguments.batch, arguments.seqstart_q, seqstart_k, None)?,
            KvCache::Paged {
                kv_indptr,
                kv_page_indices,
                kv_last_page_lens,
                page_block_size,
                ..
            } => paged_requests(
                arguments.batch,
                arguments.seqstart_q,
                kv_indptr,
                kv_page_indices,
                kv_last_page_lens,
                *page_block_size,
            )?,
        };
        check_max_seqlen_q(&requests, arguments.max_seqlen_q)?;
        let operands = read_operands(arguments, traits.data_type, traits.bias_type, (k, v), (k_strides, v_strides))?;
        let logits_soft_cap = traits.has_logits_soft_cap.then_some(arguments.logits_soft_cap);

        let mut results = Vec::new();
        for request in &requests {
            for head in 0..arguments.nhead_q {
                let view = operands.head(request, head)?;
                let params = LogitsParams {
                    scale_s: arguments.scale_s,
                    logits_soft_cap,
                    mask: *mask,
                    bias: operands.head_bias(request, head)?,
                };
                let rows =
                    (0..request.seqlen_q).map(|row| attend_row(&view, &params, row, 0..request.seqlen_k, None)).collect();
                results.push(HeadResult {
                    request,
                    head,
                    rows,
                });
            }
        }

        OutputTarget {
            o: arguments.o,
            o_strides: arguments.o_strides,
            o_data_type: traits.data_type,
            base_offset: (0, 0),
            lse,
        }
        .write(&results, true)
    }
}

impl BatchPrefillKernel for CpuBatchPrefillKernel {
    type Backend = Cpu;

    fn name(&self) -> &str {
        &self.name
    }

    fn launch(
        &self,
        arguments: &BatchPrefillArguments<Cpu>,
        mask: &MaskInfo,
        stream: &CpuStream,
    ) {
        stream.submit(&self.name, || self.run(arguments, mask));
    }
}

fn read_operands(
    arguments: &BatchPrefillArguments<Cpu>,
    data_type: DataType,
    bias_type: BiasType,
    (k, v): (&CpuBuffer, &CpuBuffer),
    (k_strides, v_strides): (Strides, Strides),
) -> Result<Operands, CpuError> {
    Ok(Operands {
        q: snapshot(arguments.q, data_type)?,
        k: snapshot(k, data_type)?,
        v: snapshot(v, data_type)?,
        bias: read_bias(arguments.bias, bias_type, data_type)?,
        q_strides: arguments.q_strides,
        k_strides,
        v_strides,
        bias_strides: arguments.bias_strides,
        nhead_q: arguments.nhead_q,
        nhead_k: arguments.nhead_k,
        hdim_q: arguments.hdim_q,
        hdim_v: arguments.hdim_v,
        is_group_mode: true,
    })
}
