use super::{
    attention::{LogitsParams, RowDropout, attend_row},
    dropout::Dropout,
    operands::{
        HeadResult, Operands, OutputTarget, Request, batch_requests, check_heads, check_mask, check_max_seqlen_q,
        group_requests, read_bias, snapshot,
    },
};
use crate::{
    BiasType, DataType, MaskInfo,
    arguments::{AttentionArguments, FwdArguments, SequenceLayout},
    backends::{
        common::ForwardKernel,
        cpu::{backend::Cpu, buffer::CpuBuffer, error::CpuError, stream::CpuStream},
    },
    traits::MhaFwdTraits,
};

/// Reference monolithic forward kernel for one specialization.
#[derive(Debug, Clone)]
pub struct CpuForwardKernel {
    name: String,
    traits: MhaFwdTraits,
}

impl CpuForwardKernel {
    pub fn new(traits: MhaFwdTraits) -> Self {
        Self {
            name: traits.to_string(),
            traits,
        }
    }

    pub fn traits(&self) -> &MhaFwdTraits {
        &self.traits
    }

    fn run(
        &self,
        arguments: &FwdArguments<Cpu>,
        mask: &MaskInfo,
    ) -> Result<(), CpuError> {
        let attention = &arguments.attention;
        let traits = &self.traits;
        check_attention(&self.name, attention, traits.hdim_q, traits.hdim_v, traits.is_group_mode)?;
        check_mask(&self.name, mask, traits.mask_type)?;

        let dropout = if traits.has_dropout {
            Some(Dropout::new(arguments.p_drop, arguments.drop_seed, arguments.drop_offset)?)
        } else {
            None
        };
        let lse = match (traits.has_lse, attention.lse) {
            (true, Some(lse)) => Some((lse, attention.lse_strides)),
            (true, None) => return Err(CpuError::MissingBuffer("lse")),
            (false, _) => None,
        };

        let operands = read_operands(attention, traits.data_type, traits.bias_type)?;
        let requests = attention_requests(attention)?;
        let logits_soft_cap = traits.has_logits_soft_cap.then_some(attention.logits_soft_cap);

        let mut rand_values = Vec::new();
        let mut results = Vec::new();
        for request in &requests {
            for head in 0..attention.nhead_q {
                let view = operands.head(request, head)?;
                let params = LogitsParams {
                    scale_s: attention.scale_s,
                    logits_soft_cap,
                    mask: *mask,
                    bias: operands.head_bias(request, head)?,
                };
                let rows = (0..request.seqlen_q)
                    .map(|row| match &dropout {
                        None => attend_row(&view, &params, row, 0..request.seqlen_k, None),
                        Some(dropout) => {
                            let values = dropout.row_values(request.batch, head, row, request.seqlen_k);
                            let keep = values.iter().map(|&value| dropout.keeps(value)).collect::<Vec<bool>>();
                            let output = attend_row(
                                &view,
                                &params,
                                row,
                                0..request.seqlen_k,
                                Some(&RowDropout {
                                    keep: &keep,
                                    rescale: dropout.rescale,
                                }),
                            );
                            let offset = request.query_offset(
                                &arguments.rand_val_strides,
                                head,
                                row,
                                attention.is_group_mode(),
                            );
                            rand_values.push((offset, values));
                            output
                        },
                    })
                    .collect();
                results.push(HeadResult {
                    request,
                    head,
                    rows,
                });
            }
        }

        OutputTarget {
            o: attention.o,
            o_strides: attention.o_strides,
            o_data_type: traits.data_type,
            base_offset: (0, 0),
            lse,
        }
        .write(&results, attention.is_group_mode())?;

        if let Some(rand_val) = arguments.rand_val {
            store_rand_values(rand_val, &rand_values)?;
        }
        Ok(())
    }
}

impl ForwardKernel for CpuForwardKernel {
    type Backend = Cpu;

    fn name(&self) -> &str {
        &self.name
    }

    fn launch(
        &self,
        arguments: &FwdArguments<Cpu>,
        mask: &MaskInfo,
        stream: &CpuStream,
    ) {
        stream.submit(&self.name, || self.run(arguments, mask));
    }
}

fn store_rand_values(
    rand_val: &CpuBuffer,
    rows: &[(usize, Vec<u8>)],
) -> Result<(), CpuError> {
    let mut bytes = rand_val.write_guard();
    let length = bytes.len();
    for (offset, values) in rows {
        let destination = bytes.get_mut(*offset..offset + values.len()).ok_or(CpuError::OutOfBounds {
            buffer: "rand_val",
            index: offset + values.len().saturating_sub(1),
            length,
        })?;
        destination.copy_from_slice(values);
    }
    Ok(())
}

/// Checks shared by the monolithic and split-KV kernels.
pub(super) fn check_attention(
    kernel: &str,
    attention: &AttentionArguments<Cpu>,
    hdim_q: usize,
    hdim_v: usize,
    is_group_mode: bool,
) -> Result<(), CpuError> {
    check_heads(kernel, (hdim_q, hdim_v), attention.hdim_q, attention.hdim_v, attention.nhead_q, attention.nhead_k)?;
    if attention.is_group_mode() != is_group_mode {
        return Err(CpuError::ModeMismatch(kernel.to_string()));
    }
    Ok(())
}

pub(super) fn read_operands(
    attention: &AttentionArguments<Cpu>,
    data_type: DataType,
    bias_type: BiasType,
) -> Result<Operands, CpuError> {
    Ok(Operands {
        q: snapshot(attention.q, data_type)?,
        k: snapshot(attention.k, data_type)?,
        v: snapshot(attention.v, data_type)?,
        bias: read_bias(attention.bias, bias_type, data_type)?,
        q_strides: attention.q_strides,
        k_strides: attention.k_strides,
        v_strides: attention.v_strides,
        bias_strides: attention.bias_strides,
        nhead_q: attention.nhead_q,
        nhead_k: attention.nhead_k,
        hdim_q: attention.hdim_q,
        hdim_v: attention.hdim_v,
        is_group_mode: attention.is_group_mode(),
    })
}

pub(super) fn attention_requests(attention: &AttentionArguments<Cpu>) -> Result<Vec<Request>, CpuError> {
    match &attention.sequence {
        SequenceLayout::Batch {
            seqlen_q,
            seqlen_k,
        } => Ok(batch_requests(attention.batch, *seqlen_q, *seqlen_k)),
        SequenceLayout::Group {
            seqstart_q,
            seqstart_k,
            seqlen_k,
            max_seqlen_q,
        } => {
            let requests = group_requests(attention.batch, seqstart_q, seqstart_k, *seqlen_k)?;
            check_max_seqlen_q(&requests, *max_seqlen_q)?;
            Ok(requests)
        },
    }
}
