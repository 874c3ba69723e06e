use super::{
    attention::{LogitsParams, RowOutput, attend_row, combine},
    fwd::{attention_requests, check_attention, read_operands},
    operands::{HeadResult, OutputTarget, check_mask},
};
use crate::{
    DataType, MaskInfo,
    arguments::{MAX_SPLITS, SplitKvArguments},
    backends::{
        common::SplitKvKernel,
        cpu::{backend::Cpu, error::CpuError, stream::CpuStream},
    },
    traits::MhaFwdSplitKvTraits,
};

/// Reference split-KV kernel: partial attention per key split into the
/// accumulators, then a log-sum-exp weighted reduction into `o`.
#[derive(Debug, Clone)]
pub struct CpuSplitKvKernel {
    name: String,
    traits: MhaFwdSplitKvTraits,
}

impl CpuSplitKvKernel {
    pub fn new(traits: MhaFwdSplitKvTraits) -> Self {
        Self {
            name: traits.to_string(),
            traits,
        }
    }

    pub fn traits(&self) -> &MhaFwdSplitKvTraits {
        &self.traits
    }

    fn run(
        &self,
        arguments: &SplitKvArguments<Cpu>,
        mask: &MaskInfo,
    ) -> Result<(), CpuError> {
        let attention = &arguments.attention;
        let traits = &self.traits;
        check_attention(&self.name, attention, traits.hdim_q, traits.hdim_v, traits.is_group_mode)?;
        check_mask(&self.name, mask, traits.mask_type)?;
        let num_splits = arguments.num_splits;
        if num_splits == 0 || num_splits > MAX_SPLITS {
            return Err(CpuError::InvalidSplitCount(num_splits));
        }
        let lse = match (traits.has_lse, attention.lse) {
            (true, Some(lse)) => Some((lse, attention.lse_strides)),
            (true, None) => return Err(CpuError::MissingBuffer("lse")),
            (false, _) => None,
        };

        let operands = read_operands(attention, traits.data_type, traits.bias_type)?;
        let requests = attention_requests(attention)?;
        let logits_soft_cap = traits.has_logits_soft_cap.then_some(attention.logits_soft_cap);

        // partials[split] holds every (request, head) of that split
        let mut partials = (0..num_splits).map(|_| Vec::new()).collect::<Vec<Vec<HeadResult>>>();
        for request in &requests {
            let chunk = request.seqlen_k.div_ceil(num_splits);
            for head in 0..attention.nhead_q {
                let view = operands.head(request, head)?;
                let params = LogitsParams {
                    scale_s: attention.scale_s,
                    logits_soft_cap,
                    mask: *mask,
                    bias: operands.head_bias(request, head)?,
                };
                for (split, results) in partials.iter_mut().enumerate() {
                    let start = (split * chunk).min(request.seqlen_k);
                    let end = (start + chunk).min(request.seqlen_k);
                    let rows = (0..request.seqlen_q).map(|row| attend_row(&view, &params, row, start..end, None)).collect();
                    results.push(HeadResult {
                        request,
                        head,
                        rows,
                    });
                }
            }
        }

        for (split, results) in partials.iter().enumerate() {
            OutputTarget {
                o: arguments.o_acc,
                o_strides: arguments.o_acc_strides,
                o_data_type: DataType::F32,
                base_offset: (split * arguments.o_acc_split_stride, split * arguments.lse_acc_split_stride),
                lse: Some((arguments.lse_acc, arguments.lse_acc_strides)),
            }
            .write(results, attention.is_group_mode())?;
        }

        let combined = (0..partials[0].len())
            .map(|index| {
                let first = &partials[0][index];
                let rows = (0..first.rows.len())
                    .map(|row| {
                        let row_partials =
                            partials.iter().map(|split| split[index].rows[row].clone()).collect::<Vec<RowOutput>>();
                        combine(&row_partials, attention.hdim_v)
                    })
                    .collect();
                HeadResult {
                    request: first.request,
                    head: first.head,
                    rows,
                }
            })
            .collect::<Vec<HeadResult>>();

        OutputTarget {
            o: attention.o,
            o_strides: attention.o_strides,
            o_data_type: traits.data_type,
            base_offset: (0, 0),
            lse,
        }
        .write(&combined, attention.is_group_mode())
    }
}

impl SplitKvKernel for CpuSplitKvKernel {
    type Backend = Cpu;

    fn name(&self) -> &str {
        &self.name
    }

    fn launch(
        &self,
        arguments: &SplitKvArguments<Cpu>,
        mask: &MaskInfo,
        stream: &CpuStream,
    ) {
        stream.submit(&self.name, || self.run(arguments, mask));
    }
}
