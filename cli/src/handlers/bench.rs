use std::process::ExitCode;

use clap::Args;
use comfy_table::{CellAlignment, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use console::Style;
use fmha::{
    BiasType, DataType, DispatchResult, MaskInfo, StreamConfig,
    arguments::{
        AttentionArguments, BatchPrefillArguments, FwdArguments, KvCache, SequenceLayout, SplitKvArguments, Strides,
    },
    backends::{
        common::Stream,
        cpu::{Cpu, CpuBuffer, CpuKernels, CpuStream},
    },
    batch_prefill, forward, forward_split_kv,
};
use half::{bf16, f16};
use indicatif::ProgressBar;
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::Family;

/// Exit status of a dispatch that matched no specialization.
const MISS_EXIT_CODE: u8 = 2;

#[derive(Debug, Clone, Args)]
pub struct BenchOptions {
    #[arg(long, value_enum, default_value_t = Family::Forward)]
    pub family: Family,
    /// Element type tag passed to the dispatcher
    #[arg(long, default_value = "fp16")]
    pub dtype: String,
    #[arg(long, default_value_t = 64)]
    pub hdim: usize,
    /// Value head size, defaults to `--hdim`
    #[arg(long)]
    pub hdim_v: Option<usize>,
    #[arg(long, default_value_t = 2)]
    pub batch: usize,
    #[arg(long, default_value_t = 8)]
    pub nhead: usize,
    /// Key/value heads, defaults to `--nhead`
    #[arg(long)]
    pub nhead_k: Option<usize>,
    #[arg(long, default_value_t = 128)]
    pub seqlen_q: usize,
    #[arg(long, default_value_t = 128)]
    pub seqlen_k: usize,
    /// Pack requests along the sequence axis (always on for batch prefill)
    #[arg(long)]
    pub group: bool,
    /// Mask descriptor: `n`, `t`, `b`, `t:l,r`, `b:l,r` or `g:l,r`
    #[arg(long, default_value = "n")]
    pub mask: MaskInfo,
    /// Bias kind: `n`, `e` or `a`
    #[arg(long, default_value = "n")]
    pub bias: BiasType,
    #[arg(long)]
    pub lse: bool,
    #[arg(long, default_value_t = 4)]
    pub splits: usize,
    #[arg(long, default_value_t = 0.0)]
    pub p_drop: f32,
    #[arg(long, default_value_t = 0.0)]
    pub soft_cap: f32,
    #[arg(long, default_value_t = 1)]
    pub warmup: usize,
    #[arg(long, default_value_t = 5)]
    pub repeat: usize,
    /// Timed dispatches; the table reports their spread
    #[arg(long, default_value_t = 3)]
    pub runs: usize,
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

impl BenchOptions {
    fn is_group_mode(&self) -> bool {
        self.group || self.family == Family::BatchPrefill
    }

    fn hdim_v(&self) -> usize {
        self.hdim_v.unwrap_or(self.hdim)
    }

    fn nhead_k(&self) -> usize {
        self.nhead_k.unwrap_or(self.nhead)
    }

    fn total_q(&self) -> usize {
        self.batch * self.seqlen_q
    }
}

/// Encodes `values` in the element type named by `dtype`; unknown tags fall back to `f32`.
fn element_buffer(
    values: &[f32],
    dtype: &str,
) -> CpuBuffer {
    match dtype.parse::<DataType>() {
        Ok(DataType::F16) => CpuBuffer::from_slice(&values.iter().map(|&value| f16::from_f32(value)).collect::<Vec<_>>()),
        Ok(DataType::BF16) => {
            CpuBuffer::from_slice(&values.iter().map(|&value| bf16::from_f32(value)).collect::<Vec<_>>())
        },
        _ => CpuBuffer::from_slice(values),
    }
}

fn seqstarts(
    batch: usize,
    seqlen: usize,
) -> CpuBuffer {
    CpuBuffer::from_slice(&(0..=batch).map(|b| (b * seqlen) as i32).collect::<Vec<i32>>())
}

/// Buffers of one benchmark problem: equal-length requests packed `[token, head, dim]`.
struct Workload {
    q: CpuBuffer,
    k: CpuBuffer,
    v: CpuBuffer,
    o: CpuBuffer,
    bias: Option<CpuBuffer>,
    lse: CpuBuffer,
    seqstart_q: CpuBuffer,
    seqstart_k: CpuBuffer,
    o_acc: CpuBuffer,
    lse_acc: CpuBuffer,
}

impl Workload {
    fn new(options: &BenchOptions) -> Self {
        let mut rng = StdRng::seed_from_u64(options.seed);
        let mut random = |count: usize| (0..count).map(|_| rng.random_range(-1.0f32..1.0)).collect::<Vec<f32>>();

        let total_q = options.total_q();
        let total_k = options.batch * options.seqlen_k;
        let (hdim_q, hdim_v) = (options.hdim, options.hdim_v());
        let q = element_buffer(&random(total_q * options.nhead * hdim_q), &options.dtype);
        let k = element_buffer(&random(total_k * options.nhead_k() * hdim_q), &options.dtype);
        let v = element_buffer(&random(total_k * options.nhead_k() * hdim_v), &options.dtype);
        let bias = match options.bias {
            BiasType::NoBias => None,
            BiasType::Elementwise => {
                Some(element_buffer(&random(options.nhead * total_q * options.seqlen_k), &options.dtype))
            },
            BiasType::Alibi => Some(CpuBuffer::from_slice(
                &(0..options.nhead)
                    .map(|head| 2.0f32.powf(-8.0 * (head + 1) as f32 / options.nhead as f32))
                    .collect::<Vec<f32>>(),
            )),
        };

        Self {
            q,
            k,
            v,
            o: element_buffer(&vec![0.0; total_q * options.nhead * hdim_v], &options.dtype),
            bias,
            lse: CpuBuffer::filled(0.0f32, options.nhead * total_q),
            seqstart_q: seqstarts(options.batch, options.seqlen_q),
            seqstart_k: seqstarts(options.batch, options.seqlen_k),
            o_acc: CpuBuffer::filled(0.0f32, options.splits * options.nhead * total_q * hdim_v),
            lse_acc: CpuBuffer::filled(0.0f32, options.splits * options.nhead * total_q),
        }
    }

    fn q_strides(options: &BenchOptions) -> Strides {
        Strides::bshd(options.nhead, options.hdim, options.seqlen_q)
    }

    fn k_strides(options: &BenchOptions) -> Strides {
        Strides::bshd(options.nhead_k(), options.hdim, options.seqlen_k)
    }

    fn v_strides(options: &BenchOptions) -> Strides {
        Strides::bshd(options.nhead_k(), options.hdim_v(), options.seqlen_k)
    }

    fn o_strides(options: &BenchOptions) -> Strides {
        Strides::bshd(options.nhead, options.hdim_v(), options.seqlen_q)
    }

    /// `[head, token]` over the packed queries.
    fn lse_strides(options: &BenchOptions) -> Strides {
        Strides {
            row: 1,
            head: options.total_q(),
            batch: options.seqlen_q,
        }
    }

    /// `[head, token, key]` over the packed queries; ALiBi slopes are one per head.
    fn bias_strides(options: &BenchOptions) -> Strides {
        match options.bias {
            BiasType::Alibi => Strides {
                row: 0,
                head: 1,
                batch: 0,
            },
            _ => Strides {
                row: options.seqlen_k,
                head: options.total_q() * options.seqlen_k,
                batch: options.seqlen_q * options.seqlen_k,
            },
        }
    }

    fn lse(
        &self,
        options: &BenchOptions,
    ) -> Option<&CpuBuffer> {
        options.lse.then_some(&self.lse)
    }

    fn attention(
        &self,
        options: &BenchOptions,
    ) -> AttentionArguments<'_, Cpu> {
        let sequence = if options.is_group_mode() {
            SequenceLayout::Group {
                seqstart_q: &self.seqstart_q,
                seqstart_k: &self.seqstart_k,
                seqlen_k: None,
                max_seqlen_q: options.seqlen_q,
            }
        } else {
            SequenceLayout::Batch {
                seqlen_q: options.seqlen_q,
                seqlen_k: options.seqlen_k,
            }
        };
        AttentionArguments {
            q: &self.q,
            k: &self.k,
            v: &self.v,
            o: &self.o,
            bias: self.bias.as_ref(),
            lse: self.lse(options),
            sequence,
            batch: options.batch,
            nhead_q: options.nhead,
            nhead_k: options.nhead_k(),
            hdim_q: options.hdim,
            hdim_v: options.hdim_v(),
            q_strides: Self::q_strides(options),
            k_strides: Self::k_strides(options),
            v_strides: Self::v_strides(options),
            o_strides: Self::o_strides(options),
            bias_strides: Self::bias_strides(options),
            lse_strides: Self::lse_strides(options),
            scale_s: 1.0 / (options.hdim as f32).sqrt(),
            logits_soft_cap: options.soft_cap,
        }
    }

    fn dispatch(
        &self,
        kernels: &CpuKernels,
        options: &BenchOptions,
        stream_config: &StreamConfig<CpuStream>,
    ) -> DispatchResult {
        let is_group_mode = options.is_group_mode();
        match options.family {
            Family::Forward => {
                let arguments = FwdArguments {
                    attention: self.attention(options),
                    rand_val: None,
                    rand_val_strides: Strides::default(),
                    p_drop: options.p_drop,
                    drop_seed: options.seed,
                    drop_offset: 0,
                };
                forward(
                    kernels,
                    &arguments,
                    stream_config,
                    &options.dtype,
                    is_group_mode,
                    &options.mask,
                    options.bias,
                    options.lse,
                )
            },
            Family::SplitKv => {
                let rows = options.nhead * options.total_q();
                let arguments = SplitKvArguments {
                    attention: self.attention(options),
                    num_splits: options.splits,
                    lse_acc: &self.lse_acc,
                    lse_acc_strides: Self::lse_strides(options),
                    lse_acc_split_stride: rows,
                    o_acc: &self.o_acc,
                    o_acc_strides: Strides::bshd(options.nhead, options.hdim_v(), options.seqlen_q),
                    o_acc_split_stride: rows * options.hdim_v(),
                };
                forward_split_kv(
                    kernels,
                    &arguments,
                    stream_config,
                    &options.dtype,
                    is_group_mode,
                    &options.mask,
                    options.bias,
                    options.lse,
                )
            },
            Family::BatchPrefill => {
                let arguments = BatchPrefillArguments {
                    q: &self.q,
                    o: &self.o,
                    kv: KvCache::Contiguous {
                        k: &self.k,
                        v: &self.v,
                        seqstart_k: &self.seqstart_k,
                        k_strides: Self::k_strides(options),
                        v_strides: Self::v_strides(options),
                    },
                    seqstart_q: &self.seqstart_q,
                    bias: self.bias.as_ref(),
                    lse: self.lse(options),
                    batch: options.batch,
                    nhead_q: options.nhead,
                    nhead_k: options.nhead_k(),
                    hdim_q: options.hdim,
                    hdim_v: options.hdim_v(),
                    max_seqlen_q: options.seqlen_q,
                    q_strides: Self::q_strides(options),
                    o_strides: Self::o_strides(options),
                    bias_strides: Self::bias_strides(options),
                    lse_strides: Self::lse_strides(options),
                    scale_s: 1.0 / (options.hdim as f32).sqrt(),
                    logits_soft_cap: options.soft_cap,
                    p_drop: options.p_drop,
                };
                batch_prefill(
                    kernels,
                    &arguments,
                    stream_config,
                    &options.dtype,
                    is_group_mode,
                    &options.mask,
                    options.bias,
                    options.lse,
                )
            },
        }
    }
}

pub fn handle_bench(options: &BenchOptions) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let kernels = CpuKernels::shared()?;
    let workload = Workload::new(options);
    let stream = CpuStream::new();
    let stream_config = StreamConfig::timed(&stream, options.warmup, options.repeat);

    let progress_bar = ProgressBar::new(options.runs as u64);
    progress_bar.set_position(0);
    let mut timings = Vec::with_capacity(options.runs);
    for _ in 0..options.runs {
        match workload.dispatch(kernels, options, &stream_config) {
            Ok(elapsed_ms) => timings.push(elapsed_ms as f64),
            Err(error) if error.is_miss() => {
                progress_bar.finish_and_clear();
                println!("{} {error}", Style::new().yellow().bold().apply_to("miss:"));
                return Ok(ExitCode::from(MISS_EXIT_CODE));
            },
            Err(error) => return Err(error.into()),
        }
        stream.synchronize()?;
        progress_bar.inc(1);
    }
    progress_bar.finish();

    let kernel_name = stream.launches().last().cloned().unwrap_or_else(|| "-".to_string());
    let launches = stream.launch_count().to_string();
    let time_metric = calculate_metric(&timings);
    let min_metric = format_optional(timings.iter().copied().reduce(f64::min));
    let max_metric = format_optional(timings.iter().copied().reduce(f64::max));

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Metric", "Value"])
        .add_row(vec!["Kernel", kernel_name.as_str()])
        .add_row(vec!["Launches", launches.as_str()])
        .add_row(vec!["Time, ms", time_metric.as_str()])
        .add_row(vec!["Min, ms", min_metric.as_str()])
        .add_row(vec!["Max, ms", max_metric.as_str()]);
    if let Some(column) = table.column_mut(1) {
        column.set_cell_alignment(CellAlignment::Right);
    }
    println!("{table}");

    Ok(ExitCode::SUCCESS)
}

fn format_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |value| format!("{value:.3}"))
}

fn calculate_metric(data: &[f64]) -> String {
    if let (Some(mean), Some(std_dev)) = (mean(data), std_dev(data)) {
        format!("{mean:.3} ± {std_dev:.3}")
    } else {
        format_optional(mean(data))
    }
}

fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }

    Some(data.iter().sum::<f64>() / data.len() as f64)
}

fn std_dev(data: &[f64]) -> Option<f64> {
    let n = data.len();
    if n < 2 {
        return None;
    }

    let mean = mean(data)?;
    let variance = data
        .iter()
        .map(|x| {
            let diff = x - mean;
            diff * diff
        })
        .sum::<f64>()
        / (n as f64 - 1.0);

    Some(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(family: Family) -> BenchOptions {
        BenchOptions {
            family,
            dtype: "fp16".to_string(),
            hdim: 64,
            hdim_v: None,
            batch: 2,
            nhead: 2,
            nhead_k: Some(1),
            seqlen_q: 8,
            seqlen_k: 16,
            group: false,
            mask: MaskInfo::causal_bottom_right(),
            bias: BiasType::Alibi,
            lse: true,
            splits: 2,
            p_drop: 0.0,
            soft_cap: 0.0,
            warmup: 0,
            repeat: 1,
            runs: 1,
            seed: 3,
        }
    }

    #[test]
    fn every_family_runs_on_the_reference_backend() {
        let kernels = CpuKernels::shared().unwrap();
        for family in Family::ALL {
            let options = options(family);
            let workload = Workload::new(&options);
            let stream = CpuStream::new();
            let elapsed = workload.dispatch(kernels, &options, &StreamConfig::timed(&stream, 0, 1)).unwrap();
            assert!(elapsed >= 0.0);
            stream.synchronize().unwrap();
            assert!(workload.lse.to_vec::<f32>().iter().all(|value| value.is_finite()));
        }
    }

    #[test]
    fn unbuilt_head_size_misses() {
        let options = BenchOptions {
            hdim: 77,
            ..options(Family::Forward)
        };
        let workload = Workload::new(&options);
        let stream = CpuStream::new();
        let result = workload.dispatch(CpuKernels::shared().unwrap(), &options, &StreamConfig::new(&stream));
        assert!(result.unwrap_err().is_miss());
        assert_eq!(stream.launch_count(), 0);
    }

    #[test]
    fn metrics() {
        assert_eq!(calculate_metric(&[]), "-");
        assert_eq!(calculate_metric(&[1.0]), "1.000");
        assert_eq!(calculate_metric(&[1.0, 3.0]), "2.000 ± 1.414");
    }
}
