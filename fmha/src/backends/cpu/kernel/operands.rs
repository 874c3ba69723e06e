use super::{
    attention::{HeadBias, HeadView, RowOutput},
    element,
};
use crate::{
    BiasType, DataType, MaskInfo, MaskType,
    arguments::Strides,
    backends::cpu::{buffer::CpuBuffer, error::CpuError},
};

/// Where the keys of one request live.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum KeyRows {
    /// Consecutive rows starting at `start` (always 0 in batch mode).
    Packed {
        start: usize,
    },
    Paged {
        pages: Vec<usize>,
        page_block_size: usize,
    },
}

/// One request of a launch with its resolved sequence lengths.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Request {
    pub batch: usize,
    pub q_start: usize,
    pub seqlen_q: usize,
    pub seqlen_k: usize,
    pub keys: KeyRows,
}

impl Request {
    pub fn query_offset(
        &self,
        strides: &Strides,
        head: usize,
        row: usize,
        is_group_mode: bool,
    ) -> usize {
        strides.offset(self.batch, head, self.q_start + row, is_group_mode)
    }

    pub fn key_offset(
        &self,
        strides: &Strides,
        head: usize,
        token: usize,
        is_group_mode: bool,
    ) -> usize {
        match &self.keys {
            KeyRows::Packed {
                start,
            } => strides.offset(self.batch, head, start + token, is_group_mode),
            KeyRows::Paged {
                pages,
                page_block_size,
            } => {
                pages[token / page_block_size] * strides.batch
                    + head * strides.head
                    + (token % page_block_size) * strides.row
            },
        }
    }
}

fn offsets(
    buffer: &CpuBuffer,
    name: &'static str,
    count: usize,
) -> Result<Vec<usize>, CpuError> {
    let values = element::decode_i32(&buffer.read());
    if values.len() < count {
        return Err(CpuError::OutOfBounds {
            buffer: name,
            index: count - 1,
            length: values.len(),
        });
    }
    values[..count].iter().map(|&value| usize::try_from(value).map_err(|_| CpuError::InvalidOffsets(name))).collect()
}

/// Reads `batch + 1` non-decreasing `i32` cumulative offsets.
fn cumulative_offsets(
    buffer: &CpuBuffer,
    name: &'static str,
    batch: usize,
) -> Result<Vec<usize>, CpuError> {
    let values = offsets(buffer, name, batch + 1)?;
    if values.windows(2).any(|pair| pair[0] > pair[1]) {
        return Err(CpuError::InvalidOffsets(name));
    }
    Ok(values)
}

pub(super) fn batch_requests(
    batch: usize,
    seqlen_q: usize,
    seqlen_k: usize,
) -> Vec<Request> {
    (0..batch)
        .map(|batch| Request {
            batch,
            q_start: 0,
            seqlen_q,
            seqlen_k,
            keys: KeyRows::Packed {
                start: 0,
            },
        })
        .collect()
}

/// Requests of a packed variable-length launch; `seqlen_k` overrides the key
/// lengths implied by `seqstart_k`.
pub(super) fn group_requests(
    batch: usize,
    seqstart_q: &CpuBuffer,
    seqstart_k: &CpuBuffer,
    seqlen_k: Option<&CpuBuffer>,
) -> Result<Vec<Request>, CpuError> {
    let seqstart_q = cumulative_offsets(seqstart_q, "seqstart_q", batch)?;
    let seqstart_k = cumulative_offsets(seqstart_k, "seqstart_k", batch)?;
    let seqlen_k = seqlen_k.map(|buffer| offsets(buffer, "seqlen_k", batch)).transpose()?;

    Ok((0..batch)
        .map(|b| Request {
            batch: b,
            q_start: seqstart_q[b],
            seqlen_q: seqstart_q[b + 1] - seqstart_q[b],
            seqlen_k: match &seqlen_k {
                Some(lengths) => lengths[b],
                None => seqstart_k[b + 1] - seqstart_k[b],
            },
            keys: KeyRows::Packed {
                start: seqstart_k[b],
            },
        })
        .collect())
}

/// Requests whose keys live in a paged cache.
pub(super) fn paged_requests(
    batch: usize,
    seqstart_q: &CpuBuffer,
    kv_indptr: &CpuBuffer,
    kv_page_indices: &CpuBuffer,
    kv_last_page_lens: &CpuBuffer,
    page_block_size: usize,
) -> Result<Vec<Request>, CpuError> {
    if page_block_size == 0 {
        return Err(CpuError::InvalidPageBlockSize(page_block_size));
    }
    let seqstart_q = cumulative_offsets(seqstart_q, "seqstart_q", batch)?;
    let kv_indptr = cumulative_offsets(kv_indptr, "kv_indptr", batch)?;
    let page_count = kv_indptr[batch];
    let page_indices = offsets(kv_page_indices, "kv_page_indices", page_count)?;
    let last_page_lens = offsets(kv_last_page_lens, "kv_last_page_lens", batch)?;

    (0..batch)
        .map(|b| {
            let pages = page_indices[kv_indptr[b]..kv_indptr[b + 1]].to_vec();
            let last_page_len = last_page_lens[b];
            let seqlen_k = match pages.len() {
                0 => 0,
                count => {
                    if last_page_len == 0 || last_page_len > page_block_size {
                        return Err(CpuError::InvalidOffsets("kv_last_page_lens"));
                    }
                    (count - 1) * page_block_size + last_page_len
                },
            };
            Ok(Request {
                batch: b,
                q_start: seqstart_q[b],
                seqlen_q: seqstart_q[b + 1] - seqstart_q[b],
                seqlen_k,
                keys: KeyRows::Paged {
                    pages,
                    page_block_size,
                },
            })
        })
        .collect()
}

fn gather(
    values: &[f32],
    buffer: &'static str,
    dim: usize,
    bases: impl Iterator<Item = usize>,
) -> Result<Vec<f32>, CpuError> {
    let mut gathered = Vec::new();
    if dim == 0 {
        return Ok(gathered);
    }
    for base in bases {
        let row = values.get(base..base + dim).ok_or(CpuError::OutOfBounds {
            buffer,
            index: base + dim - 1,
            length: values.len(),
        })?;
        gathered.extend_from_slice(row);
    }
    Ok(gathered)
}

#[derive(Debug)]
pub(super) enum BiasValues {
    None,
    /// Element-typed bias tensor addressed like the queries.
    Elementwise(Vec<f32>),
    /// `f32` slope per `(batch, head)`.
    Alibi(Vec<f32>),
}

/// Host snapshot of a launch's inputs.
#[derive(Debug)]
pub(super) struct Operands {
    pub q: Vec<f32>,
    pub k: Vec<f32>,
    pub v: Vec<f32>,
    pub bias: BiasValues,
    pub q_strides: Strides,
    pub k_strides: Strides,
    pub v_strides: Strides,
    pub bias_strides: Strides,
    pub nhead_q: usize,
    pub nhead_k: usize,
    pub hdim_q: usize,
    pub hdim_v: usize,
    pub is_group_mode: bool,
}

impl Operands {
    /// Key/value head shared by query head `head`.
    fn kv_head(
        &self,
        head: usize,
    ) -> usize {
        head / (self.nhead_q / self.nhead_k)
    }

    pub fn head(
        &self,
        request: &Request,
        head: usize,
    ) -> Result<HeadView, CpuError> {
        let kv_head = self.kv_head(head);
        let q = gather(
            &self.q,
            "q",
            self.hdim_q,
            (0..request.seqlen_q).map(|row| request.query_offset(&self.q_strides, head, row, self.is_group_mode)),
        )?;
        let k = gather(
            &self.k,
            "k",
            self.hdim_q,
            (0..request.seqlen_k).map(|token| request.key_offset(&self.k_strides, kv_head, token, self.is_group_mode)),
        )?;
        let v = gather(
            &self.v,
            "v",
            self.hdim_v,
            (0..request.seqlen_k).map(|token| request.key_offset(&self.v_strides, kv_head, token, self.is_group_mode)),
        )?;
        Ok(HeadView {
            q,
            k,
            v,
            seqlen_q: request.seqlen_q,
            seqlen_k: request.seqlen_k,
            hdim_q: self.hdim_q,
            hdim_v: self.hdim_v,
        })
    }

    pub fn head_bias(
        &self,
        request: &Request,
        head: usize,
    ) -> Result<HeadBias, CpuError> {
        match &self.bias {
            BiasValues::None => Ok(HeadBias::None),
            BiasValues::Elementwise(values) => {
                let rows = (0..request.seqlen_q)
                    .map(|row| request.query_offset(&self.bias_strides, head, row, self.is_group_mode));
                Ok(HeadBias::Elementwise(gather(values, "bias", request.seqlen_k, rows)?))
            },
            BiasValues::Alibi(slopes) => {
                let index = request.batch * self.bias_strides.batch + head;
                let slope = slopes.get(index).copied().ok_or(CpuError::OutOfBounds {
                    buffer: "bias",
                    index,
                    length: slopes.len(),
                })?;
                Ok(HeadBias::Alibi(slope))
            },
        }
    }
}

/// Decodes a whole input buffer.
pub(super) fn snapshot(
    buffer: &CpuBuffer,
    data_type: DataType,
) -> Result<Vec<f32>, CpuError> {
    element::decode(&buffer.read(), data_type)
}

pub(super) fn read_bias(
    bias: Option<&CpuBuffer>,
    bias_type: BiasType,
    data_type: DataType,
) -> Result<BiasValues, CpuError> {
    match (bias_type, bias) {
        (BiasType::NoBias, _) => Ok(BiasValues::None),
        (_, None) => Err(CpuError::MissingBuffer("bias")),
        (BiasType::Elementwise, Some(bias)) => Ok(BiasValues::Elementwise(snapshot(bias, data_type)?)),
        (BiasType::Alibi, Some(bias)) => Ok(BiasValues::Alibi(snapshot(bias, DataType::F32)?)),
    }
}

/// Rows computed for one `(request, head)`.
pub(super) struct HeadResult<'r> {
    pub request: &'r Request,
    pub head: usize,
    pub rows: Vec<RowOutput>,
}

/// Destination of row results: an element buffer and the `f32` log-sum-exp.
pub(super) struct OutputTarget<'a> {
    pub o: &'a CpuBuffer,
    pub o_strides: Strides,
    pub o_data_type: DataType,
    /// Extra element offset applied to every `o` and `lse` write.
    pub base_offset: (usize, usize),
    pub lse: Option<(&'a CpuBuffer, Strides)>,
}

/// Fails when an element past the end of `buffer` would be written.
fn check_capacity(
    buffer: &CpuBuffer,
    name: &'static str,
    data_type: DataType,
    ends: impl Iterator<Item = usize>,
) -> Result<(), CpuError> {
    let length = buffer.read().len() / data_type.size_in_bytes();
    match ends.max() {
        Some(end) if end > length => Err(CpuError::OutOfBounds {
            buffer: name,
            index: end - 1,
            length,
        }),
        _ => Ok(()),
    }
}

impl OutputTarget<'_> {
    /// Writes every row, or nothing when any row falls outside its buffer.
    pub fn write(
        &self,
        results: &[HeadResult],
        is_group_mode: bool,
    ) -> Result<(), CpuError> {
        let (o_base, lse_base) = self.base_offset;
        let rows = |strides: Strides, base: usize| {
            results.iter().flat_map(move |result| {
                result.rows.iter().enumerate().map(move |(row, output)| {
                    (base + result.request.query_offset(&strides, result.head, row, is_group_mode), output)
                })
            })
        };

        let o_ends = rows(self.o_strides, o_base).map(|(offset, output)| offset + output.o.len());
        check_capacity(self.o, "o", self.o_data_type, o_ends)?;
        if let Some((lse, strides)) = &self.lse {
            check_capacity(lse, "lse", DataType::F32, rows(*strides, lse_base).map(|(offset, _)| offset + 1))?;
        }

        {
            let mut bytes = self.o.write_guard();
            for (offset, output) in rows(self.o_strides, o_base) {
                for (index, &value) in output.o.iter().enumerate() {
                    element::store(&mut bytes, "o", self.o_data_type, offset + index, value)?;
                }
            }
        }
        if let Some((lse, strides)) = &self.lse {
            let mut bytes = lse.write_guard();
            for (offset, output) in rows(*strides, lse_base) {
                element::store(&mut bytes, "lse", DataType::F32, offset, output.lse)?;
            }
        }
        Ok(())
    }
}

pub(super) fn check_mask(
    kernel: &str,
    mask: &MaskInfo,
    mask_type: MaskType,
) -> Result<(), CpuError> {
    if mask.mask_type != mask_type {
        return Err(CpuError::MaskMismatch {
            mask: *mask,
            kernel: kernel.to_string(),
        });
    }
    Ok(())
}

pub(super) fn check_max_seqlen_q(
    requests: &[Request],
    max_seqlen_q: usize,
) -> Result<(), CpuError> {
    match requests.iter().find(|request| request.seqlen_q > max_seqlen_q) {
        Some(request) => Err(CpuError::SeqlenExceedsMax {
            seqlen_q: request.seqlen_q,
            max_seqlen_q,
        }),
        None => Ok(()),
    }
}

/// Shape checks shared by every reference kernel.
pub(super) fn check_heads(
    kernel: &str,
    expected: (usize, usize),
    hdim_q: usize,
    hdim_v: usize,
    nhead_q: usize,
    nhead_k: usize,
) -> Result<(), CpuError> {
    if (hdim_q, hdim_v) != expected {
        return Err(CpuError::HeadDimMismatch {
            hdim_q,
            hdim_v,
            kernel: kernel.to_string(),
        });
    }
    if nhead_k == 0 || nhead_q % nhead_k != 0 {
        return Err(CpuError::HeadMismatch {
            nhead_q,
            nhead_k,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_offsets_must_not_decrease() {
        let seqstart_q = CpuBuffer::from_slice(&[0i32, 4, 2]);
        let seqstart_k = CpuBuffer::from_slice(&[0i32, 4, 8]);
        assert_eq!(
            group_requests(2, &seqstart_q, &seqstart_k, None).unwrap_err(),
            CpuError::InvalidOffsets("seqstart_q")
        );
    }

    #[test]
    fn seqlen_k_overrides_key_lengths() {
        let seqstart_q = CpuBuffer::from_slice(&[0i32, 2, 5]);
        let seqstart_k = CpuBuffer::from_slice(&[0i32, 8, 16]);
        let seqlen_k = CpuBuffer::from_slice(&[3i32, 6]);
        let requests = group_requests(2, &seqstart_q, &seqstart_k, Some(&seqlen_k)).unwrap();
        assert_eq!(requests[1].q_start, 2);
        assert_eq!(requests[1].seqlen_q, 3);
        assert_eq!(requests[1].seqlen_k, 6);
        assert_eq!(
            requests[1].keys,
            KeyRows::Packed {
                start: 8
            }
        );
    }

    #[test]
    fn paged_lengths_and_offsets() {
        let seqstart_q = CpuBuffer::from_slice(&[0i32, 1]);
        let kv_indptr = CpuBuffer::from_slice(&[0i32, 3]);
        let kv_page_indices = CpuBuffer::from_slice(&[5i32, 1, 3]);
        let kv_last_page_lens = CpuBuffer::from_slice(&[2i32]);
        let requests = paged_requests(1, &seqstart_q, &kv_indptr, &kv_page_indices, &kv_last_page_lens, 4).unwrap();
        assert_eq!(requests[0].seqlen_k, 10);

        let strides = Strides {
            row: 16,
            head: 8,
            batch: 64,
        };
        // token 6 sits in slot 2 of page 1
        assert_eq!(requests[0].key_offset(&strides, 1, 6, true), 64 + 8 + 2 * 16);
    }

    #[test]
    fn paged_last_page_must_fit() {
        let seqstart_q = CpuBuffer::from_slice(&[0i32, 1]);
        let kv_indptr = CpuBuffer::from_slice(&[0i32, 1]);
        let kv_page_indices = CpuBuffer::from_slice(&[0i32]);
        let kv_last_page_lens = CpuBuffer::from_slice(&[5i32]);
        assert_eq!(
            paged_requests(1, &seqstart_q, &kv_indptr, &kv_page_indices, &kv_last_page_lens, 4).unwrap_err(),
            CpuError::InvalidOffsets("kv_last_page_lens")
        );
    }

    #[test]
    fn gather_is_bounds_checked() {
        assert_eq!(
            gather(&[0.0; 6], "k", 4, [0usize, 4].into_iter()).unwrap_err(),
            CpuError::OutOfBounds {
                buffer: "k",
                index: 7,
                length: 6,
            }
        );
    }

    #[test]
    fn out_of_bounds_rows_leave_the_output_untouched() {
        let requests = batch_requests(1, 2, 2);
        let results = [HeadResult {
            request: &requests[0],
            head: 0,
            rows: vec![
                RowOutput {
                    o: vec![1.0, 2.0],
                    lse: 0.5,
                };
                2
            ],
        }];
        let o = CpuBuffer::filled(9.0f32, 3);
        let target = OutputTarget {
            o: &o,
            o_strides: Strides::bshd(1, 2, 2),
            o_data_type: DataType::F32,
            base_offset: (0, 0),
            lse: None,
        };
        assert_eq!(
            target.write(&results, false),
            Err(CpuError::OutOfBounds {
                buffer: "o",
                index: 3,
                length: 3,
            })
        );
        assert_eq!(o.to_vec::<f32>(), vec![9.0; 3]);
    }

    #[test]
    fn mask_kind_and_query_length_are_checked() {
        assert!(check_mask("k", &MaskInfo::window(4, 0), MaskType::WindowGeneric).is_ok());
        assert!(matches!(
            check_mask("k", &MaskInfo::no_mask(), MaskType::CausalTopLeft),
            Err(CpuError::MaskMismatch { .. })
        ));
        let requests = batch_requests(2, 8, 8);
        assert!(check_max_seqlen_q(&requests, 8).is_ok());
        assert_eq!(
            check_max_seqlen_q(&requests, 7),
            Err(CpuError::SeqlenExceedsMax {
                seqlen_q: 8,
                max_seqlen_q: 7,
            })
        );
    }

    #[test]
    fn rejects_uneven_head_groups() {
        assert!(check_heads("d64", (64, 64), 64, 64, 8, 2).is_ok());
        assert_eq!(
            check_heads("d64", (64, 64), 64, 64, 6, 4).unwrap_err(),
            CpuError::HeadMismatch {
                nhead_q: 6,
                nhead_k: 4,
            }
        );
        assert!(matches!(check_heads("d64", (64, 64), 128, 128, 8, 8), Err(CpuError::HeadDimMismatch { .. })));
    }
}
