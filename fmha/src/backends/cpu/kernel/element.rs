use half::{bf16, f16};

use crate::{DataType, backends::cpu::error::CpuError};

/// Widens a whole buffer of `data_type` elements to `f32`.
pub(super) fn decode(
    bytes: &[u8],
    data_type: DataType,
) -> Result<Vec<f32>, CpuError> {
    let values = match data_type {
        DataType::F16 => bytemuck::pod_collect_to_vec::<u8, f16>(bytes).into_iter().map(f16::to_f32).collect(),
        DataType::BF16 => bytemuck::pod_collect_to_vec::<u8, bf16>(bytes).into_iter().map(bf16::to_f32).collect(),
        DataType::F32 => bytemuck::pod_collect_to_vec::<u8, f32>(bytes),
        DataType::FP8 | DataType::BF8 => return Err(CpuError::UnsupportedDataType(data_type)),
    };
    Ok(values)
}

pub(super) fn decode_i32(bytes: &[u8]) -> Vec<i32> {
    bytemuck::pod_collect_to_vec::<u8, i32>(bytes)
}

/// Narrows `value` to `data_type` and stores it as element `index`.
pub(super) fn store(
    bytes: &mut [u8],
    buffer: &'static str,
    data_type: DataType,
    index: usize,
    value: f32,
) -> Result<(), CpuError> {
    let size = data_type.size_in_bytes();
    let length = bytes.len() / size;
    if index >= length {
        return Err(CpuError::OutOfBounds {
            buffer,
            index,
            length,
        });
    }
    let destination = &mut bytes[index * size..(index + 1) * size];
    match data_type {
        DataType::F16 => destination.copy_from_slice(bytemuck::bytes_of(&f16::from_f32(value))),
        DataType::BF16 => destination.copy_from_slice(bytemuck::bytes_of(&bf16::from_f32(value))),
        DataType::F32 => destination.copy_from_slice(bytemuck::bytes_of(&value)),
        DataType::FP8 | DataType::BF8 => return Err(CpuError::UnsupportedDataType(data_type)),
    }
    Ok(())
}
