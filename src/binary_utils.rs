use std::ops::Range;

/// Returns `data[range]`, or `None` when the range falls outside the buffer.
pub fn checked_slice(data: &[u8], range: Range<usize>) -> Option<&[u8]> {
    if range.start > range.end || range.end > data.len() {
        return None;
    }
    Some(&data[range])
}

pub fn read_u16_le(data: &[u8], pos: usize) -> Option<u16> {
    let bytes = checked_slice(data, pos..pos.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

pub fn read_i32_le(data: &[u8], pos: usize) -> Option<i32> {
    let bytes = checked_slice(data, pos..pos.checked_add(4)?)?;
    Some(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub fn read_u32_le(data: &[u8], pos: usize) -> Option<u32> {
    let bytes = checked_slice(data, pos..pos.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Overwrites four bytes at `pos`. Returns false when they don't fit.
pub fn write_i32_le(data: &mut [u8], value: i32, pos: usize) -> bool {
    match pos.checked_add(4) {
        Some(end) if end <= data.len() => {
            data[pos..end].copy_from_slice(&value.to_le_bytes());
            true
        }
        _ => false,
    }
}

/// Rounds `len` up to the next multiple of 16.
pub fn next_multiple_of_16(len: usize) -> usize {
    len.div_ceil(16) * 16
}
