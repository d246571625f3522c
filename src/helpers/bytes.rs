//! Little-endian readers over raw byte slices used by the compound file and
//! BIFF8 parsers. Callers guarantee the slice is long enough.

/// Iterates over a byte slice as little-endian 32-bit words widened to usize.
pub(crate) fn to_usize_iter(bytes: &[u8]) -> impl Iterator<Item = usize> + '_ {
    bytes.chunks_exact(4).map(to_usize)
}

#[inline]
pub(crate) fn to_u16(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

#[inline]
pub(crate) fn to_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[inline]
pub(crate) fn to_usize(bytes: &[u8]) -> usize {
    to_u32(bytes) as usize
}

#[inline]
pub(crate) fn to_u64(bytes: &[u8]) -> u64 {
    let mut buffer = [0u8; 8];
    buffer.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buffer)
}

#[inline]
pub(crate) fn to_f64(bytes: &[u8]) -> f64 {
    f64::from_bits(to_u64(bytes))
}
