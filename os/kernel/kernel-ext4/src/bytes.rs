//! Bounds-checked little-endian field readers for on-disk records.

use crate::Ext4Error;

#[inline]
fn field<const N: usize>(buf: &[u8], off: usize, what: &'static str) -> Result<[u8; N], Ext4Error> {
    let end = off.checked_add(N).ok_or(Ext4Error::Truncated(what))?;
    let s = buf.get(off..end).ok_or(Ext4Error::Truncated(what))?;
    let mut out = [0u8; N];
    out.copy_from_slice(s);
    Ok(out)
}

#[inline]
pub fn read_u16_le(buf: &[u8], off: usize, what: &'static str) -> Result<u16, Ext4Error> {
    field(buf, off, what).map(u16::from_le_bytes)
}

#[inline]
pub fn read_u32_le(buf: &[u8], off: usize, what: &'static str) -> Result<u32, Ext4Error> {
    field(buf, off, what).map(u32::from_le_bytes)
}

/// Copy `N` raw bytes starting at `off`.
#[inline]
pub fn read_array<const N: usize>(
    buf: &[u8],
    off: usize,
    what: &'static str,
) -> Result<[u8; N], Ext4Error> {
    field(buf, off, what)
}

/// Join split `lo`/`hi` halves of a 64-bit field.
#[inline]
pub const fn join_u64(lo: u32, hi: u32) -> u64 {
    (lo as u64) | ((hi as u64) << 32)
}
