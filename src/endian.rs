//! Big-endian reads over the memory-mapped `mime.cache` buffer
//!
//! The shared-mime-info binary cache stores every multi-byte quantity in
//! big-endian (network) byte order, and all cross-references are 32-bit byte
//! offsets from the start of the file. This module provides the small set of
//! primitives the cache reader is built from.
//!
//! Unlike a trusted in-process format, a `mime.cache` file on disk can be
//! truncated or corrupt, so every read is bounds-checked and returns `None`
//! past the end of the buffer. Lookups treat `None` as "this cache has no
//! answer" rather than an error.

use memchr::memchr;

/// Read a big-endian u32 at `offset`, or `None` if it runs past the buffer.
#[inline]
pub fn read_u32_be(buffer: &[u8], offset: usize) -> Option<u32> {
    let bytes = buffer.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Read a big-endian u16 at `offset`, or `None` if it runs past the buffer.
#[inline]
pub fn read_u16_be(buffer: &[u8], offset: usize) -> Option<u16> {
    let bytes = buffer.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Read a NUL-terminated byte string starting at `offset`.
///
/// Returns the bytes before the terminator. An offset of zero is the cache
/// format's "absent" marker and yields `None`, as does a string that runs
/// off the end of the buffer without a terminator.
#[inline]
pub fn read_cstr(buffer: &[u8], offset: usize) -> Option<&[u8]> {
    if offset == 0 {
        return None;
    }
    let tail = buffer.get(offset..)?;
    let end = memchr(0, tail)?;
    Some(&tail[..end])
}

/// Read a NUL-terminated UTF-8 string starting at `offset`.
///
/// MIME type and icon names in well-formed caches are ASCII; anything that
/// fails UTF-8 validation is treated as absent.
#[inline]
pub fn read_str(buffer: &[u8], offset: usize) -> Option<&str> {
    std::str::from_utf8(read_cstr(buffer, offset)?).ok()
}
