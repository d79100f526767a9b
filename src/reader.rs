//! Random-access byte fetch from a memory image by virtual address.
//!
//! The reader is built once over an ordered set of `(virtual_start, length,
//! file_offset)` segments - the PT_LOAD regions of a core file, or any
//! equivalent flat mapping - and serves reads by bisecting that set.

use crate::error::{EvalError, Result};

/// One contiguous, readable region of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub virtual_start: u64,
    pub length: u64,
    pub file_offset: u64,
}

impl Segment {
    pub fn new(virtual_start: u64, length: u64, file_offset: u64) -> Self {
        Self {
            virtual_start,
            length,
            file_offset,
        }
    }

    fn virtual_end(&self) -> u64 {
        self.virtual_start + self.length
    }

    fn contains_range(&self, address: u64, length: u64) -> bool {
        address >= self.virtual_start
            && length <= self.length
            && address - self.virtual_start <= self.length - length
    }
}

/// Serves bytes at virtual addresses out of an in-memory image and a list
/// of mapped segments.
///
/// Reads are pure and side-effect-free; a `CoreReader` may be freely shared
/// (it only ever borrows its image and segment table).
#[derive(Debug)]
pub struct CoreReader<'a> {
    image: &'a [u8],
    segments: Vec<Segment>,
}

impl<'a> CoreReader<'a> {
    /// Builds a reader over `image`, sorting `segments` by virtual address
    /// so reads can bisect them.
    pub fn new(image: &'a [u8], mut segments: Vec<Segment>) -> Self {
        segments.sort_by_key(|s| s.virtual_start);
        Self { image, segments }
    }

    fn find_segment(&self, address: u64, length: u64) -> Option<&Segment> {
        let idx = self
            .segments
            .partition_point(|s| s.virtual_start <= address);
        idx.checked_sub(1)
            .map(|i| &self.segments[i])
            .filter(|s| s.contains_range(address, length))
    }

    /// Reads `length` bytes starting at `address`.
    ///
    /// Fails with [`EvalError::AddressNotMapped`] if the range straddles or
    /// misses every segment.
    pub fn read(&self, address: u64, length: u64) -> Result<&'a [u8]> {
        let segment = self.find_segment(address, length).ok_or_else(|| {
            log::trace!("read miss: {length} bytes at {address:#x} not in any mapped segment");
            EvalError::AddressNotMapped { address, length }
        })?;
        let file_start = segment.file_offset + (address - segment.virtual_start);
        let file_start = usize::try_from(file_start).unwrap_or(usize::MAX);
        let file_end = file_start.checked_add(length as usize);
        match file_end {
            Some(end) if end <= self.image.len() => Ok(&self.image[file_start..end]),
            _ => Err(EvalError::AddressNotMapped { address, length }),
        }
    }

    /// Reads a NUL-terminated string starting at `address`, up to `max_len`
    /// bytes. Returns the bytes *not* including the terminator.
    ///
    /// Fails with [`EvalError::UnterminatedString`] if no NUL is found
    /// within `max_len` bytes.
    pub fn read_c_string(&self, address: u64, max_len: u64) -> Result<&'a [u8]> {
        // Probe segment-by-segment, clamping each chunk to what is actually
        // mapped from the current position to the end of its containing
        // segment (and to 4096 bytes) so that a string entirely inside one
        // mapped segment doesn't require max_len to be mapped in full.
        let mut scanned = 0u64;
        while scanned < max_len {
            let cur = address + scanned;
            let segment = self.find_segment(cur, 1).ok_or_else(|| {
                log::trace!("read miss: c-string byte at {cur:#x} not in any mapped segment");
                EvalError::AddressNotMapped {
                    address: cur,
                    length: 1,
                }
            })?;
            let available = segment.virtual_end() - cur;
            let chunk = (max_len - scanned).min(available).min(4096);
            let bytes = self.read(cur, chunk)?;
            if let Some(pos) = bytes.iter().position(|&b| b == 0) {
                let end = scanned + pos as u64;
                return self.read(address, end);
            }
            scanned += chunk;
        }
        Err(EvalError::UnterminatedString { address, max_len })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_reader(data: &[u8]) -> CoreReader<'_> {
        CoreReader::new(data, vec![Segment::new(0xffff_0000, data.len() as u64, 0)])
    }

    #[test]
    fn reads_within_segment() {
        let data = [1u8, 0, 0, 0, 2, 0, 0, 0, b'h', b'e', b'l', b'l', b'o', 0, 0, 0];
        let reader = sample_reader(&data);
        assert_eq!(reader.read(0xffff_0000, 4).unwrap(), &[1, 0, 0, 0]);
        assert_eq!(reader.read(0xffff_0004, 4).unwrap(), &[2, 0, 0, 0]);
    }

    #[test]
    fn straddling_read_is_not_mapped() {
        let data = [0u8; 8];
        let reader = sample_reader(&data);
        assert!(matches!(
            reader.read(0xffff_0004, 8),
            Err(EvalError::AddressNotMapped { .. })
        ));
    }

    #[test]
    fn unmapped_address_fails() {
        let data = [0u8; 8];
        let reader = sample_reader(&data);
        assert!(matches!(
            reader.read(0, 1),
            Err(EvalError::AddressNotMapped { .. })
        ));
    }

    #[test]
    fn c_string_reads_up_to_nul() {
        let data = [b'h', b'e', b'l', b'l', b'o', 0, 0, 0];
        let reader = sample_reader(&data);
        assert_eq!(reader.read_c_string(0xffff_0000, 8).unwrap(), b"hello");
    }

    #[test]
    fn c_string_without_nul_is_unterminated() {
        let data = [b'h', b'e', b'l', b'l', b'o'];
        let reader = sample_reader(&data);
        assert!(matches!(
            reader.read_c_string(0xffff_0000, 5),
            Err(EvalError::UnterminatedString { .. })
        ));
    }

    #[test]
    fn c_string_with_large_max_len_clamps_to_segment() {
        // The segment backing this string is far smaller than max_len; the
        // scan must clamp to what's actually mapped instead of requiring
        // max_len bytes to be mapped in one shot.
        let data = [1u8, 0, 0, 0, 2, 0, 0, 0, b'h', b'e', b'l', b'l', b'o', 0, 0, 0];
        let reader = sample_reader(&data);
        assert_eq!(reader.read_c_string(0xffff_0008, 4096).unwrap(), b"hello");
    }

    #[test]
    fn c_string_at_final_byte_of_segment_is_empty() {
        let data = [0u8; 16];
        let reader = sample_reader(&data);
        assert_eq!(reader.read_c_string(0xffff_000f, 4096).unwrap(), b"");
    }

    #[test]
    fn multiple_segments_bisect_correctly() {
        let data = [0xAAu8, 0xBB, 0xCC, 0xDD];
        let reader = CoreReader::new(
            &data,
            vec![
                Segment::new(0x2000, 2, 2),
                Segment::new(0x1000, 2, 0),
            ],
        );
        assert_eq!(reader.read(0x1000, 2).unwrap(), &[0xAA, 0xBB]);
        assert_eq!(reader.read(0x2000, 2).unwrap(), &[0xCC, 0xDD]);
        assert!(reader.read(0x1800, 1).is_err());
    }
}
