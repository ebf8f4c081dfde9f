//! Marker location inside a JPEG byte stream.
//!
//! The scanner never interprets segment payloads: it walks forward byte by
//! byte looking for `0xFF` followed by a marker code. `FF 00` (a stuffed
//! literal inside entropy-coded data) and runs of `0xFF` fill bytes are
//! skipped. Every routine here is restartable from any position and never
//! reads at or beyond `data.len()`.

use crate::constants::{JPEG_MARKER_START_BYTE, JPEG_STUFFED_ZERO_BYTE};
use crate::jpeg_marker_code::is_restart_code;

/// Finds the next marker at or after `position`.
///
/// On success `position` is left just past the marker code byte. When no
/// marker remains `None` is returned and `position` is at the end of `data`.
pub fn next_marker(data: &[u8], position: &mut usize) -> Option<u8> {
    let length = data.len();
    if *position >= length {
        *position = length;
        return None;
    }

    let mut c = data[*position];
    *position += 1;

    loop {
        while c != JPEG_MARKER_START_BYTE && *position < length {
            c = data[*position];
            *position += 1;
        }

        if *position >= length {
            return None;
        }

        c = data[*position];
        *position += 1;

        // A stuffed zero resumes the search, a fill byte makes the next byte
        // the candidate code.
        if c != JPEG_STUFFED_ZERO_BYTE && c != JPEG_MARKER_START_BYTE {
            return Some(c);
        }
    }
}

/// Extent of the entropy-coded segment that follows a scan header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanExtent {
    /// One past the last entropy-coded byte.
    pub data_end: usize,
    /// Offset of the `0xFF` that introduces the terminating marker, or
    /// `data.len()` when the stream ends without one.
    pub marker_position: usize,
}

/// Locates the end of the entropy-coded data starting at `start`.
///
/// With `restart_enabled` the RST0..RST7 markers are part of the scan and do
/// not terminate it.
pub fn find_scan_end(data: &[u8], start: usize, restart_enabled: bool) -> ScanExtent {
    let mut position = start;
    loop {
        match next_marker(data, &mut position) {
            Some(code) if restart_enabled && is_restart_code(code) => continue,
            Some(_) => {
                let marker_position = position - 2;
                let mut data_end = marker_position;
                while data_end > start && data[data_end - 1] == JPEG_MARKER_START_BYTE {
                    data_end -= 1;
                }
                return ScanExtent {
                    data_end,
                    marker_position,
                };
            }
            None => {
                return ScanExtent {
                    data_end: data.len(),
                    marker_position: data.len(),
                };
            }
        }
    }
}
