//! Baseline JPEG (ISO/IEC 10918-1) container codec.
//!
//! The crate parses and emits the marker structure of a baseline JPEG stream
//! and plans the per-channel block geometry. Block arithmetic is delegated to
//! a [`TransformEngine`]; [`CpuEngine`] is the bundled software engine.

pub mod bitmap;
pub mod constants;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod jpeg1;
pub mod jpeg_marker_code;
pub mod jpeg_stream_reader;
pub mod jpeg_stream_writer;
pub mod marker_scanner;

pub use bitmap::{Bitmap, GenericImageLoader, ImageLoader, PixelFormat};
pub use engine::{CpuEngine, TransformEngine};
pub use error::{EngineError, ErrorKind, JpegError};
pub use jpeg1::{DecoderState, EncoderState, JpegDecoder, JpegEncoder, StreamInfo, read_header};

use constants::{
    BASELINE_APPROXIMATION, BASELINE_SPECTRAL_END, BASELINE_SPECTRAL_START, SAMPLE_PRECISION,
};
use engine::SpectralSelection;

/// Count of MCUs between restart markers; `None` disables restart handling.
pub type RestartInterval = Option<u16>;

/// One component of a frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameComponent {
    pub identifier: u8,
    /// High nibble vertical, low nibble horizontal.
    pub sampling_factors: u8,
    pub quantization_table_selector: u8,
}

impl FrameComponent {
    pub fn horizontal_sampling(&self) -> usize {
        (self.sampling_factors & 0x0F) as usize
    }

    pub fn vertical_sampling(&self) -> usize {
        (self.sampling_factors >> 4) as usize
    }
}

/// SOF0 frame header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub sample_precision: u8,
    pub height: u16,
    pub width: u16,
    pub components: Vec<FrameComponent>,
}

impl Default for FrameHeader {
    fn default() -> Self {
        Self {
            sample_precision: SAMPLE_PRECISION,
            height: 0,
            width: 0,
            components: Vec::new(),
        }
    }
}

impl FrameHeader {
    /// Components numbered from 1, the first using quantization table 0 and
    /// the others table 1.
    pub fn with_sampling(width: u16, height: u16, sampling_factors: &[u8]) -> Self {
        let components = sampling_factors
            .iter()
            .enumerate()
            .map(|(i, &sampling)| FrameComponent {
                identifier: i as u8 + 1,
                sampling_factors: sampling,
                quantization_table_selector: if i == 0 { 0 } else { 1 },
            })
            .collect();
        Self {
            sample_precision: SAMPLE_PRECISION,
            height,
            width,
            components,
        }
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn component_index(&self, identifier: u8) -> Option<usize> {
        self.components.iter().position(|c| c.identifier == identifier)
    }
}

/// One component of a scan header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanComponentSelector {
    pub selector: u8,
    /// High nibble DC table, low nibble AC table.
    pub huffman_tables: u8,
}

impl ScanComponentSelector {
    pub fn dc_table(&self) -> u8 {
        self.huffman_tables >> 4
    }

    pub fn ac_table(&self) -> u8 {
        self.huffman_tables & 0x0F
    }
}

/// SOS scan header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanHeader {
    pub components: Vec<ScanComponentSelector>,
    pub spectral_start: u8,
    pub spectral_end: u8,
    pub successive_approximation: u8,
}

impl ScanHeader {
    pub fn baseline(components: Vec<ScanComponentSelector>) -> Self {
        Self {
            components,
            spectral_start: BASELINE_SPECTRAL_START,
            spectral_end: BASELINE_SPECTRAL_END,
            successive_approximation: BASELINE_APPROXIMATION,
        }
    }

    /// A baseline scan over every component of `frame`: tables 0/0 for the
    /// first component and 1/1 for the rest.
    pub fn for_frame(frame: &FrameHeader) -> Self {
        Self::baseline(
            frame
                .components
                .iter()
                .enumerate()
                .map(|(i, c)| ScanComponentSelector {
                    selector: c.identifier,
                    huffman_tables: if i == 0 { 0x00 } else { 0x11 },
                })
                .collect(),
        )
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn spectral_selection(&self) -> SpectralSelection {
        SpectralSelection {
            start: self.spectral_start,
            end: self.spectral_end,
            approximation: self.successive_approximation,
        }
    }
}
