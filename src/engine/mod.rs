//! Block-transform engine seam.
//!
//! The codec core only prepares correctly shaped buffers and tables; the
//! per-block arithmetic (quantized DCT, entropy coding, color twist and
//! resampling) is delegated to a [`TransformEngine`]. Every resource an
//! engine hands out has a paired release method that consumes it, and the
//! encoder and decoder sessions call those explicitly on every exit path.

pub mod cpu;

pub use cpu::CpuEngine;

use crate::RestartInterval;
use crate::constants::{
    BASELINE_APPROXIMATION, BASELINE_SPECTRAL_END, BASELINE_SPECTRAL_START, BLOCK_DIM, BLOCK_SIZE,
};
use crate::error::EngineError;
use crate::jpeg1::color::ColorMatrix;
use crate::jpeg1::huffman::{HuffmanSpec, HuffmanTable, TableClass};
use crate::jpeg1::quantization::QuantizationTable;

/// Size of a channel measured in 8x8 blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockGrid {
    pub blocks_wide: usize,
    pub blocks_high: usize,
}

impl BlockGrid {
    pub fn new(blocks_wide: usize, blocks_high: usize) -> Self {
        Self {
            blocks_wide,
            blocks_high,
        }
    }

    pub fn block_count(&self) -> usize {
        self.blocks_wide * self.blocks_high
    }

    pub fn pixel_width(&self) -> usize {
        self.blocks_wide * BLOCK_SIZE
    }

    pub fn pixel_height(&self) -> usize {
        self.blocks_high * BLOCK_SIZE
    }
}

/// One 8-bit sample plane, rows packed without padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl Plane {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub fn sample(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }
}

/// Quantized DCT coefficients of one channel, 64 per block in zig-zag order,
/// blocks in raster order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoefficientBuffer {
    grid: BlockGrid,
    data: Vec<i16>,
}

impl CoefficientBuffer {
    pub fn new(grid: BlockGrid) -> Self {
        Self {
            grid,
            data: vec![0; grid.block_count() * BLOCK_DIM],
        }
    }

    pub fn grid(&self) -> BlockGrid {
        self.grid
    }

    pub fn block(&self, block_x: usize, block_y: usize) -> &[i16] {
        let offset = (block_y * self.grid.blocks_wide + block_x) * BLOCK_DIM;
        &self.data[offset..offset + BLOCK_DIM]
    }

    pub fn block_mut(&mut self, block_x: usize, block_y: usize) -> &mut [i16] {
        let offset = (block_y * self.grid.blocks_wide + block_x) * BLOCK_DIM;
        &mut self.data[offset..offset + BLOCK_DIM]
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }
}

/// Spectral selection and successive approximation of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpectralSelection {
    pub start: u8,
    pub end: u8,
    /// High nibble Ah, low nibble Al.
    pub approximation: u8,
}

impl SpectralSelection {
    pub const BASELINE: Self = Self {
        start: BASELINE_SPECTRAL_START,
        end: BASELINE_SPECTRAL_END,
        approximation: BASELINE_APPROXIMATION,
    };

    pub fn is_baseline(&self) -> bool {
        *self == Self::BASELINE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// Area averaging, used when shrinking.
    Supersample,
    /// Lanczos3 windowed sinc, used when enlarging.
    Lanczos,
}

impl Interpolation {
    /// Supersampling below a ratio of 1, Lanczos from 1 up.
    pub fn for_ratio(ratio: f64) -> Self {
        if ratio < 1.0 {
            Self::Supersample
        } else {
            Self::Lanczos
        }
    }
}

/// A channel taking part in a scan being encoded.
pub struct ScanComponent<'a> {
    pub coefficients: &'a CoefficientBuffer,
    pub horizontal_sampling: usize,
    pub vertical_sampling: usize,
    /// Blocks coded when the scan holds this component alone.
    pub coded_blocks: BlockGrid,
    pub dc: &'a HuffmanSpec,
    pub ac: &'a HuffmanSpec,
}

/// A channel taking part in a scan being decoded.
pub struct ScanComponentMut<'a> {
    pub coefficients: &'a mut CoefficientBuffer,
    pub horizontal_sampling: usize,
    pub vertical_sampling: usize,
    pub coded_blocks: BlockGrid,
    pub dc: &'a HuffmanSpec,
    pub ac: &'a HuffmanSpec,
}

pub trait TransformEngine {
    fn allocate_coefficients(&mut self, grid: BlockGrid) -> Result<CoefficientBuffer, EngineError>;

    fn release_coefficients(&mut self, buffer: CoefficientBuffer);

    fn init_huffman_spec(
        &mut self,
        table: &HuffmanTable,
        class: TableClass,
    ) -> Result<HuffmanSpec, EngineError>;

    fn release_huffman_spec(&mut self, spec: HuffmanSpec);

    /// Level shift, forward DCT and quantization of every block of `source`.
    fn forward_dct_quant(
        &mut self,
        source: &Plane,
        destination: &mut CoefficientBuffer,
        table: &QuantizationTable,
    ) -> Result<(), EngineError>;

    /// Dequantization, inverse DCT and level shift into `destination`.
    fn inverse_dct_quant(
        &mut self,
        source: &CoefficientBuffer,
        destination: &mut Plane,
        table: &QuantizationTable,
    ) -> Result<(), EngineError>;

    /// Entropy-codes one scan; the returned vector's length is the scan length.
    fn huffman_encode_scan(
        &mut self,
        components: &[ScanComponent<'_>],
        selection: SpectralSelection,
        restart_interval: RestartInterval,
    ) -> Result<Vec<u8>, EngineError>;

    fn huffman_decode_scan(
        &mut self,
        data: &[u8],
        selection: SpectralSelection,
        restart_interval: RestartInterval,
        components: &mut [ScanComponentMut<'_>],
    ) -> Result<(), EngineError>;

    /// Applies `matrix` in place to packed 3-channel pixels.
    fn color_twist(&mut self, pixels: &mut [u8], matrix: &ColorMatrix) -> Result<(), EngineError>;

    /// Resamples `source` to the size of `destination`.
    fn resize(
        &mut self,
        source: &Plane,
        destination: &mut Plane,
        interpolation: Interpolation,
    ) -> Result<(), EngineError>;
}

impl<E: TransformEngine + ?Sized> TransformEngine for &mut E {
    fn allocate_coefficients(&mut self, grid: BlockGrid) -> Result<CoefficientBuffer, EngineError> {
        (**self).allocate_coefficients(grid)
    }

    fn release_coefficients(&mut self, buffer: CoefficientBuffer) {
        (**self).release_coefficients(buffer)
    }

    fn init_huffman_spec(
        &mut self,
        table: &HuffmanTable,
        class: TableClass,
    ) -> Result<HuffmanSpec, EngineError> {
        (**self).init_huffman_spec(table, class)
    }

    fn release_huffman_spec(&mut self, spec: HuffmanSpec) {
        (**self).release_huffman_spec(spec)
    }

    fn forward_dct_quant(
        &mut self,
        source: &Plane,
        destination: &mut CoefficientBuffer,
        table: &QuantizationTable,
    ) -> Result<(), EngineError> {
        (**self).forward_dct_quant(source, destination, table)
    }

    fn inverse_dct_quant(
        &mut self,
        source: &CoefficientBuffer,
        destination: &mut Plane,
        table: &QuantizationTable,
    ) -> Result<(), EngineError> {
        (**self).inverse_dct_quant(source, destination, table)
    }

    fn huffman_encode_scan(
        &mut self,
        components: &[ScanComponent<'_>],
        selection: SpectralSelection,
        restart_interval: RestartInterval,
    ) -> Result<Vec<u8>, EngineError> {
        (**self).huffman_encode_scan(components, selection, restart_interval)
    }

    fn huffman_decode_scan(
        &mut self,
        data: &[u8],
        selection: SpectralSelection,
        restart_interval: RestartInterval,
        components: &mut [ScanComponentMut<'_>],
    ) -> Result<(), EngineError> {
        (**self).huffman_decode_scan(data, selection, restart_interval, components)
    }

    fn color_twist(&mut self, pixels: &mut [u8], matrix: &ColorMatrix) -> Result<(), EngineError> {
        (**self).color_twist(pixels, matrix)
    }

    fn resize(
        &mut self,
        source: &Plane,
        destination: &mut Plane,
        interpolation: Interpolation,
    ) -> Result<(), EngineError> {
        (**self).resize(source, destination, interpolation)
    }
}
