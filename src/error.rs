use crate::PixelFormat;
use thiserror::Error;

/// Coarse classification of a [`JpegError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input is not a JPEG stream at all.
    Format,
    /// A JPEG stream this codec does not decode structurally (progressive, non 3-channel).
    UnsupportedFormat,
    /// Encoder input rejected before any engine work was dispatched.
    Precondition,
    Io,
    Engine,
    /// Malformed marker segments or entropy data.
    CorruptStream,
    /// The generic image loader used on the fallback path failed.
    Fallback,
}

#[derive(Error, Debug)]
pub enum JpegError {
    #[error("Start of image marker not found")]
    StartOfImageMarkerNotFound,

    #[error("Progressive or extended frame (marker 0x{0:02X}) not supported")]
    NonBaselineFrame(u8),
    #[error("Frame has {0} components, structured decoding requires 3")]
    UnsupportedComponentCount(usize),

    #[error("Image dimensions {width}x{height} are not a multiple of 16")]
    DimensionsNotMultipleOf16 { width: usize, height: usize },
    #[error("Pixel format {actual:?} does not match the expected {expected:?}")]
    PixelFormatMismatch {
        expected: PixelFormat,
        actual: PixelFormat,
    },
    #[error("Invalid channel count {0}, expected 1 or 3")]
    InvalidChannelCount(u8),
    #[error("Invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    #[error("Pixel buffer holds {actual} bytes, expected {expected}")]
    PixelBufferSize { expected: usize, actual: usize },
    #[error("Operation requires a {expected}-channel encoder session, this one has {actual}")]
    ChannelModeMismatch { expected: u8, actual: u8 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Transform engine failure: {0}")]
    Engine(#[from] EngineError),
    #[error("Generic image loader failed: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("Unexpected end of stream at offset {0}")]
    UnexpectedEndOfStream(usize),
    #[error("Invalid marker segment size {size} at offset {offset}")]
    InvalidMarkerSegmentSize { offset: usize, size: usize },
    #[error("Quantization table selector 0x{0:02X} is not a baseline table")]
    InvalidQuantizationTable(u8),
    #[error("Quantization table {0} is not defined")]
    MissingQuantizationTable(u8),
    #[error("Frame header declares {width}x{height} samples")]
    InvalidFrameDimensions { width: u16, height: u16 },
    #[error("Huffman table selector 0x{0:02X} is out of range")]
    InvalidHuffmanTableSelector(u8),
    #[error("Huffman table declares {0} code values, at most 256 allowed")]
    InvalidHuffmanCodeCount(usize),
    #[error("Table data overruns its marker segment")]
    TableOverrunsSegment,
    #[error("Invalid component count {0}")]
    InvalidComponentCount(usize),
    #[error("Start of scan marker before frame header")]
    ScanBeforeFrameHeader,
    #[error("Scan references unknown component {0}")]
    UnknownComponentSelector(u8),
    #[error("Scan references component {0} twice")]
    DuplicateComponentSelector(u8),
    #[error("Invalid sampling factors 0x{0:02X}")]
    InvalidSamplingFactors(u8),
    #[error("Scan references undefined Huffman table (class {class}, table {identifier})")]
    MissingHuffmanTable { class: u8, identifier: u8 },
    #[error("Frame header not found")]
    MissingFrameHeader,
    #[error("No scan data found")]
    MissingScanData,
    #[error("Encoded stream exceeds output buffer of {0} bytes")]
    OutputBufferTooSmall(usize),
}

impl JpegError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StartOfImageMarkerNotFound => ErrorKind::Format,
            Self::NonBaselineFrame(_) | Self::UnsupportedComponentCount(_) => {
                ErrorKind::UnsupportedFormat
            }
            Self::DimensionsNotMultipleOf16 { .. }
            | Self::PixelFormatMismatch { .. }
            | Self::InvalidChannelCount(_)
            | Self::InvalidDimensions { .. }
            | Self::PixelBufferSize { .. }
            | Self::ChannelModeMismatch { .. } => ErrorKind::Precondition,
            Self::Io(_) => ErrorKind::Io,
            Self::Engine(error) if error.is_corrupt_data() => ErrorKind::CorruptStream,
            Self::Engine(_) | Self::OutputBufferTooSmall(_) => ErrorKind::Engine,
            Self::ImageLoad(_) => ErrorKind::Fallback,
            _ => ErrorKind::CorruptStream,
        }
    }
}

/// Failures reported by a [`crate::engine::TransformEngine`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Allocation of {0} blocks failed")]
    AllocationFailed(usize),
    #[error("Invalid Huffman table")]
    InvalidHuffmanTable,
    #[error("Quantization table contains a zero divisor")]
    InvalidQuantizationTable,
    #[error("Spectral selection {start}..={end} (A=0x{approximation:02X}) is not baseline")]
    UnsupportedSpectralSelection {
        start: u8,
        end: u8,
        approximation: u8,
    },
    #[error("Plane {plane_width}x{plane_height} does not match a {blocks_wide}x{blocks_high} block grid")]
    GridMismatch {
        plane_width: usize,
        plane_height: usize,
        blocks_wide: usize,
        blocks_high: usize,
    },
    #[error("Pixel buffer of {0} bytes is not packed 3-channel data")]
    InvalidPixelBuffer(usize),
    #[error("Entropy-coded data exhausted")]
    ScanDataExhausted,
    #[error("Invalid Huffman code in entropy-coded data")]
    InvalidHuffmanCode,
    #[error("Coefficient run overflows the 8x8 block")]
    CoefficientOverflow,
    #[error("Value category {0} has no Huffman code")]
    MissingHuffmanCode(u8),
    #[error("Expected restart marker RST{expected}, found 0x{found:04X}")]
    RestartMarkerMismatch { expected: u8, found: u16 },
    #[error("Scan has no components")]
    EmptyScan,
    #[error("Scan component {component} needs a {needed_wide}x{needed_high} block grid")]
    ScanLayout {
        component: usize,
        needed_wide: usize,
        needed_high: usize,
    },
}

impl EngineError {
    /// Failures caused by malformed entropy-coded data rather than the engine.
    pub fn is_corrupt_data(&self) -> bool {
        matches!(
            self,
            Self::ScanDataExhausted
                | Self::InvalidHuffmanCode
                | Self::CoefficientOverflow
                | Self::RestartMarkerMismatch { .. }
        )
    }
}
