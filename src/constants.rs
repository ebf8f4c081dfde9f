pub const JPEG_MARKER_START_BYTE: u8 = 0xFF;
pub const JPEG_STUFFED_ZERO_BYTE: u8 = 0x00;
pub const JPEG_RESTART_MARKER_RANGE: u8 = 8;

// The size in bytes of the segment length field.
pub const SEGMENT_LENGTH_SIZE: usize = 2;

// The maximum size of the data bytes that fit in a segment.
pub const SEGMENT_MAX_DATA_SIZE: usize = u16::MAX as usize - SEGMENT_LENGTH_SIZE;

/// Largest width or height a frame header can carry.
pub const MAXIMUM_DIMENSION: usize = u16::MAX as usize;

/// Host output buffer limit for a single encoded stream (32 MiB).
pub const MAXIMUM_STREAM_SIZE: usize = 4 << 23;

pub const BLOCK_SIZE: usize = 8;
pub const BLOCK_DIM: usize = BLOCK_SIZE * BLOCK_SIZE;

pub const SAMPLE_PRECISION: u8 = 8;
pub const QUANTIZATION_TABLE_COUNT: usize = 4;
pub const HUFFMAN_TABLE_COUNT: usize = 4;
pub const HUFFMAN_CODE_LENGTHS: usize = 16;
pub const MAXIMUM_HUFFMAN_VALUES: usize = 256;

/// Encoder input dimensions must be a multiple of this value.
pub const ENCODER_DIMENSION_ALIGNMENT: usize = 16;

// Baseline spectral selection and successive approximation.
pub const BASELINE_SPECTRAL_START: u8 = 0;
pub const BASELINE_SPECTRAL_END: u8 = 63;
pub const BASELINE_APPROXIMATION: u8 = 0;

/// JFIF APP0 payload: identifier, version 1.02, no units, 1:1 density, no thumbnail.
pub const JFIF_TAG: [u8; 14] = [
    0x4A, 0x46, 0x49, 0x46, 0x00, // "JFIF\0"
    0x01, 0x02, // version
    0x00, // units
    0x00, 0x01, 0x00, 0x01, // density
    0x00, 0x00, // thumbnail size
];

// Packed sampling factors, high nibble vertical, low nibble horizontal.
pub const SAMPLING_FULL: u8 = 0x11;
pub const SAMPLING_LUMA_420: u8 = 0x22;

pub const SAMPLING_444: [u8; 3] = [SAMPLING_FULL, SAMPLING_FULL, SAMPLING_FULL];
pub const SAMPLING_420: [u8; 3] = [SAMPLING_LUMA_420, SAMPLING_FULL, SAMPLING_FULL];
