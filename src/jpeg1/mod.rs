//! JPEG 1 (Baseline) Implementation (ISO/IEC 10918-1 / ITU-T T.81)
//!
//! Sequential Huffman-coded DCT frames with 8-bit samples.
//!
//! Features:
//! - YCbCr 4:2:0 color and single-component grayscale encoding.
//! - Standard Annex K quantization and Huffman tables, quality scaled.
//! - Restart intervals (DRI/RSTm) on both paths.
//! - Interleaved and single-component scans on decode.

pub mod color;
pub mod dct;
pub mod decoder;
pub mod encoder;
pub mod huffman;
pub mod quantization;

pub use decoder::{DecoderState, JpegDecoder, StreamInfo, read_header};
pub use encoder::{EncoderState, JpegEncoder};
