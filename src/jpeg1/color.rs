//! Color matrices between packed BGR pixels and JPEG YCbCr.
//!
//! JPEG uses full-range YCbCr (all channels span 0..=255), unlike the
//! clamped video range of ITU-R BT.601, so both directions carry their own
//! offsets. Each row maps `(c0, c1, c2, 1)` to one output channel.

pub type ColorMatrix = [[f32; 4]; 3];

/// (B, G, R) -> (Y, Cb, Cr)
pub const BGR_TO_YCBCR: ColorMatrix = [
    [0.114, 0.587, 0.299, 0.0],
    [0.5, -0.33126, -0.16874, 128.0],
    [-0.08131, -0.41869, 0.5, 128.0],
];

/// (Y, Cb, Cr) -> (B, G, R)
pub const YCBCR_TO_BGR: ColorMatrix = [
    [1.0, 1.772, 0.0, -226.816],
    [1.0, -0.34414, -0.71414, 135.45984],
    [1.0, 0.0, 1.402, -179.456],
];

/// Applies `matrix` to one pixel, rounding and saturating to 8 bits.
pub fn twist_pixel(matrix: &ColorMatrix, pixel: [u8; 3]) -> [u8; 3] {
    let input = [pixel[0] as f32, pixel[1] as f32, pixel[2] as f32];
    let mut output = [0u8; 3];
    for (channel, row) in output.iter_mut().zip(matrix) {
        let value = row[0] * input[0] + row[1] * input[1] + row[2] * input[2] + row[3];
        *channel = value.round().clamp(0.0, 255.0) as u8;
    }
    output
}
