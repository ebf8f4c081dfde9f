//! Discrete Cosine Transform (DCT) implementation for JPEG 1.

use crate::constants::{BLOCK_DIM, BLOCK_SIZE};
use std::f32::consts::PI;
use std::sync::OnceLock;

/// Zigzag scan pattern for 8x8 blocks: entry `k` is the natural (row-major)
/// index of the `k`-th coefficient in zig-zag order.
pub const ZIGZAG_ORDER: [usize; BLOCK_DIM] = [
    0,  1,  8, 16,  9,  2,  3, 10,
    17, 24, 32, 25, 18, 11,  4,  5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13,  6,  7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
];

/// `COS[u][x] = c(u) * cos((2x + 1) u pi / 16) / 2`
fn cosine_table() -> &'static [[f32; BLOCK_SIZE]; BLOCK_SIZE] {
    static TABLE: OnceLock<[[f32; BLOCK_SIZE]; BLOCK_SIZE]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [[0.0f32; BLOCK_SIZE]; BLOCK_SIZE];
        for (u, row) in table.iter_mut().enumerate() {
            let cu = if u == 0 { 1.0 / 2.0f32.sqrt() } else { 1.0 };
            for (x, value) in row.iter_mut().enumerate() {
                *value = 0.5 * cu * ((((2 * x + 1) * u) as f32 * PI) / 16.0).cos();
            }
        }
        table
    })
}

/// Separable forward DCT over a level-shifted block in natural order.
pub fn fdct_8x8(input: &[f32; BLOCK_DIM], output: &mut [f32; BLOCK_DIM]) {
    let cos = cosine_table();
    let mut rows = [0.0f32; BLOCK_DIM];
    for y in 0..BLOCK_SIZE {
        for u in 0..BLOCK_SIZE {
            let mut sum = 0.0f32;
            for x in 0..BLOCK_SIZE {
                sum += input[y * BLOCK_SIZE + x] * cos[u][x];
            }
            rows[y * BLOCK_SIZE + u] = sum;
        }
    }
    for u in 0..BLOCK_SIZE {
        for v in 0..BLOCK_SIZE {
            let mut sum = 0.0f32;
            for y in 0..BLOCK_SIZE {
                sum += rows[y * BLOCK_SIZE + u] * cos[v][y];
            }
            output[v * BLOCK_SIZE + u] = sum;
        }
    }
}

/// Separable inverse DCT, the exact transpose of [`fdct_8x8`].
pub fn idct_8x8(input: &[f32; BLOCK_DIM], output: &mut [f32; BLOCK_DIM]) {
    let cos = cosine_table();
    let mut columns = [0.0f32; BLOCK_DIM];
    for u in 0..BLOCK_SIZE {
        for y in 0..BLOCK_SIZE {
            let mut sum = 0.0f32;
            for v in 0..BLOCK_SIZE {
                sum += input[v * BLOCK_SIZE + u] * cos[v][y];
            }
            columns[y * BLOCK_SIZE + u] = sum;
        }
    }
    for y in 0..BLOCK_SIZE {
        for x in 0..BLOCK_SIZE {
            let mut sum = 0.0f32;
            for u in 0..BLOCK_SIZE {
                sum += columns[y * BLOCK_SIZE + u] * cos[u][x];
            }
            output[y * BLOCK_SIZE + x] = sum;
        }
    }
}
