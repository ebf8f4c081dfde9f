//! Quantization implementation for JPEG 1.
//! Handles quantization tables and the quantization of DCT coefficients.

use crate::constants::BLOCK_DIM;
use crate::jpeg1::dct::ZIGZAG_ORDER;

/// Standard JPEG luminance quantization table (Quality 50), natural order.
pub const STD_LUMINANCE_QUANT_TABLE: [u8; BLOCK_DIM] = [
    16, 11, 10, 16, 24, 40, 51, 61,
    12, 12, 14, 19, 26, 58, 60, 55,
    14, 13, 16, 24, 40, 57, 69, 56,
    14, 17, 22, 29, 51, 87, 80, 62,
    18, 22, 37, 56, 68, 109, 103, 77,
    24, 35, 55, 64, 81, 104, 113, 92,
    49, 64, 78, 87, 103, 121, 120, 101,
    72, 92, 95, 98, 112, 100, 103, 99,
];

/// Standard JPEG chrominance quantization table (Quality 50), natural order.
pub const STD_CHROMINANCE_QUANT_TABLE: [u8; BLOCK_DIM] = [
    17, 18, 24, 47, 99, 99, 99, 99,
    18, 21, 26, 66, 99, 99, 99, 99,
    24, 26, 56, 99, 99, 99, 99, 99,
    47, 66, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99,
];

// Baseline tables are limited to 8-bit entries even though 12-bit precision
// would allow up to 32767.
const BASELINE_MAXIMUM_QUANTIZER: u32 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantizationKind {
    Luminance,
    Chroma,
}

impl QuantizationKind {
    pub fn base_table(self) -> &'static [u8; BLOCK_DIM] {
        match self {
            Self::Luminance => &STD_LUMINANCE_QUANT_TABLE,
            Self::Chroma => &STD_CHROMINANCE_QUANT_TABLE,
        }
    }

    pub fn identifier(self) -> u8 {
        match self {
            Self::Luminance => 0,
            Self::Chroma => 1,
        }
    }
}

/// A DQT table: precision/identifier byte and 64 entries in zig-zag order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantizationTable {
    pub precision_and_identifier: u8,
    pub table: [u8; BLOCK_DIM],
}

impl Default for QuantizationTable {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl QuantizationTable {
    /// Placeholder filled in by a DQT segment.
    pub fn zeroed() -> Self {
        Self {
            precision_and_identifier: 0,
            table: [0; BLOCK_DIM],
        }
    }

    /// Standard table of `kind` scaled to `quality`; qualities outside 1..=100 are clamped.
    pub fn standard(kind: QuantizationKind, quality: i32) -> Self {
        let scale = quality_scale_factor(quality);
        let base = kind.base_table();
        let mut table = [0u8; BLOCK_DIM];
        for (k, entry) in table.iter_mut().enumerate() {
            *entry = scale_coefficient(base[ZIGZAG_ORDER[k]], scale);
        }
        Self {
            precision_and_identifier: kind.identifier(),
            table,
        }
    }

    pub fn identifier(&self) -> u8 {
        self.precision_and_identifier & 0x0F
    }

    pub fn precision(&self) -> u8 {
        self.precision_and_identifier >> 4
    }

    /// Entries rearranged into natural (row-major) order.
    pub fn natural_order(&self) -> [u8; BLOCK_DIM] {
        let mut natural = [0u8; BLOCK_DIM];
        for (k, &value) in self.table.iter().enumerate() {
            natural[ZIGZAG_ORDER[k]] = value;
        }
        natural
    }
}

/// libjpeg quality scaling: 5000 / q below 50, 200 - 2q from 50 up.
pub fn quality_scale_factor(quality: i32) -> u32 {
    let quality = quality.clamp(1, 100) as u32;
    if quality < 50 {
        5000 / quality
    } else {
        200 - quality * 2
    }
}

pub fn scale_coefficient(base: u8, scale: u32) -> u8 {
    let value = (base as u32 * scale + 50) / 100;
    value.clamp(1, BASELINE_MAXIMUM_QUANTIZER) as u8
}

/// Quantizes DCT coefficients given in natural order into zig-zag order.
pub fn quantize_block(
    dct_block: &[f32; BLOCK_DIM],
    quant_table: &[u8; BLOCK_DIM],
    output: &mut [i16],
) {
    for k in 0..BLOCK_DIM {
        let q_val = quant_table[k] as f32;
        output[k] = (dct_block[ZIGZAG_ORDER[k]] / q_val).round() as i16;
    }
}

/// De-quantizes zig-zag ordered coefficients back to natural order.
pub fn dequantize_block(
    quant_block: &[i16],
    quant_table: &[u8; BLOCK_DIM],
    output: &mut [f32; BLOCK_DIM],
) {
    for k in 0..BLOCK_DIM {
        let q_val = quant_table[k] as f32;
        output[ZIGZAG_ORDER[k]] = quant_block[k] as f32 * q_val;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn quality_50_reproduces_base_tables() {
        for kind in [QuantizationKind::Luminance, QuantizationKind::Chroma] {
            let table = QuantizationTable::standard(kind, 50);
            assert_eq!(&table.natural_order(), kind.base_table());
        }
    }

    #[test]
    fn identifiers_follow_kind() {
        assert_eq!(
            QuantizationTable::standard(QuantizationKind::Luminance, 75).precision_and_identifier,
            0
        );
        assert_eq!(
            QuantizationTable::standard(QuantizationKind::Chroma, 75).precision_and_identifier,
            1
        );
    }

    #[test]
    fn quality_is_clamped() {
        assert_eq!(
            QuantizationTable::standard(QuantizationKind::Luminance, -20),
            QuantizationTable::standard(QuantizationKind::Luminance, 1)
        );
        assert_eq!(
            QuantizationTable::standard(QuantizationKind::Chroma, 250),
            QuantizationTable::standard(QuantizationKind::Chroma, 100)
        );
    }

    #[test]
    fn baseline_clamp_limits_entries() {
        // Quality 1 scales by 5000: every base entry would exceed 255.
        let table = QuantizationTable::standard(QuantizationKind::Luminance, 1);
        assert!(table.table.iter().all(|&v| v == 255));

        // Quality 100 scales by 0: every entry is lifted to 1.
        let table = QuantizationTable::standard(QuantizationKind::Chroma, 100);
        assert!(table.table.iter().all(|&v| v == 1));
    }

    #[test]
    fn known_scaled_entries() {
        // 16 * 50 / 100 rounds to 8 at quality 75.
        let table = QuantizationTable::standard(QuantizationKind::Luminance, 75);
        assert_eq!(table.table[0], 8);
        assert_eq!(table.natural_order()[1], 6); // (11 * 50 + 50) / 100
    }

    #[test]
    fn higher_quality_never_increases_entries() {
        arbtest::arbtest(|u| {
            let low_range = u.arbitrary::<bool>()?;
            let (q1, q2) = if low_range {
                let a = u.int_in_range(1..=48)?;
                (a, u.int_in_range(a + 1..=49)?)
            } else {
                let a = u.int_in_range(50..=99)?;
                (a, u.int_in_range(a + 1..=100)?)
            };
            for kind in [QuantizationKind::Luminance, QuantizationKind::Chroma] {
                let coarse = QuantizationTable::standard(kind, q1);
                let fine = QuantizationTable::standard(kind, q2);
                for k in 0..BLOCK_DIM {
                    assert!(fine.table[k] <= coarse.table[k], "q{} vs q{} at {}", q1, q2, k);
                }
            }
            Ok(())
        });
    }

    #[test]
    fn quantize_dequantize_preserves_dc() {
        let mut dct = [0.0f32; BLOCK_DIM];
        dct[0] = 400.0;
        let table = QuantizationTable::standard(QuantizationKind::Luminance, 50);
        let mut quantized = [0i16; BLOCK_DIM];
        quantize_block(&dct, &table.table, &mut quantized);
        assert_eq!(quantized[0], 25);
        let mut restored = [0.0f32; BLOCK_DIM];
        dequantize_block(&quantized, &table.table, &mut restored);
        assert_eq!(restored[0], 400.0);
    }
}
