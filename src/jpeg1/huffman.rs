//! Huffman coding implementation for JPEG 1 Baseline.
//! Holds the standard Huffman tables, the code construction derived from a
//! DHT table, and bit-stream packing with byte stuffing.

use crate::constants::{HUFFMAN_CODE_LENGTHS, MAXIMUM_HUFFMAN_VALUES};
use crate::error::EngineError;

/// Standard JPEG DC luminance Huffman table lengths (Table K.3).
pub const STD_LUMINANCE_DC_LENGTHS: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];

/// Standard JPEG DC luminance Huffman table values (Table K.3).
pub const STD_LUMINANCE_DC_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

/// Standard JPEG DC chrominance Huffman table lengths (Table K.4).
pub const STD_CHROMINANCE_DC_LENGTHS: [u8; 16] = [0, 3, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0];

/// Standard JPEG DC chrominance Huffman table values (Table K.4).
pub const STD_CHROMINANCE_DC_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

/// Standard JPEG AC luminance Huffman table lengths (Table K.5).
pub const STD_LUMINANCE_AC_LENGTHS: [u8; 16] = [0, 2, 1, 3, 3, 2, 4, 3, 5, 5, 4, 4, 0, 0, 1, 0x7d];

/// Standard JPEG AC luminance Huffman table values (Table K.5).
pub const STD_LUMINANCE_AC_VALUES: [u8; 162] = [
    0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12,
    0x21, 0x31, 0x41, 0x06, 0x13, 0x51, 0x61, 0x07,
    0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xa1, 0x08,
    0x23, 0x42, 0xb1, 0xc1, 0x15, 0x52, 0xd1, 0xf0,
    0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0a, 0x16,
    0x17, 0x18, 0x19, 0x1a, 0x25, 0x26, 0x27, 0x28,
    0x29, 0x2a, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39,
    0x3a, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49,
    0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59,
    0x5a, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69,
    0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79,
    0x7a, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89,
    0x8a, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98,
    0x99, 0x9a, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7,
    0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4, 0xb5, 0xb6,
    0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3, 0xc4, 0xc5,
    0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xd2, 0xd3, 0xd4,
    0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda, 0xe1, 0xe2,
    0xe3, 0xe4, 0xe5, 0xe6, 0xe7, 0xe8, 0xe9, 0xea,
    0xf1, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8,
    0xf9, 0xfa,
];

/// Standard JPEG AC chrominance Huffman table lengths (Table K.6).
pub const STD_CHROMINANCE_AC_LENGTHS: [u8; 16] = [0, 2, 1, 2, 4, 4, 3, 4, 7, 5, 4, 4, 0, 1, 2, 0x77];

/// Standard JPEG AC chrominance Huffman table values (Table K.6).
pub const STD_CHROMINANCE_AC_VALUES: [u8; 162] = [
    0x00, 0x01, 0x02, 0x03, 0x11, 0x04, 0x05, 0x21,
    0x31, 0x06, 0x12, 0x41, 0x51, 0x07, 0x61, 0x71,
    0x13, 0x22, 0x32, 0x81, 0x08, 0x14, 0x42, 0x91,
    0xa1, 0xb1, 0xc1, 0x09, 0x23, 0x33, 0x52, 0xf0,
    0x15, 0x62, 0x72, 0xd1, 0x0a, 0x16, 0x24, 0x34,
    0xe1, 0x25, 0xf1, 0x17, 0x18, 0x19, 0x1a, 0x26,
    0x27, 0x28, 0x29, 0x2a, 0x35, 0x36, 0x37, 0x38,
    0x39, 0x3a, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48,
    0x49, 0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58,
    0x59, 0x5a, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68,
    0x69, 0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78,
    0x79, 0x7a, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87,
    0x88, 0x89, 0x8a, 0x92, 0x93, 0x94, 0x95, 0x96,
    0x97, 0x98, 0x99, 0x9a, 0xa2, 0xa3, 0xa4, 0xa5,
    0xa6, 0xa7, 0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4,
    0xb5, 0xb6, 0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3,
    0xc4, 0xc5, 0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xd2,
    0xd3, 0xd4, 0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda,
    0xe2, 0xe3, 0xe4, 0xe5, 0xe6, 0xe7, 0xe8, 0xe9,
    0xea, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8,
    0xf9, 0xfa,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableClass {
    Dc = 0,
    Ac = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HuffmanKind {
    LuminanceDc,
    ChromaDc,
    LuminanceAc,
    ChromaAc,
}

impl HuffmanKind {
    pub const ALL: [HuffmanKind; 4] = [
        Self::LuminanceDc,
        Self::ChromaDc,
        Self::LuminanceAc,
        Self::ChromaAc,
    ];

    /// DHT class (high nibble) and identifier (low nibble).
    pub fn class_and_identifier(self) -> u8 {
        match self {
            Self::LuminanceDc => 0x00,
            Self::ChromaDc => 0x01,
            Self::LuminanceAc => 0x10,
            Self::ChromaAc => 0x11,
        }
    }

    fn lengths_and_values(self) -> (&'static [u8; 16], &'static [u8]) {
        match self {
            Self::LuminanceDc => (&STD_LUMINANCE_DC_LENGTHS, &STD_LUMINANCE_DC_VALUES),
            Self::ChromaDc => (&STD_CHROMINANCE_DC_LENGTHS, &STD_CHROMINANCE_DC_VALUES),
            Self::LuminanceAc => (&STD_LUMINANCE_AC_LENGTHS, &STD_LUMINANCE_AC_VALUES),
            Self::ChromaAc => (&STD_CHROMINANCE_AC_LENGTHS, &STD_CHROMINANCE_AC_VALUES),
        }
    }
}

/// A DHT table as stored in the stream: 16 code-length counts followed by
/// up to 256 code values, of which the first `code_count()` are meaningful.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTable {
    pub class_and_identifier: u8,
    pub counts: [u8; HUFFMAN_CODE_LENGTHS],
    pub values: [u8; MAXIMUM_HUFFMAN_VALUES],
}

impl Default for HuffmanTable {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl HuffmanTable {
    /// Placeholder filled in by a DHT segment.
    pub fn zeroed() -> Self {
        Self {
            class_and_identifier: 0,
            counts: [0; HUFFMAN_CODE_LENGTHS],
            values: [0; MAXIMUM_HUFFMAN_VALUES],
        }
    }

    pub fn standard(kind: HuffmanKind) -> Self {
        let (lengths, values) = kind.lengths_and_values();
        let mut table = Self::zeroed();
        table.class_and_identifier = kind.class_and_identifier();
        table.counts = *lengths;
        table.values[..values.len()].copy_from_slice(values);
        table
    }

    pub fn class(&self) -> u8 {
        self.class_and_identifier >> 4
    }

    pub fn identifier(&self) -> u8 {
        self.class_and_identifier & 0x0F
    }

    /// Sum of the 16 length counts.
    pub fn code_count(&self) -> usize {
        self.counts.iter().map(|&c| c as usize).sum()
    }

    /// The meaningful code values.
    pub fn values(&self) -> &[u8] {
        &self.values[..self.code_count().min(MAXIMUM_HUFFMAN_VALUES)]
    }
}

/// Represents a Huffman code with its bit value and length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HuffmanCode {
    pub value: u16,
    pub length: u8,
}

/// Canonical codes derived from a [`HuffmanTable`], usable for both
/// encoding (symbol lookup) and decoding (per-length code ranges).
#[derive(Debug, Clone)]
pub struct HuffmanSpec {
    pub class: TableClass,
    pub codes: [HuffmanCode; 256],
    pub values: Vec<u8>,

    // Decoding fields
    pub min_code: [i32; 16],
    pub max_code: [i32; 16],
    pub val_ptr: [i32; 16],
}

impl HuffmanSpec {
    /// Builds canonical codes (ISO/IEC 10918-1 Annex C).
    pub fn build(table: &HuffmanTable, class: TableClass) -> Result<Self, EngineError> {
        let total = table.code_count();
        if total == 0 || total > MAXIMUM_HUFFMAN_VALUES {
            return Err(EngineError::InvalidHuffmanTable);
        }

        let mut spec = Self {
            class,
            codes: [HuffmanCode::default(); 256],
            values: table.values[..total].to_vec(),
            min_code: [0; 16],
            max_code: [-1; 16],
            val_ptr: [0; 16],
        };

        let mut code = 0u32;
        let mut val_idx = 0usize;

        for i in 0..16 {
            let n_codes = table.counts[i] as usize;
            if n_codes > 0 {
                spec.val_ptr[i] = val_idx as i32;
                spec.min_code[i] = code as i32;
                for _ in 0..n_codes {
                    // Codes of length i + 1 must fit in i + 1 bits.
                    if code >= (1u32 << (i + 1)) {
                        return Err(EngineError::InvalidHuffmanTable);
                    }
                    let symbol = spec.values[val_idx] as usize;
                    spec.codes[symbol] = HuffmanCode {
                        value: code as u16,
                        length: (i + 1) as u8,
                    };
                    code += 1;
                    val_idx += 1;
                }
                spec.max_code[i] = code as i32 - 1;
            }
            code <<= 1;
        }
        Ok(spec)
    }

    pub fn code_for(&self, symbol: u8) -> Result<HuffmanCode, EngineError> {
        let code = self.codes[symbol as usize];
        if code.length == 0 {
            return Err(EngineError::MissingHuffmanCode(symbol));
        }
        Ok(code)
    }

    /// Decodes the next symbol from the given JpegBitReader.
    pub fn decode(&self, reader: &mut JpegBitReader) -> Result<u8, EngineError> {
        let mut code = 0i32;
        for i in 0..16 {
            let bit = reader.read_bits(1)? as i32;
            code = (code << 1) | bit;
            if code <= self.max_code[i] {
                let idx = self.val_ptr[i] + (code - self.min_code[i]);
                return Ok(self.values[idx as usize]);
            }
        }
        Err(EngineError::InvalidHuffmanCode)
    }
}

/// Helper for reading bits from bytes with JPEG anti-stuffing (skipping FF00).
pub struct JpegBitReader<'a> {
    source: &'a [u8],
    position: usize,
    bit_buffer: u32,
    bits_in_buffer: i32,
}

impl<'a> JpegBitReader<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            position: 0,
            bit_buffer: 0,
            bits_in_buffer: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn read_bits(&mut self, count: u8) -> Result<u16, EngineError> {
        if count == 0 {
            return Ok(0);
        }
        let count = count as i32;
        while self.bits_in_buffer < count {
            let byte = self.read_byte_unstuffed()?;
            self.bit_buffer = (self.bit_buffer << 8) | (byte as u32);
            self.bits_in_buffer += 8;
        }

        let shift = self.bits_in_buffer - count;
        let value = (self.bit_buffer >> shift) & ((1 << count) - 1);
        self.bits_in_buffer -= count;
        self.bit_buffer &= (1u32 << self.bits_in_buffer) - 1;
        Ok(value as u16)
    }

    fn read_byte_unstuffed(&mut self) -> Result<u8, EngineError> {
        if self.position >= self.source.len() {
            return Err(EngineError::ScanDataExhausted);
        }
        let byte = self.source[self.position];
        self.position += 1;

        if byte == 0xFF && self.source.get(self.position) == Some(&0x00) {
            self.position += 1;
        }
        Ok(byte)
    }

    /// Drops the padding bits of the current byte and consumes the restart
    /// marker that must follow, returning its 16-bit code.
    pub fn read_restart_marker(&mut self) -> Result<u16, EngineError> {
        self.bit_buffer = 0;
        self.bits_in_buffer = 0;
        while self.source.get(self.position) == Some(&0xFF)
            && self.source.get(self.position + 1) == Some(&0xFF)
        {
            self.position += 1;
        }
        if self.position + 1 >= self.source.len() {
            return Err(EngineError::ScanDataExhausted);
        }
        let marker = u16::from_be_bytes([self.source[self.position], self.source[self.position + 1]]);
        self.position += 2;
        Ok(marker)
    }
}

/// Helper for packing bits into bytes with JPEG bit-stuffing (FF00).
pub struct JpegBitWriter<'a> {
    destination: &'a mut Vec<u8>,
    bit_buffer: u32,
    bits_in_buffer: i32,
}

impl<'a> JpegBitWriter<'a> {
    pub fn new(destination: &'a mut Vec<u8>) -> Self {
        Self {
            destination,
            bit_buffer: 0,
            bits_in_buffer: 0,
        }
    }

    pub fn write_bits(&mut self, value: u16, length: u8) {
        if length == 0 {
            return;
        }
        let length = length as i32;
        let mask = (1u32 << length) - 1;
        self.bit_buffer = (self.bit_buffer << length) | (value as u32 & mask);
        self.bits_in_buffer += length;

        while self.bits_in_buffer >= 8 {
            let shift = self.bits_in_buffer - 8;
            let byte = ((self.bit_buffer >> shift) & 0xFF) as u8;
            self.emit_byte(byte);
            self.bits_in_buffer = shift;
            self.bit_buffer &= (1u32 << shift) - 1;
        }
    }

    pub fn write_code(&mut self, code: HuffmanCode) {
        self.write_bits(code.value, code.length);
    }

    fn emit_byte(&mut self, byte: u8) {
        self.destination.push(byte);
        if byte == 0xFF {
            self.destination.push(0x00);
        }
    }

    /// Pads the last partial byte with one bits.
    pub fn flush(&mut self) {
        if self.bits_in_buffer > 0 {
            let pad_bits = 8 - self.bits_in_buffer;
            let value = (1u32 << pad_bits) - 1;
            self.write_bits(value as u16, pad_bits as u8);
        }
    }

    /// Flushes and appends a raw (unstuffed) marker.
    pub fn write_marker(&mut self, code: u8) {
        self.flush();
        self.destination.push(0xFF);
        self.destination.push(code);
    }
}

/// Computes the magnitude category of an integer (ISO/IEC 10918-1 F.1.2.1).
pub fn category(value: i16) -> u8 {
    if value == 0 {
        return 0;
    }
    let abs_val = value.unsigned_abs();
    (16 - abs_val.leading_zeros()) as u8
}

/// Encodes the bits for a given category and value (ISO/IEC 10918-1 F.1.2.1.1).
pub fn diff_bits(value: i16, category: u8) -> u16 {
    if category == 0 {
        return 0;
    }
    if value >= 0 {
        value as u16
    } else {
        (value as i32 + (1 << category) - 1) as u16
    }
}

/// Decodes the value from bits given its category (ISO/IEC 10918-1 F.2.2.1).
pub fn extend(bits: u16, category: u8) -> i16 {
    if category == 0 {
        return 0;
    }
    let threshold = 1u32 << (category - 1);
    if bits as u32 >= threshold {
        bits as i16
    } else {
        (bits as i32 - (1i32 << category) + 1) as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_writer_reader_roundtrip() {
        let mut buffer = Vec::new();
        {
            let mut writer = JpegBitWriter::new(&mut buffer);
            writer.write_bits(0x01, 2);
            writer.write_bits(0xFF, 8); // Should trigger stuffing
            writer.write_bits(0x0A, 4);
            writer.flush();
        }
        assert!(buffer.windows(2).any(|w| w == [0xFF, 0x00]));

        let mut reader = JpegBitReader::new(&buffer);
        assert_eq!(reader.read_bits(2).unwrap(), 0x01);
        assert_eq!(reader.read_bits(8).unwrap(), 0xFF);
        assert_eq!(reader.read_bits(4).unwrap(), 0x0A);
    }

    #[test]
    fn restart_marker_is_read_after_padding() {
        let mut buffer = Vec::new();
        {
            let mut writer = JpegBitWriter::new(&mut buffer);
            writer.write_bits(0x5, 3);
            writer.write_marker(0xD0);
            writer.write_bits(0x3, 2);
            writer.flush();
        }
        let mut reader = JpegBitReader::new(&buffer);
        assert_eq!(reader.read_bits(3).unwrap(), 0x5);
        assert_eq!(reader.read_restart_marker().unwrap(), 0xFFD0);
        assert_eq!(reader.read_bits(2).unwrap(), 0x3);
    }

    #[test]
    fn standard_tables_match_reference_sizes() {
        let expected = [12usize, 12, 162, 162];
        for (kind, count) in HuffmanKind::ALL.iter().zip(expected) {
            let table = HuffmanTable::standard(*kind);
            assert_eq!(table.code_count(), count);
            assert_eq!(table.values().len(), count);
            assert!(table.values[count..].iter().all(|&v| v == 0));
        }
        assert_eq!(HuffmanTable::standard(HuffmanKind::LuminanceAc).class_and_identifier, 16);
        assert_eq!(HuffmanTable::standard(HuffmanKind::ChromaAc).class_and_identifier, 17);
    }

    #[test]
    fn canonical_codes_for_luminance_dc() {
        let spec = HuffmanSpec::build(&HuffmanTable::standard(HuffmanKind::LuminanceDc), TableClass::Dc).unwrap();
        assert_eq!(spec.code_for(0).unwrap(), HuffmanCode { value: 0b00, length: 2 });
        assert_eq!(spec.code_for(1).unwrap(), HuffmanCode { value: 0b010, length: 3 });
        assert_eq!(spec.code_for(11).unwrap(), HuffmanCode { value: 0b1_1111_1110, length: 9 });
        assert_eq!(spec.code_for(12), Err(EngineError::MissingHuffmanCode(12)));
    }

    #[test]
    fn every_standard_symbol_decodes() {
        for kind in HuffmanKind::ALL {
            let table = HuffmanTable::standard(kind);
            let spec = HuffmanSpec::build(&table, TableClass::Ac).unwrap();
            let mut buffer = Vec::new();
            {
                let mut writer = JpegBitWriter::new(&mut buffer);
                for &symbol in table.values() {
                    writer.write_code(spec.code_for(symbol).unwrap());
                }
                writer.flush();
            }
            let mut reader = JpegBitReader::new(&buffer);
            for &symbol in table.values() {
                assert_eq!(spec.decode(&mut reader).unwrap(), symbol);
            }
        }
    }

    #[test]
    fn rejects_empty_and_oversubscribed_tables() {
        assert!(HuffmanSpec::build(&HuffmanTable::zeroed(), TableClass::Dc).is_err());

        let mut table = HuffmanTable::zeroed();
        table.counts[0] = 3; // three 1-bit codes cannot exist
        assert_eq!(
            HuffmanSpec::build(&table, TableClass::Dc).unwrap_err(),
            EngineError::InvalidHuffmanTable
        );
    }

    #[test]
    fn value_categories() {
        assert_eq!(category(0), 0);
        assert_eq!(category(1), 1);
        assert_eq!(category(-1), 1);
        assert_eq!(category(255), 8);
        assert_eq!(category(-1024), 11);
        for value in [-300i16, -7, -1, 1, 5, 1000] {
            let c = category(value);
            assert_eq!(extend(diff_bits(value, c), c), value);
        }
    }
}
