//! JPEG marker segment reader.
//!
//! `JpegStreamReader` walks a byte stream with the marker scanner and parses
//! the baseline segments (DQT, DHT, SOF0, SOS, DRI) into the tables and
//! headers it owns. Every length field is validated against the segment and
//! the buffer before any payload byte is read.

use crate::constants::{
    BLOCK_DIM, HUFFMAN_CODE_LENGTHS, HUFFMAN_TABLE_COUNT, MAXIMUM_HUFFMAN_VALUES,
    QUANTIZATION_TABLE_COUNT, SEGMENT_LENGTH_SIZE,
};
use crate::error::JpegError;
use crate::jpeg_marker_code::{JpegMarkerCode, has_segment_code};
use crate::jpeg1::huffman::HuffmanTable;
use crate::jpeg1::quantization::QuantizationTable;
use crate::marker_scanner::next_marker;
use crate::{FrameComponent, FrameHeader, RestartInterval, ScanComponentSelector, ScanHeader};

const HUFFMAN_SUB_TABLE_HEADER_SIZE: usize = 1 + HUFFMAN_CODE_LENGTHS;
const MAXIMUM_SCAN_COMPONENTS: usize = 4;
// Progressive and extended frames may define up to four tables per class.
const MAXIMUM_TABLE_IDENTIFIER: u8 = 3;

pub struct JpegStreamReader<'a> {
    source: &'a [u8],
    position: usize,
    pub quantization_tables: [QuantizationTable; QUANTIZATION_TABLE_COUNT],
    /// Indexed by `class * 2 + identifier`.
    pub huffman_tables: [HuffmanTable; HUFFMAN_TABLE_COUNT],
    /// Class/identifier bytes of DHT tables outside the baseline slots.
    extended_huffman_tables: Vec<u8>,
    frame_header: Option<FrameHeader>,
    restart_interval: RestartInterval,
}

impl<'a> JpegStreamReader<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            position: 0,
            quantization_tables: [QuantizationTable::zeroed(); QUANTIZATION_TABLE_COUNT],
            huffman_tables: std::array::from_fn(|_| HuffmanTable::zeroed()),
            extended_huffman_tables: Vec::new(),
            frame_header: None,
            restart_interval: None,
        }
    }

    pub fn source(&self) -> &'a [u8] {
        self.source
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn set_position(&mut self, position: usize) {
        self.position = position.min(self.source.len());
    }

    pub fn frame_header(&self) -> Option<&FrameHeader> {
        self.frame_header.as_ref()
    }

    pub fn restart_interval(&self) -> RestartInterval {
        self.restart_interval
    }

    pub fn huffman_table(&self, class: u8, identifier: u8) -> Option<&HuffmanTable> {
        if class > 1 || identifier > 1 {
            return None;
        }
        self.huffman_tables
            .get(class as usize * 2 + identifier as usize)
            .filter(|table| table.code_count() > 0)
    }

    /// An 8-bit table usable by a baseline frame.
    pub fn quantization_table(&self, selector: u8) -> Result<&QuantizationTable, JpegError> {
        let table = self
            .quantization_tables
            .get(selector as usize)
            .ok_or(JpegError::InvalidQuantizationTable(selector))?;
        if table.precision_and_identifier >> 4 != 0 {
            return Err(JpegError::InvalidQuantizationTable(table.precision_and_identifier));
        }
        if table.table.iter().all(|&v| v == 0) {
            return Err(JpegError::MissingQuantizationTable(selector));
        }
        Ok(table)
    }

    /// Precision/identifier bytes of every DQT table defined so far.
    pub fn quantization_table_selectors(&self) -> Vec<u8> {
        self.quantization_tables
            .iter()
            .filter(|t| t.precision_and_identifier >> 4 != 0 || t.table.iter().any(|&v| v != 0))
            .map(|t| t.precision_and_identifier)
            .collect()
    }

    /// Class/identifier bytes of every DHT table defined so far.
    pub fn huffman_table_selectors(&self) -> Vec<u8> {
        let mut selectors: Vec<u8> = self
            .huffman_tables
            .iter()
            .filter(|t| t.code_count() > 0)
            .map(|t| t.class_and_identifier)
            .chain(self.extended_huffman_tables.iter().copied())
            .collect();
        selectors.sort_unstable();
        selectors.dedup();
        selectors
    }

    pub fn read_u8(&mut self) -> Result<u8, JpegError> {
        let value = *self
            .source
            .get(self.position)
            .ok_or(JpegError::UnexpectedEndOfStream(self.position))?;
        self.position += 1;
        Ok(value)
    }

    pub fn read_u16(&mut self) -> Result<u16, JpegError> {
        let high = self.read_u8()? as u16;
        let low = self.read_u8()? as u16;
        Ok((high << 8) | low)
    }

    fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], JpegError> {
        let end = self
            .position
            .checked_add(count)
            .filter(|&end| end <= self.source.len())
            .ok_or(JpegError::UnexpectedEndOfStream(self.source.len()))?;
        let bytes = &self.source[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    /// Next marker code found by the scanner, leaving the position after it.
    pub fn next_marker(&mut self) -> Option<u8> {
        next_marker(self.source, &mut self.position)
    }

    /// The stream must open with SOI.
    pub fn read_start_of_image(&mut self) -> Result<(), JpegError> {
        self.position = 0;
        match self.next_marker() {
            Some(code) if code == JpegMarkerCode::StartOfImage.code() => Ok(()),
            _ => Err(JpegError::StartOfImageMarkerNotFound),
        }
    }

    /// Reads a segment length field and returns the payload size following it.
    fn read_segment_length(&mut self) -> Result<usize, JpegError> {
        let offset = self.position;
        let size = self.read_u16()? as usize;
        if size < SEGMENT_LENGTH_SIZE || offset + size > self.source.len() {
            return Err(JpegError::InvalidMarkerSegmentSize { offset, size });
        }
        Ok(size - SEGMENT_LENGTH_SIZE)
    }

    pub fn skip_segment(&mut self) -> Result<(), JpegError> {
        let payload = self.read_segment_length()?;
        self.position += payload;
        Ok(())
    }

    /// Skips an embedded image (thumbnail) up to and including its EOI.
    pub fn skip_thumbnail(&mut self) {
        while let Some(code) = self.next_marker() {
            if code == JpegMarkerCode::EndOfImage.code() {
                break;
            }
        }
    }

    /// Reads every table of a DQT segment. 16-bit tables are kept as
    /// markers only; a baseline frame referencing one is rejected later.
    pub fn read_dqt_segment(&mut self) -> Result<(), JpegError> {
        let mut remaining = self.read_segment_length()?;
        while remaining > 0 {
            let precision_and_identifier = self.read_u8()?;
            let precision = precision_and_identifier >> 4;
            let identifier = (precision_and_identifier & 0x0F) as usize;
            if precision > 1 || identifier >= QUANTIZATION_TABLE_COUNT {
                return Err(JpegError::InvalidQuantizationTable(precision_and_identifier));
            }
            let entry_size = BLOCK_DIM << precision;
            if remaining < 1 + entry_size {
                return Err(JpegError::TableOverrunsSegment);
            }
            let entries = self.read_bytes(entry_size)?;
            remaining -= 1 + entry_size;

            let table = &mut self.quantization_tables[identifier];
            *table = QuantizationTable::zeroed();
            table.precision_and_identifier = precision_and_identifier;
            if precision == 0 {
                table.table.copy_from_slice(entries);
            }
            tracing::trace!("DQT table {} ({}-bit)", identifier, 8 << precision);
        }
        Ok(())
    }

    pub fn read_dht_segment(&mut self) -> Result<(), JpegError> {
        let mut remaining = self.read_segment_length()?;
        while remaining > 0 {
            if remaining < HUFFMAN_SUB_TABLE_HEADER_SIZE {
                return Err(JpegError::TableOverrunsSegment);
            }
            let class_and_identifier = self.read_u8()?;
            let class = class_and_identifier >> 4;
            let identifier = class_and_identifier & 0x0F;
            if class > 1 || identifier > MAXIMUM_TABLE_IDENTIFIER {
                return Err(JpegError::InvalidHuffmanTableSelector(class_and_identifier));
            }

            let mut counts = [0u8; HUFFMAN_CODE_LENGTHS];
            counts.copy_from_slice(self.read_bytes(HUFFMAN_CODE_LENGTHS)?);
            let total: usize = counts.iter().map(|&c| c as usize).sum();
            if total > MAXIMUM_HUFFMAN_VALUES {
                return Err(JpegError::InvalidHuffmanCodeCount(total));
            }
            remaining -= HUFFMAN_SUB_TABLE_HEADER_SIZE;
            if remaining < total {
                return Err(JpegError::TableOverrunsSegment);
            }
            let values = self.read_bytes(total)?;
            remaining -= total;

            if identifier > 1 {
                tracing::trace!("DHT class {} table {} (not baseline)", class, identifier);
                self.extended_huffman_tables.push(class_and_identifier);
                continue;
            }
            let table = &mut self.huffman_tables[(class * 2 + identifier) as usize];
            *table = HuffmanTable::zeroed();
            table.class_and_identifier = class_and_identifier;
            table.counts = counts;
            table.values[..total].copy_from_slice(values);
            tracing::trace!("DHT class {} table {} with {} codes", class, identifier, total);
        }
        Ok(())
    }

    /// Reads the SOFn payload; the caller decides whether the frame type is
    /// supported.
    pub fn read_sof_segment(&mut self) -> Result<FrameHeader, JpegError> {
        let payload = self.read_segment_length()?;
        let sample_precision = self.read_u8()?;
        let height = self.read_u16()?;
        let width = self.read_u16()?;
        let component_count = self.read_u8()? as usize;
        if width == 0 || height == 0 {
            return Err(JpegError::InvalidFrameDimensions { width, height });
        }
        if component_count == 0 || payload != 6 + 3 * component_count {
            return Err(JpegError::InvalidComponentCount(component_count));
        }

        let mut components = Vec::with_capacity(component_count);
        for _ in 0..component_count {
            let identifier = self.read_u8()?;
            let sampling_factors = self.read_u8()?;
            let quantization_table_selector = self.read_u8()?;
            if quantization_table_selector as usize >= QUANTIZATION_TABLE_COUNT {
                return Err(JpegError::InvalidQuantizationTable(quantization_table_selector));
            }
            components.push(FrameComponent {
                identifier,
                sampling_factors,
                quantization_table_selector,
            });
        }

        let frame = FrameHeader {
            sample_precision,
            height,
            width,
            components,
        };
        self.frame_header = Some(frame.clone());
        Ok(frame)
    }

    pub fn read_sos_segment(&mut self) -> Result<ScanHeader, JpegError> {
        let payload = self.read_segment_length()?;
        let frame = self
            .frame_header
            .as_ref()
            .ok_or(JpegError::ScanBeforeFrameHeader)?;
        let frame_component_ids: Vec<u8> = frame.components.iter().map(|c| c.identifier).collect();

        let component_count = self.read_u8()? as usize;
        if component_count == 0
            || component_count > MAXIMUM_SCAN_COMPONENTS
            || payload != 4 + 2 * component_count
        {
            return Err(JpegError::InvalidComponentCount(component_count));
        }

        let mut components: Vec<ScanComponentSelector> = Vec::with_capacity(component_count);
        for _ in 0..component_count {
            let selector = self.read_u8()?;
            let huffman_tables = self.read_u8()?;
            if !frame_component_ids.contains(&selector) {
                return Err(JpegError::UnknownComponentSelector(selector));
            }
            if components.iter().any(|c| c.selector == selector) {
                return Err(JpegError::DuplicateComponentSelector(selector));
            }
            components.push(ScanComponentSelector {
                selector,
                huffman_tables,
            });
        }

        Ok(ScanHeader {
            components,
            spectral_start: self.read_u8()?,
            spectral_end: self.read_u8()?,
            successive_approximation: self.read_u8()?,
        })
    }

    pub fn read_dri_segment(&mut self) -> Result<RestartInterval, JpegError> {
        let offset = self.position;
        let payload = self.read_segment_length()?;
        if payload != 2 {
            return Err(JpegError::InvalidMarkerSegmentSize {
                offset,
                size: payload + SEGMENT_LENGTH_SIZE,
            });
        }
        let interval = self.read_u16()?;
        self.restart_interval = (interval > 0).then_some(interval);
        Ok(self.restart_interval)
    }
}

/// Offset and code of every marker in `source`. Segment payloads are skipped
/// by their length field, so only entropy-coded data is scanned byte by byte.
pub fn list_markers(source: &[u8]) -> Result<Vec<(usize, u8)>, JpegError> {
    let mut reader = JpegStreamReader::new(source);
    let mut markers = Vec::new();
    while let Some(code) = reader.next_marker() {
        markers.push((reader.position() - 2, code));
        if has_segment_code(code) {
            reader.skip_segment()?;
        }
    }
    Ok(markers)
}
