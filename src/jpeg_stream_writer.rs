//! JPEG Codestream Writer utilities.
//!
//! This module provides the `JpegStreamWriter` which emits the markers and
//! segments of a baseline JPEG stream into a caller-provided buffer.

use crate::constants::{JFIF_TAG, JPEG_MARKER_START_BYTE, SEGMENT_LENGTH_SIZE, SEGMENT_MAX_DATA_SIZE};
use crate::error::JpegError;
use crate::jpeg_marker_code::JpegMarkerCode;
use crate::jpeg1::huffman::HuffmanTable;
use crate::jpeg1::quantization::QuantizationTable;
use crate::{FrameHeader, ScanHeader};

/// A writer for JPEG codestreams over a fixed-size output buffer.
pub struct JpegStreamWriter<'a> {
    destination: &'a mut [u8],
    position: usize,
}

impl<'a> JpegStreamWriter<'a> {
    pub fn new(destination: &'a mut [u8]) -> Self {
        Self {
            destination,
            position: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.position
    }

    pub fn is_empty(&self) -> bool {
        self.position == 0
    }

    pub fn write_byte(&mut self, value: u8) -> Result<(), JpegError> {
        if self.position >= self.destination.len() {
            return Err(JpegError::OutputBufferTooSmall(self.destination.len()));
        }
        self.destination[self.position] = value;
        self.position += 1;
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<(), JpegError> {
        let bytes = value.to_be_bytes();
        self.write_byte(bytes[0])?;
        self.write_byte(bytes[1])?;
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), JpegError> {
        let end = self.position + bytes.len();
        if end > self.destination.len() {
            return Err(JpegError::OutputBufferTooSmall(self.destination.len()));
        }
        self.destination[self.position..end].copy_from_slice(bytes);
        self.position = end;
        Ok(())
    }

    pub fn write_marker(&mut self, marker: JpegMarkerCode) -> Result<(), JpegError> {
        self.write_byte(JPEG_MARKER_START_BYTE)?;
        self.write_byte(marker.code())?;
        Ok(())
    }

    /// Marker followed by the length field; the length counts itself.
    fn write_segment_header(
        &mut self,
        marker: JpegMarkerCode,
        payload_size: usize,
    ) -> Result<(), JpegError> {
        if payload_size > SEGMENT_MAX_DATA_SIZE {
            return Err(JpegError::InvalidMarkerSegmentSize {
                offset: self.position,
                size: payload_size + SEGMENT_LENGTH_SIZE,
            });
        }
        self.write_marker(marker)?;
        self.write_u16((payload_size + SEGMENT_LENGTH_SIZE) as u16)
    }

    pub fn write_start_of_image(&mut self) -> Result<(), JpegError> {
        self.write_marker(JpegMarkerCode::StartOfImage)
    }

    pub fn write_end_of_image(&mut self) -> Result<(), JpegError> {
        self.write_marker(JpegMarkerCode::EndOfImage)
    }

    /// APP0 segment carrying the fixed JFIF tag.
    pub fn write_jfif_tag(&mut self) -> Result<(), JpegError> {
        self.write_segment_header(JpegMarkerCode::ApplicationData0, JFIF_TAG.len())?;
        self.write_bytes(&JFIF_TAG)
    }

    pub fn write_dqt(&mut self, table: &QuantizationTable) -> Result<(), JpegError> {
        self.write_segment_header(JpegMarkerCode::DefineQuantizationTable, 1 + table.table.len())?;
        self.write_byte(table.precision_and_identifier)?;
        self.write_bytes(&table.table)
    }

    pub fn write_dht(&mut self, table: &HuffmanTable) -> Result<(), JpegError> {
        let values = table.values();
        self.write_segment_header(
            JpegMarkerCode::DefineHuffmanTable,
            1 + table.counts.len() + values.len(),
        )?;
        self.write_byte(table.class_and_identifier)?;
        self.write_bytes(&table.counts)?;
        self.write_bytes(values)
    }

    pub fn write_sof0(&mut self, frame: &FrameHeader) -> Result<(), JpegError> {
        self.write_segment_header(
            JpegMarkerCode::StartOfFrameBaseline,
            6 + 3 * frame.component_count(),
        )?;
        self.write_byte(frame.sample_precision)?;
        self.write_u16(frame.height)?;
        self.write_u16(frame.width)?;
        self.write_byte(frame.component_count() as u8)?;
        for component in &frame.components {
            self.write_byte(component.identifier)?;
            self.write_byte(component.sampling_factors)?;
            self.write_byte(component.quantization_table_selector)?;
        }
        Ok(())
    }

    pub fn write_sos(&mut self, scan: &ScanHeader) -> Result<(), JpegError> {
        self.write_segment_header(JpegMarkerCode::StartOfScan, 4 + 2 * scan.component_count())?;
        self.write_byte(scan.component_count() as u8)?;
        for component in &scan.components {
            self.write_byte(component.selector)?;
            self.write_byte(component.huffman_tables)?;
        }
        self.write_byte(scan.spectral_start)?;
        self.write_byte(scan.spectral_end)?;
        self.write_byte(scan.successive_approximation)?;
        Ok(())
    }

    pub fn write_dri(&mut self, restart_interval: u16) -> Result<(), JpegError> {
        self.write_segment_header(JpegMarkerCode::DefineRestartInterval, 2)?;
        self.write_u16(restart_interval)
    }

    /// Copies entropy-coded bytes, already stuffed, verbatim.
    pub fn write_scan_data(&mut self, data: &[u8]) -> Result<(), JpegError> {
        self.write_bytes(data)
    }
}
