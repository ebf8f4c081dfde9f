//! JPEG 1 Baseline Decoder implementation.
//!
//! The decoder walks the marker structure, fills tables and headers, hands
//! each scan's entropy-coded bytes to the engine and reassembles the decoded
//! planes into a BGR bitmap. Streams it does not decode structurally
//! (non-baseline frames, component counts other than 3) go through the
//! fallback image loader instead; every engine resource acquired for the
//! call is released before that loader runs.

use std::path::Path;

use crate::bitmap::{Bitmap, GenericImageLoader, ImageLoader, PixelFormat};
use crate::constants::SAMPLE_PRECISION;
use crate::engine::{CoefficientBuffer, Interpolation, Plane, ScanComponentMut, TransformEngine};
use crate::error::JpegError;
use crate::geometry::FrameGeometry;
use crate::jpeg_marker_code::{JpegMarkerCode, has_segment_code, is_start_of_frame_code};
use crate::jpeg_stream_reader::JpegStreamReader;
use crate::jpeg1::color::YCBCR_TO_BGR;
use crate::jpeg1::huffman::{HuffmanSpec, TableClass};
use crate::marker_scanner::find_scan_end;
use crate::{FrameHeader, RestartInterval, ScanHeader};

const COLOR_COMPONENT_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    ExpectSoi,
    ScanningMarkers,
    HaveScanData,
    Reassembling,
    Done,
    /// The stream was handed to the fallback loader.
    Fallback,
}

/// Header summary gathered without touching the engine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamInfo {
    /// Marker code of the frame header (SOF0..SOF15).
    pub frame_marker: Option<u8>,
    pub frame: Option<FrameHeader>,
    pub scan: Option<ScanHeader>,
    pub restart_interval: RestartInterval,
    /// Precision/identifier bytes of the DQT tables seen.
    pub quantization_tables: Vec<u8>,
    /// Class/identifier bytes of the DHT tables seen.
    pub huffman_tables: Vec<u8>,
}

impl StreamInfo {
    pub fn is_baseline(&self) -> bool {
        self.frame_marker == Some(JpegMarkerCode::StartOfFrameBaseline.code())
    }
}

/// Parses the stream up to the first scan header.
pub fn read_header(data: &[u8]) -> Result<StreamInfo, JpegError> {
    let mut reader = JpegStreamReader::new(data);
    reader.read_start_of_image()?;
    let mut info = StreamInfo::default();

    while let Some(code) = reader.next_marker() {
        match JpegMarkerCode::from_code(code) {
            Some(JpegMarkerCode::DefineQuantizationTable) => {
                reader.read_dqt_segment()?;
                info.quantization_tables = reader.quantization_table_selectors();
            }
            Some(JpegMarkerCode::DefineHuffmanTable) => {
                reader.read_dht_segment()?;
                info.huffman_tables = reader.huffman_table_selectors();
            }
            Some(JpegMarkerCode::DefineRestartInterval) => {
                info.restart_interval = reader.read_dri_segment()?;
            }
            Some(JpegMarkerCode::StartOfScan) => {
                info.scan = Some(reader.read_sos_segment()?);
                break;
            }
            Some(JpegMarkerCode::EndOfImage) => break,
            Some(JpegMarkerCode::StartOfImage) => reader.skip_thumbnail(),
            Some(marker) if marker.is_opaque_segment() => reader.skip_segment()?,
            _ if is_start_of_frame_code(code) && info.frame.is_none() => {
                info.frame_marker = Some(code);
                info.frame = Some(reader.read_sof_segment()?);
            }
            _ if has_segment_code(code) => reader.skip_segment()?,
            _ => {}
        }
    }
    Ok(info)
}

/// Engine resources held for the duration of one decode call.
#[derive(Default)]
struct DecodeSession {
    coefficients: Vec<CoefficientBuffer>,
    huffman_specs: Vec<HuffmanSpec>,
}

impl DecodeSession {
    fn release_specs<E: TransformEngine>(&mut self, engine: &mut E) {
        for spec in self.huffman_specs.drain(..) {
            engine.release_huffman_spec(spec);
        }
    }

    fn release<E: TransformEngine>(&mut self, engine: &mut E) {
        self.release_specs(engine);
        for buffer in self.coefficients.drain(..) {
            engine.release_coefficients(buffer);
        }
    }
}

enum Decoded {
    Image(Bitmap),
    Unsupported(JpegError),
}

pub struct JpegDecoder<E: TransformEngine, L: ImageLoader = GenericImageLoader> {
    engine: E,
    loader: L,
    state: DecoderState,
}

impl<E: TransformEngine> JpegDecoder<E, GenericImageLoader> {
    pub fn new(engine: E) -> Self {
        Self::with_loader(engine, GenericImageLoader)
    }
}

impl<E: TransformEngine, L: ImageLoader> JpegDecoder<E, L> {
    pub fn with_loader(engine: E, loader: L) -> Self {
        Self {
            engine,
            loader,
            state: DecoderState::ExpectSoi,
        }
    }

    /// State reached by the last decode call.
    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Tears the decoder down and returns its engine.
    pub fn release(self) -> E {
        self.engine
    }

    pub fn load_jpeg_file(&mut self, path: impl AsRef<Path>) -> Result<Bitmap, JpegError> {
        let data = std::fs::read(path)?;
        self.load_jpeg(&data)
    }

    pub fn load_jpeg(&mut self, data: &[u8]) -> Result<Bitmap, JpegError> {
        let mut session = DecodeSession::default();
        let outcome = self.decode_stream(data, &mut session);
        session.release(&mut self.engine);

        match outcome? {
            Decoded::Image(bitmap) => Ok(bitmap),
            Decoded::Unsupported(reason) => {
                self.transition(DecoderState::Fallback);
                tracing::debug!("falling back to the generic loader: {}", reason);
                self.loader.load(data)
            }
        }
    }

    fn transition(&mut self, state: DecoderState) {
        if self.state != state {
            tracing::debug!("decoder {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    fn decode_stream(
        &mut self,
        data: &[u8],
        session: &mut DecodeSession,
    ) -> Result<Decoded, JpegError> {
        self.state = DecoderState::ExpectSoi;
        let mut reader = JpegStreamReader::new(data);
        reader.read_start_of_image()?;
        self.transition(DecoderState::ScanningMarkers);

        let mut frame: Option<(FrameHeader, FrameGeometry)> = None;
        let mut scans_decoded = 0usize;

        while let Some(code) = reader.next_marker() {
            tracing::trace!("marker 0xFF{:02X} at offset {}", code, reader.position() - 2);
            match JpegMarkerCode::from_code(code) {
                Some(JpegMarkerCode::StartOfFrameBaseline) if frame.is_none() => {
                    tracing::debug!("baseline frame at offset {}", reader.position() - 2);
                    let header = reader.read_sof_segment()?;
                    if header.component_count() != COLOR_COMPONENT_COUNT {
                        return Ok(Decoded::Unsupported(JpegError::UnsupportedComponentCount(
                            header.component_count(),
                        )));
                    }
                    if header.sample_precision != SAMPLE_PRECISION {
                        return Ok(Decoded::Unsupported(JpegError::NonBaselineFrame(code)));
                    }
                    let geometry = FrameGeometry::plan(&header)?;
                    for channel in &geometry.channels {
                        let buffer = self.engine.allocate_coefficients(channel.blocks)?;
                        session.coefficients.push(buffer);
                    }
                    frame = Some((header, geometry));
                }
                Some(JpegMarkerCode::DefineQuantizationTable) => reader.read_dqt_segment()?,
                Some(JpegMarkerCode::DefineHuffmanTable) => reader.read_dht_segment()?,
                Some(JpegMarkerCode::DefineRestartInterval) => {
                    reader.read_dri_segment()?;
                }
                Some(JpegMarkerCode::StartOfScan) => {
                    let scan = reader.read_sos_segment()?;
                    let Some((header, geometry)) = frame.as_ref() else {
                        return Err(JpegError::ScanBeforeFrameHeader);
                    };
                    self.transition(DecoderState::HaveScanData);
                    self.decode_scan(&mut reader, header, geometry, &scan, session)?;
                    scans_decoded += 1;
                    self.transition(DecoderState::ScanningMarkers);
                }
                Some(JpegMarkerCode::EndOfImage) => break,
                Some(JpegMarkerCode::StartOfImage) => {
                    tracing::debug!("skipping embedded image at offset {}", reader.position() - 2);
                    reader.skip_thumbnail();
                }
                Some(marker) if marker.is_opaque_segment() => reader.skip_segment()?,
                _ if is_start_of_frame_code(code) && frame.is_none() => {
                    return Ok(Decoded::Unsupported(JpegError::NonBaselineFrame(code)));
                }
                _ if has_segment_code(code) => {
                    tracing::warn!("skipping segment 0xFF{:02X}", code);
                    reader.skip_segment()?;
                }
                _ => tracing::warn!("ignoring stray marker 0xFF{:02X}", code),
            }
        }

        let Some((header, geometry)) = frame else {
            return Err(JpegError::MissingFrameHeader);
        };
        if scans_decoded == 0 {
            return Err(JpegError::MissingScanData);
        }

        self.transition(DecoderState::Reassembling);
        let bitmap = self.reassemble(&reader, &header, &geometry, session)?;
        self.transition(DecoderState::Done);
        Ok(Decoded::Image(bitmap))
    }

    fn decode_scan(
        &mut self,
        reader: &mut JpegStreamReader<'_>,
        header: &FrameHeader,
        geometry: &FrameGeometry,
        scan: &ScanHeader,
        session: &mut DecodeSession,
    ) -> Result<(), JpegError> {
        let restart_interval = reader.restart_interval();
        let start = reader.position();
        let extent = find_scan_end(reader.source(), start, restart_interval.is_some());
        let entropy_coded = &reader.source()[start..extent.data_end];
        tracing::debug!(
            "scan of {} component(s), {} entropy-coded bytes",
            scan.component_count(),
            entropy_coded.len()
        );

        // Specs of one scan: DC then AC for each scan component.
        let mut indices = Vec::with_capacity(scan.component_count());
        for selector in &scan.components {
            let index = header
                .component_index(selector.selector)
                .ok_or(JpegError::UnknownComponentSelector(selector.selector))?;
            for (class, identifier, table_class) in [
                (0u8, selector.dc_table(), TableClass::Dc),
                (1u8, selector.ac_table(), TableClass::Ac),
            ] {
                let table = reader
                    .huffman_table(class, identifier)
                    .ok_or(JpegError::MissingHuffmanTable { class, identifier })?;
                let spec = self.engine.init_huffman_spec(table, table_class)?;
                session.huffman_specs.push(spec);
            }
            indices.push(index);
        }

        {
            let DecodeSession {
                coefficients,
                huffman_specs,
            } = &mut *session;
            let mut slots: Vec<Option<&mut CoefficientBuffer>> =
                coefficients.iter_mut().map(Some).collect();
            let mut components = Vec::with_capacity(indices.len());
            for (n, &index) in indices.iter().enumerate() {
                let coefficients = slots[index]
                    .take()
                    .ok_or(JpegError::DuplicateComponentSelector(scan.components[n].selector))?;
                let channel = &geometry.channels[index];
                components.push(ScanComponentMut {
                    coefficients,
                    horizontal_sampling: channel.horizontal_sampling,
                    vertical_sampling: channel.vertical_sampling,
                    coded_blocks: channel.coded_blocks,
                    dc: &huffman_specs[2 * n],
                    ac: &huffman_specs[2 * n + 1],
                });
            }
            self.engine.huffman_decode_scan(
                entropy_coded,
                scan.spectral_selection(),
                restart_interval,
                &mut components,
            )?;
        }

        session.release_specs(&mut self.engine);
        reader.set_position(extent.marker_position);
        Ok(())
    }

    fn reassemble(
        &mut self,
        reader: &JpegStreamReader<'_>,
        header: &FrameHeader,
        geometry: &FrameGeometry,
        session: &DecodeSession,
    ) -> Result<Bitmap, JpegError> {
        let mut planes = Vec::with_capacity(geometry.channels.len());
        for (index, channel) in geometry.channels.iter().enumerate() {
            let mut plane = Plane::new(channel.padded_width(), channel.padded_height());
            let selector = header.components[index].quantization_table_selector;
            self.engine.inverse_dct_quant(
                &session.coefficients[index],
                &mut plane,
                reader.quantization_table(selector)?,
            )?;
            planes.push(plane);
        }

        // Channels are brought to the full-resolution size, which is the
        // luma plane for every common layout.
        let full_width = planes.iter().map(|p| p.width).max().unwrap_or_default();
        let full_height = planes.iter().map(|p| p.height).max().unwrap_or_default();
        for plane in planes.iter_mut() {
            if plane.width != full_width || plane.height != full_height {
                let mut resampled = Plane::new(full_width, full_height);
                let ratio = full_width as f64 / plane.width as f64;
                self.engine
                    .resize(plane, &mut resampled, Interpolation::for_ratio(ratio))?;
                *plane = resampled;
            }
        }

        let (width, height) = (geometry.width, geometry.height);
        let mut bitmap = Bitmap::new(width, height, PixelFormat::Bgr24);
        for y in 0..height {
            for x in 0..width {
                let source = y * full_width + x;
                let target = (y * width + x) * 3;
                for (c, plane) in planes.iter().enumerate() {
                    bitmap.data[target + c] = plane.data[source];
                }
            }
        }
        self.engine.color_twist(&mut bitmap.data, &YCBCR_TO_BGR)?;
        Ok(bitmap)
    }
}
