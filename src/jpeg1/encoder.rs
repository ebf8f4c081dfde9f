//! JPEG 1 Baseline Encoder orchestration.
//!
//! A `JpegEncoder` session fixes sampling factors, tables and coefficient
//! buffers at construction, then turns host bitmaps into complete baseline
//! streams: color transform, chroma downsampling, forward DCT and entropy
//! coding on the engine, and finally serialization of every segment.

use std::path::Path;

use crate::bitmap::{Bitmap, PixelFormat};
use crate::constants::{
    ENCODER_DIMENSION_ALIGNMENT, MAXIMUM_DIMENSION, MAXIMUM_STREAM_SIZE, SAMPLING_420,
    SAMPLING_FULL,
};
use crate::engine::{CoefficientBuffer, Interpolation, Plane, ScanComponent, TransformEngine};
use crate::error::JpegError;
use crate::geometry::FrameGeometry;
use crate::jpeg_stream_writer::JpegStreamWriter;
use crate::jpeg1::color::BGR_TO_YCBCR;
use crate::jpeg1::huffman::{HuffmanKind, HuffmanSpec, HuffmanTable, TableClass};
use crate::jpeg1::quantization::{QuantizationKind, QuantizationTable};
use crate::{FrameHeader, RestartInterval, ScanHeader};

// Room for SOI, JFIF, two DQT, SOF0, four standard DHT, DRI, SOS and EOI.
const HEADER_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    Init,
    Ready,
    Encoding,
    Written,
}

pub struct JpegEncoder<E: TransformEngine> {
    engine: E,
    channels: u8,
    quality: i32,
    state: EncoderState,
    frame: FrameHeader,
    scan: ScanHeader,
    geometry: FrameGeometry,
    quantization_tables: [QuantizationTable; 2],
    /// Indexed by `class * 2 + identifier`.
    huffman_tables: [HuffmanTable; 4],
    huffman_specs: Vec<HuffmanSpec>,
    coefficients: Vec<CoefficientBuffer>,
    restart_interval: RestartInterval,
}

fn release_all<E: TransformEngine>(
    engine: &mut E,
    coefficients: &mut Vec<CoefficientBuffer>,
    specs: &mut Vec<HuffmanSpec>,
) {
    for buffer in coefficients.drain(..) {
        engine.release_coefficients(buffer);
    }
    for spec in specs.drain(..) {
        engine.release_huffman_spec(spec);
    }
}

fn allocate_buffers<E: TransformEngine>(
    engine: &mut E,
    geometry: &FrameGeometry,
) -> Result<Vec<CoefficientBuffer>, JpegError> {
    let mut buffers = Vec::with_capacity(geometry.channels.len());
    for channel in &geometry.channels {
        match engine.allocate_coefficients(channel.blocks) {
            Ok(buffer) => buffers.push(buffer),
            Err(error) => {
                release_all(engine, &mut buffers, &mut Vec::new());
                return Err(error.into());
            }
        }
    }
    Ok(buffers)
}

impl<E: TransformEngine> JpegEncoder<E> {
    /// Opens an encoder session for `channels` (1 or 3) at the given size.
    pub fn new(
        mut engine: E,
        width: usize,
        height: usize,
        quality: i32,
        channels: u8,
    ) -> Result<Self, JpegError> {
        let sampling: &[u8] = match channels {
            3 => &SAMPLING_420,
            1 => &[SAMPLING_FULL],
            _ => return Err(JpegError::InvalidChannelCount(channels)),
        };
        if width == 0 || height == 0 || width > MAXIMUM_DIMENSION || height > MAXIMUM_DIMENSION {
            return Err(JpegError::InvalidDimensions { width, height });
        }

        let frame = FrameHeader::with_sampling(width as u16, height as u16, sampling);
        let scan = ScanHeader::for_frame(&frame);
        let geometry = FrameGeometry::plan(&frame)?;
        let quantization_tables = [
            QuantizationTable::standard(QuantizationKind::Luminance, quality),
            QuantizationTable::standard(QuantizationKind::Chroma, quality),
        ];
        let huffman_tables = HuffmanKind::ALL.map(HuffmanTable::standard);

        let mut coefficients = allocate_buffers(&mut engine, &geometry)?;
        let mut huffman_specs = Vec::with_capacity(huffman_tables.len());
        for table in &huffman_tables {
            let class = if table.class() == 0 {
                TableClass::Dc
            } else {
                TableClass::Ac
            };
            match engine.init_huffman_spec(table, class) {
                Ok(spec) => huffman_specs.push(spec),
                Err(error) => {
                    release_all(&mut engine, &mut coefficients, &mut huffman_specs);
                    return Err(error.into());
                }
            }
        }

        tracing::debug!(
            "encoder session {}x{}, {} channel(s), quality {}",
            width,
            height,
            channels,
            quality
        );

        Ok(Self {
            engine,
            channels,
            quality,
            state: EncoderState::Ready,
            frame,
            scan,
            geometry,
            quantization_tables,
            huffman_tables,
            huffman_specs,
            coefficients,
            restart_interval: None,
        })
    }

    pub fn state(&self) -> EncoderState {
        self.state
    }

    pub fn quality(&self) -> i32 {
        self.quality
    }

    pub fn frame_header(&self) -> &FrameHeader {
        &self.frame
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Emits a DRI segment and RSTn markers every `interval` MCUs; `None` or
    /// zero disables restart markers.
    pub fn set_restart_interval(&mut self, interval: RestartInterval) {
        self.restart_interval = interval.filter(|&n| n > 0);
    }

    pub fn save_color_jpeg(&mut self, bitmap: &Bitmap) -> Result<Vec<u8>, JpegError> {
        self.check_input(bitmap, 3, PixelFormat::Bgr24)?;
        self.encode(bitmap)
    }

    pub fn save_gray_jpeg(&mut self, bitmap: &Bitmap) -> Result<Vec<u8>, JpegError> {
        self.check_input(bitmap, 1, PixelFormat::Gray8)?;
        self.encode(bitmap)
    }

    pub fn save_color_jpeg_to_file(
        &mut self,
        path: impl AsRef<Path>,
        bitmap: &Bitmap,
    ) -> Result<(), JpegError> {
        let stream = self.save_color_jpeg(bitmap)?;
        std::fs::write(path, stream)?;
        Ok(())
    }

    pub fn save_gray_jpeg_to_file(
        &mut self,
        path: impl AsRef<Path>,
        bitmap: &Bitmap,
    ) -> Result<(), JpegError> {
        let stream = self.save_gray_jpeg(bitmap)?;
        std::fs::write(path, stream)?;
        Ok(())
    }

    /// Tears the session down, releasing every engine resource it holds.
    pub fn release(self) -> E {
        let Self {
            mut engine,
            mut coefficients,
            mut huffman_specs,
            ..
        } = self;
        release_all(&mut engine, &mut coefficients, &mut huffman_specs);
        tracing::debug!("encoder session released");
        engine
    }

    fn check_input(&self, bitmap: &Bitmap, channels: u8, format: PixelFormat) -> Result<(), JpegError> {
        if self.channels != channels {
            return Err(JpegError::ChannelModeMismatch {
                expected: channels,
                actual: self.channels,
            });
        }
        if bitmap.format != format {
            return Err(JpegError::PixelFormatMismatch {
                expected: format,
                actual: bitmap.format,
            });
        }
        if bitmap.width == 0
            || bitmap.height == 0
            || bitmap.width % ENCODER_DIMENSION_ALIGNMENT != 0
            || bitmap.height % ENCODER_DIMENSION_ALIGNMENT != 0
        {
            return Err(JpegError::DimensionsNotMultipleOf16 {
                width: bitmap.width,
                height: bitmap.height,
            });
        }
        if bitmap.width > MAXIMUM_DIMENSION || bitmap.height > MAXIMUM_DIMENSION {
            return Err(JpegError::InvalidDimensions {
                width: bitmap.width,
                height: bitmap.height,
            });
        }
        let expected = bitmap.width * bitmap.height * format.bytes_per_pixel();
        if bitmap.data.len() != expected {
            return Err(JpegError::PixelBufferSize {
                expected,
                actual: bitmap.data.len(),
            });
        }
        Ok(())
    }

    fn encode(&mut self, bitmap: &Bitmap) -> Result<Vec<u8>, JpegError> {
        self.state = EncoderState::Encoding;
        let result = self.encode_bitmap(bitmap);
        self.state = if result.is_ok() {
            EncoderState::Written
        } else {
            EncoderState::Ready
        };
        result
    }

    /// Adopts the processed image size, reallocating buffers when the block
    /// grids change.
    fn adopt_dimensions(&mut self, width: usize, height: usize) -> Result<(), JpegError> {
        self.frame.width = width as u16;
        self.frame.height = height as u16;
        self.geometry = FrameGeometry::plan(&self.frame)?;

        let grids = self.geometry.block_grids();
        let current: Vec<_> = self.coefficients.iter().map(|b| b.grid()).collect();
        if current != grids {
            tracing::debug!("reallocating coefficient buffers for {}x{}", width, height);
            release_all(&mut self.engine, &mut self.coefficients, &mut Vec::new());
            self.coefficients = allocate_buffers(&mut self.engine, &self.geometry)?;
        }
        Ok(())
    }

    fn split_planes(&mut self, bitmap: &Bitmap) -> Result<Vec<Plane>, JpegError> {
        let (width, height) = (bitmap.width, bitmap.height);
        if bitmap.format == PixelFormat::Gray8 {
            return Ok(vec![Plane {
                width,
                height,
                data: bitmap.data.clone(),
            }]);
        }

        let mut pixels = bitmap.data.clone();
        self.engine.color_twist(&mut pixels, &BGR_TO_YCBCR)?;
        let mut planes = vec![Plane::new(width, height); 3];
        for (i, pixel) in pixels.chunks_exact(3).enumerate() {
            for (plane, &value) in planes.iter_mut().zip(pixel) {
                plane.data[i] = value;
            }
        }
        Ok(planes)
    }

    fn encode_bitmap(&mut self, bitmap: &Bitmap) -> Result<Vec<u8>, JpegError> {
        self.adopt_dimensions(bitmap.width, bitmap.height)?;

        for (index, plane) in self.split_planes(bitmap)?.into_iter().enumerate() {
            let channel = self.geometry.channels[index];
            let (target_width, target_height) = (channel.padded_width(), channel.padded_height());
            let plane = if plane.width == target_width && plane.height == target_height {
                plane
            } else {
                let mut resized = Plane::new(target_width, target_height);
                let ratio = target_width as f64 / plane.width as f64;
                self.engine
                    .resize(&plane, &mut resized, Interpolation::for_ratio(ratio))?;
                resized
            };
            let selector = self.frame.components[index].quantization_table_selector as usize;
            self.engine.forward_dct_quant(
                &plane,
                &mut self.coefficients[index],
                &self.quantization_tables[selector],
            )?;
        }

        let mut components = Vec::with_capacity(self.scan.component_count());
        for (index, selector) in self.scan.components.iter().enumerate() {
            let channel = &self.geometry.channels[index];
            components.push(ScanComponent {
                coefficients: &self.coefficients[index],
                horizontal_sampling: channel.horizontal_sampling,
                vertical_sampling: channel.vertical_sampling,
                coded_blocks: channel.coded_blocks,
                dc: &self.huffman_specs[selector.dc_table() as usize],
                ac: &self.huffman_specs[2 + selector.ac_table() as usize],
            });
        }
        let scan_data = self.engine.huffman_encode_scan(
            &components,
            self.scan.spectral_selection(),
            self.restart_interval,
        )?;

        let capacity = HEADER_CAPACITY + scan_data.len();
        if capacity > MAXIMUM_STREAM_SIZE {
            return Err(JpegError::OutputBufferTooSmall(MAXIMUM_STREAM_SIZE));
        }
        let mut stream = vec![0u8; capacity];
        let mut writer = JpegStreamWriter::new(&mut stream);
        writer.write_start_of_image()?;
        writer.write_jfif_tag()?;
        for table in &self.quantization_tables {
            writer.write_dqt(table)?;
        }
        writer.write_sof0(&self.frame)?;
        for table in &self.huffman_tables {
            writer.write_dht(table)?;
        }
        if let Some(interval) = self.restart_interval {
            writer.write_dri(interval)?;
        }
        writer.write_sos(&self.scan)?;
        writer.write_scan_data(&scan_data)?;
        writer.write_end_of_image()?;
        let length = writer.len();
        stream.truncate(length);

        tracing::debug!(
            "encoded {}x{} into {} bytes ({} entropy-coded)",
            bitmap.width,
            bitmap.height,
            length,
            scan_data.len()
        );
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CpuEngine;
    use crate::error::ErrorKind;
    use crate::marker_scanner::next_marker;
    use test_log::test;

    fn solid_bgr(width: usize, height: usize, bgr: [u8; 3]) -> Bitmap {
        let data = bgr.iter().copied().cycle().take(width * height * 3).collect();
        Bitmap::from_raw(width, height, PixelFormat::Bgr24, data).unwrap()
    }

    fn markers(stream: &[u8]) -> Vec<u8> {
        let mut position = 0;
        let mut found = Vec::new();
        while let Some(code) = next_marker(stream, &mut position) {
            found.push(code);
            // Stop at SOS: the scanner would otherwise walk the entropy data.
            if code == 0xDA {
                break;
            }
            if code == 0xD8 {
                continue;
            }
            let length = u16::from_be_bytes([stream[position], stream[position + 1]]) as usize;
            position += length;
        }
        found
    }

    #[test]
    fn color_stream_has_segments_in_order() {
        let mut encoder = JpegEncoder::new(CpuEngine::new(), 16, 16, 75, 3).unwrap();
        assert_eq!(encoder.state(), EncoderState::Ready);
        let stream = encoder.save_color_jpeg(&solid_bgr(16, 16, [40, 80, 160])).unwrap();
        assert_eq!(encoder.state(), EncoderState::Written);

        assert_eq!(
            markers(&stream),
            vec![0xD8, 0xE0, 0xDB, 0xDB, 0xC0, 0xC4, 0xC4, 0xC4, 0xC4, 0xDA]
        );
        assert_eq!(&stream[stream.len() - 2..], &[0xFF, 0xD9]);

        let engine = encoder.release();
        assert_eq!(engine.outstanding_resources(), 0);
    }

    #[test]
    fn restart_interval_adds_dri() {
        let mut encoder = JpegEncoder::new(CpuEngine::new(), 32, 32, 50, 3).unwrap();
        encoder.set_restart_interval(Some(1));
        let stream = encoder.save_color_jpeg(&solid_bgr(32, 32, [0, 0, 255])).unwrap();
        let found = markers(&stream);
        assert!(found.contains(&0xDD));
        let restarts = stream
            .windows(2)
            .filter(|w| w[0] == 0xFF && (0xD0..=0xD7).contains(&w[1]))
            .count();
        assert_eq!(restarts, 3);
        encoder.release();
    }

    #[test]
    fn preconditions_fail_before_engine_work() {
        let mut encoder = JpegEncoder::new(CpuEngine::new(), 16, 16, 75, 3).unwrap();

        let error = encoder.save_color_jpeg(&solid_bgr(24, 16, [1, 2, 3])).unwrap_err();
        assert!(matches!(error, JpegError::DimensionsNotMultipleOf16 { width: 24, height: 16 }));
        assert_eq!(error.kind(), ErrorKind::Precondition);

        let gray = Bitmap::new(16, 16, PixelFormat::Gray8);
        let error = encoder.save_color_jpeg(&gray).unwrap_err();
        assert!(matches!(error, JpegError::PixelFormatMismatch { .. }));

        let error = encoder.save_gray_jpeg(&gray).unwrap_err();
        assert!(matches!(
            error,
            JpegError::ChannelModeMismatch {
                expected: 1,
                actual: 3
            }
        ));
        assert_eq!(encoder.state(), EncoderState::Ready);
        encoder.release();
    }

    #[test]
    fn invalid_channel_count_is_rejected() {
        assert!(matches!(
            JpegEncoder::new(CpuEngine::new(), 16, 16, 75, 2),
            Err(JpegError::InvalidChannelCount(2))
        ));
    }

    #[test]
    fn processed_size_replaces_declared_size() {
        let mut encoder = JpegEncoder::new(CpuEngine::new(), 16, 16, 75, 3).unwrap();
        let stream = encoder.save_color_jpeg(&solid_bgr(48, 32, [9, 9, 9])).unwrap();
        assert_eq!(encoder.frame_header().width, 48);
        assert_eq!(encoder.frame_header().height, 32);

        let mut reader = crate::jpeg_stream_reader::JpegStreamReader::new(&stream);
        reader.read_start_of_image().unwrap();
        while let Some(code) = reader.next_marker() {
            if code == 0xC0 {
                let frame = reader.read_sof_segment().unwrap();
                assert_eq!((frame.width, frame.height), (48, 32));
                break;
            }
            reader.skip_segment().unwrap();
        }
        assert_eq!(encoder.engine().outstanding_resources(), 3 + 4);
        let engine = encoder.release();
        assert_eq!(engine.outstanding_resources(), 0);
    }

    #[test]
    fn gray_stream_has_one_component() {
        let mut encoder = JpegEncoder::new(CpuEngine::new(), 16, 32, 90, 1).unwrap();
        let bitmap = Bitmap::from_raw(16, 32, PixelFormat::Gray8, (0..512).map(|i| (i % 256) as u8).collect()).unwrap();
        let stream = encoder.save_gray_jpeg(&bitmap).unwrap();
        assert_eq!(encoder.frame_header().component_count(), 1);
        assert_eq!(encoder.frame_header().components[0].sampling_factors, 0x11);
        assert!(stream.len() > 600);
        encoder.release();
    }
}
