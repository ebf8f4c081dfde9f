// Fallback routing: streams the structured decoder does not handle go to the
// image loader, and every engine resource is released on every exit path.

#[cfg(test)]
mod decoder_fallback {
    use bjpeg_rs::engine::{
        BlockGrid, CoefficientBuffer, Interpolation, Plane, ScanComponent, ScanComponentMut,
        SpectralSelection,
    };
    use bjpeg_rs::jpeg1::color::ColorMatrix;
    use bjpeg_rs::jpeg1::huffman::{HuffmanSpec, HuffmanTable, TableClass};
    use bjpeg_rs::jpeg1::quantization::QuantizationTable;
    use bjpeg_rs::{
        Bitmap, CpuEngine, DecoderState, EngineError, ErrorKind, ImageLoader, JpegDecoder,
        JpegEncoder, JpegError, PixelFormat, RestartInterval, TransformEngine, read_header,
    };
    use std::cell::Cell;
    use test_log::test;

    /// Delegates to the software engine and counts acquisitions and releases.
    #[derive(Default)]
    struct CountingEngine {
        inner: CpuEngine,
        acquired: usize,
        released: usize,
        scans_decoded: usize,
    }

    impl TransformEngine for CountingEngine {
        fn allocate_coefficients(
            &mut self,
            grid: BlockGrid,
        ) -> Result<CoefficientBuffer, EngineError> {
            let buffer = self.inner.allocate_coefficients(grid)?;
            self.acquired += 1;
            Ok(buffer)
        }

        fn release_coefficients(&mut self, buffer: CoefficientBuffer) {
            self.released += 1;
            self.inner.release_coefficients(buffer);
        }

        fn init_huffman_spec(
            &mut self,
            table: &HuffmanTable,
            class: TableClass,
        ) -> Result<HuffmanSpec, EngineError> {
            let spec = self.inner.init_huffman_spec(table, class)?;
            self.acquired += 1;
            Ok(spec)
        }

        fn release_huffman_spec(&mut self, spec: HuffmanSpec) {
            self.released += 1;
            self.inner.release_huffman_spec(spec);
        }

        fn forward_dct_quant(
            &mut self,
            source: &Plane,
            destination: &mut CoefficientBuffer,
            table: &QuantizationTable,
        ) -> Result<(), EngineError> {
            self.inner.forward_dct_quant(source, destination, table)
        }

        fn inverse_dct_quant(
            &mut self,
            source: &CoefficientBuffer,
            destination: &mut Plane,
            table: &QuantizationTable,
        ) -> Result<(), EngineError> {
            self.inner.inverse_dct_quant(source, destination, table)
        }

        fn huffman_encode_scan(
            &mut self,
            components: &[ScanComponent<'_>],
            selection: SpectralSelection,
            restart_interval: RestartInterval,
        ) -> Result<Vec<u8>, EngineError> {
            self.inner
                .huffman_encode_scan(components, selection, restart_interval)
        }

        fn huffman_decode_scan(
            &mut self,
            data: &[u8],
            selection: SpectralSelection,
            restart_interval: RestartInterval,
            components: &mut [ScanComponentMut<'_>],
        ) -> Result<(), EngineError> {
            self.scans_decoded += 1;
            self.inner
                .huffman_decode_scan(data, selection, restart_interval, components)
        }

        fn color_twist(&mut self, pixels: &mut [u8], matrix: &ColorMatrix) -> Result<(), EngineError> {
            self.inner.color_twist(pixels, matrix)
        }

        fn resize(
            &mut self,
            source: &Plane,
            destination: &mut Plane,
            interpolation: Interpolation,
        ) -> Result<(), EngineError> {
            self.inner.resize(source, destination, interpolation)
        }
    }

    /// Returns a fixed 2x2 gray bitmap and counts how often it was asked.
    #[derive(Default)]
    struct StubLoader {
        calls: Cell<usize>,
    }

    impl ImageLoader for StubLoader {
        fn load(&self, _data: &[u8]) -> Result<Bitmap, JpegError> {
            self.calls.set(self.calls.get() + 1);
            Bitmap::from_raw(2, 2, PixelFormat::Gray8, vec![7; 4])
        }
    }

    fn color_stream() -> Vec<u8> {
        let data = [30u8, 60, 90].iter().copied().cycle().take(32 * 32 * 3).collect();
        let bitmap = Bitmap::from_raw(32, 32, PixelFormat::Bgr24, data).unwrap();
        let mut encoder = JpegEncoder::new(CpuEngine::new(), 32, 32, 75, 3).unwrap();
        let stream = encoder.save_color_jpeg(&bitmap).unwrap();
        encoder.release();
        stream
    }

    fn marker_offset(stream: &[u8], code: u8) -> usize {
        stream.windows(2).position(|w| w == [0xFF, code]).unwrap()
    }

    #[test]
    fn progressive_frame_goes_to_the_loader() {
        let mut stream = color_stream();
        let sof = marker_offset(&stream, 0xC0);
        stream[sof + 1] = 0xC2;

        let mut decoder = JpegDecoder::with_loader(CpuEngine::new(), StubLoader::default());
        let bitmap = decoder.load_jpeg(&stream).unwrap();
        assert_eq!(decoder.state(), DecoderState::Fallback);
        assert_eq!((bitmap.width, bitmap.height, bitmap.format), (2, 2, PixelFormat::Gray8));
        assert_eq!(decoder.loader().calls.get(), 1);
        assert_eq!(decoder.engine().outstanding_resources(), 0);
    }

    /// DHT with a class 0 table 2 and a DQT with a 16-bit table 0.
    fn progressive_only_tables() -> Vec<u8> {
        let mut tables = vec![0xFF, 0xC4, 0x00, 0x14, 0x02, 0x01];
        tables.extend([0u8; 15]);
        tables.push(0x00);
        tables.extend([0xFF, 0xDB, 0x00, 0x83, 0x10]);
        tables.extend([0x00u8, 0x01].repeat(64));
        tables
    }

    fn with_tables_before_frame(stream: &[u8], tables: &[u8]) -> Vec<u8> {
        let sof = marker_offset(stream, 0xC0);
        let mut patched = stream[..sof].to_vec();
        patched.extend_from_slice(tables);
        patched.extend_from_slice(&stream[sof..]);
        patched
    }

    #[test]
    fn progressive_tables_before_the_frame_still_reach_the_loader() {
        let mut stream = with_tables_before_frame(&color_stream(), &progressive_only_tables());
        let sof = marker_offset(&stream, 0xC0);
        stream[sof + 1] = 0xC2;

        let mut decoder = JpegDecoder::with_loader(CpuEngine::new(), StubLoader::default());
        decoder.load_jpeg(&stream).unwrap();
        assert_eq!(decoder.state(), DecoderState::Fallback);
        assert_eq!(decoder.loader().calls.get(), 1);
        assert_eq!(decoder.engine().outstanding_resources(), 0);

        let info = read_header(&stream).unwrap();
        assert!(!info.is_baseline());
        assert_eq!(info.quantization_tables, vec![0x10, 0x01]);
        assert_eq!(info.huffman_tables, vec![0x00, 0x01, 0x02, 0x10, 0x11]);
    }

    #[test]
    fn baseline_frame_using_a_sixteen_bit_table_is_corrupt() {
        let stream = with_tables_before_frame(&color_stream(), &progressive_only_tables());

        let mut decoder = JpegDecoder::with_loader(CpuEngine::new(), StubLoader::default());
        let error = decoder.load_jpeg(&stream).unwrap_err();
        assert!(matches!(error, JpegError::InvalidQuantizationTable(0x10)));
        assert_eq!(error.kind(), ErrorKind::CorruptStream);
        assert_eq!(decoder.loader().calls.get(), 0);
        assert_eq!(decoder.engine().outstanding_resources(), 0);
    }

    #[test]
    fn extended_frames_go_to_the_loader_too() {
        for code in [0xC1u8, 0xC3, 0xC9] {
            let mut stream = color_stream();
            let sof = marker_offset(&stream, 0xC0);
            stream[sof + 1] = code;

            let mut decoder = JpegDecoder::with_loader(CpuEngine::new(), StubLoader::default());
            decoder.load_jpeg(&stream).unwrap();
            assert_eq!(decoder.state(), DecoderState::Fallback, "SOF 0x{:02X}", code);
        }
    }

    #[test]
    fn grayscale_stream_is_decoded_by_the_generic_loader() {
        let bitmap = Bitmap::from_raw(16, 16, PixelFormat::Gray8, vec![100; 256]).unwrap();
        let mut encoder = JpegEncoder::new(CpuEngine::new(), 16, 16, 90, 1).unwrap();
        let stream = encoder.save_gray_jpeg(&bitmap).unwrap();
        encoder.release();

        let mut decoder = JpegDecoder::new(CpuEngine::new());
        let decoded = decoder.load_jpeg(&stream).unwrap();
        assert_eq!(decoder.state(), DecoderState::Fallback);
        assert_eq!(decoded.format, PixelFormat::Gray8);
        assert_eq!((decoded.width, decoded.height), (16, 16));
        assert!(decoded.data.iter().all(|&v| (v as i32 - 100).abs() <= 3));
    }

    #[test]
    fn loader_failure_is_reported_as_fallback_error() {
        let stream = [
            0xFF, 0xD8, // SOI
            0xFF, 0xC2, 0x00, 0x11, 0x08, 0x00, 0x10, 0x00, 0x10, 0x03, // SOF2
            0x01, 0x22, 0x00, 0x02, 0x11, 0x01, 0x03, 0x11, 0x01, //
            0xFF, 0xD9, // EOI
        ];
        let mut decoder = JpegDecoder::new(CpuEngine::new());
        let error = decoder.load_jpeg(&stream).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Fallback);
        assert_eq!(decoder.state(), DecoderState::Fallback);
    }

    #[test]
    fn loader_is_not_used_for_baseline_color() {
        let stream = color_stream();
        let loader = StubLoader::default();
        let mut decoder = JpegDecoder::with_loader(CpuEngine::new(), loader);
        let bitmap = decoder.load_jpeg(&stream).unwrap();
        assert_eq!(decoder.state(), DecoderState::Done);
        assert_eq!(decoder.loader().calls.get(), 0);
        assert_eq!((bitmap.width, bitmap.height), (32, 32));
    }

    #[test]
    fn truncated_scan_releases_every_buffer() {
        let stream = color_stream();
        let sos = marker_offset(&stream, 0xDA);
        let header_length = u16::from_be_bytes([stream[sos + 2], stream[sos + 3]]) as usize;
        let truncated = &stream[..sos + 2 + header_length + 3];

        let loader = StubLoader::default();
        let mut decoder = JpegDecoder::with_loader(CpuEngine::new(), loader);
        let error = decoder.load_jpeg(truncated).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::CorruptStream);
        assert_eq!(decoder.state(), DecoderState::HaveScanData);
        assert_eq!(decoder.engine().outstanding_resources(), 0);
    }

    #[test]
    fn decoder_is_reusable_after_a_failure() {
        let stream = color_stream();
        let mut decoder = JpegDecoder::new(CpuEngine::new());
        assert!(decoder.load_jpeg(&stream[..stream.len() / 2]).is_err());
        let bitmap = decoder.load_jpeg(&stream).unwrap();
        assert_eq!(decoder.state(), DecoderState::Done);
        assert_eq!(bitmap.width, 32);
        let engine = decoder.release();
        assert_eq!(engine.outstanding_resources(), 0);
    }

    #[test]
    fn every_acquisition_is_released_exactly_once() {
        let stream = color_stream();
        let mut decoder = JpegDecoder::new(CountingEngine::default());
        decoder.load_jpeg(&stream).unwrap();
        let engine = decoder.release();
        // Three coefficient buffers and one DC/AC pair per scan component.
        assert_eq!(engine.acquired, 3 + 6);
        assert_eq!(engine.released, engine.acquired);
        assert_eq!(engine.scans_decoded, 1);
        assert_eq!(engine.inner.outstanding_resources(), 0);
    }

    #[test]
    fn fallback_path_never_touches_the_engine() {
        let mut stream = color_stream();
        let sof = marker_offset(&stream, 0xC0);
        stream[sof + 1] = 0xC2;

        let mut decoder = JpegDecoder::with_loader(CountingEngine::default(), StubLoader::default());
        decoder.load_jpeg(&stream).unwrap();
        let engine = decoder.release();
        assert_eq!((engine.acquired, engine.released, engine.scans_decoded), (0, 0, 0));
    }

    #[test]
    fn failed_scan_releases_through_the_engine() {
        let stream = color_stream();
        let sos = marker_offset(&stream, 0xDA);
        let mut decoder = JpegDecoder::new(CountingEngine::default());
        assert!(decoder.load_jpeg(&stream[..sos + 16]).is_err());
        let engine = decoder.release();
        assert!(engine.acquired > 0);
        assert_eq!(engine.released, engine.acquired);
    }

    #[test]
    fn encoder_session_release_balances_the_engine() {
        let data = vec![50u8; 16 * 16 * 3];
        let bitmap = Bitmap::from_raw(16, 16, PixelFormat::Bgr24, data).unwrap();
        let mut encoder = JpegEncoder::new(CountingEngine::default(), 16, 16, 75, 3).unwrap();
        encoder.save_color_jpeg(&bitmap).unwrap();
        let engine = encoder.release();
        assert_eq!(engine.acquired, 3 + 4);
        assert_eq!(engine.released, engine.acquired);
    }
}
