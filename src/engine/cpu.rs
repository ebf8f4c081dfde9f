//! Software implementation of the transform engine.

use super::{
    BlockGrid, CoefficientBuffer, Interpolation, Plane, ScanComponent, ScanComponentMut,
    SpectralSelection, TransformEngine,
};
use crate::RestartInterval;
use crate::constants::{BLOCK_DIM, BLOCK_SIZE, JPEG_RESTART_MARKER_RANGE};
use crate::error::EngineError;
use crate::jpeg_marker_code::{JpegMarkerCode, is_restart_code};
use crate::jpeg1::color::{ColorMatrix, twist_pixel};
use crate::jpeg1::dct::{fdct_8x8, idct_8x8};
use crate::jpeg1::huffman::{
    HuffmanSpec, HuffmanTable, JpegBitReader, JpegBitWriter, TableClass, category, diff_bits,
    extend,
};
use crate::jpeg1::quantization::{QuantizationTable, dequantize_block, quantize_block};

const END_OF_BLOCK: u8 = 0x00;
const ZERO_RUN_LENGTH: u8 = 0xF0;

// Largest magnitude categories representable with baseline Huffman tables.
const MAXIMUM_DC_CATEGORY: u8 = 11;
const MAXIMUM_AC_CATEGORY: u8 = 10;
const MAXIMUM_AC_VALUE: i16 = 1023;

const LANCZOS_LOBES: f64 = 3.0;

/// Reference engine running every block operation on the CPU.
///
/// Keeps a count of outstanding coefficient buffers and Huffman specs so that
/// callers can verify sessions release everything they acquire.
#[derive(Debug, Default)]
pub struct CpuEngine {
    live_buffers: usize,
    live_specs: usize,
}

impl CpuEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coefficient buffers and Huffman specs handed out and not yet released.
    pub fn outstanding_resources(&self) -> usize {
        self.live_buffers + self.live_specs
    }
}

fn check_baseline(selection: SpectralSelection) -> Result<(), EngineError> {
    if selection.is_baseline() {
        Ok(())
    } else {
        Err(EngineError::UnsupportedSpectralSelection {
            start: selection.start,
            end: selection.end,
            approximation: selection.approximation,
        })
    }
}

fn check_divisors(table: &QuantizationTable) -> Result<(), EngineError> {
    if table.table.contains(&0) {
        return Err(EngineError::InvalidQuantizationTable);
    }
    Ok(())
}

fn check_plane(plane: &Plane, grid: BlockGrid) -> Result<(), EngineError> {
    if plane.width == 0 || plane.height == 0 {
        return Err(EngineError::GridMismatch {
            plane_width: plane.width,
            plane_height: plane.height,
            blocks_wide: grid.blocks_wide,
            blocks_high: grid.blocks_high,
        });
    }
    if plane.data.len() != plane.width * plane.height {
        return Err(EngineError::InvalidPixelBuffer(plane.data.len()));
    }
    Ok(())
}

/// Iteration order of one scan: how many MCUs there are and which block of
/// each component belongs to which MCU.
struct ScanLayout {
    mcus_wide: usize,
    mcus_high: usize,
    interleaved: bool,
}

impl ScanLayout {
    fn new(grids: &[(BlockGrid, usize, usize, BlockGrid)]) -> Result<Self, EngineError> {
        let Some(&(first_grid, first_h, first_v, first_coded)) = grids.first() else {
            return Err(EngineError::EmptyScan);
        };

        if grids.len() == 1 {
            if first_coded.blocks_wide > first_grid.blocks_wide
                || first_coded.blocks_high > first_grid.blocks_high
            {
                return Err(EngineError::ScanLayout {
                    component: 0,
                    needed_wide: first_coded.blocks_wide,
                    needed_high: first_coded.blocks_high,
                });
            }
            return Ok(Self {
                mcus_wide: first_coded.blocks_wide,
                mcus_high: first_coded.blocks_high,
                interleaved: false,
            });
        }

        let mcus_wide = first_grid.blocks_wide / first_h.max(1);
        let mcus_high = first_grid.blocks_high / first_v.max(1);
        for (component, &(grid, h, v, _)) in grids.iter().enumerate() {
            let needed_wide = mcus_wide * h;
            let needed_high = mcus_high * v;
            if h == 0 || v == 0 || needed_wide > grid.blocks_wide || needed_high > grid.blocks_high {
                return Err(EngineError::ScanLayout {
                    component,
                    needed_wide,
                    needed_high,
                });
            }
        }
        Ok(Self {
            mcus_wide,
            mcus_high,
            interleaved: true,
        })
    }

    fn mcu_count(&self) -> usize {
        self.mcus_wide * self.mcus_high
    }

    /// Block coordinates of every block of `(h, v)` inside MCU `(mx, my)`.
    fn blocks(&self, mx: usize, my: usize, h: usize, v: usize) -> impl Iterator<Item = (usize, usize)> {
        let (h, v) = if self.interleaved { (h, v) } else { (1, 1) };
        (0..v).flat_map(move |by| (0..h).map(move |bx| (mx * h + bx, my * v + by)))
    }
}

fn restart_due(interval: RestartInterval, mcu: usize, mcu_count: usize) -> bool {
    match interval {
        Some(n) if n > 0 => mcu > 0 && mcu < mcu_count && mcu % n as usize == 0,
        _ => false,
    }
}

fn encode_block(
    writer: &mut JpegBitWriter<'_>,
    block: &[i16],
    predictor: &mut i16,
    dc: &HuffmanSpec,
    ac: &HuffmanSpec,
) -> Result<(), EngineError> {
    let diff = block[0].wrapping_sub(*predictor);
    *predictor = block[0];
    let size = category(diff);
    if size > MAXIMUM_DC_CATEGORY {
        return Err(EngineError::CoefficientOverflow);
    }
    writer.write_code(dc.code_for(size)?);
    writer.write_bits(diff_bits(diff, size), size);

    let mut run = 0u8;
    for &value in &block[1..BLOCK_DIM] {
        if value == 0 {
            run += 1;
            continue;
        }
        while run > 15 {
            writer.write_code(ac.code_for(ZERO_RUN_LENGTH)?);
            run -= 16;
        }
        let size = category(value);
        if size > MAXIMUM_AC_CATEGORY {
            return Err(EngineError::CoefficientOverflow);
        }
        writer.write_code(ac.code_for((run << 4) | size)?);
        writer.write_bits(diff_bits(value, size), size);
        run = 0;
    }
    if run > 0 {
        writer.write_code(ac.code_for(END_OF_BLOCK)?);
    }
    Ok(())
}

fn decode_block(
    reader: &mut JpegBitReader<'_>,
    block: &mut [i16],
    predictor: &mut i16,
    dc: &HuffmanSpec,
    ac: &HuffmanSpec,
) -> Result<(), EngineError> {
    block.fill(0);

    let size = dc.decode(reader)?;
    if size > MAXIMUM_DC_CATEGORY {
        return Err(EngineError::InvalidHuffmanCode);
    }
    let diff = extend(reader.read_bits(size)?, size);
    *predictor = predictor.wrapping_add(diff);
    block[0] = *predictor;

    let mut k = 1usize;
    while k < BLOCK_DIM {
        let symbol = ac.decode(reader)?;
        let run = (symbol >> 4) as usize;
        let size = symbol & 0x0F;
        if size == 0 {
            if symbol == ZERO_RUN_LENGTH {
                k += 16;
                continue;
            }
            break;
        }
        k += run;
        if k >= BLOCK_DIM {
            return Err(EngineError::CoefficientOverflow);
        }
        block[k] = extend(reader.read_bits(size)?, size);
        k += 1;
    }
    Ok(())
}

/// Source taps and normalized weights of one output sample.
struct Contribution {
    taps: Vec<(usize, f32)>,
}

fn lanczos3(x: f64) -> f64 {
    fn sinc(x: f64) -> f64 {
        if x.abs() < 1e-8 {
            1.0
        } else {
            let a = std::f64::consts::PI * x;
            a.sin() / a
        }
    }
    if x.abs() < LANCZOS_LOBES {
        sinc(x) * sinc(x / LANCZOS_LOBES)
    } else {
        0.0
    }
}

fn contributions(source_len: usize, target_len: usize, interpolation: Interpolation) -> Vec<Contribution> {
    let ratio = target_len as f64 / source_len as f64;
    let last = source_len - 1;
    (0..target_len)
        .map(|d| {
            let mut taps: Vec<(usize, f32)> = Vec::new();
            match interpolation {
                Interpolation::Supersample => {
                    let start = d as f64 / ratio;
                    let end = (d + 1) as f64 / ratio;
                    let first = start.floor() as usize;
                    let stop = (end.ceil() as usize).min(source_len);
                    for s in first..stop.max(first + 1) {
                        let covered = end.min((s + 1) as f64) - start.max(s as f64);
                        if covered > 0.0 {
                            taps.push((s.min(last), covered as f32));
                        }
                    }
                }
                Interpolation::Lanczos => {
                    let filter_scale = (1.0 / ratio).max(1.0);
                    let support = LANCZOS_LOBES * filter_scale;
                    let center = (d as f64 + 0.5) / ratio - 0.5;
                    let first = (center - support).floor() as i64;
                    let stop = (center + support).ceil() as i64;
                    for s in first..=stop {
                        let weight = lanczos3((s as f64 - center) / filter_scale);
                        if weight != 0.0 {
                            taps.push((s.clamp(0, last as i64) as usize, weight as f32));
                        }
                    }
                }
            }
            let total: f32 = taps.iter().map(|&(_, w)| w).sum();
            if total != 0.0 {
                for tap in &mut taps {
                    tap.1 /= total;
                }
            } else {
                taps = vec![((d * source_len / target_len).min(last), 1.0)];
            }
            Contribution { taps }
        })
        .collect()
}

impl TransformEngine for CpuEngine {
    fn allocate_coefficients(&mut self, grid: BlockGrid) -> Result<CoefficientBuffer, EngineError> {
        let blocks = grid.block_count();
        if blocks == 0 || blocks.checked_mul(BLOCK_DIM).is_none() {
            return Err(EngineError::AllocationFailed(blocks));
        }
        self.live_buffers += 1;
        tracing::trace!(
            "allocated {}x{} coefficient blocks",
            grid.blocks_wide,
            grid.blocks_high
        );
        Ok(CoefficientBuffer::new(grid))
    }

    fn release_coefficients(&mut self, buffer: CoefficientBuffer) {
        self.live_buffers = self.live_buffers.saturating_sub(1);
        drop(buffer);
    }

    fn init_huffman_spec(
        &mut self,
        table: &HuffmanTable,
        class: TableClass,
    ) -> Result<HuffmanSpec, EngineError> {
        let spec = HuffmanSpec::build(table, class)?;
        self.live_specs += 1;
        Ok(spec)
    }

    fn release_huffman_spec(&mut self, spec: HuffmanSpec) {
        self.live_specs = self.live_specs.saturating_sub(1);
        drop(spec);
    }

    fn forward_dct_quant(
        &mut self,
        source: &Plane,
        destination: &mut CoefficientBuffer,
        table: &QuantizationTable,
    ) -> Result<(), EngineError> {
        let grid = destination.grid();
        check_plane(source, grid)?;
        check_divisors(table)?;

        let mut samples = [0.0f32; BLOCK_DIM];
        let mut frequencies = [0.0f32; BLOCK_DIM];
        for block_y in 0..grid.blocks_high {
            for block_x in 0..grid.blocks_wide {
                for y in 0..BLOCK_SIZE {
                    // Edge samples are replicated into blocks past the plane.
                    let sy = (block_y * BLOCK_SIZE + y).min(source.height - 1);
                    for x in 0..BLOCK_SIZE {
                        let sx = (block_x * BLOCK_SIZE + x).min(source.width - 1);
                        samples[y * BLOCK_SIZE + x] = source.sample(sx, sy) as f32 - 128.0;
                    }
                }
                fdct_8x8(&samples, &mut frequencies);
                let block = destination.block_mut(block_x, block_y);
                quantize_block(&frequencies, &table.table, block);
                for value in &mut block[1..] {
                    *value = (*value).clamp(-MAXIMUM_AC_VALUE, MAXIMUM_AC_VALUE);
                }
            }
        }
        Ok(())
    }

    fn inverse_dct_quant(
        &mut self,
        source: &CoefficientBuffer,
        destination: &mut Plane,
        table: &QuantizationTable,
    ) -> Result<(), EngineError> {
        let grid = source.grid();
        check_plane(destination, grid)?;
        check_divisors(table)?;

        let mut frequencies = [0.0f32; BLOCK_DIM];
        let mut samples = [0.0f32; BLOCK_DIM];
        for block_y in 0..grid.blocks_high {
            for block_x in 0..grid.blocks_wide {
                dequantize_block(source.block(block_x, block_y), &table.table, &mut frequencies);
                idct_8x8(&frequencies, &mut samples);
                for y in 0..BLOCK_SIZE {
                    let dy = block_y * BLOCK_SIZE + y;
                    if dy >= destination.height {
                        break;
                    }
                    for x in 0..BLOCK_SIZE {
                        let dx = block_x * BLOCK_SIZE + x;
                        if dx >= destination.width {
                            break;
                        }
                        let value = (samples[y * BLOCK_SIZE + x] + 128.0).round().clamp(0.0, 255.0);
                        destination.data[dy * destination.width + dx] = value as u8;
                    }
                }
            }
        }
        Ok(())
    }

    fn huffman_encode_scan(
        &mut self,
        components: &[ScanComponent<'_>],
        selection: SpectralSelection,
        restart_interval: RestartInterval,
    ) -> Result<Vec<u8>, EngineError> {
        check_baseline(selection)?;
        let grids: Vec<_> = components
            .iter()
            .map(|c| {
                (
                    c.coefficients.grid(),
                    c.horizontal_sampling,
                    c.vertical_sampling,
                    c.coded_blocks,
                )
            })
            .collect();
        let layout = ScanLayout::new(&grids)?;

        let mut output = Vec::new();
        let mut writer = JpegBitWriter::new(&mut output);
        let mut predictors = vec![0i16; components.len()];
        let mut restart_index = 0u8;

        for mcu in 0..layout.mcu_count() {
            if restart_due(restart_interval, mcu, layout.mcu_count()) {
                writer.write_marker(JpegMarkerCode::restart(restart_index as usize).code());
                restart_index = (restart_index + 1) % JPEG_RESTART_MARKER_RANGE;
                predictors.fill(0);
            }
            let (mx, my) = (mcu % layout.mcus_wide, mcu / layout.mcus_wide);
            for (component, predictor) in components.iter().zip(predictors.iter_mut()) {
                for (bx, by) in layout.blocks(
                    mx,
                    my,
                    component.horizontal_sampling,
                    component.vertical_sampling,
                ) {
                    encode_block(
                        &mut writer,
                        component.coefficients.block(bx, by),
                        predictor,
                        component.dc,
                        component.ac,
                    )?;
                }
            }
        }
        writer.flush();
        tracing::trace!(
            "encoded {} MCUs into {} bytes",
            layout.mcu_count(),
            output.len()
        );
        Ok(output)
    }

    fn huffman_decode_scan(
        &mut self,
        data: &[u8],
        selection: SpectralSelection,
        restart_interval: RestartInterval,
        components: &mut [ScanComponentMut<'_>],
    ) -> Result<(), EngineError> {
        check_baseline(selection)?;
        let grids: Vec<_> = components
            .iter()
            .map(|c| {
                (
                    c.coefficients.grid(),
                    c.horizontal_sampling,
                    c.vertical_sampling,
                    c.coded_blocks,
                )
            })
            .collect();
        let layout = ScanLayout::new(&grids)?;

        let mut reader = JpegBitReader::new(data);
        let mut predictors = vec![0i16; components.len()];
        let mut restart_index = 0u8;

        for mcu in 0..layout.mcu_count() {
            if restart_due(restart_interval, mcu, layout.mcu_count()) {
                let found = reader.read_restart_marker()?;
                let [high, low] = found.to_be_bytes();
                if high != 0xFF || !is_restart_code(low) {
                    return Err(EngineError::RestartMarkerMismatch {
                        expected: restart_index,
                        found,
                    });
                }
                if low != JpegMarkerCode::restart(restart_index as usize).code() {
                    tracing::warn!(
                        "expected RST{}, found 0x{:04X}; resynchronizing",
                        restart_index,
                        found
                    );
                }
                restart_index = (restart_index + 1) % JPEG_RESTART_MARKER_RANGE;
                predictors.fill(0);
            }
            let (mx, my) = (mcu % layout.mcus_wide, mcu / layout.mcus_wide);
            for (component, predictor) in components.iter_mut().zip(predictors.iter_mut()) {
                let (dc, ac) = (component.dc, component.ac);
                for (bx, by) in layout.blocks(
                    mx,
                    my,
                    component.horizontal_sampling,
                    component.vertical_sampling,
                ) {
                    decode_block(
                        &mut reader,
                        component.coefficients.block_mut(bx, by),
                        predictor,
                        dc,
                        ac,
                    )?;
                }
            }
        }
        tracing::trace!(
            "decoded {} MCUs from {} of {} bytes",
            layout.mcu_count(),
            reader.position(),
            data.len()
        );
        Ok(())
    }

    fn color_twist(&mut self, pixels: &mut [u8], matrix: &ColorMatrix) -> Result<(), EngineError> {
        if pixels.len() % 3 != 0 {
            return Err(EngineError::InvalidPixelBuffer(pixels.len()));
        }
        for pixel in pixels.chunks_exact_mut(3) {
            let twisted = twist_pixel(matrix, [pixel[0], pixel[1], pixel[2]]);
            pixel.copy_from_slice(&twisted);
        }
        Ok(())
    }

    fn resize(
        &mut self,
        source: &Plane,
        destination: &mut Plane,
        interpolation: Interpolation,
    ) -> Result<(), EngineError> {
        let grid = BlockGrid::default();
        check_plane(source, grid)?;
        check_plane(destination, grid)?;

        let horizontal = contributions(source.width, destination.width, interpolation);
        let vertical = contributions(source.height, destination.height, interpolation);

        let mut rows = vec![0.0f32; destination.width * source.height];
        for y in 0..source.height {
            let line = &source.data[y * source.width..(y + 1) * source.width];
            for (x, contribution) in horizontal.iter().enumerate() {
                rows[y * destination.width + x] = contribution
                    .taps
                    .iter()
                    .map(|&(s, w)| line[s] as f32 * w)
                    .sum();
            }
        }
        for (y, contribution) in vertical.iter().enumerate() {
            for x in 0..destination.width {
                let value: f32 = contribution
                    .taps
                    .iter()
                    .map(|&(s, w)| rows[s * destination.width + x] * w)
                    .sum();
                destination.data[y * destination.width + x] = value.round().clamp(0.0, 255.0) as u8;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg1::huffman::HuffmanKind;
    use crate::jpeg1::quantization::QuantizationKind;
    use test_log::test;

    fn specs(engine: &mut CpuEngine, dc: HuffmanKind, ac: HuffmanKind) -> (HuffmanSpec, HuffmanSpec) {
        (
            engine
                .init_huffman_spec(&HuffmanTable::standard(dc), TableClass::Dc)
                .unwrap(),
            engine
                .init_huffman_spec(&HuffmanTable::standard(ac), TableClass::Ac)
                .unwrap(),
        )
    }

    fn gradient(width: usize, height: usize) -> Plane {
        let mut plane = Plane::new(width, height);
        for y in 0..height {
            for x in 0..width {
                plane.data[y * width + x] = ((x * 7 + y * 3) % 256) as u8;
            }
        }
        plane
    }

    #[test]
    fn dct_quant_round_trip_is_close() {
        let mut engine = CpuEngine::new();
        let table = QuantizationTable::standard(QuantizationKind::Luminance, 95);
        let source = gradient(16, 16);
        let mut coefficients = engine.allocate_coefficients(BlockGrid::new(2, 2)).unwrap();
        engine.forward_dct_quant(&source, &mut coefficients, &table).unwrap();
        let mut restored = Plane::new(16, 16);
        engine.inverse_dct_quant(&coefficients, &mut restored, &table).unwrap();
        for (a, b) in source.data.iter().zip(&restored.data) {
            assert!((*a as i32 - *b as i32).abs() <= 6, "{} vs {}", a, b);
        }
        engine.release_coefficients(coefficients);
        assert_eq!(engine.outstanding_resources(), 0);
    }

    #[test]
    fn zero_divisor_is_rejected() {
        let mut engine = CpuEngine::new();
        let mut coefficients = CoefficientBuffer::new(BlockGrid::new(1, 1));
        let result = engine.forward_dct_quant(&Plane::new(8, 8), &mut coefficients, &QuantizationTable::zeroed());
        assert_eq!(result, Err(EngineError::InvalidQuantizationTable));
    }

    #[test]
    fn interleaved_scan_round_trip_with_restarts() {
        let mut engine = CpuEngine::new();
        let (luma_dc, luma_ac) = specs(&mut engine, HuffmanKind::LuminanceDc, HuffmanKind::LuminanceAc);
        let (chroma_dc, chroma_ac) = specs(&mut engine, HuffmanKind::ChromaDc, HuffmanKind::ChromaAc);

        let mut luma = CoefficientBuffer::new(BlockGrid::new(4, 4));
        let mut chroma = CoefficientBuffer::new(BlockGrid::new(2, 2));
        for by in 0..4 {
            for bx in 0..4 {
                let block = luma.block_mut(bx, by);
                block[0] = (bx as i16 - by as i16) * 40;
                block[1] = 3;
                block[20] = -17;
                block[63] = 1;
            }
        }
        chroma.block_mut(1, 1)[0] = -9;
        chroma.block_mut(0, 1)[5] = 2;

        for interval in [None, Some(1), Some(3)] {
            let data = engine
                .huffman_encode_scan(
                    &[
                        ScanComponent {
                            coefficients: &luma,
                            horizontal_sampling: 2,
                            vertical_sampling: 2,
                            coded_blocks: BlockGrid::new(4, 4),
                            dc: &luma_dc,
                            ac: &luma_ac,
                        },
                        ScanComponent {
                            coefficients: &chroma,
                            horizontal_sampling: 1,
                            vertical_sampling: 1,
                            coded_blocks: BlockGrid::new(2, 2),
                            dc: &chroma_dc,
                            ac: &chroma_ac,
                        },
                    ],
                    SpectralSelection::BASELINE,
                    interval,
                )
                .unwrap();

            let restarts = data
                .windows(2)
                .filter(|w| w[0] == 0xFF && is_restart_code(w[1]))
                .count();
            let expected_restarts = match interval {
                Some(1) => 3,
                Some(3) => 1,
                _ => 0,
            };
            assert_eq!(restarts, expected_restarts);

            let mut luma_out = CoefficientBuffer::new(BlockGrid::new(4, 4));
            let mut chroma_out = CoefficientBuffer::new(BlockGrid::new(2, 2));
            engine
                .huffman_decode_scan(
                    &data,
                    SpectralSelection::BASELINE,
                    interval,
                    &mut [
                        ScanComponentMut {
                            coefficients: &mut luma_out,
                            horizontal_sampling: 2,
                            vertical_sampling: 2,
                            coded_blocks: BlockGrid::new(4, 4),
                            dc: &luma_dc,
                            ac: &luma_ac,
                        },
                        ScanComponentMut {
                            coefficients: &mut chroma_out,
                            horizontal_sampling: 1,
                            vertical_sampling: 1,
                            coded_blocks: BlockGrid::new(2, 2),
                            dc: &chroma_dc,
                            ac: &chroma_ac,
                        },
                    ],
                )
                .unwrap();
            assert_eq!(luma_out, luma);
            assert_eq!(chroma_out, chroma);
        }

        for spec in [luma_dc, luma_ac, chroma_dc, chroma_ac] {
            engine.release_huffman_spec(spec);
        }
        assert_eq!(engine.outstanding_resources(), 0);
    }

    #[test]
    fn progressive_selection_is_rejected() {
        let mut engine = CpuEngine::new();
        let selection = SpectralSelection {
            start: 1,
            end: 5,
            approximation: 0,
        };
        assert!(matches!(
            engine.huffman_encode_scan(&[], selection, None),
            Err(EngineError::UnsupportedSpectralSelection { start: 1, end: 5, .. })
        ));
        assert_eq!(
            engine.huffman_encode_scan(&[], SpectralSelection::BASELINE, None),
            Err(EngineError::EmptyScan)
        );
    }

    #[test]
    fn truncated_scan_reports_exhaustion() {
        let mut engine = CpuEngine::new();
        let (dc, ac) = specs(&mut engine, HuffmanKind::LuminanceDc, HuffmanKind::LuminanceAc);
        let mut out = CoefficientBuffer::new(BlockGrid::new(2, 2));
        let result = engine.huffman_decode_scan(
            &[],
            SpectralSelection::BASELINE,
            None,
            &mut [ScanComponentMut {
                coefficients: &mut out,
                horizontal_sampling: 1,
                vertical_sampling: 1,
                coded_blocks: BlockGrid::new(2, 2),
                dc: &dc,
                ac: &ac,
            }],
        );
        assert_eq!(result, Err(EngineError::ScanDataExhausted));
    }

    #[test]
    fn color_twist_requires_packed_triplets() {
        let mut engine = CpuEngine::new();
        let mut pixels = [0u8; 4];
        assert_eq!(
            engine.color_twist(&mut pixels, &crate::jpeg1::color::BGR_TO_YCBCR),
            Err(EngineError::InvalidPixelBuffer(4))
        );
    }

    #[test]
    fn resize_preserves_constant_planes() {
        let mut engine = CpuEngine::new();
        let source = Plane::filled(16, 16, 77);
        let mut down = Plane::new(8, 8);
        engine.resize(&source, &mut down, Interpolation::Supersample).unwrap();
        assert!(down.data.iter().all(|&v| v == 77));

        let mut up = Plane::new(32, 24);
        engine.resize(&down, &mut up, Interpolation::Lanczos).unwrap();
        assert!(up.data.iter().all(|&v| v == 77));
    }

    #[test]
    fn supersample_averages_pixel_pairs() {
        let mut engine = CpuEngine::new();
        let source = Plane {
            width: 4,
            height: 1,
            data: vec![10, 20, 100, 200],
        };
        let mut target = Plane::new(2, 1);
        engine.resize(&source, &mut target, Interpolation::Supersample).unwrap();
        assert_eq!(target.data, vec![15, 150]);
    }
}
