//! Per-channel block geometry derived from a frame header.

use crate::FrameHeader;
use crate::constants::BLOCK_SIZE;
use crate::engine::BlockGrid;
use crate::error::JpegError;

/// Block grid and padded plane size of one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelGeometry {
    pub horizontal_sampling: usize,
    pub vertical_sampling: usize,
    /// Blocks allocated for the channel, a whole number of MCUs.
    pub blocks: BlockGrid,
    /// Blocks carrying image data, coded by a scan holding this channel alone.
    pub coded_blocks: BlockGrid,
}

impl ChannelGeometry {
    pub fn padded_width(&self) -> usize {
        self.blocks.pixel_width()
    }

    pub fn padded_height(&self) -> usize {
        self.blocks.pixel_height()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: usize,
    pub height: usize,
    pub max_horizontal_sampling: usize,
    pub max_vertical_sampling: usize,
    pub channels: Vec<ChannelGeometry>,
}

impl FrameGeometry {
    /// Plans the block grid of every component of `frame`.
    pub fn plan(frame: &FrameHeader) -> Result<Self, JpegError> {
        let width = frame.width as usize;
        let height = frame.height as usize;
        if width == 0 || height == 0 {
            return Err(JpegError::InvalidDimensions { width, height });
        }
        if frame.components.is_empty() {
            return Err(JpegError::InvalidComponentCount(0));
        }

        let mut max_horizontal_sampling = 1;
        let mut max_vertical_sampling = 1;
        for component in &frame.components {
            let (h, v) = (component.horizontal_sampling(), component.vertical_sampling());
            if !(1..=4).contains(&h) || !(1..=4).contains(&v) {
                return Err(JpegError::InvalidSamplingFactors(component.sampling_factors));
            }
            max_horizontal_sampling = max_horizontal_sampling.max(h);
            max_vertical_sampling = max_vertical_sampling.max(v);
        }

        let image_blocks_wide = width.div_ceil(BLOCK_SIZE);
        let image_blocks_high = height.div_ceil(BLOCK_SIZE);

        let channels = frame
            .components
            .iter()
            .map(|component| {
                let h = component.horizontal_sampling();
                let v = component.vertical_sampling();
                let blocks_wide = (image_blocks_wide * h)
                    .div_ceil(max_horizontal_sampling)
                    .next_multiple_of(h);
                let blocks_high = (image_blocks_high * v)
                    .div_ceil(max_vertical_sampling)
                    .next_multiple_of(v);
                let coded_wide = (width * h).div_ceil(max_horizontal_sampling).div_ceil(BLOCK_SIZE);
                let coded_high = (height * v).div_ceil(max_vertical_sampling).div_ceil(BLOCK_SIZE);
                ChannelGeometry {
                    horizontal_sampling: h,
                    vertical_sampling: v,
                    blocks: BlockGrid::new(blocks_wide, blocks_high),
                    coded_blocks: BlockGrid::new(coded_wide, coded_high),
                }
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            "geometry {}x{}: max sampling {}x{}, {} channels",
            width,
            height,
            max_horizontal_sampling,
            max_vertical_sampling,
            channels.len()
        );

        Ok(Self {
            width,
            height,
            max_horizontal_sampling,
            max_vertical_sampling,
            channels,
        })
    }

    pub fn mcus_wide(&self) -> usize {
        self.width.div_ceil(BLOCK_SIZE * self.max_horizontal_sampling)
    }

    pub fn mcus_high(&self) -> usize {
        self.height.div_ceil(BLOCK_SIZE * self.max_vertical_sampling)
    }

    pub fn block_grids(&self) -> Vec<BlockGrid> {
        self.channels.iter().map(|c| c.blocks).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{SAMPLING_420, SAMPLING_444};

    #[test]
    fn chroma_planes_are_halved_for_420() {
        let frame = FrameHeader::with_sampling(32, 32, &SAMPLING_420);
        let geometry = FrameGeometry::plan(&frame).unwrap();
        assert_eq!(geometry.channels[0].padded_width(), 32);
        assert_eq!(geometry.channels[0].padded_height(), 32);
        for chroma in &geometry.channels[1..] {
            assert_eq!(chroma.padded_width(), 16);
            assert_eq!(chroma.padded_height(), 16);
        }
        assert_eq!(geometry.mcus_wide(), 2);
        assert_eq!(geometry.mcus_high(), 2);
    }

    #[test]
    fn all_planes_match_for_444() {
        let frame = FrameHeader::with_sampling(24, 40, &SAMPLING_444);
        let geometry = FrameGeometry::plan(&frame).unwrap();
        for channel in &geometry.channels {
            assert_eq!(channel.blocks, BlockGrid::new(3, 5));
            assert_eq!(channel.coded_blocks, BlockGrid::new(3, 5));
        }
    }

    #[test]
    fn odd_sizes_pad_to_whole_mcus() {
        let frame = FrameHeader::with_sampling(41, 17, &SAMPLING_420);
        let geometry = FrameGeometry::plan(&frame).unwrap();
        let luma = geometry.channels[0];
        assert_eq!(luma.blocks, BlockGrid::new(6, 4));
        assert_eq!(luma.coded_blocks, BlockGrid::new(6, 3));
        let chroma = geometry.channels[1];
        assert_eq!(chroma.blocks, BlockGrid::new(3, 2));
        assert_eq!(chroma.coded_blocks, BlockGrid::new(3, 2));
        assert_eq!(geometry.mcus_wide() * 2, luma.blocks.blocks_wide);
        assert_eq!(geometry.mcus_high() * 2, luma.blocks.blocks_high);
    }

    #[test]
    fn rejects_zero_sampling() {
        let frame = FrameHeader::with_sampling(16, 16, &[0x10]);
        assert!(matches!(
            FrameGeometry::plan(&frame),
            Err(JpegError::InvalidSamplingFactors(0x10))
        ));
    }
}
