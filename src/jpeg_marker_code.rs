use num_enum::{IntoPrimitive, TryFromPrimitive};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum JpegMarkerCode {
    /// SOF0: Start of a baseline DCT frame.
    StartOfFrameBaseline = 0xC0,
    /// SOF1: Start of an extended sequential DCT frame.
    StartOfFrameExtended = 0xC1,
    /// SOF2: Start of a progressive DCT frame.
    StartOfFrameProgressive = 0xC2,
    /// SOF3: Start of a lossless frame.
    StartOfFrameLossless = 0xC3,

    /// DHT: Defines one or more Huffman tables.
    DefineHuffmanTable = 0xC4,

    /// RST0..RST7: Restart markers, only valid inside entropy-coded data.
    Restart0 = 0xD0,
    Restart1 = 0xD1,
    Restart2 = 0xD2,
    Restart3 = 0xD3,
    Restart4 = 0xD4,
    Restart5 = 0xD5,
    Restart6 = 0xD6,
    Restart7 = 0xD7,

    /// SOI: Marks the start of an image.
    StartOfImage = 0xD8,
    /// EOI: Marks the end of an image.
    EndOfImage = 0xD9,
    /// SOS: Marks the start of scan.
    StartOfScan = 0xDA,
    /// DQT: Defines one or more quantization tables.
    DefineQuantizationTable = 0xDB,
    /// DNL: Defines the number of lines in a scan.
    DefineNumberOfLines = 0xDC,
    /// DRI: Defines the restart interval used in succeeding scans.
    DefineRestartInterval = 0xDD,

    /// APP0: Application data 0: used for JFIF header.
    ApplicationData0 = 0xE0,
    /// APP1: Application data 1: used for EXIF or XMP header.
    ApplicationData1 = 0xE1,
    /// APP2: Application data 2: used for ICC profile.
    ApplicationData2 = 0xE2,
    ApplicationData3 = 0xE3,
    ApplicationData4 = 0xE4,
    ApplicationData5 = 0xE5,
    ApplicationData6 = 0xE6,
    ApplicationData7 = 0xE7,
    ApplicationData8 = 0xE8,
    ApplicationData9 = 0xE9,
    ApplicationData10 = 0xEA,
    ApplicationData11 = 0xEB,
    ApplicationData12 = 0xEC,
    ApplicationData13 = 0xED,
    /// APP14: Application data 14: used by Adobe
    ApplicationData14 = 0xEE,
    ApplicationData15 = 0xEF,

    /// COM: Comment block.
    Comment = 0xFE,
}

impl JpegMarkerCode {
    pub fn from_code(code: u8) -> Option<Self> {
        Self::try_from(code).ok()
    }

    pub fn code(self) -> u8 {
        self.into()
    }

    pub fn is_restart(self) -> bool {
        is_restart_code(self.code())
    }

    pub fn is_start_of_frame(self) -> bool {
        matches!(
            self,
            Self::StartOfFrameBaseline
                | Self::StartOfFrameExtended
                | Self::StartOfFrameProgressive
                | Self::StartOfFrameLossless
        )
    }

    /// APPn and COM segments carry opaque payloads.
    pub fn is_opaque_segment(self) -> bool {
        matches!(self.code(), 0xE0..=0xEF | 0xFE)
    }

    /// The restart marker emitted after the `index`-th restart interval.
    pub fn restart(index: usize) -> Self {
        match index % 8 {
            0 => Self::Restart0,
            1 => Self::Restart1,
            2 => Self::Restart2,
            3 => Self::Restart3,
            4 => Self::Restart4,
            5 => Self::Restart5,
            6 => Self::Restart6,
            _ => Self::Restart7,
        }
    }
}

pub fn is_restart_code(code: u8) -> bool {
    (0xD0..=0xD7).contains(&code)
}

/// SOF0..SOF15, excluding DHT, JPG and DAC which share the range.
pub fn is_start_of_frame_code(code: u8) -> bool {
    (0xC0..=0xCF).contains(&code) && !matches!(code, 0xC4 | 0xC8 | 0xCC)
}

/// Every marker except SOI, EOI, RSTn and TEM is followed by a length field.
pub fn has_segment_code(code: u8) -> bool {
    !matches!(code, 0x01 | 0xD0..=0xD9)
}
