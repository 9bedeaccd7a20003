//! Hardware variants of the Icon HD family and their memory geometry.
//!
//! A device reports its product name inside the identification block; the
//! name selects the [`Model`], which in turn fixes the memory [`Layout`],
//! the maximum read packet size, and the on-device dive record geometry
//! ([`RecordShape`]). Devices reporting an unlisted name are driven as
//! [`Model::Unknown`], which behaves like the most capable variant.

use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

/// Memory layout of a hardware variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Layout {
    /// Total addressable memory size in bytes.
    pub memory_size: u32,
    /// Start of the dive profile ring buffer.
    pub rb_profile_begin: u32,
    /// End of the dive profile ring buffer (exclusive).
    pub rb_profile_end: u32,
}

impl Layout {
    /// Capacity of the profile ring buffer in bytes.
    pub fn rb_capacity(&self) -> u32 {
        self.rb_profile_end - self.rb_profile_begin
    }
}

const ICONHD_LAYOUT: Layout = Layout {
    memory_size: 0x100000,
    rb_profile_begin: 0x00A000,
    rb_profile_end: 0x100000,
};

const ICONAIR_LAYOUT: Layout = Layout {
    memory_size: 0x100000,
    rb_profile_begin: 0x00E000,
    rb_profile_end: 0x100000,
};

const MATRIX_LAYOUT: Layout = Layout {
    memory_size: 0x40000,
    rb_profile_begin: 0x0A000,
    rb_profile_end: 0x3E000,
};

const NEMOWIDE2_LAYOUT: Layout = Layout {
    memory_size: 0x40000,
    rb_profile_begin: 0x0A000,
    rb_profile_end: 0x40000,
};

/// Offset of the product name window inside the identification block.
pub const PRODUCT_NAME_OFFSET: usize = 0x46;

/// Length of the product name window.
pub const PRODUCT_NAME_SIZE: usize = 16;

/// Dive mode, encoded in the low two bits of a record's type field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DiveMode {
    /// Open-circuit air.
    Air,
    /// Gauge (bottom timer) mode.
    Gauge,
    /// Open-circuit nitrox.
    Nitrox,
    /// Apnea / free diving.
    Freedive,
}

impl DiveMode {
    /// Decode the mode from a record type field.
    pub fn from_type(type_field: u16) -> Self {
        match type_field & 0x03 {
            0 => Self::Air,
            1 => Self::Gauge,
            2 => Self::Nitrox,
            _ => Self::Freedive,
        }
    }
}

/// On-device geometry of a dive record for a (model, mode) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordShape {
    /// Size of the dive header stored at the record tail.
    pub header_size: usize,
    /// Size of one profile sample.
    pub sample_size: usize,
    /// Offset of the fingerprint field inside the header.
    pub fingerprint_offset: usize,
}

/// Hardware variants of the Icon HD family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Model {
    /// Mares Matrix.
    Matrix,
    /// Mares Smart.
    Smart,
    /// Mares Smart Apnea.
    SmartApnea,
    /// Mares Icon HD.
    IconHd,
    /// Mares Icon HD Net Ready ("Icon AIR").
    IconAir,
    /// Mares Puck Pro.
    PuckPro,
    /// Mares Nemo Wide 2.
    NemoWide2,
    /// Mares Puck 2.
    Puck2,
    /// Mares Quad Air.
    QuadAir,
    /// Mares Smart Air.
    SmartAir,
    /// Mares Quad.
    Quad,
    /// Unrecognized product name; driven as the most capable variant.
    Unknown,
}

const fn name16(name: &str) -> [u8; PRODUCT_NAME_SIZE] {
    let bytes = name.as_bytes();
    let mut out = [0u8; PRODUCT_NAME_SIZE];
    let mut i = 0;
    while i < bytes.len() {
        out[i] = bytes[i];
        i += 1;
    }
    out
}

/// Product directory in match order. The identification block window is
/// compared byte for byte against each NUL-padded name; first match wins.
const DIRECTORY: &[([u8; PRODUCT_NAME_SIZE], Model)] = &[
    (name16("Matrix"), Model::Matrix),
    (name16("Smart"), Model::Smart),
    (name16("Smart Apnea"), Model::SmartApnea),
    (name16("Icon HD"), Model::IconHd),
    (name16("Icon AIR"), Model::IconAir),
    (name16("Puck Pro"), Model::PuckPro),
    (name16("Nemo Wide 2"), Model::NemoWide2),
    (name16("Puck 2"), Model::Puck2),
    (name16("Quad Air"), Model::QuadAir),
    (name16("Smart Air"), Model::SmartAir),
    (name16("Quad"), Model::Quad),
];

impl Model {
    /// Resolve the model from a raw identification block.
    ///
    /// Returns [`Model::Unknown`] when the block is too short or the product
    /// name matches no directory entry.
    pub fn detect(identification: &[u8]) -> Self {
        let Some(window) =
            identification.get(PRODUCT_NAME_OFFSET..PRODUCT_NAME_OFFSET + PRODUCT_NAME_SIZE)
        else {
            return Self::Unknown;
        };

        DIRECTORY
            .iter()
            .find(|(name, _)| window == name.as_slice())
            .map_or(Self::Unknown, |&(_, model)| model)
    }

    /// Numeric model code, as reported in device-info events.
    pub fn code(self) -> u32 {
        match self {
            Self::Matrix => 0x0F,
            Self::Smart => 0x000010,
            Self::SmartApnea => 0x010010,
            Self::IconHd => 0x14,
            Self::IconAir => 0x15,
            Self::PuckPro => 0x18,
            Self::NemoWide2 => 0x19,
            Self::Puck2 => 0x1F,
            Self::QuadAir => 0x23,
            Self::SmartAir => 0x24,
            Self::Quad => 0x29,
            Self::Unknown => 0,
        }
    }

    /// Memory layout of this variant.
    pub fn layout(self) -> Layout {
        match self {
            Self::Matrix => MATRIX_LAYOUT,
            Self::PuckPro
            | Self::Puck2
            | Self::NemoWide2
            | Self::Smart
            | Self::SmartApnea
            | Self::Quad => NEMOWIDE2_LAYOUT,
            Self::QuadAir | Self::SmartAir | Self::IconAir => ICONAIR_LAYOUT,
            Self::IconHd | Self::Unknown => ICONHD_LAYOUT,
        }
    }

    /// Maximum payload of one addressed-read exchange.
    pub fn packet_size(self) -> usize {
        match self {
            Self::IconHd | Self::IconAir | Self::Unknown => 4096,
            _ => 256,
        }
    }

    /// Bytes of header to read before the record can be sized.
    ///
    /// The Smart family stores the type and sample count right at the start
    /// of the header, so a few bytes suffice; the other variants need the
    /// full fixed part.
    pub fn peek_size(self) -> usize {
        match self {
            Self::IconAir => 0x80,
            Self::QuadAir => 0x84,
            Self::Smart | Self::SmartAir => 4,
            Self::SmartApnea => 6,
            _ => 0x5C,
        }
    }

    /// Whether the sample count precedes the type field in the header.
    pub fn samples_first(self) -> bool {
        matches!(self, Self::Smart | Self::SmartApnea | Self::SmartAir)
    }

    /// Record geometry for a dive in the given mode.
    pub fn record_shape(self, mode: DiveMode) -> RecordShape {
        match self {
            Self::IconAir => RecordShape {
                header_size: 0x80,
                sample_size: 12,
                fingerprint_offset: 6,
            },
            Self::QuadAir => RecordShape {
                header_size: 0x84,
                sample_size: 12,
                fingerprint_offset: 6,
            },
            Self::Smart => {
                if mode == DiveMode::Freedive {
                    RecordShape {
                        header_size: 0x2E,
                        sample_size: 6,
                        fingerprint_offset: 0x20,
                    }
                } else {
                    RecordShape {
                        header_size: 0x5C,
                        sample_size: 8,
                        fingerprint_offset: 2,
                    }
                }
            },
            Self::SmartApnea => RecordShape {
                header_size: 0x50,
                sample_size: 14,
                fingerprint_offset: 0x40,
            },
            Self::SmartAir => RecordShape {
                header_size: 0x84,
                sample_size: 12,
                fingerprint_offset: 2,
            },
            _ => RecordShape {
                header_size: 0x5C,
                sample_size: 8,
                fingerprint_offset: 6,
            },
        }
    }

    /// Variable data appended after the samples, in bytes.
    ///
    /// `header` is the full dive header as stored at the record tail. The
    /// result is wide enough to never overflow on corrupt header values; the
    /// caller compares it against the remaining window before casting down.
    pub fn extra_bytes(self, nsamples: u32, header: &[u8]) -> u64 {
        match self {
            Self::IconAir | Self::QuadAir | Self::SmartAir => u64::from(nsamples / 4) * 8,
            Self::SmartApnea => {
                let settings = LittleEndian::read_u16(&header[0x1C..]);
                let divetime = LittleEndian::read_u32(&header[0x24..]);
                let samplerate = 1u64 << ((settings >> 9) & 0x03);
                u64::from(divetime) * samplerate * 2
            },
            _ => 0,
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matrix => write!(f, "Matrix"),
            Self::Smart => write!(f, "Smart"),
            Self::SmartApnea => write!(f, "Smart Apnea"),
            Self::IconHd => write!(f, "Icon HD"),
            Self::IconAir => write!(f, "Icon AIR"),
            Self::PuckPro => write!(f, "Puck Pro"),
            Self::NemoWide2 => write!(f, "Nemo Wide 2"),
            Self::Puck2 => write!(f, "Puck 2"),
            Self::QuadAir => write!(f, "Quad Air"),
            Self::SmartAir => write!(f, "Smart Air"),
            Self::Quad => write!(f, "Quad"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}
