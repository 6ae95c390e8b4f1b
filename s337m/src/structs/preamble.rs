//! SMPTE 337m preamble words.
//!
//! Every word is a 32-bit PCM word with the embedded value left-justified at
//! the wrap depth, so a 20-bit value `v` travels as `v << 12`.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::structs::burst::Variant;
use crate::utils::errors::ConfigError;

pub const PA_16: u32 = 0xF872_0000;
pub const PA_20: u32 = 0x6F87_2000;
pub const PA_24: u32 = 0x96F8_7200;

pub const PB_16: u32 = 0x4E1F_0000;
pub const PB_20: u32 = 0x54E1_F000;
pub const PB_24: u32 = 0xA54E_1F00;

/// Pc data type of a legacy metadata burst.
pub const DATA_TYPE_LEGACY: u16 = 0x1B;
/// Pc data type of a serial ADM burst.
pub const DATA_TYPE_SADM: u16 = 0x1F;

/// Data type and data mode bits of Pc.
pub const PC_TYPE_MASK: u16 = 0x7F;

const PC_DATA_MODE_SHIFT: u16 = 5;
const PC_LEGACY_KEY_FLAG: u16 = 1 << 8;
const PC_SADM_CHANGED: u16 = 1 << 8;
const PC_SADM_ASSEMBLE_INFO: u16 = 1 << 9;
const PC_SADM_FORMAT_INFO: u16 = 1 << 10;

/// Format type carried in the serial ADM format info word.
pub const FORMAT_TYPE_GZIP: u16 = 1;

/// Preamble words Pa..Pd.
pub const PREAMBLE_WORDS: usize = 4;

/// Bits per embedded word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum BitDepth {
    Bits16,
    Bits20,
    Bits24,
}

impl BitDepth {
    pub const ALL: [BitDepth; 3] = [Self::Bits16, Self::Bits20, Self::Bits24];

    pub const fn bits(self) -> u32 {
        match self {
            Self::Bits16 => 16,
            Self::Bits20 => 20,
            Self::Bits24 => 24,
        }
    }

    /// Left shift that places a value of this depth in a PCM word.
    pub const fn shift(self) -> u32 {
        32 - self.bits()
    }

    /// Largest value a word of this depth can carry.
    pub const fn max_value(self) -> u32 {
        (1 << self.bits()) - 1
    }

    const fn data_mode(self) -> u16 {
        match self {
            Self::Bits16 => 0,
            Self::Bits20 => 1,
            Self::Bits24 => 2,
        }
    }

    pub const fn pa(self) -> u32 {
        match self {
            Self::Bits16 => PA_16,
            Self::Bits20 => PA_20,
            Self::Bits24 => PA_24,
        }
    }

    pub const fn pb(self) -> u32 {
        match self {
            Self::Bits16 => PB_16,
            Self::Bits20 => PB_20,
            Self::Bits24 => PB_24,
        }
    }

    /// Identifies the wrap depth of a burst from its Pa word.
    pub fn from_pa(word: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|depth| depth.pa() == word)
    }

    /// Places `value` in a PCM word.
    pub const fn word(self, value: u32) -> u32 {
        value << self.shift()
    }

    /// Extracts the embedded value of a PCM word.
    pub const fn value(self, word: u32) -> u32 {
        word >> self.shift()
    }
}

impl TryFrom<u8> for BitDepth {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            16 => Ok(Self::Bits16),
            20 => Ok(Self::Bits20),
            24 => Ok(Self::Bits24),
            _ => Err(ConfigError::InvalidBitDepth(value)),
        }
    }
}

impl From<BitDepth> for u8 {
    fn from(depth: BitDepth) -> Self {
        depth.bits() as u8
    }
}

impl Display for BitDepth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

/// Builds a Pc word. Pc fields occupy the top 16 bits at every depth.
pub fn pc_word(variant: Variant, depth: BitDepth, assemble_info: bool) -> u32 {
    let mode = depth.data_mode() << PC_DATA_MODE_SHIFT;
    let pc = match variant {
        Variant::Legacy => DATA_TYPE_LEGACY | mode | PC_LEGACY_KEY_FLAG,
        Variant::SerialAdm => {
            let ai = if assemble_info {
                PC_SADM_ASSEMBLE_INFO
            } else {
                0
            };
            DATA_TYPE_SADM | mode | PC_SADM_CHANGED | PC_SADM_FORMAT_INFO | ai
        }
    };

    (pc as u32) << 16
}

pub fn pd_word(depth: BitDepth, length_bits: u32) -> u32 {
    depth.word(length_bits)
}

/// Pe of a serial ADM burst.
pub fn pe_word(depth: BitDepth) -> u32 {
    depth.word(1)
}

/// Assemble info word. All fields are zero for full-frame bursts.
pub const ASSEMBLE_INFO_WORD: u32 = 0;

pub const FORMAT_INFO_WORD: u32 = (FORMAT_TYPE_GZIP as u32) << 16;

/// What a Pc word announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstKind {
    Null,
    Legacy,
    SerialAdm {
        assemble_info: bool,
        format_info: bool,
    },
    /// Some other SMPTE 338 data type, carrying its raw Pc field.
    Foreign(u16),
}

impl BurstKind {
    pub fn classify(pc: u32, depth: BitDepth) -> Self {
        let field = (pc >> 16) as u16;
        let mode = depth.data_mode() << PC_DATA_MODE_SHIFT;

        if field & PC_TYPE_MASK == 0 {
            Self::Null
        } else if field & PC_TYPE_MASK == DATA_TYPE_LEGACY | mode {
            Self::Legacy
        } else if field & PC_TYPE_MASK == DATA_TYPE_SADM | mode {
            Self::SerialAdm {
                assemble_info: field & PC_SADM_ASSEMBLE_INFO != 0,
                format_info: field & PC_SADM_FORMAT_INFO != 0,
            }
        } else {
            Self::Foreign(field)
        }
    }

    pub fn variant(self) -> Option<Variant> {
        match self {
            Self::Legacy => Some(Variant::Legacy),
            Self::SerialAdm { .. } => Some(Variant::SerialAdm),
            Self::Null | Self::Foreign(_) => None,
        }
    }
}

#[test]
fn pc_words_match_broadcast_values() {
    assert_eq!(
        pc_word(Variant::Legacy, BitDepth::Bits20, false),
        0x013B_0000
    );
    assert_eq!(
        pc_word(Variant::Legacy, BitDepth::Bits24, false),
        0x015B_0000
    );
    assert_eq!(
        pc_word(Variant::SerialAdm, BitDepth::Bits24, false),
        0x055F_0000
    );
    assert_eq!(
        pc_word(Variant::SerialAdm, BitDepth::Bits16, true),
        0x071F_0000
    );
}

#[test]
fn classify_round_trips_pc() {
    for depth in BitDepth::ALL {
        assert_eq!(
            BurstKind::classify(pc_word(Variant::Legacy, depth, false), depth),
            BurstKind::Legacy
        );
        assert_eq!(
            BurstKind::classify(pc_word(Variant::SerialAdm, depth, true), depth),
            BurstKind::SerialAdm {
                assemble_info: true,
                format_info: true
            }
        );
        assert_eq!(BurstKind::classify(0, depth), BurstKind::Null);
    }

    // Dolby E, data type 28
    assert_eq!(
        BurstKind::classify(0x001C_0000, BitDepth::Bits16),
        BurstKind::Foreign(0x1C)
    );
    // legacy Pc written at 20 bits does not match a 24-bit burst
    assert!(matches!(
        BurstKind::classify(0x013B_0000, BitDepth::Bits24),
        BurstKind::Foreign(_)
    ));
}

#[test]
fn depth_from_pa() {
    assert_eq!(BitDepth::from_pa(0x6F87_2000), Some(BitDepth::Bits20));
    assert_eq!(BitDepth::from_pa(PA_24), Some(BitDepth::Bits24));
    assert_eq!(BitDepth::from_pa(PB_16), None);
    assert_eq!(pd_word(BitDepth::Bits20, 64), 64 << 12);
    assert_eq!(pe_word(BitDepth::Bits16), 0x0001_0000);
}
