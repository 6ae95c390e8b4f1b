use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::structs::burst::Variant;
use crate::utils::errors::ConfigError;

/// Samples in one legacy metadata block.
pub const BLOCK_SIZE: usize = 160;

/// Silent samples kept free after every video sync.
pub const GUARD_BAND: usize = 32;

/// Video frame rates recognised by the framer.
///
/// Numeric codes follow declaration order, `0` for 23.98 fps up to `10` for
/// 120 fps. All timing assumes a 48 kHz sample clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum FrameRate {
    #[serde(rename = "23.98")]
    R23_98 = 0,
    #[serde(rename = "24")]
    R24,
    #[serde(rename = "25")]
    R25,
    #[serde(rename = "29.97")]
    R29_97,
    #[serde(rename = "30")]
    R30,
    #[serde(rename = "50")]
    R50,
    #[serde(rename = "59.94")]
    R59_94,
    #[serde(rename = "60")]
    R60,
    #[serde(rename = "100")]
    R100,
    #[serde(rename = "119.88")]
    R119_88,
    #[serde(rename = "120")]
    R120,
}

impl FrameRate {
    pub const COUNT: usize = 11;

    pub const ALL: [FrameRate; Self::COUNT] = [
        Self::R23_98,
        Self::R24,
        Self::R25,
        Self::R29_97,
        Self::R30,
        Self::R50,
        Self::R59_94,
        Self::R60,
        Self::R100,
        Self::R119_88,
        Self::R120,
    ];
}

impl TryFrom<u8> for FrameRate {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(ConfigError::UnknownFrameRate(value))
    }
}

impl Display for FrameRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let fps = match self {
            FrameRate::R23_98 => "23.98",
            FrameRate::R24 => "24",
            FrameRate::R25 => "25",
            FrameRate::R29_97 => "29.97",
            FrameRate::R30 => "30",
            FrameRate::R50 => "50",
            FrameRate::R59_94 => "59.94",
            FrameRate::R60 => "60",
            FrameRate::R100 => "100",
            FrameRate::R119_88 => "119.88",
            FrameRate::R120 => "120",
        };

        f.write_str(fps)
    }
}

/// Minimum video frame length, in 48 kHz samples, for every [`FrameRate`].
///
/// Fractional rates (29.97, 59.94, 119.88) have frames of varying length in a
/// real timeline; the table holds the shortest one, which is what block
/// scheduling must fit into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTimingTable {
    min_frame_length: [usize; FrameRate::COUNT],
}

impl FrameTimingTable {
    pub const STANDARD: Self = Self {
        min_frame_length: [2002, 2000, 1920, 1601, 1600, 960, 800, 800, 480, 400, 400],
    };

    /// Table with custom frame lengths, indexed by [`FrameRate`] code.
    pub const fn new(min_frame_length: [usize; FrameRate::COUNT]) -> Self {
        Self { min_frame_length }
    }

    pub const fn min_frame_length(&self, rate: FrameRate) -> usize {
        self.min_frame_length[rate as usize]
    }

    /// Number of legacy blocks that fit into one frame at `rate`.
    pub const fn legacy_block_count(&self, rate: FrameRate) -> usize {
        self.min_frame_length(rate) / BLOCK_SIZE
    }
}

impl Default for FrameTimingTable {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Block schedule of one video frame.
///
/// Legacy frames carry `frame_length / 160` blocks. Block `i` starts `160 * i`
/// samples after the video sync, except block 0 which starts after the guard
/// band; the first and last blocks are shortened by the guard band.
/// Serial ADM frames carry a single block spanning the frame minus a guard band
/// at each end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    variant: Variant,
    frame_length: usize,
    block_count: usize,
}

impl FrameLayout {
    pub fn new(table: &FrameTimingTable, rate: FrameRate, variant: Variant) -> Self {
        let frame_length = table.min_frame_length(rate);
        let block_count = match variant {
            Variant::Legacy => table.legacy_block_count(rate),
            Variant::SerialAdm => 1,
        };

        Self {
            variant,
            frame_length,
            block_count,
        }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Length in samples of block `index`, burst plus trailing padding.
    pub fn block_length(&self, index: usize) -> usize {
        match self.variant {
            Variant::SerialAdm => self.frame_length.saturating_sub(2 * GUARD_BAND),
            Variant::Legacy if index == 0 || index + 1 == self.block_count => {
                BLOCK_SIZE - GUARD_BAND
            }
            Variant::Legacy => BLOCK_SIZE,
        }
    }

    /// Offset of block `index` from the video sync, in samples.
    pub fn block_offset(&self, index: usize) -> usize {
        match self.variant {
            Variant::SerialAdm => GUARD_BAND,
            Variant::Legacy if index == 0 => GUARD_BAND,
            Variant::Legacy => BLOCK_SIZE * index,
        }
    }

    /// Length of the longest block in the frame.
    pub fn max_block_length(&self) -> usize {
        (0..self.block_count)
            .map(|i| self.block_length(i))
            .max()
            .unwrap_or(0)
    }
}

#[test]
fn frame_lengths_hold_whole_blocks() {
    let table = FrameTimingTable::STANDARD;

    for rate in FrameRate::ALL {
        let length = table.min_frame_length(rate);
        let blocks = table.legacy_block_count(rate);

        assert!(length > 0, "{rate} fps has no frame length");
        assert!(blocks * BLOCK_SIZE <= length);
        assert!(length < blocks * BLOCK_SIZE + BLOCK_SIZE);
    }

    let counts = FrameRate::ALL.map(|rate| table.legacy_block_count(rate));
    assert_eq!(counts.iter().min(), Some(&2));
    assert_eq!(counts.iter().max(), Some(&12));
    assert_eq!(table.legacy_block_count(FrameRate::R100), 3);
    assert_eq!(table.legacy_block_count(FrameRate::R25), 12);
    assert_eq!(table.min_frame_length(FrameRate::R29_97), 1601);
}

#[test]
fn legacy_blocks_tile_the_frame() {
    let table = FrameTimingTable::default();

    for rate in FrameRate::ALL {
        let layout = FrameLayout::new(&table, rate, Variant::Legacy);
        let mut next = GUARD_BAND;

        for i in 0..layout.block_count() {
            assert_eq!(layout.block_offset(i), next, "{rate} fps block {i}");
            next += layout.block_length(i);
        }

        assert!(next + GUARD_BAND <= layout.frame_length());
    }
}

#[test]
fn sadm_block_spans_frame() {
    let layout = FrameLayout::new(&FrameTimingTable::STANDARD, FrameRate::R50, Variant::SerialAdm);

    assert_eq!(layout.block_count(), 1);
    assert_eq!(layout.block_offset(0), 32);
    assert_eq!(layout.block_length(0), 960 - 64);
    assert_eq!(layout.max_block_length(), 896);
}

#[test]
fn unknown_rate_code_is_rejected() {
    assert_eq!(FrameRate::try_from(2).ok(), Some(FrameRate::R25));
    assert_eq!(FrameRate::try_from(10).ok(), Some(FrameRate::R120));
    assert!(matches!(
        FrameRate::try_from(11),
        Err(ConfigError::UnknownFrameRate(11))
    ));
}
