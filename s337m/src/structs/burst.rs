use serde::{Deserialize, Serialize};

use crate::structs::preamble::{BitDepth, PREAMBLE_WORDS};
use crate::utils::errors::FramerError;

/// Silent samples reserved at the end of every legacy burst.
pub const LEGACY_TRAILER_SAMPLES: usize = 4;

/// Serial ADM header words following Pd without assemble info: Pe, Pf and
/// format info.
pub const SADM_HEADER_WORDS: usize = 3;

/// Burst dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Variant {
    /// Many fixed-size blocks per frame, each carrying a slice of the
    /// metadata set.
    #[serde(rename = "legacy")]
    Legacy,
    /// One burst per frame carrying a compressed serial ADM document.
    #[serde(rename = "sadm")]
    SerialAdm,
}

impl Variant {
    pub const fn default_bit_depth(self) -> BitDepth {
        match self {
            Self::Legacy => BitDepth::Bits20,
            Self::SerialAdm => BitDepth::Bits24,
        }
    }
}

/// PCM channels that carry the bursts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelLayout {
    /// One channel, by index.
    Single(usize),
    /// Two adjacent channels, by index of the first.
    Pair(usize),
}

impl ChannelLayout {
    pub const fn words_per_sample(self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Pair(_) => 2,
        }
    }

    pub const fn first_channel(self) -> usize {
        match self {
            Self::Single(channel) | Self::Pair(channel) => channel,
        }
    }
}

/// Size arithmetic of one burst for a fixed dialect, depth and layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstGeometry {
    variant: Variant,
    depth: BitDepth,
    words_per_sample: usize,
    header_words: usize,
}

impl BurstGeometry {
    pub fn new(variant: Variant, depth: BitDepth, layout: ChannelLayout, assemble_info: bool) -> Self {
        let header_words = match variant {
            Variant::Legacy => 0,
            Variant::SerialAdm => SADM_HEADER_WORDS + usize::from(assemble_info),
        };

        Self {
            variant,
            depth,
            words_per_sample: layout.words_per_sample(),
            header_words,
        }
    }

    /// Same geometry at another wrap depth.
    pub fn with_depth(self, depth: BitDepth) -> Self {
        Self { depth, ..self }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn depth(&self) -> BitDepth {
        self.depth
    }

    pub fn words_per_sample(&self) -> usize {
        self.words_per_sample
    }

    /// Words between Pd and the payload.
    pub fn header_words(&self) -> usize {
        self.header_words
    }

    /// Samples taken by Pa..Pd.
    pub fn preamble_samples(&self) -> usize {
        PREAMBLE_WORDS / self.words_per_sample
    }

    fn header_bits(&self) -> usize {
        self.header_words * self.depth.bits() as usize
    }

    fn pd_limit(&self) -> usize {
        (self.depth.max_value() as usize).saturating_sub(self.header_bits())
    }

    /// Payload bits an encoder may place in a block of `block_length`
    /// samples.
    pub fn capacity_bits(&self, block_length: usize) -> usize {
        let trailer = match self.variant {
            Variant::Legacy => LEGACY_TRAILER_SAMPLES,
            Variant::SerialAdm => 0,
        };
        let samples = block_length.saturating_sub(self.preamble_samples() + trailer);
        let words = (samples * self.words_per_sample).saturating_sub(self.header_words);

        (words * self.depth.bits() as usize).min(self.pd_limit())
    }

    pub fn capacity_bytes(&self, block_length: usize) -> usize {
        self.capacity_bits(block_length) / 8
    }

    /// Largest payload a decoder accepts in a block of `block_length`
    /// samples. Unlike [`capacity_bits`](Self::capacity_bits) this does not
    /// reserve the legacy trailer.
    pub fn max_burst_bits(&self, block_length: usize) -> usize {
        let samples = block_length.saturating_sub(self.preamble_samples());
        let words = (samples * self.words_per_sample).saturating_sub(self.header_words);

        (words * self.depth.bits() as usize).min(self.pd_limit())
    }

    pub fn payload_words(&self, payload_bits: usize) -> usize {
        payload_bits.div_ceil(self.depth.bits() as usize)
    }

    /// Value carried by Pd. Serial ADM lengths include the header words.
    pub fn pd_value(&self, payload_bits: usize) -> u32 {
        if payload_bits == 0 {
            0
        } else {
            (payload_bits + self.header_bits()) as u32
        }
    }

    /// Payload bits announced by a Pd value, `None` when it cannot even hold
    /// the header.
    pub fn payload_bits_from_pd(&self, pd: u32) -> Option<usize> {
        (pd as usize).checked_sub(self.header_bits())
    }

    /// Samples occupied by a burst carrying `payload_bits`, preamble included.
    pub fn burst_samples(&self, payload_bits: usize) -> usize {
        let mut words = PREAMBLE_WORDS;
        if payload_bits > 0 {
            words += self.header_words + self.payload_words(payload_bits);
        }

        words.div_ceil(self.words_per_sample)
    }
}

/// Bytes handed to the framer for one block.
///
/// `bit_len` may end mid-byte; the bits past it are never embedded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl Payload {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(bytes: Vec<u8>) -> Self {
        let bit_len = bytes.len() * 8;
        Self { bytes, bit_len }
    }

    pub fn with_bit_len(bytes: Vec<u8>, bit_len: usize) -> Result<Self, FramerError> {
        if bit_len > bytes.len() * 8 {
            return Err(FramerError::InvalidBitLength {
                bit_len,
                bytes: bytes.len(),
            });
        }

        Ok(Self { bytes, bit_len })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn is_empty(&self) -> bool {
        self.bit_len == 0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }
}

#[test]
fn legacy_capacity() {
    let pair = BurstGeometry::new(Variant::Legacy, BitDepth::Bits20, ChannelLayout::Pair(0), false);
    assert_eq!(pair.capacity_bytes(160), 770);
    assert_eq!(pair.capacity_bits(128), (128 - 2 - 4) * 2 * 20);

    let single = BurstGeometry::new(Variant::Legacy, BitDepth::Bits16, ChannelLayout::Single(3), false);
    assert_eq!(single.preamble_samples(), 4);
    assert_eq!(single.capacity_bits(160), (160 - 8) * 16);
}

#[test]
fn sadm_capacity_is_bounded_by_pd() {
    let wide = BurstGeometry::new(Variant::SerialAdm, BitDepth::Bits24, ChannelLayout::Pair(0), false);
    assert_eq!(wide.capacity_bits(1938), ((1938 - 2) * 2 - 3) * 24);
    assert_eq!(wide.pd_value(8), 8 + 72);

    let narrow = BurstGeometry::new(Variant::SerialAdm, BitDepth::Bits16, ChannelLayout::Pair(0), true);
    assert_eq!(narrow.header_words(), 4);
    assert!(narrow.capacity_bits(1938) <= 0xFFFF - 64);
    assert_eq!(narrow.payload_bits_from_pd(0xFFFF), Some(0xFFFF - 64));
    assert_eq!(narrow.payload_bits_from_pd(10), None);
}

#[test]
fn burst_samples_round_up_to_sample_sets() {
    let pair = BurstGeometry::new(Variant::SerialAdm, BitDepth::Bits20, ChannelLayout::Pair(0), false);
    // Pa..Pd, Pe, Pf, format info, one payload word
    assert_eq!(pair.burst_samples(1), 4);
    assert_eq!(pair.burst_samples(0), 2);

    let legacy = pair.with_depth(BitDepth::Bits24);
    assert_eq!(legacy.payload_words(49), 3);
}

#[test]
fn payload_bit_len_is_checked() {
    assert!(Payload::with_bit_len(vec![0xFF], 7).is_ok());
    assert!(matches!(
        Payload::with_bit_len(vec![0xFF], 9),
        Err(FramerError::InvalidBitLength { bit_len: 9, bytes: 1 })
    ));
    assert!(Payload::empty().is_empty());
}
