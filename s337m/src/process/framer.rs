use log::{Level, debug, trace};

use crate::log_at;
use crate::structs::burst::{BurstGeometry, ChannelLayout, Payload, Variant};
use crate::structs::config::StreamConfig;
use crate::structs::preamble::{
    ASSEMBLE_INFO_WORD, BitDepth, BurstKind, FORMAT_INFO_WORD, pc_word, pd_word, pe_word,
};
use crate::structs::timing::{FrameTimingTable, GUARD_BAND};
use crate::utils::bitstream_io::{WordPacker, WordUnpacker};
use crate::utils::errors::{BurstError, ConfigError, FramerError};

/// Position of the framer within a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingSync,
    GuardBand,
    Padding,
    PreambleA,
    PreambleB,
    PreambleC,
    PreambleD,
    PreambleE,
    PreambleF,
    SadmAssembleInfo,
    SadmFormatInfo,
    Data,
}

/// A block handed to [`BurstFramer::emit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledBlock {
    pub index: usize,
    /// Samples from the block's first preamble word to the next block.
    pub length: usize,
    pub payload: Payload,
}

/// Feeds blocks to [`BurstFramer::emit`].
pub trait BlockScheduler {
    /// The block following the one just written, or `None` once the frame is
    /// complete and the framer should wait for the next video sync.
    fn next_block(&mut self) -> Option<ScheduledBlock>;
}

/// Receives what [`BurstFramer::detect`] finds.
///
/// Positions are stream sample positions of the burst's Pa word.
pub trait BurstObserver {
    /// A burst of this stream's dialect, or a null burst, starts here.
    fn sync_found(&mut self, position: u64);

    /// A burst was read completely. Null and zero-length bursts report an
    /// empty payload.
    fn block_decoded(&mut self, position: u64, bytes: &[u8], bit_len: usize);

    fn burst_rejected(&mut self, position: u64, error: BurstError);
}

/// SMPTE 337m burst state machine.
///
/// One instance serves one direction of one stream: [`emit`](Self::emit)
/// writes bursts into PCM, [`detect`](Self::detect) reads them back. Both are
/// resumable across calls of any size down to a single sample.
///
/// # Example
///
/// ```rust
/// use s337m::process::framer::{BlockScheduler, BurstFramer, ScheduledBlock};
/// use s337m::structs::burst::{ChannelLayout, Payload, Variant};
/// use s337m::structs::config::StreamConfig;
/// use s337m::structs::preamble::PA_20;
/// use s337m::structs::timing::{FrameRate, FrameTimingTable};
///
/// struct OneBlock(Option<Payload>);
///
/// impl BlockScheduler for OneBlock {
///     fn next_block(&mut self) -> Option<ScheduledBlock> {
///         let payload = self.0.take()?;
///         Some(ScheduledBlock { index: 0, length: 128, payload })
///     }
/// }
///
/// let config = StreamConfig::new(FrameRate::R25, Variant::Legacy, ChannelLayout::Pair(0), 2);
/// let mut framer = BurstFramer::new(&config, &FrameTimingTable::STANDARD)?;
///
/// let mut pcm = vec![0u32; 2 * 160];
/// let mut blocks = OneBlock(Some(Payload::new(b"metadata".to_vec())));
/// framer.emit(&mut pcm, 160, Some(0), &mut blocks)?;
///
/// // Pa follows the 32 sample guard band
/// assert_eq!(pcm[2 * 32], PA_20);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct BurstFramer {
    variant: Variant,
    layout: ChannelLayout,
    stride: usize,
    geometry: BurstGeometry,
    assemble_info: bool,
    mark_empty_blocks: bool,
    max_block_length: usize,

    phase: Phase,
    word_in_sample: usize,
    position: u64,
    vsync: Option<u64>,
    counter: usize,

    block_length: usize,
    payload_bits: usize,
    packer: Option<WordPacker>,
    pack_buffer: Vec<u8>,

    depth: BitDepth,
    kind: BurstKind,
    burst_start: u64,
    unpacker: Option<WordUnpacker>,
    scratch: Vec<u8>,
}

impl BurstFramer {
    pub fn new(config: &StreamConfig, table: &FrameTimingTable) -> Result<Self, ConfigError> {
        config.validate_with(table)?;

        let geometry = config.geometry();
        let max_block_length = config.frame_layout(table).max_block_length();
        let widest = BurstGeometry::new(config.variant, BitDepth::Bits24, config.layout, false);

        Ok(Self {
            variant: config.variant,
            layout: config.layout,
            stride: config.channels,
            geometry,
            assemble_info: config.assemble_info,
            mark_empty_blocks: config.mark_empty_blocks,
            max_block_length,

            phase: Phase::AwaitingSync,
            word_in_sample: 0,
            position: 0,
            vsync: None,
            counter: 0,

            block_length: 0,
            payload_bits: 0,
            packer: None,
            pack_buffer: Vec::with_capacity(geometry.max_burst_bits(max_block_length).div_ceil(8) + 4),

            depth: geometry.depth(),
            kind: BurstKind::Null,
            burst_start: 0,
            unpacker: None,
            scratch: Vec::with_capacity(widest.max_burst_bits(max_block_length).div_ceil(8)),
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Samples processed since construction.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn geometry(&self) -> BurstGeometry {
        self.geometry
    }

    /// Wrap depth of the burst being read, or the configured depth when
    /// writing.
    pub fn depth(&self) -> BitDepth {
        self.depth
    }

    /// Moves the stream position forward without looking at any PCM.
    pub fn advance(&mut self, samples: usize) {
        self.position += samples as u64;
    }

    fn check_buffer(&self, len: usize, sample_count: usize) -> Result<(), FramerError> {
        let required = sample_count * self.stride;
        if len < required {
            return Err(FramerError::BufferTooShort {
                required,
                actual: len,
            });
        }
        Ok(())
    }

    #[inline]
    fn word_index(&self, sample: usize) -> usize {
        sample * self.stride + self.layout.first_channel() + self.word_in_sample
    }

    #[inline]
    fn advance_word(&mut self) {
        self.word_in_sample += 1;
        if self.word_in_sample == self.layout.words_per_sample() {
            self.word_in_sample = 0;
            self.position += 1;
        }
    }

    fn silence(&mut self, pcm: &mut [u32], sample: usize, samples: usize) {
        let first = self.layout.first_channel();
        let width = self.layout.words_per_sample();

        for s in sample..sample + samples {
            let base = s * self.stride + first;
            pcm[base..base + width].fill(0);
        }
        self.position += samples as u64;
    }

    /// Writes framed words for `sample_count` samples of interleaved `pcm`.
    ///
    /// `vsync` is the sample offset of a video frame start within this call.
    /// Only the embedding channels are written. A payload too large for its
    /// block is replaced by an empty block and reported once the whole range
    /// has been written.
    pub fn emit<S: BlockScheduler>(
        &mut self,
        pcm: &mut [u32],
        sample_count: usize,
        vsync: Option<usize>,
        scheduler: &mut S,
    ) -> Result<usize, FramerError> {
        self.check_buffer(pcm.len(), sample_count)?;

        let call_start = self.position;
        let end = call_start + sample_count as u64;
        if let Some(offset) = vsync {
            self.vsync = Some(call_start + offset as u64);
        }

        let mut deferred = None;

        while self.position < end {
            let sample = (self.position - call_start) as usize;
            let remaining = (end - self.position) as usize;

            match self.phase {
                Phase::AwaitingSync => {
                    if let Some(at) = self.vsync.filter(|&at| at < self.position) {
                        debug!("Dropping video sync at sample {at}, frame still in progress");
                        self.vsync = None;
                    }

                    let samples = self
                        .vsync
                        .map_or(remaining, |at| ((at - self.position) as usize).min(remaining));
                    self.silence(pcm, sample, samples);

                    if self.vsync == Some(self.position) {
                        trace!("Video sync at sample {}", self.position);
                        self.vsync = None;
                        self.counter = GUARD_BAND;
                        self.phase = Phase::GuardBand;
                    }
                }
                Phase::GuardBand | Phase::Padding => {
                    if self.word_in_sample != 0 {
                        let index = self.word_index(sample);
                        pcm[index] = 0;
                        self.advance_word();
                        continue;
                    }

                    let samples = self.counter.min(remaining);
                    self.silence(pcm, sample, samples);
                    self.counter -= samples;

                    if self.counter == 0 {
                        self.start_block(scheduler, &mut deferred);
                    }
                }
                _ => {
                    let word = self.emit_word()?;
                    let index = self.word_index(sample);
                    pcm[index] = word;
                    self.advance_word();
                }
            }
        }

        deferred.map_or(Ok(sample_count), Err)
    }

    fn start_block<S: BlockScheduler>(
        &mut self,
        scheduler: &mut S,
        deferred: &mut Option<FramerError>,
    ) {
        let Some(block) = scheduler.next_block() else {
            trace!("Frame complete at sample {}", self.position);
            self.phase = Phase::AwaitingSync;
            return;
        };

        let available = self.geometry.capacity_bits(block.length);
        let payload = if block.payload.bit_len() > available {
            let err = FramerError::CapacityExceeded {
                block: block.index,
                requested: block.payload.bit_len(),
                available,
            };
            log_at!(Level::Warn, err);
            deferred.get_or_insert(err);
            Payload::empty()
        } else {
            block.payload
        };

        trace!(
            "Block {} at sample {}: {} bits",
            block.index,
            self.position,
            payload.bit_len()
        );

        self.block_length = block.length;
        self.payload_bits = payload.bit_len();
        let buffer = std::mem::take(&mut self.pack_buffer);
        self.packer = Some(WordPacker::with_buffer(
            &payload,
            self.geometry.depth(),
            buffer,
        ));
        self.phase = Phase::PreambleA;
    }

    fn emit_word(&mut self) -> Result<u32, FramerError> {
        let depth = self.geometry.depth();
        let has_data = self.payload_bits > 0;
        let marked = has_data || self.mark_empty_blocks;

        let (word, next) = match self.phase {
            Phase::PreambleA => (if marked { depth.pa() } else { 0 }, Phase::PreambleB),
            Phase::PreambleB => (if marked { depth.pb() } else { 0 }, Phase::PreambleC),
            Phase::PreambleC if !has_data => (0, Phase::PreambleD),
            Phase::PreambleC => (
                pc_word(self.variant, depth, self.assemble_info),
                Phase::PreambleD,
            ),
            Phase::PreambleD => {
                let next = match self.variant {
                    _ if !has_data => Phase::Padding,
                    Variant::Legacy => Phase::Data,
                    Variant::SerialAdm => Phase::PreambleE,
                };
                (pd_word(depth, self.geometry.pd_value(self.payload_bits)), next)
            }
            Phase::PreambleE => (pe_word(depth), Phase::PreambleF),
            Phase::PreambleF if self.assemble_info => (0, Phase::SadmAssembleInfo),
            Phase::PreambleF => (0, Phase::SadmFormatInfo),
            Phase::SadmAssembleInfo => (ASSEMBLE_INFO_WORD, Phase::SadmFormatInfo),
            Phase::SadmFormatInfo => (FORMAT_INFO_WORD, Phase::Data),
            Phase::Data => {
                let word = match self.packer.as_mut() {
                    Some(packer) => packer.next_word()?.unwrap_or(0),
                    None => 0,
                };
                let done = self.packer.as_ref().is_none_or(|p| p.words_left() == 0);
                (word, if done { Phase::Padding } else { Phase::Data })
            }
            Phase::AwaitingSync | Phase::GuardBand | Phase::Padding => (0, self.phase),
        };

        if next == Phase::Padding {
            let used = self.geometry.burst_samples(self.payload_bits);
            self.counter = self.block_length.saturating_sub(used);
            if let Some(packer) = self.packer.take() {
                self.pack_buffer = packer.into_buffer();
            }
        }
        self.phase = next;

        Ok(word)
    }

    /// Scans `sample_count` samples of interleaved `pcm` for bursts.
    ///
    /// With `vsync` set and no burst in progress, samples before the given
    /// offset are skipped. Malformed bursts are reported to the observer and
    /// scanning resumes right after them.
    pub fn detect<O: BurstObserver>(
        &mut self,
        pcm: &[u32],
        sample_count: usize,
        vsync: Option<usize>,
        observer: &mut O,
    ) -> Result<usize, FramerError> {
        self.check_buffer(pcm.len(), sample_count)?;

        let call_start = self.position;
        let end = call_start + sample_count as u64;
        if let Some(offset) = vsync {
            self.vsync = Some(call_start + offset as u64);
        }

        while self.position < end {
            let sample = (self.position - call_start) as usize;

            match self.phase {
                Phase::AwaitingSync | Phase::GuardBand | Phase::Padding => match self.vsync {
                    Some(at) if at > self.position && self.word_in_sample == 0 => {
                        self.position = at.min(end);
                    }
                    _ => {
                        self.vsync = None;
                        self.phase = Phase::PreambleA;
                    }
                },
                _ => {
                    let at = self.position;
                    let word = pcm[self.word_index(sample)];
                    self.advance_word();
                    self.accept_word(word, at, observer)?;
                }
            }
        }

        Ok(sample_count)
    }

    fn accept_word<O: BurstObserver>(
        &mut self,
        word: u32,
        at: u64,
        observer: &mut O,
    ) -> Result<(), FramerError> {
        match self.phase {
            Phase::PreambleA => {
                if let Some(depth) = BitDepth::from_pa(word) {
                    self.depth = depth;
                    self.burst_start = at;
                    self.phase = Phase::PreambleB;
                }
            }
            Phase::PreambleB => {
                if word == self.depth.pb() {
                    self.phase = Phase::PreambleC;
                } else if let Some(depth) = BitDepth::from_pa(word) {
                    self.depth = depth;
                    self.burst_start = at;
                } else {
                    self.phase = Phase::PreambleA;
                }
            }
            Phase::PreambleC => {
                let kind = BurstKind::classify(word, self.depth);
                self.kind = kind;
                match kind {
                    BurstKind::Null => self.phase = Phase::PreambleD,
                    BurstKind::SerialAdm {
                        format_info: false,
                        ..
                    } if self.variant == Variant::SerialAdm => {
                        self.reject(BurstError::Uncompressed, observer)
                    }
                    kind if kind.variant() == Some(self.variant) => {
                        observer.sync_found(self.burst_start);
                        self.phase = Phase::PreambleD;
                    }
                    kind => {
                        debug!("Skipping {kind:?} burst at sample {}", self.burst_start);
                        self.phase = Phase::PreambleA;
                    }
                }
            }
            Phase::PreambleD => self.accept_length(self.depth.value(word), observer),
            Phase::PreambleE => {
                let expected = pe_word(self.depth);
                if word == expected {
                    self.phase = Phase::PreambleF;
                } else {
                    self.reject(
                        BurstError::WordMismatch {
                            word: "Pe",
                            expected,
                            found: word,
                        },
                        observer,
                    );
                }
            }
            Phase::PreambleF => {
                if word != 0 {
                    self.reject(
                        BurstError::WordMismatch {
                            word: "Pf",
                            expected: 0,
                            found: word,
                        },
                        observer,
                    );
                } else if matches!(
                    self.kind,
                    BurstKind::SerialAdm {
                        assemble_info: true,
                        ..
                    }
                ) {
                    self.phase = Phase::SadmAssembleInfo;
                } else {
                    self.phase = Phase::SadmFormatInfo;
                }
            }
            Phase::SadmAssembleInfo => self.phase = Phase::SadmFormatInfo,
            Phase::SadmFormatInfo => {
                if word == FORMAT_INFO_WORD {
                    self.begin_data(observer);
                } else {
                    self.reject(BurstError::UnsupportedFormat(word), observer);
                }
            }
            Phase::Data => {
                let complete = match self.unpacker.as_mut() {
                    Some(unpacker) => {
                        unpacker.push_word(word)?;
                        unpacker.is_complete()
                    }
                    None => true,
                };
                if complete {
                    self.finish_data(observer)?;
                }
            }
            Phase::AwaitingSync | Phase::GuardBand | Phase::Padding => {}
        }

        Ok(())
    }

    fn accept_length<O: BurstObserver>(&mut self, pd: u32, observer: &mut O) {
        let kind = self.kind;
        match kind {
            BurstKind::Null if pd != 0 => self.reject(BurstError::NullWithLength(pd), observer),
            BurstKind::Null => {
                observer.sync_found(self.burst_start);
                self.deliver_empty(observer);
            }
            _ if pd == 0 => self.deliver_empty(observer),
            kind => {
                let assemble_info = matches!(
                    kind,
                    BurstKind::SerialAdm {
                        assemble_info: true,
                        ..
                    }
                );
                let geometry =
                    BurstGeometry::new(self.variant, self.depth, self.layout, assemble_info);

                let Some(bits) = geometry.payload_bits_from_pd(pd) else {
                    self.reject(
                        BurstError::TruncatedHeader { bits: pd as usize },
                        observer,
                    );
                    return;
                };

                let max = geometry.max_burst_bits(self.max_block_length);
                if bits > max {
                    self.reject(BurstError::TooLong { bits, max }, observer);
                    return;
                }

                self.payload_bits = bits;
                match self.variant {
                    Variant::Legacy => self.begin_data(observer),
                    Variant::SerialAdm => self.phase = Phase::PreambleE,
                }
            }
        }
    }

    fn begin_data<O: BurstObserver>(&mut self, observer: &mut O) {
        if self.payload_bits == 0 {
            self.deliver_empty(observer);
            return;
        }

        let buffer = std::mem::take(&mut self.scratch);
        self.unpacker = Some(WordUnpacker::new(buffer, self.depth, self.payload_bits));
        self.phase = Phase::Data;
    }

    fn finish_data<O: BurstObserver>(&mut self, observer: &mut O) -> Result<(), FramerError> {
        if let Some(unpacker) = self.unpacker.take() {
            let bytes = unpacker.finish()?;
            trace!(
                "Burst at sample {}: {} bits",
                self.burst_start, self.payload_bits
            );
            observer.block_decoded(self.burst_start, &bytes, self.payload_bits);
            self.scratch = bytes;
        }

        self.phase = Phase::AwaitingSync;
        Ok(())
    }

    fn deliver_empty<O: BurstObserver>(&mut self, observer: &mut O) {
        observer.block_decoded(self.burst_start, &[], 0);
        self.phase = Phase::AwaitingSync;
    }

    fn reject<O: BurstObserver>(&mut self, error: BurstError, observer: &mut O) {
        debug!("Rejecting burst at sample {}: {error}", self.burst_start);
        observer.burst_rejected(self.burst_start, error);
        self.phase = Phase::PreambleA;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::preamble::{PA_20, PB_20, PA_24, PB_24};
    use crate::structs::timing::FrameRate;

    const SENTINEL: u32 = 0x1111_1111;

    struct Blocks {
        payloads: Vec<Payload>,
        next: usize,
    }

    impl Blocks {
        fn new(payloads: Vec<Payload>) -> Self {
            Self { payloads, next: 0 }
        }
    }

    impl BlockScheduler for Blocks {
        fn next_block(&mut self) -> Option<ScheduledBlock> {
            let payload = self.payloads.get(self.next)?.clone();
            self.next += 1;
            Some(ScheduledBlock {
                index: self.next - 1,
                length: 128,
                payload,
            })
        }
    }

    #[derive(Default)]
    struct Recorder {
        syncs: Vec<u64>,
        blocks: Vec<(u64, Vec<u8>, usize)>,
        rejected: Vec<(u64, BurstError)>,
    }

    impl BurstObserver for Recorder {
        fn sync_found(&mut self, position: u64) {
            self.syncs.push(position);
        }

        fn block_decoded(&mut self, position: u64, bytes: &[u8], bit_len: usize) {
            self.blocks.push((position, bytes.to_vec(), bit_len));
        }

        fn burst_rejected(&mut self, position: u64, error: BurstError) {
            self.rejected.push((position, error));
        }
    }

    fn legacy_quad() -> StreamConfig {
        StreamConfig::new(FrameRate::R25, Variant::Legacy, ChannelLayout::Pair(2), 4)
    }

    const PAYLOAD: [u8; 8] = [0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF];

    fn emitted() -> anyhow::Result<Vec<u32>> {
        let mut framer = BurstFramer::new(&legacy_quad(), &FrameTimingTable::STANDARD)?;
        let mut pcm = vec![SENTINEL; 4 * 400];
        let mut blocks = Blocks::new(vec![Payload::new(PAYLOAD.to_vec())]);

        framer.emit(&mut pcm, 400, Some(0), &mut blocks)?;
        Ok(pcm)
    }

    #[test]
    fn emit_places_burst_after_guard_band() -> anyhow::Result<()> {
        let pcm = emitted()?;
        let pair = |sample: usize| (pcm[sample * 4 + 2], pcm[sample * 4 + 3]);

        for sample in 0..400 {
            assert_eq!(pcm[sample * 4], SENTINEL);
            assert_eq!(pcm[sample * 4 + 1], SENTINEL);
        }
        for sample in 0..32 {
            assert_eq!(pair(sample), (0, 0));
        }

        assert_eq!(pair(32), (PA_20, PB_20));
        assert_eq!(pair(33), (0x013B_0000, 64 << 12));
        assert_eq!(pair(34), (0x0123_4000, 0x5678_9000));
        assert_eq!(pair(35), (0xABCD_E000, 0xF000_0000));

        for sample in 36..400 {
            assert_eq!(pair(sample), (0, 0));
        }
        Ok(())
    }

    #[test]
    fn emit_keeps_one_pack_buffer() -> anyhow::Result<()> {
        let mut framer = BurstFramer::new(&legacy_quad(), &FrameTimingTable::STANDARD)?;
        let allocation = framer.pack_buffer.as_ptr();
        let mut pcm = vec![0u32; 4 * 400];
        let mut blocks = Blocks::new(vec![
            Payload::new(PAYLOAD.to_vec()),
            Payload::new(vec![0x77; 300]),
        ]);

        framer.emit(&mut pcm, 400, Some(0), &mut blocks)?;

        assert!(framer.packer.is_none());
        assert_eq!(framer.pack_buffer.as_ptr(), allocation);
        Ok(())
    }

    #[test]
    fn emit_resumes_across_calls() -> anyhow::Result<()> {
        let mut framer = BurstFramer::new(&legacy_quad(), &FrameTimingTable::STANDARD)?;
        let mut pcm = vec![SENTINEL; 4 * 400];
        let mut blocks = Blocks::new(vec![Payload::new(PAYLOAD.to_vec())]);

        for (i, chunk) in pcm.chunks_mut(4).enumerate() {
            let vsync = (i == 0).then_some(0);
            framer.emit(chunk, 1, vsync, &mut blocks)?;
        }

        assert_eq!(pcm, emitted()?);
        assert_eq!(framer.position(), 400);
        assert_eq!(framer.phase(), Phase::AwaitingSync);
        Ok(())
    }

    #[test]
    fn detect_one_sample_at_a_time() -> anyhow::Result<()> {
        let pcm = emitted()?;
        let mut framer = BurstFramer::new(&legacy_quad(), &FrameTimingTable::STANDARD)?;
        let mut recorder = Recorder::default();

        for chunk in pcm.chunks(4) {
            framer.detect(chunk, 1, None, &mut recorder)?;
        }

        assert_eq!(recorder.syncs, vec![32]);
        assert_eq!(recorder.blocks, vec![(32, PAYLOAD.to_vec(), 64)]);
        assert!(recorder.rejected.is_empty());
        Ok(())
    }

    #[test]
    fn oversized_payload_becomes_null_burst() -> anyhow::Result<()> {
        let config = legacy_quad().with_mark_empty_blocks(true);
        let mut framer = BurstFramer::new(&config, &FrameTimingTable::STANDARD)?;
        let mut pcm = vec![0u32; 4 * 200];
        let capacity = framer.geometry().capacity_bytes(128);
        let mut blocks = Blocks::new(vec![Payload::new(vec![0x55; capacity + 1])]);

        let result = framer.emit(&mut pcm, 200, Some(0), &mut blocks);
        assert!(matches!(
            result,
            Err(FramerError::CapacityExceeded { block: 0, .. })
        ));

        assert_eq!((pcm[32 * 4 + 2], pcm[32 * 4 + 3]), (PA_20, PB_20));
        assert_eq!((pcm[33 * 4 + 2], pcm[33 * 4 + 3]), (0, 0));
        assert!(pcm[34 * 4..].iter().all(|&w| w == 0));
        assert_eq!(framer.position(), 200);
        Ok(())
    }

    #[test]
    fn unmarked_empty_block_is_silent() -> anyhow::Result<()> {
        let mut framer = BurstFramer::new(&legacy_quad(), &FrameTimingTable::STANDARD)?;
        let mut pcm = vec![SENTINEL; 4 * 200];
        let mut blocks = Blocks::new(vec![Payload::empty()]);

        framer.emit(&mut pcm, 200, Some(10), &mut blocks)?;

        for sample in 0..200 {
            assert_eq!((pcm[sample * 4 + 2], pcm[sample * 4 + 3]), (0, 0));
        }
        Ok(())
    }

    #[test]
    fn sadm_header_words() -> anyhow::Result<()> {
        let config = StreamConfig::new(FrameRate::R50, Variant::SerialAdm, ChannelLayout::Single(0), 1)
            .with_assemble_info(true);
        let mut framer = BurstFramer::new(&config, &FrameTimingTable::STANDARD)?;
        let mut pcm = vec![0u32; 960];
        let mut blocks = Blocks::new(vec![Payload::new(vec![0xAB, 0xCD, 0xEF])]);

        framer.emit(&mut pcm, 960, Some(0), &mut blocks)?;

        assert_eq!(
            &pcm[32..41],
            &[
                PA_24,
                PB_24,
                0x075F_0000,
                (24 + 4 * 24) << 8,
                1 << 8,
                0,
                ASSEMBLE_INFO_WORD,
                FORMAT_INFO_WORD,
                0xABCD_EF00,
            ]
        );

        let mut reader = BurstFramer::new(&config, &FrameTimingTable::STANDARD)?;
        let mut recorder = Recorder::default();
        reader.detect(&pcm, 960, None, &mut recorder)?;
        assert_eq!(recorder.blocks, vec![(32, vec![0xAB, 0xCD, 0xEF], 24)]);
        Ok(())
    }

    #[test]
    fn detect_skips_foreign_and_rejects_bad_length() -> anyhow::Result<()> {
        let config = StreamConfig::new(FrameRate::R25, Variant::Legacy, ChannelLayout::Single(0), 1);
        let mut framer = BurstFramer::new(&config, &FrameTimingTable::STANDARD)?;
        let mut recorder = Recorder::default();

        let mut pcm = vec![0u32; 64];
        // Dolby E at 20 bits
        pcm[4..8].copy_from_slice(&[PA_20, PB_20, 0x003C_0000, 32 << 12]);
        // legacy burst longer than any block
        pcm[20..24].copy_from_slice(&[PA_20, PB_20, 0x013B_0000, 0xFFFF_F000]);

        framer.detect(&pcm, 64, None, &mut recorder)?;

        assert_eq!(recorder.syncs, vec![20]);
        assert!(recorder.blocks.is_empty());
        assert!(matches!(
            recorder.rejected.as_slice(),
            [(20, BurstError::TooLong { .. })]
        ));
        Ok(())
    }

    #[test]
    fn detect_waits_for_vsync() -> anyhow::Result<()> {
        let pcm = emitted()?;
        let mut framer = BurstFramer::new(&legacy_quad(), &FrameTimingTable::STANDARD)?;
        let mut recorder = Recorder::default();

        // the burst at sample 32 lies before the sync and is not seen
        framer.detect(&pcm, 400, Some(100), &mut recorder)?;
        assert!(recorder.syncs.is_empty());
        assert_eq!(framer.position(), 400);
        Ok(())
    }

    #[test]
    fn short_buffer_is_rejected() -> anyhow::Result<()> {
        let mut framer = BurstFramer::new(&legacy_quad(), &FrameTimingTable::STANDARD)?;
        let mut pcm = vec![0u32; 7];
        let mut blocks = Blocks::new(vec![]);

        assert!(matches!(
            framer.emit(&mut pcm, 2, None, &mut blocks),
            Err(FramerError::BufferTooShort { required: 8, actual: 7 })
        ));
        assert_eq!(framer.position(), 0);
        Ok(())
    }
}
