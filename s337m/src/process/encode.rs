use log::{debug, info};

use crate::process::framer::{BlockScheduler, BurstFramer, ScheduledBlock};
use crate::process::probe::{CandidateFrame, WriteStatus, probe_with};
use crate::process::{BlockRequest, PayloadSource};
use crate::structs::burst::BurstGeometry;
use crate::structs::config::StreamConfig;
use crate::structs::timing::{FrameLayout, FrameTimingTable};
use crate::utils::errors::{ConfigError, FramerError};

/// Block position within the frame being written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FrameCursor {
    block: Option<usize>,
}

/// Bridges the framer's block requests to a [`PayloadSource`].
pub(crate) struct Feeder<'a, S> {
    pub(crate) layout: &'a FrameLayout,
    pub(crate) geometry: BurstGeometry,
    pub(crate) cursor: &'a mut FrameCursor,
    pub(crate) source: &'a mut S,
}

impl<S: PayloadSource> BlockScheduler for Feeder<'_, S> {
    fn next_block(&mut self) -> Option<ScheduledBlock> {
        let index = match self.cursor.block {
            None => {
                self.source.new_frame();
                0
            }
            Some(previous) => previous + 1,
        };

        if index >= self.layout.block_count() {
            self.cursor.block = None;
            return None;
        }
        self.cursor.block = Some(index);

        let length = self.layout.block_length(index);
        let request = BlockRequest {
            variant: self.layout.variant(),
            block_index: index,
            block_count: self.layout.block_count(),
            capacity_bits: self.geometry.capacity_bits(length),
        };
        let payload = self.source.next_block(&request);

        Some(ScheduledBlock {
            index,
            length,
            payload,
        })
    }
}

/// Embeds payloads from a [`PayloadSource`] into outgoing PCM.
///
/// # Example
///
/// ```rust
/// use s337m::process::BlockRequest;
/// use s337m::process::encode::EncodeDriver;
/// use s337m::structs::burst::{ChannelLayout, Payload, Variant};
/// use s337m::structs::config::StreamConfig;
/// use s337m::structs::timing::FrameRate;
///
/// let config = StreamConfig::new(FrameRate::R25, Variant::Legacy, ChannelLayout::Pair(0), 2);
/// let source = |request: &BlockRequest| {
///     if request.block_index == 0 {
///         Payload::new(vec![0xA5; 16])
///     } else {
///         Payload::empty()
///     }
/// };
/// let mut encoder = EncodeDriver::new(config, source)?;
///
/// // one video frame of stereo PCM
/// let mut pcm = vec![0u32; 2 * 1920];
/// encoder.write(&mut pcm, 1920, Some(0))?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct EncodeDriver<S: PayloadSource> {
    config: StreamConfig,
    timing: FrameTimingTable,
    layout: FrameLayout,
    framer: BurstFramer,
    cursor: FrameCursor,
    source: S,
}

impl<S: PayloadSource> EncodeDriver<S> {
    pub fn new(config: StreamConfig, source: S) -> Result<Self, ConfigError> {
        Self::with_timing(config, &FrameTimingTable::STANDARD, source)
    }

    pub fn with_timing(
        config: StreamConfig,
        table: &FrameTimingTable,
        source: S,
    ) -> Result<Self, ConfigError> {
        let framer = BurstFramer::new(&config, table)?;
        let layout = config.frame_layout(table);

        info!(
            "Encoding {:?} bursts at {} fps, {}, {} blocks per frame",
            config.variant,
            config.frame_rate,
            config.bit_depth(),
            layout.block_count()
        );

        Ok(Self {
            config,
            timing: *table,
            layout,
            framer,
            cursor: FrameCursor::default(),
            source,
        })
    }

    /// Writes bursts into `sample_count` samples of interleaved `pcm`.
    ///
    /// `vsync` is the offset of a video frame start within this call, if one
    /// falls inside it. Channels outside the embedding layout are left
    /// untouched.
    ///
    /// # Errors
    ///
    /// [`FramerError::BufferTooShort`] when `pcm` holds fewer than
    /// `sample_count` sample-sets, leaving the stream untouched.
    /// [`FramerError::CapacityExceeded`] when the source returned a payload
    /// larger than its block; the block is written empty and the rest of the
    /// range is still processed.
    pub fn write(
        &mut self,
        pcm: &mut [u32],
        sample_count: usize,
        vsync: Option<usize>,
    ) -> Result<usize, FramerError> {
        if let Some(offset) = vsync {
            debug!(
                "Video sync at sample {}",
                self.framer.position() + offset as u64
            );
        }

        let mut feeder = Feeder {
            layout: &self.layout,
            geometry: self.framer.geometry(),
            cursor: &mut self.cursor,
            source: &mut self.source,
        };

        self.framer.emit(pcm, sample_count, vsync, &mut feeder)
    }

    /// Checks whether `candidate` fits one frame of this stream.
    ///
    /// Runs a full frame through a scratch framer; the stream itself is not
    /// touched, so repeated probes give the same answer.
    pub fn probe_capacity(&self, candidate: &CandidateFrame) -> WriteStatus {
        probe_with(&self.config, &self.timing, candidate)
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn frame_layout(&self) -> &FrameLayout {
        &self.layout
    }

    /// Block currently being written, `None` between frames.
    pub fn block_index(&self) -> Option<usize> {
        self.cursor.block
    }

    /// Samples written since construction.
    pub fn position(&self) -> u64 {
        self.framer.position()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::burst::{ChannelLayout, Payload, Variant};
    use crate::structs::preamble::{PA_20, PA_24};
    use crate::structs::timing::FrameRate;

    #[derive(Default)]
    struct Counting {
        frames: usize,
        requests: Vec<(usize, usize)>,
    }

    impl PayloadSource for Counting {
        fn next_block(&mut self, request: &BlockRequest) -> Payload {
            self.requests.push((self.frames, request.block_index));
            Payload::new(vec![request.block_index as u8; 4])
        }

        fn new_frame(&mut self) {
            self.frames += 1;
        }
    }

    #[test]
    fn new_frame_precedes_each_frame() -> anyhow::Result<()> {
        let config = StreamConfig::new(FrameRate::R50, Variant::Legacy, ChannelLayout::Pair(0), 2);
        let mut encoder = EncodeDriver::new(config, Counting::default())?;
        let mut pcm = vec![0u32; 2 * 960];

        for _ in 0..3 {
            encoder.write(&mut pcm, 960, Some(0))?;
        }

        let source = encoder.into_source();
        assert_eq!(source.frames, 3);
        assert_eq!(source.requests.len(), 3 * 6);
        assert_eq!(source.requests[0], (1, 0));
        assert_eq!(source.requests[5], (1, 5));
        assert_eq!(source.requests[6], (2, 0));
        Ok(())
    }

    #[test]
    fn legacy_blocks_land_on_schedule() -> anyhow::Result<()> {
        let config = StreamConfig::new(FrameRate::R25, Variant::Legacy, ChannelLayout::Pair(0), 2);
        let mut encoder = EncodeDriver::new(config, Counting::default())?;
        let mut pcm = vec![0u32; 2 * 1920];

        encoder.write(&mut pcm, 1920, Some(0))?;

        assert_eq!(pcm[2 * 32], PA_20);
        for block in 1..12 {
            assert_eq!(pcm[2 * 160 * block], PA_20, "block {block}");
        }
        assert_eq!(encoder.block_index(), None);
        assert_eq!(encoder.position(), 1920);
        Ok(())
    }

    #[test]
    fn other_channels_untouched() -> anyhow::Result<()> {
        let config = StreamConfig::new(FrameRate::R60, Variant::SerialAdm, ChannelLayout::Single(3), 6);
        let source = |_: &BlockRequest| Payload::new(b"<frame/>".to_vec());
        let mut encoder = EncodeDriver::new(config, source)?;

        let mut pcm: Vec<u32> = (0..6 * 800).map(|i| i as u32 | 0x8000_0000).collect();
        let original = pcm.clone();
        encoder.write(&mut pcm, 800, Some(0))?;

        for (i, (&now, &before)) in pcm.iter().zip(&original).enumerate() {
            if i % 6 != 3 {
                assert_eq!(now, before, "word {i}");
            }
        }
        assert_eq!(pcm[6 * 32 + 3], PA_24);
        Ok(())
    }

    #[test]
    fn vsync_mid_call() -> anyhow::Result<()> {
        let config = StreamConfig::new(FrameRate::R120, Variant::Legacy, ChannelLayout::Single(0), 1);
        let mut encoder = EncodeDriver::new(config, Counting::default())?;
        let mut pcm = vec![0u32; 1000];

        // nothing is written before the first sync
        encoder.write(&mut pcm[..300], 300, None)?;
        assert!(pcm[..300].iter().all(|&w| w == 0));

        encoder.write(&mut pcm[300..], 700, Some(250))?;
        assert_eq!(pcm[300 + 250 + 32], PA_20);
        assert_eq!(pcm[300 + 250 + 160], PA_20);
        Ok(())
    }

    #[test]
    fn oversized_payload_is_reported() -> anyhow::Result<()> {
        let config = StreamConfig::new(FrameRate::R25, Variant::SerialAdm, ChannelLayout::Pair(0), 2);
        let source = |request: &BlockRequest| Payload::new(vec![0; request.capacity_bytes() + 1]);
        let mut encoder = EncodeDriver::new(config, source)?;
        let mut pcm = vec![0u32; 2 * 1920];

        let result = encoder.write(&mut pcm, 1920, Some(0));
        assert!(matches!(result, Err(FramerError::CapacityExceeded { .. })));
        assert!(pcm.iter().all(|&w| w == 0));
        assert_eq!(encoder.position(), 1920);
        Ok(())
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = StreamConfig::new(FrameRate::R25, Variant::Legacy, ChannelLayout::Pair(3), 4);
        let source = |_: &BlockRequest| Payload::empty();
        assert!(EncodeDriver::new(config, source).is_err());
    }

    #[test]
    fn custom_timing_table_is_validated() {
        let config = StreamConfig::new(FrameRate::R50, Variant::SerialAdm, ChannelLayout::Pair(0), 2);
        let short = FrameTimingTable::new([48; FrameRate::COUNT]);
        let source = |_: &BlockRequest| Payload::empty();

        assert!(matches!(
            EncodeDriver::with_timing(config, &short, source),
            Err(ConfigError::ZeroCapacity)
        ));
    }
}
