use log::{Level, debug, info};

use crate::log_at;
use crate::process::framer::{BurstFramer, BurstObserver};
use crate::process::{DecodedBlock, PayloadSink};
use crate::structs::config::StreamConfig;
use crate::structs::timing::{BLOCK_SIZE, FrameLayout, FrameTimingTable, GUARD_BAND};
use crate::utils::errors::{BurstError, ConfigError, DecodeError, FramerError};

/// Samples handed to the framer per scan step.
const SCAN_CHUNK: usize = BLOCK_SIZE;

/// Running totals of a [`DecodeDriver`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Blocks passed to the sink, empty ones included.
    pub blocks: u64,
    /// Blocks the sink failed to apply plus rejected bursts.
    pub failures: u64,
    /// Malformed bursts.
    pub rejected: u64,
    /// Frames started.
    pub frames: u64,
}

/// Outcome of one [`DecodeDriver::read`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadSummary {
    pub blocks: usize,
    pub failures: usize,
    /// Every video sync inferred during the call, in order, as sample offsets
    /// from the start of the call. An offset is negative when the sync lies
    /// in an earlier call's samples, up to one guard band back. Only filled
    /// when decoding without external sync.
    pub vsyncs: Vec<i64>,
}

#[derive(Debug, Default)]
struct FrameTracker {
    self_detecting: bool,
    previous_burst: Option<u64>,
    block_index: usize,
    frame_start: Option<u64>,
    next_vsync: Option<u64>,
    new_frame_pending: bool,
}

struct Observer<'a, K> {
    call_start: u64,
    tracker: &'a mut FrameTracker,
    sink: &'a mut K,
    error: &'a mut Option<String>,
    stats: &'a mut DecodeStats,
    summary: &'a mut ReadSummary,
}

impl<K: PayloadSink> Observer<'_, K> {
    fn fail(&mut self, err: DecodeError) {
        log_at!(Level::Warn, err);
        *self.error = Some(err.to_string());
        self.stats.failures += 1;
        self.summary.failures += 1;
    }
}

impl<K: PayloadSink> BurstObserver for Observer<'_, K> {
    fn sync_found(&mut self, position: u64) {
        let tracker = &mut *self.tracker;

        let opens_frame = if tracker.self_detecting {
            tracker
                .previous_burst
                .is_none_or(|previous| position - previous > BLOCK_SIZE as u64)
        } else {
            match tracker.next_vsync {
                Some(vsync) if position >= vsync => {
                    tracker.next_vsync = None;
                    true
                }
                _ => tracker.previous_burst.is_none(),
            }
        };

        if opens_frame {
            let frame_start = position.saturating_sub(GUARD_BAND as u64);
            debug!("Frame at sample {frame_start}, first burst at {position}");

            if tracker.self_detecting {
                if tracker.previous_burst.is_some() {
                    self.sink.new_frame();
                }
                self.summary
                    .vsyncs
                    .push(frame_start as i64 - self.call_start as i64);
            }

            tracker.block_index = 0;
            tracker.frame_start = Some(frame_start);
            tracker.new_frame_pending = true;
            self.stats.frames += 1;
        } else {
            tracker.block_index += 1;
        }

        tracker.previous_burst = Some(position);
    }

    fn block_decoded(&mut self, position: u64, bytes: &[u8], bit_len: usize) {
        let block = DecodedBlock {
            bytes,
            bit_len,
            block_index: self.tracker.block_index,
            is_new_frame: std::mem::take(&mut self.tracker.new_frame_pending),
            position,
        };

        self.stats.blocks += 1;
        self.summary.blocks += 1;

        if let Err(err) = self.sink.decode_block(&block) {
            self.fail(err);
        }
    }

    fn burst_rejected(&mut self, position: u64, error: BurstError) {
        self.tracker.new_frame_pending = false;
        self.stats.rejected += 1;
        self.fail(DecodeError::Burst { position, error });
    }
}

/// Recovers payloads from incoming PCM and hands them to a [`PayloadSink`].
///
/// In driven mode the caller passes video sync offsets to
/// [`read`](Self::read); nothing is decoded before the first one. With
/// `no_vsync` set, frames are inferred from burst spacing: a burst more than
/// one legacy block after its predecessor opens a new frame.
///
/// Decoding never stops on bad data. The most recent failure is kept in
/// [`error_flag`](Self::error_flag) and [`error_message`](Self::error_message)
/// until the next call to `read`.
///
/// # Example
///
/// ```rust
/// use s337m::process::decode::DecodeDriver;
/// use s337m::process::{DecodedBlock, PayloadSink};
/// use s337m::structs::burst::{ChannelLayout, Variant};
/// use s337m::structs::config::StreamConfig;
/// use s337m::structs::timing::FrameRate;
/// use s337m::utils::errors::DecodeError;
///
/// #[derive(Default)]
/// struct Latest(Vec<u8>);
///
/// impl PayloadSink for Latest {
///     fn decode_block(&mut self, block: &DecodedBlock<'_>) -> Result<(), DecodeError> {
///         self.0 = block.bytes.to_vec();
///         Ok(())
///     }
/// }
///
/// let config = StreamConfig::new(FrameRate::R25, Variant::Legacy, ChannelLayout::Pair(0), 2)
///     .with_no_vsync(true);
/// let mut decoder = DecodeDriver::new(config, Latest::default())?;
///
/// let pcm = vec![0u32; 2 * 1920];
/// let summary = decoder.read(&pcm, 1920, None)?;
/// assert_eq!(summary.blocks, 0);
/// assert!(!decoder.error_flag());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct DecodeDriver<K: PayloadSink> {
    config: StreamConfig,
    layout: FrameLayout,
    framer: BurstFramer,
    tracker: FrameTracker,
    sink: K,
    waiting: bool,
    error: Option<String>,
    stats: DecodeStats,
}

impl<K: PayloadSink> DecodeDriver<K> {
    pub fn new(config: StreamConfig, sink: K) -> Result<Self, ConfigError> {
        Self::with_timing(config, &FrameTimingTable::STANDARD, sink)
    }

    pub fn with_timing(
        config: StreamConfig,
        table: &FrameTimingTable,
        sink: K,
    ) -> Result<Self, ConfigError> {
        let framer = BurstFramer::new(&config, table)?;
        let layout = config.frame_layout(table);

        info!(
            "Decoding {:?} bursts at {} fps, {}",
            config.variant,
            config.frame_rate,
            if config.no_vsync {
                "inferring video sync"
            } else {
                "driven by video sync"
            }
        );

        Ok(Self {
            waiting: !config.no_vsync,
            tracker: FrameTracker {
                self_detecting: config.no_vsync,
                ..Default::default()
            },
            config,
            layout,
            framer,
            sink,
            error: None,
            stats: DecodeStats::default(),
        })
    }

    /// Scans `sample_count` samples of interleaved `pcm`.
    ///
    /// `vsync` is the offset of a video frame start within this call; it is
    /// ignored when decoding without external sync. Decoded blocks and frame
    /// starts reach the sink before this returns.
    ///
    /// # Errors
    ///
    /// Only [`FramerError`]s about the call itself, such as a short buffer.
    /// Problems with the stream are reported through the sticky error state
    /// and [`ReadSummary::failures`].
    pub fn read(
        &mut self,
        pcm: &[u32],
        sample_count: usize,
        vsync: Option<usize>,
    ) -> Result<ReadSummary, FramerError> {
        self.error = None;

        let stride = self.config.channels;
        if pcm.len() < sample_count * stride {
            return Err(FramerError::BufferTooShort {
                required: sample_count * stride,
                actual: pcm.len(),
            });
        }

        let mut summary = ReadSummary::default();
        let call_start = self.framer.position();

        let mut framer_vsync = None;
        if self.tracker.self_detecting {
            if let Some(offset) = vsync {
                debug!("Ignoring video sync at offset {offset}, inferring frames from bursts");
            }
        } else {
            if let Some(offset) = vsync {
                self.tracker.next_vsync = Some(call_start + offset as u64);
            }

            if self.waiting {
                let Some(offset) = vsync else {
                    self.framer.advance(sample_count);
                    return Ok(summary);
                };
                debug!("First video sync at sample {}", call_start + offset as u64);
                self.waiting = false;
                framer_vsync = Some(offset);
            }
        }

        let mut observer = Observer {
            call_start,
            tracker: &mut self.tracker,
            sink: &mut self.sink,
            error: &mut self.error,
            stats: &mut self.stats,
            summary: &mut summary,
        };

        let mut start = 0;
        while start < sample_count {
            let samples = SCAN_CHUNK.min(sample_count - start);
            let chunk = &pcm[start * stride..(start + samples) * stride];

            self.framer
                .detect(chunk, samples, framer_vsync.take(), &mut observer)?;
            start += samples;
        }

        Ok(summary)
    }

    /// Whether the last [`read`](Self::read) met a decode failure.
    pub fn error_flag(&self) -> bool {
        self.error.is_some()
    }

    /// Description of the last failure, empty when there was none.
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or_default()
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    /// Still waiting for the first external video sync.
    pub fn is_waiting_for_vsync(&self) -> bool {
        self.waiting
    }

    /// Index within its frame of the last burst found.
    pub fn block_index(&self) -> usize {
        self.tracker.block_index
    }

    /// Stream sample position of the current frame's video sync.
    pub fn frame_start(&self) -> Option<u64> {
        self.tracker.frame_start
    }

    /// Samples read since construction.
    pub fn position(&self) -> u64 {
        self.framer.position()
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn frame_layout(&self) -> &FrameLayout {
        &self.layout
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    pub fn into_sink(self) -> K {
        self.sink
    }
}
