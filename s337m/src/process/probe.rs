use log::debug;

use crate::process::encode::{Feeder, FrameCursor};
use crate::process::framer::BurstFramer;
use crate::process::{BlockRequest, PayloadSource};
use crate::structs::burst::Payload;
use crate::structs::config::StreamConfig;
use crate::structs::timing::FrameTimingTable;

/// Largest payload any configuration can carry in one frame: a 24-bit
/// serial ADM pair at 23.98 fps.
pub const MAX_BURST_BYTES: usize = 11_607;

/// How much of a candidate metadata set one frame can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WriteStatus {
    /// The candidate cannot be evaluated for this stream.
    Error,
    /// Mandatory records do not fit.
    Red,
    /// Mandatory records fit, some optional ones were dropped.
    Yellow,
    /// Everything fits.
    Green,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Mandatory,
    /// Records a frame can do without, such as element names.
    Optional,
}

/// One indivisible piece of an encoded metadata set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub kind: RecordKind,
    pub bytes: Vec<u8>,
}

/// Metadata set offered to a capacity probe.
///
/// # Example
///
/// ```rust
/// use s337m::process::probe::{CandidateFrame, WriteStatus, probe_frame};
/// use s337m::structs::burst::{ChannelLayout, Variant};
/// use s337m::structs::config::StreamConfig;
/// use s337m::structs::timing::FrameRate;
///
/// let config = StreamConfig::new(FrameRate::R25, Variant::Legacy, ChannelLayout::Pair(0), 2);
/// let candidate = CandidateFrame::new()
///     .mandatory(vec![0; 400])
///     .optional(vec![0; 1000]);
///
/// // a 1000 byte record is larger than any legacy block
/// assert_eq!(probe_frame(&config, &candidate), WriteStatus::Yellow);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateFrame {
    records: Vec<Record>,
}

impl CandidateFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mandatory(mut self, bytes: Vec<u8>) -> Self {
        self.push(Record {
            kind: RecordKind::Mandatory,
            bytes,
        });
        self
    }

    pub fn optional(mut self, bytes: Vec<u8>) -> Self {
        self.push(Record {
            kind: RecordKind::Optional,
            bytes,
        });
        self
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn total_bytes(&self) -> usize {
        self.records.iter().map(|r| r.bytes.len()).sum()
    }
}

/// Packs whole records into blocks, mandatory ones first.
struct ProbeSource<'a> {
    records: &'a [Record],
    order: Vec<usize>,
    written: Vec<bool>,
}

impl<'a> ProbeSource<'a> {
    fn new(candidate: &'a CandidateFrame) -> Self {
        let records = candidate.records();
        let mut order: Vec<usize> = (0..records.len()).collect();
        order.sort_by_key(|&i| records[i].kind == RecordKind::Optional);

        Self {
            records,
            order,
            written: vec![false; records.len()],
        }
    }

    fn status(&self) -> WriteStatus {
        let missing = |kind: RecordKind| {
            self.records
                .iter()
                .zip(&self.written)
                .any(|(record, &written)| record.kind == kind && !written)
        };

        if missing(RecordKind::Mandatory) {
            WriteStatus::Red
        } else if missing(RecordKind::Optional) {
            WriteStatus::Yellow
        } else {
            WriteStatus::Green
        }
    }
}

impl PayloadSource for ProbeSource<'_> {
    fn next_block(&mut self, request: &BlockRequest) -> Payload {
        let mut room = request.capacity_bytes();
        let mut bytes = Vec::with_capacity(room);

        for &i in &self.order {
            let record = &self.records[i].bytes;
            if !self.written[i] && record.len() <= room {
                bytes.extend_from_slice(record);
                room -= record.len();
                self.written[i] = true;
            }
        }

        Payload::new(bytes)
    }
}

/// Checks whether `candidate` fits one frame of a stream configured as
/// `config`, without an encoder instance.
pub fn probe_frame(config: &StreamConfig, candidate: &CandidateFrame) -> WriteStatus {
    probe_with(config, &FrameTimingTable::STANDARD, candidate)
}

pub(crate) fn probe_with(
    config: &StreamConfig,
    table: &FrameTimingTable,
    candidate: &CandidateFrame,
) -> WriteStatus {
    if candidate.total_bytes() > MAX_BURST_BYTES {
        debug!(
            "Candidate of {} bytes exceeds any frame capacity",
            candidate.total_bytes()
        );
        return WriteStatus::Error;
    }

    let mut framer = match BurstFramer::new(config, table) {
        Ok(framer) => framer,
        Err(err) => {
            debug!("Cannot probe: {err}");
            return WriteStatus::Error;
        }
    };

    let layout = config.frame_layout(table);
    let frame_length = layout.frame_length();
    let mut pcm = vec![0u32; frame_length * config.channels];
    let mut source = ProbeSource::new(candidate);
    let mut cursor = FrameCursor::default();
    let mut feeder = Feeder {
        layout: &layout,
        geometry: framer.geometry(),
        cursor: &mut cursor,
        source: &mut source,
    };

    if let Err(err) = framer.emit(&mut pcm, frame_length, Some(0), &mut feeder) {
        debug!("Probe frame failed: {err}");
        return WriteStatus::Error;
    }

    source.status()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::encode::EncodeDriver;
    use crate::structs::burst::{BurstGeometry, ChannelLayout, Variant};
    use crate::structs::preamble::BitDepth;
    use crate::structs::timing::{FrameLayout, FrameRate};

    fn sadm_pair() -> StreamConfig {
        StreamConfig::new(FrameRate::R25, Variant::SerialAdm, ChannelLayout::Pair(0), 2)
    }

    fn sadm_capacity(config: &StreamConfig) -> usize {
        let layout = config.frame_layout(&FrameTimingTable::STANDARD);
        config.geometry().capacity_bytes(layout.block_length(0))
    }

    #[test]
    fn sadm_capacity_edge() {
        let config = sadm_pair();
        let capacity = sadm_capacity(&config);
        assert_eq!(capacity, 11_115);

        let under = CandidateFrame::new().mandatory(vec![0x5A; capacity - 1]);
        assert_eq!(probe_frame(&config, &under), WriteStatus::Green);

        let exact = CandidateFrame::new().mandatory(vec![0x5A; capacity]);
        assert_eq!(probe_frame(&config, &exact), WriteStatus::Green);

        let over = CandidateFrame::new().mandatory(vec![0x5A; capacity + 1]);
        assert_eq!(probe_frame(&config, &over), WriteStatus::Red);

        let names = CandidateFrame::new()
            .mandatory(vec![0; capacity - 10])
            .optional(vec![0; 11]);
        assert_eq!(probe_frame(&config, &names), WriteStatus::Yellow);
    }

    #[test]
    fn legacy_records_spread_over_blocks() {
        let config = StreamConfig::new(FrameRate::R25, Variant::Legacy, ChannelLayout::Pair(0), 2);

        let spread = CandidateFrame::new()
            .mandatory(vec![1; 500])
            .optional(vec![2; 300])
            .mandatory(vec![3; 700]);
        assert_eq!(probe_frame(&config, &spread), WriteStatus::Green);

        let too_wide = CandidateFrame::new().mandatory(vec![1; 800]);
        assert_eq!(probe_frame(&config, &too_wide), WriteStatus::Red);

        let names = CandidateFrame::new()
            .mandatory(vec![1; 500])
            .optional(vec![2; 800]);
        assert_eq!(probe_frame(&config, &names), WriteStatus::Yellow);
    }

    #[test]
    fn hard_failures() {
        let huge = CandidateFrame::new().mandatory(vec![0; MAX_BURST_BYTES + 1]);
        assert_eq!(probe_frame(&sadm_pair(), &huge), WriteStatus::Error);

        let bad = StreamConfig::new(FrameRate::R25, Variant::SerialAdm, ChannelLayout::Pair(0), 3);
        let small = CandidateFrame::new().mandatory(vec![0; 8]);
        assert_eq!(probe_frame(&bad, &small), WriteStatus::Error);

        assert_eq!(probe_frame(&sadm_pair(), &CandidateFrame::new()), WriteStatus::Green);
    }

    #[test]
    fn probe_is_idempotent() -> anyhow::Result<()> {
        let source = |_: &BlockRequest| Payload::new(vec![7; 32]);
        let mut encoder = EncodeDriver::new(sadm_pair(), source)?;
        let mut pcm = vec![0u32; 2 * 1000];
        encoder.write(&mut pcm, 1000, Some(0))?;

        let before = (encoder.position(), encoder.block_index());
        let candidate = CandidateFrame::new()
            .mandatory(vec![0; 9000])
            .optional(vec![0; 2200]);

        let first = encoder.probe_capacity(&candidate);
        let second = encoder.probe_capacity(&candidate);

        assert_eq!(first, WriteStatus::Yellow);
        assert_eq!(first, second);
        assert_eq!((encoder.position(), encoder.block_index()), before);
        Ok(())
    }

    #[test]
    fn max_burst_bytes_is_worst_case() {
        let mut worst = 0;
        for rate in FrameRate::ALL {
            for variant in [Variant::Legacy, Variant::SerialAdm] {
                let layout = FrameLayout::new(&FrameTimingTable::STANDARD, rate, variant);
                for depth in BitDepth::ALL {
                    let geometry = BurstGeometry::new(variant, depth, ChannelLayout::Pair(0), false);
                    let frame: usize = (0..layout.block_count())
                        .map(|i| geometry.capacity_bytes(layout.block_length(i)))
                        .sum();
                    worst = worst.max(frame);
                }
            }
        }
        assert_eq!(worst, MAX_BURST_BYTES);
    }
}
