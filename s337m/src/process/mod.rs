use crate::structs::burst::{Payload, Variant};
use crate::utils::errors::DecodeError;

/// Burst placement and detection inside a PCM word stream.
///
/// Provides the [`BurstFramer`](framer::BurstFramer) state machine shared by
/// both drivers.
pub mod framer;

/// Writing bursts into outgoing PCM.
///
/// Provides the [`EncodeDriver`](encode::EncodeDriver), which schedules one
/// payload per block and keeps bursts aligned to video frames.
pub mod encode;

/// Frame capacity checks for candidate metadata sets.
pub mod probe;

/// Reading bursts from incoming PCM.
///
/// Provides the [`DecodeDriver`](decode::DecodeDriver), which reassembles
/// payloads and infers frame boundaries.
pub mod decode;

/// Serial ADM document compression and the matching payload adapters.
pub mod sadm;

/// Describes the block the encoder is about to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRequest {
    pub variant: Variant,
    /// Position of the block within its frame.
    pub block_index: usize,
    pub block_count: usize,
    /// Largest payload, in bits, the block accepts.
    pub capacity_bits: usize,
}

impl BlockRequest {
    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bits / 8
    }
}

/// Supplies the bytes embedded by an [`EncodeDriver`](encode::EncodeDriver).
///
/// Calls arrive in stream order: `new_frame` once per video frame, then
/// `next_block` once for every block of that frame.
pub trait PayloadSource {
    /// Payload for the requested block. An empty payload leaves the block
    /// without data.
    fn next_block(&mut self, request: &BlockRequest) -> Payload;

    /// A new frame begins; called before its first block is requested.
    fn new_frame(&mut self) {}
}

impl<F> PayloadSource for F
where
    F: FnMut(&BlockRequest) -> Payload,
{
    fn next_block(&mut self, request: &BlockRequest) -> Payload {
        self(request)
    }
}

/// One payload recovered by a [`DecodeDriver`](decode::DecodeDriver).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedBlock<'a> {
    pub bytes: &'a [u8],
    pub bit_len: usize,
    pub block_index: usize,
    /// First block of a frame.
    pub is_new_frame: bool,
    /// Stream sample position of the burst's Pa word.
    pub position: u64,
}

impl DecodedBlock<'_> {
    pub fn is_empty(&self) -> bool {
        self.bit_len == 0
    }
}

/// Receives payloads recovered by a [`DecodeDriver`](decode::DecodeDriver).
pub trait PayloadSink {
    /// Applies one block. An error leaves previously applied state intact;
    /// decoding carries on with the next burst.
    fn decode_block(&mut self, block: &DecodedBlock<'_>) -> Result<(), DecodeError>;

    /// The previous frame is complete. Only raised when frames are inferred
    /// from burst spacing.
    fn new_frame(&mut self) {}
}
