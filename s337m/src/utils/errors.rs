/// Logs `$err` at `$level`.
///
/// Used on the stream paths that must keep running after a failure; the
/// caller decides how loud each kind of failure is.
#[macro_export]
macro_rules! log_at {
    ($level:expr, $err:expr $(,)?) => {{
        match $level {
            ::log::Level::Error => ::log::error!("{}", $err),
            ::log::Level::Warn => ::log::warn!("{}", $err),
            ::log::Level::Info => ::log::info!("{}", $err),
            ::log::Level::Debug => ::log::debug!("{}", $err),
            ::log::Level::Trace => ::log::trace!("{}", $err),
        }
    }};
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Unknown frame rate code {0}")]
    UnknownFrameRate(u8),

    #[error("Unsupported wrap bit depth {0}, expected 16, 20 or 24")]
    InvalidBitDepth(u8),

    #[error("PCM stream has no channels")]
    NoChannels,

    #[error("Pair layout needs an even channel count, got {0}")]
    OddPairStride(usize),

    #[error("Channel {channel} out of range for {channels} channel PCM")]
    ChannelOutOfRange { channel: usize, channels: usize },

    #[error("Assemble info is only carried by serial ADM bursts")]
    AssembleInfoWithoutSadm,

    #[error("Configuration leaves a block with no payload capacity")]
    ZeroCapacity,
}

#[derive(thiserror::Error, Debug)]
pub enum FramerError {
    #[error("PCM buffer holds {actual} words, {required} needed")]
    BufferTooShort { required: usize, actual: usize },

    #[error("Payload of {requested} bits exceeds capacity of {available} bits in block {block}")]
    CapacityExceeded {
        block: usize,
        requested: usize,
        available: usize,
    },

    #[error("Payload bit length {bit_len} exceeds its {bytes} bytes")]
    InvalidBitLength { bit_len: usize, bytes: usize },

    #[error("Bitstream I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A burst found on the read path that could not be accepted.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BurstError {
    #[error("Pd announces {bits} bits, block holds at most {max}")]
    TooLong { bits: usize, max: usize },

    #[error("Pd of {bits} bits is shorter than the serial ADM header")]
    TruncatedHeader { bits: usize },

    #[error("Null burst with non-zero Pd {0}")]
    NullWithLength(u32),

    #[error("Unexpected {word} word {found:#010X}, expected {expected:#010X}")]
    WordMismatch {
        word: &'static str,
        expected: u32,
        found: u32,
    },

    #[error("Uncompressed serial ADM bursts are not supported")]
    Uncompressed,

    #[error("Unsupported serial ADM format info {0:#010X}")]
    UnsupportedFormat(u32),
}

/// Failure to apply a decoded block.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("Payload decompression failed: {0}")]
    Decompress(String),

    #[error("Payload rejected: {0}")]
    Parse(String),

    #[error("Malformed burst at sample {position}: {error}")]
    Burst { position: u64, error: BurstError },
}

#[derive(thiserror::Error, Debug)]
pub enum SadmError {
    #[error("Compressed document of {size} bytes exceeds frame capacity of {capacity} bytes")]
    TooLarge { size: usize, capacity: usize },

    #[error("Compression failed: {0}")]
    Io(#[from] std::io::Error),
}
