//! Serial ADM frame payloads.
//!
//! A serial ADM burst carries one gzip-compressed document per video frame.
//! [`SadmSource`] and [`SadmSink`] adapt a document producer and consumer to
//! the encode and decode drivers.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::GzEncoder;
use log::{Level, trace};

use crate::log_at;
use crate::process::{BlockRequest, DecodedBlock, PayloadSink, PayloadSource};
use crate::structs::burst::Payload;
use crate::utils::errors::{DecodeError, SadmError};

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Compresses `document` for one frame of at most `capacity` bytes.
pub fn compress_document(document: &[u8], capacity: usize) -> Result<Vec<u8>, SadmError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(document)?;
    let compressed = encoder.finish()?;

    if compressed.len() > capacity {
        return Err(SadmError::TooLarge {
            size: compressed.len(),
            capacity,
        });
    }

    trace!(
        "Compressed {} byte document to {} bytes",
        document.len(),
        compressed.len()
    );
    Ok(compressed)
}

/// Inflates a frame payload. Both gzip and zlib wrappers are accepted.
pub fn decompress_document(bytes: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut document = Vec::new();

    let result = if bytes.starts_with(&GZIP_MAGIC) {
        GzDecoder::new(bytes).read_to_end(&mut document)
    } else {
        ZlibDecoder::new(bytes).read_to_end(&mut document)
    };
    result.map_err(|e| DecodeError::Decompress(e.to_string()))?;

    Ok(document)
}

/// Produces the serialized document for each frame.
pub trait DocumentSource {
    /// Document for the frame about to be written, `None` to send nothing.
    fn document(&mut self) -> Option<Vec<u8>>;
}

impl<F> DocumentSource for F
where
    F: FnMut() -> Option<Vec<u8>>,
{
    fn document(&mut self) -> Option<Vec<u8>> {
        self()
    }
}

/// Consumes documents recovered from the stream.
pub trait DocumentSink {
    fn apply(&mut self, document: &[u8], is_new_frame: bool) -> anyhow::Result<()>;

    /// The previous frame's document is final.
    fn frame_complete(&mut self) {}
}

/// [`PayloadSource`] that compresses one document per frame.
///
/// Documents that do not fit the frame are dropped and the frame is sent
/// empty.
#[derive(Debug)]
pub struct SadmSource<D> {
    documents: D,
    frames_sent: u64,
    frames_dropped: u64,
    last_error: Option<SadmError>,
}

impl<D: DocumentSource> SadmSource<D> {
    pub fn new(documents: D) -> Self {
        Self {
            documents,
            frames_sent: 0,
            frames_dropped: 0,
            last_error: None,
        }
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    /// Why the last dropped frame was dropped.
    pub fn last_error(&self) -> Option<&SadmError> {
        self.last_error.as_ref()
    }
}

impl<D: DocumentSource> PayloadSource for SadmSource<D> {
    fn next_block(&mut self, request: &BlockRequest) -> Payload {
        let Some(document) = self.documents.document() else {
            return Payload::empty();
        };

        match compress_document(&document, request.capacity_bytes()) {
            Ok(bytes) => {
                self.frames_sent += 1;
                Payload::new(bytes)
            }
            Err(err) => {
                log_at!(Level::Warn, err);
                self.frames_dropped += 1;
                self.last_error = Some(err);
                Payload::empty()
            }
        }
    }
}

/// [`PayloadSink`] that inflates each frame and hands the document on.
///
/// Decompression failures surface as [`DecodeError::Decompress`], documents
/// the consumer refuses as [`DecodeError::Parse`].
#[derive(Debug)]
pub struct SadmSink<D> {
    documents: D,
}

impl<D: DocumentSink> SadmSink<D> {
    pub fn new(documents: D) -> Self {
        Self { documents }
    }

    pub fn documents(&self) -> &D {
        &self.documents
    }

    pub fn into_documents(self) -> D {
        self.documents
    }
}

impl<D: DocumentSink> PayloadSink for SadmSink<D> {
    fn decode_block(&mut self, block: &DecodedBlock<'_>) -> Result<(), DecodeError> {
        if block.is_empty() {
            return Ok(());
        }

        let document = decompress_document(block.bytes)?;
        self.documents
            .apply(&document, block.is_new_frame)
            .map_err(|e| DecodeError::Parse(format!("{e:#}")))
    }

    fn new_frame(&mut self) {
        self.documents.frame_complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::decode::DecodeDriver;
    use crate::process::encode::EncodeDriver;
    use crate::structs::burst::{ChannelLayout, Variant};
    use crate::structs::config::StreamConfig;
    use crate::structs::timing::FrameRate;
    use anyhow::ensure;
    use flate2::write::ZlibEncoder;

    const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<frame version="1.0"><frameHeader><frameFormat frameFormatID="FF_00000001" type="full"/></frameHeader>
<audioFormatExtended><audioProgramme audioProgrammeID="APR_1001" audioProgrammeName="Main"/></audioFormatExtended></frame>"#;

    #[derive(Default)]
    struct Documents {
        received: Vec<String>,
        completed: usize,
    }

    impl DocumentSink for Documents {
        fn apply(&mut self, document: &[u8], _is_new_frame: bool) -> anyhow::Result<()> {
            let text = std::str::from_utf8(document)?;
            ensure!(text.starts_with("<?xml"), "not an XML document");
            self.received.push(text.to_string());
            Ok(())
        }

        fn frame_complete(&mut self) {
            self.completed += 1;
        }
    }

    #[test]
    fn document_round_trip() -> anyhow::Result<()> {
        let compressed = compress_document(DOCUMENT.as_bytes(), 4096)?;
        assert!(compressed.starts_with(&GZIP_MAGIC));
        assert!(compressed.len() < DOCUMENT.len());
        assert_eq!(decompress_document(&compressed)?, DOCUMENT.as_bytes());
        Ok(())
    }

    #[test]
    fn zlib_payload_accepted() -> anyhow::Result<()> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(DOCUMENT.as_bytes())?;
        let compressed = encoder.finish()?;

        assert_eq!(decompress_document(&compressed)?, DOCUMENT.as_bytes());
        Ok(())
    }

    #[test]
    fn oversized_document_rejected() {
        assert!(matches!(
            compress_document(DOCUMENT.as_bytes(), 16),
            Err(SadmError::TooLarge { capacity: 16, .. })
        ));
    }

    #[test]
    fn garbage_fails_decompression() {
        let result = decompress_document(&[0x1F, 0x8B, 0x08, 0x00, 0xDE, 0xAD]);
        assert!(matches!(result, Err(DecodeError::Decompress(_))));
    }

    fn sadm_stream(frames: usize) -> anyhow::Result<(StreamConfig, Vec<u32>)> {
        let config = StreamConfig::new(FrameRate::R30, Variant::SerialAdm, ChannelLayout::Pair(2), 4);
        let source = SadmSource::new(|| Some(DOCUMENT.as_bytes().to_vec()));
        let mut encoder = EncodeDriver::new(config.clone(), source)?;

        let mut pcm = vec![0u32; frames * 1600 * 4];
        for frame in pcm.chunks_mut(1600 * 4) {
            encoder.write(frame, 1600, Some(0))?;
        }
        assert_eq!(encoder.source().frames_sent(), frames as u64);
        Ok((config, pcm))
    }

    #[test]
    fn documents_survive_the_stream() -> anyhow::Result<()> {
        let (config, pcm) = sadm_stream(3)?;
        let mut decoder = DecodeDriver::new(config.with_no_vsync(true), SadmSink::new(Documents::default()))?;

        decoder.read(&pcm, 3 * 1600, None)?;
        assert!(!decoder.error_flag());

        let documents = decoder.into_sink().into_documents();
        assert_eq!(documents.received, vec![DOCUMENT.to_string(); 3]);
        assert_eq!(documents.completed, 2);
        Ok(())
    }

    #[test]
    fn decompression_and_parse_failures_differ() -> anyhow::Result<()> {
        let (config, mut pcm) = sadm_stream(2)?;
        // a word deep inside the first frame's compressed payload
        pcm[4 * 40 + 2] ^= 0x00FF_FF00;

        let mut decoder = DecodeDriver::new(config.with_no_vsync(true), SadmSink::new(Documents::default()))?;
        decoder.read(&pcm[..4 * 1600], 1600, None)?;
        assert!(decoder.error_flag());
        assert!(decoder.error_message().starts_with("Payload decompression failed"));

        decoder.read(&pcm[4 * 1600..], 1600, None)?;
        assert!(!decoder.error_flag());
        assert_eq!(decoder.sink().documents().received.len(), 1);

        let mut sink = SadmSink::new(Documents::default());
        let not_xml = compress_document(b"plain text", 64)?;
        let block = DecodedBlock {
            bytes: &not_xml,
            bit_len: not_xml.len() * 8,
            block_index: 0,
            is_new_frame: true,
            position: 0,
        };
        assert!(matches!(sink.decode_block(&block), Err(DecodeError::Parse(_))));
        Ok(())
    }

    #[test]
    fn source_drops_oversized_frames() {
        let big: Vec<u8> = (0..40_000u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8).collect();
        let mut source = SadmSource::new(move || Some(big.clone()));
        let request = BlockRequest {
            variant: Variant::SerialAdm,
            block_index: 0,
            block_count: 1,
            capacity_bits: 8 * 1024,
        };

        assert!(source.next_block(&request).is_empty());
        assert_eq!(source.frames_dropped(), 1);
        assert!(matches!(source.last_error(), Some(SadmError::TooLarge { .. })));
    }
}
