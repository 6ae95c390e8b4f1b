#![doc = include_str!("../README.md")]
//!
//! ## Technical Overview
//!
//! Metadata travels as SMPTE 337m bursts embedded in the PCM channels of a
//! video-locked audio stream. Each burst opens with four preamble words:
//!
//! - **Pa/Pb**: sync words that also identify the word depth (16, 20 or 24 bits)
//! - **Pc**: data type, data mode and the key/flag bits of the burst variant
//! - **Pd**: payload length in bits
//!
//! ### Burst Variants
//!
//! - **Legacy**: one burst per 160-sample block, two to twelve blocks per frame
//! - **Serial ADM**: a single burst spanning the frame, carrying a
//!   gzip-compressed document behind a short header
//!
//! Bursts never start within 32 samples of a video frame boundary, so a frame
//! stays intact when the stream is cut on frame edges.
//!
//! ## Quick Start
//!
//! 1. Describe the stream with a [`structs::config::StreamConfig`]
//! 2. Embed payloads with [`process::encode::EncodeDriver`]
//! 3. Recover them with [`process::decode::DecodeDriver`]
//!
//! ```rust
//! use s337m::process::{BlockRequest, DecodedBlock, PayloadSink};
//! use s337m::process::decode::DecodeDriver;
//! use s337m::process::encode::EncodeDriver;
//! use s337m::structs::burst::{ChannelLayout, Payload, Variant};
//! use s337m::structs::config::StreamConfig;
//! use s337m::structs::timing::FrameRate;
//! use s337m::utils::errors::DecodeError;
//!
//! #[derive(Default)]
//! struct Collect(Vec<Vec<u8>>);
//!
//! impl PayloadSink for Collect {
//!     fn decode_block(&mut self, block: &DecodedBlock<'_>) -> Result<(), DecodeError> {
//!         if !block.is_empty() {
//!             self.0.push(block.bytes.to_vec());
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let config = StreamConfig::new(FrameRate::R25, Variant::Legacy, ChannelLayout::Pair(0), 2);
//! let source = |request: &BlockRequest| Payload::new(vec![request.block_index as u8; 8]);
//!
//! let mut encoder = EncodeDriver::new(config.clone(), source)?;
//! let mut pcm = vec![0u32; 2 * 1920];
//! encoder.write(&mut pcm, 1920, Some(0))?;
//!
//! let mut decoder = DecodeDriver::new(config.with_no_vsync(true), Collect::default())?;
//! decoder.read(&pcm, 1920, None)?;
//!
//! let blocks = &decoder.sink().0;
//! assert_eq!(blocks.len(), 12);
//! assert_eq!(blocks[3], vec![3u8; 8]);
//! # Ok::<(), anyhow::Error>(())
//! ```

/// Burst writing, reading and capacity checks.
///
/// 1. **Framing** ([`process::framer`]): Places and detects bursts in PCM.
///
/// 2. **Encoding** ([`process::encode`]): Drives the framer from a payload
///    source, one payload per block.
///
/// 3. **Decoding** ([`process::decode`]): Drives the framer into a payload
///    sink and tracks frame boundaries.
///
/// 4. **Probing** ([`process::probe`]): Tells whether a metadata set fits a
///    frame.
pub mod process;

/// Data structures describing the burst stream.
///
/// - **Timing** ([`structs::timing`]): Frame rates and block layout
/// - **Preambles** ([`structs::preamble`]): Sync words and burst info
/// - **Bursts** ([`structs::burst`]): Capacity and payloads
/// - **Configuration** ([`structs::config`]): Stream settings
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Word Packing** ([`utils::bitstream_io`]): Payload bits to PCM words
/// - **Error Handling** ([`utils::errors`]): Error types
pub mod utils;
