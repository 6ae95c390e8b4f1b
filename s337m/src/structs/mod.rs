//! Data structures describing the burst stream.
//!
//! Contains the frame timing table, the preamble words and bit depths, the
//! burst geometry derived from a stream's configuration, and the
//! configuration itself.

pub mod burst;
pub mod config;
pub mod preamble;
pub mod timing;
