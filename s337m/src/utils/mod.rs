//! Utility functions and supporting infrastructure.
//!
//! Provides payload word packing and the error types shared by the framer
//! and both drivers.

pub mod bitstream_io;
pub mod errors;
