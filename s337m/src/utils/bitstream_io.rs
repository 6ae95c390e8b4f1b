//! Payload to PCM word packing.
//!
//! Payload bits travel MSB first, `depth` bits per PCM word, left-justified in
//! the 32-bit word. The last word is zero padded.

use std::fmt::{Debug, Formatter};
use std::io;

use bitstream_io::{BigEndian, BitRead, BitReader, BitWrite, BitWriter};

use crate::structs::burst::Payload;
use crate::structs::preamble::BitDepth;

fn tail_mask(bit_len: usize) -> u8 {
    match bit_len % 8 {
        0 => 0xFF,
        tail => 0xFFu8 << (8 - tail),
    }
}

/// Splits a payload into PCM words.
pub struct WordPacker {
    bs: BitReader<io::Cursor<Vec<u8>>, BigEndian>,
    depth: BitDepth,
    words_left: usize,
}

impl Debug for WordPacker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordPacker")
            .field("depth", &self.depth)
            .field("words_left", &self.words_left)
            .finish()
    }
}

impl WordPacker {
    pub fn new(payload: &Payload, depth: BitDepth) -> Self {
        Self::with_buffer(payload, depth, Vec::new())
    }

    /// Copies the payload into `buffer`, reusing its allocation.
    pub fn with_buffer(payload: &Payload, depth: BitDepth, mut buffer: Vec<u8>) -> Self {
        let bits = depth.bits() as usize;
        let bit_len = payload.bit_len();
        let words = bit_len.div_ceil(bits);

        buffer.clear();
        buffer.extend_from_slice(&payload.bytes()[..bit_len.div_ceil(8)]);
        if let Some(last) = buffer.last_mut() {
            *last &= tail_mask(bit_len);
        }
        buffer.resize((words * bits).div_ceil(8), 0);

        Self {
            bs: BitReader::new(io::Cursor::new(buffer)),
            depth,
            words_left: words,
        }
    }

    /// Hands the buffer back for the next payload.
    pub fn into_buffer(self) -> Vec<u8> {
        self.bs.into_reader().into_inner()
    }

    pub fn words_left(&self) -> usize {
        self.words_left
    }

    /// Next PCM word, `None` once the payload is exhausted.
    #[inline]
    pub fn next_word(&mut self) -> io::Result<Option<u32>> {
        if self.words_left == 0 {
            return Ok(None);
        }

        let value: u32 = self.bs.read_unsigned_var(self.depth.bits())?;
        self.words_left -= 1;
        Ok(Some(self.depth.word(value)))
    }
}

/// Collects PCM words back into payload bytes.
pub struct WordUnpacker {
    bs: BitWriter<Vec<u8>, BigEndian>,
    depth: BitDepth,
    words_left: usize,
    payload_bits: usize,
}

impl Debug for WordUnpacker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordUnpacker")
            .field("depth", &self.depth)
            .field("words_left", &self.words_left)
            .field("payload_bits", &self.payload_bits)
            .finish()
    }
}

impl WordUnpacker {
    /// Reuses `buffer`'s allocation for the payload.
    pub fn new(mut buffer: Vec<u8>, depth: BitDepth, payload_bits: usize) -> Self {
        buffer.clear();

        Self {
            bs: BitWriter::new(buffer),
            depth,
            words_left: payload_bits.div_ceil(depth.bits() as usize),
            payload_bits,
        }
    }

    pub fn words_left(&self) -> usize {
        self.words_left
    }

    pub fn is_complete(&self) -> bool {
        self.words_left == 0
    }

    #[inline]
    pub fn push_word(&mut self, word: u32) -> io::Result<()> {
        debug_assert!(self.words_left > 0);
        self.bs
            .write_unsigned_var(self.depth.bits(), self.depth.value(word))?;
        self.words_left = self.words_left.saturating_sub(1);
        Ok(())
    }

    /// Payload bytes, truncated to the announced bit length.
    pub fn finish(mut self) -> io::Result<Vec<u8>> {
        self.bs.byte_align()?;

        let mut bytes = self.bs.into_writer();
        bytes.truncate(self.payload_bits.div_ceil(8));
        if let Some(last) = bytes.last_mut() {
            *last &= tail_mask(self.payload_bits);
        }
        Ok(bytes)
    }
}

#[test]
fn pack_twenty_bit_words() -> io::Result<()> {
    let payload = Payload::new(vec![0x12, 0x34, 0x56, 0x78, 0x9A]);
    let mut packer = WordPacker::new(&payload, BitDepth::Bits20);

    assert_eq!(packer.words_left(), 2);
    assert_eq!(packer.next_word()?, Some(0x1234_5000));
    assert_eq!(packer.next_word()?, Some(0x6789_A000));
    assert_eq!(packer.next_word()?, None);
    Ok(())
}

#[test]
fn pack_masks_bits_past_length() -> io::Result<()> {
    let payload = Payload::with_bit_len(vec![0xFF, 0xFF, 0xFF], 12).unwrap();
    let mut packer = WordPacker::new(&payload, BitDepth::Bits16);

    assert_eq!(packer.next_word()?, Some(0xFFF0_0000));
    assert_eq!(packer.next_word()?, None);
    Ok(())
}

#[test]
fn packer_reuses_its_buffer() -> io::Result<()> {
    let buffer = Vec::with_capacity(64);
    let allocation = buffer.as_ptr();

    let first = Payload::new(vec![0xAB; 20]);
    let mut packer = WordPacker::with_buffer(&first, BitDepth::Bits24, buffer);
    while packer.next_word()?.is_some() {}
    let buffer = packer.into_buffer();
    assert_eq!(buffer.as_ptr(), allocation);

    let second = Payload::new(vec![0x12, 0x34, 0x56]);
    let mut packer = WordPacker::with_buffer(&second, BitDepth::Bits24, buffer);
    assert_eq!(packer.next_word()?, Some(0x1234_5600));
    assert_eq!(packer.next_word()?, None);
    assert_eq!(packer.into_buffer().as_ptr(), allocation);
    Ok(())
}

#[test]
fn unpack_twenty_four_bit_words() -> io::Result<()> {
    let mut unpacker = WordUnpacker::new(Vec::with_capacity(8), BitDepth::Bits24, 40);

    unpacker.push_word(0xA1B2_C300)?;
    assert!(!unpacker.is_complete());
    unpacker.push_word(0xD4E5_FF00)?;
    assert!(unpacker.is_complete());

    assert_eq!(unpacker.finish()?, vec![0xA1, 0xB2, 0xC3, 0xD4, 0xE5]);
    Ok(())
}
