// lzw.rs
//
// Copyright (c) 2020-2023  Douglas Lau
//
//! Lempel-Ziv-Welch compression for GIF
use crate::error::{Error, Result};
use crate::sink::ByteSink;
use std::ops::AddAssign;

/// Number of slots in the code hash table (about 80% occupancy)
const TABLE_SZ: usize = 5003;

/// Shift for the primary hash probe, `8 - log2(65536 / TABLE_SZ)`
const HASH_SHIFT: u32 = 4;

/// Maximum data bytes in one image data sub-block
const SUB_BLOCK_SZ: usize = 254;

/// Code Bits
#[derive(Clone, Copy, Debug, PartialEq)]
struct Bits(u8);

impl From<u8> for Bits {
    fn from(bits: u8) -> Self {
        Bits(bits.min(Self::MAX.0))
    }
}

impl From<Bits> for u8 {
    fn from(bits: Bits) -> Self {
        bits.0
    }
}

impl AddAssign<u8> for Bits {
    fn add_assign(&mut self, rhs: u8) {
        self.0 = (self.0 + rhs).min(Self::MAX.0)
    }
}

impl Bits {
    /// Maximum code bits allowed for GIF
    const MAX: Self = Bits(12);

    /// Get the number of entries
    fn entries(self) -> u16 {
        1 << (self.0 as u16)
    }

    /// Get the largest code before the width must grow
    fn max_code(self) -> Code {
        if self == Self::MAX {
            self.entries()
        } else {
            self.entries() - 1
        }
    }
}

/// Code type
type Code = u16;

/// Code dictionary, open addressing with double hashing
struct CodeTable {
    /// Hash keys (`symbol << 12 | prefix`), negative for empty slots
    keys: Vec<i32>,
    /// Code for each slot
    codes: Vec<Code>,
}

impl CodeTable {
    /// Create an empty table
    fn new() -> Self {
        CodeTable {
            keys: vec![-1; TABLE_SZ],
            codes: vec![0; TABLE_SZ],
        }
    }

    /// Remove all entries
    fn clear(&mut self) {
        for key in self.keys.iter_mut() {
            *key = -1;
        }
    }

    /// Search for the code of `prefix` followed by `symbol`.
    ///
    /// On a miss, returns the empty slot where that string belongs.
    fn search(&self, prefix: Code, symbol: u8) -> std::result::Result<Code, usize> {
        let key = Self::key(prefix, symbol);
        let mut slot = ((symbol as usize) << HASH_SHIFT) ^ prefix as usize;
        if self.keys[slot] == key {
            return Ok(self.codes[slot]);
        }
        if self.keys[slot] >= 0 {
            // secondary probe (after G. Knott)
            let disp = if slot == 0 { 1 } else { TABLE_SZ - slot };
            loop {
                slot = if slot >= disp {
                    slot - disp
                } else {
                    slot + TABLE_SZ - disp
                };
                if self.keys[slot] == key {
                    return Ok(self.codes[slot]);
                }
                if self.keys[slot] < 0 {
                    break;
                }
            }
        }
        Err(slot)
    }

    /// Insert a code into an empty slot
    fn insert(&mut self, slot: usize, prefix: Code, symbol: u8, code: Code) {
        debug_assert!(self.keys[slot] < 0);
        self.keys[slot] = Self::key(prefix, symbol);
        self.codes[slot] = code;
    }

    /// Get the hash key for a string
    fn key(prefix: Code, symbol: u8) -> i32 {
        ((symbol as i32) << u8::from(Bits::MAX)) + prefix as i32
    }
}

/// Writer for length-prefixed data sub-blocks
struct BlockWriter<'a> {
    writer: &'a mut ByteSink,
    buf: Vec<u8>,
}

impl<'a> BlockWriter<'a> {
    fn new(writer: &'a mut ByteSink) -> Self {
        let buf = Vec::with_capacity(SUB_BLOCK_SZ);
        BlockWriter { writer, buf }
    }

    /// Add one byte, writing the sub-block when full
    fn push(&mut self, byte: u8) {
        self.buf.push(byte);
        if self.buf.len() >= SUB_BLOCK_SZ {
            self.flush();
        }
    }

    /// Write any buffered bytes as a sub-block
    fn flush(&mut self) {
        let len = self.buf.len();
        if len > 0 {
            self.writer.write_byte(len as u8);
            self.writer.write_bytes(&self.buf);
            self.buf.clear();
        }
    }
}

/// LZW Data Compressor
pub struct Compressor {
    /// Code dictionary
    table: CodeTable,
    /// Bits per color index
    color_depth: u8,
    /// Minimum code bits
    min_code_bits: u8,
    /// Current code bits
    code_bits: Bits,
    /// Next free code
    free_code: Code,
    /// Clear code was just emitted; reset width after packing it
    clearing: bool,
    /// Current code
    code: u32,
    /// Number of bits in current code
    n_bits: u8,
}

impl Compressor {
    /// Create a new compressor for a color depth (bits per index, 1-8)
    pub fn new(color_depth: u8) -> Self {
        let color_depth = color_depth.max(1).min(8);
        let min_code_bits = color_depth.max(2);
        Compressor {
            table: CodeTable::new(),
            color_depth,
            min_code_bits,
            code_bits: Bits::from(min_code_bits + 1),
            free_code: 0,
            clearing: false,
            code: 0,
            n_bits: 0,
        }
    }

    /// Get the minimum code size written before the data
    pub fn min_code_size(&self) -> u8 {
        self.min_code_bits
    }

    /// Get the clear code
    fn clear_code(&self) -> Code {
        1 << self.min_code_bits
    }

    /// Get the end code
    fn end_code(&self) -> Code {
        self.clear_code() + 1
    }

    /// Reset for a new image
    fn reset(&mut self) {
        self.table.clear();
        self.code_bits = Bits::from(self.min_code_bits + 1);
        self.free_code = self.clear_code() + 2;
        self.clearing = false;
        self.code = 0;
        self.n_bits = 0;
    }

    /// Pack a code into the sub-block writer
    fn pack(&mut self, code: Code, bw: &mut BlockWriter) {
        self.code |= (code as u32) << self.n_bits;
        self.n_bits += u8::from(self.code_bits);
        while self.n_bits >= 8 {
            bw.push(self.code as u8);
            self.code >>= 8;
            self.n_bits -= 8;
        }
        if self.clearing {
            self.code_bits = Bits::from(self.min_code_bits + 1);
            self.clearing = false;
        } else if self.free_code > self.code_bits.max_code() {
            self.code_bits += 1;
        }
        if code == self.end_code() {
            while self.n_bits > 0 {
                bw.push(self.code as u8);
                self.code >>= 8;
                self.n_bits = self.n_bits.saturating_sub(8);
            }
            bw.flush();
        }
    }

    /// Clear the dictionary once every code is used
    fn clear_table(&mut self, bw: &mut BlockWriter) {
        self.table.clear();
        self.free_code = self.clear_code() + 2;
        self.clearing = true;
        self.pack(self.clear_code(), bw);
    }

    /// Compress indexed pixels into image data.
    ///
    /// Writes the minimum code size, data sub-blocks and the terminating
    /// empty sub-block.  Nothing is written if an index does not fit the
    /// color depth.
    pub fn compress(&mut self, indices: &[u8], sink: &mut ByteSink)
        -> Result<()>
    {
        let limit = 1u16 << self.color_depth;
        if indices.iter().any(|idx| u16::from(*idx) >= limit) {
            return Err(Error::InvalidColorIndex);
        }
        self.reset();
        let start = sink.len();
        sink.write_byte(self.min_code_bits);
        let mut bw = BlockWriter::new(sink);
        self.pack(self.clear_code(), &mut bw);
        let mut pixels = indices.iter().copied();
        let mut prefix = match pixels.next() {
            Some(idx) => Code::from(idx),
            None => {
                self.pack(self.end_code(), &mut bw);
                sink.write_byte(0);
                return Ok(());
            }
        };
        for symbol in pixels {
            match self.table.search(prefix, symbol) {
                Ok(code) => prefix = code,
                Err(slot) => {
                    self.pack(prefix, &mut bw);
                    if self.free_code < Bits::MAX.entries() {
                        self.table.insert(slot, prefix, symbol, self.free_code);
                        self.free_code += 1;
                    } else {
                        self.clear_table(&mut bw);
                    }
                    prefix = Code::from(symbol);
                }
            }
        }
        self.pack(prefix, &mut bw);
        self.pack(self.end_code(), &mut bw);
        sink.write_byte(0);
        trace!("lzw: {} indices -> {} bytes", indices.len(),
            sink.len() - start);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Decode image data with `weezl`
    fn decompress(data: &[u8]) -> Vec<u8> {
        let min_code_size = data[0];
        let mut packed = vec![];
        let mut pos = 1;
        loop {
            let len = data[pos] as usize;
            pos += 1;
            if len == 0 {
                break;
            }
            assert!(len <= SUB_BLOCK_SZ);
            packed.extend_from_slice(&data[pos..pos + len]);
            pos += len;
        }
        assert_eq!(pos, data.len());
        weezl::decode::Decoder::new(weezl::BitOrder::Lsb, min_code_size)
            .decode(&packed)
            .unwrap()
    }

    fn compressed(indices: &[u8], depth: u8) -> Vec<u8> {
        let mut sink = ByteSink::new();
        Compressor::new(depth).compress(indices, &mut sink).unwrap();
        sink.into_inner()
    }

    /// Deterministic pseudo-random indices
    fn noise(len: usize, modulo: u32) -> Vec<u8> {
        let mut seed = 0x2545_F491u32;
        (0..len)
            .map(|_| {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                ((seed >> 16) % modulo) as u8
            })
            .collect()
    }

    #[test]
    fn bits() {
        let mut b = Bits::from(11);
        assert_eq!(b.max_code(), 2047);
        b += 1;
        assert_eq!(b, Bits::MAX);
        assert_eq!(b.max_code(), 4096);
        b += 1;
        assert_eq!(b, Bits::MAX);
    }

    #[test]
    fn four_zeros() {
        assert_eq!(compressed(&[0, 0, 0, 0], 8),
            [8, 6, 0x00, 0x01, 0x08, 0x04, 0x10, 0x10, 0]);
    }

    #[test]
    fn empty() {
        let data = compressed(&[], 8);
        assert_eq!(data[0], 8);
        assert_eq!(*data.last().unwrap(), 0);
        assert!(decompress(&data).is_empty());
    }

    #[test]
    fn round_trip_noise() {
        // enough codes to fill the table and clear several times
        let indices = noise(200_000, 256);
        let data = compressed(&indices, 8);
        assert_eq!(decompress(&data), indices);
    }

    #[test]
    fn round_trip_runs() {
        let mut indices = noise(50_000, 4);
        indices.extend(std::iter::repeat(7).take(70_000));
        let data = compressed(&indices, 8);
        assert_eq!(decompress(&data), indices);
        assert!(data.len() < indices.len() / 2);
    }

    #[test]
    fn deterministic() {
        let indices = noise(10_000, 200);
        assert_eq!(compressed(&indices, 8), compressed(&indices, 8));
    }

    #[test]
    fn reject_index_out_of_range() {
        let mut sink = ByteSink::new();
        let res = Compressor::new(2).compress(&[0, 1, 4, 3], &mut sink);
        assert!(matches!(res, Err(Error::InvalidColorIndex)));
        assert!(sink.is_empty());
    }

    #[test]
    fn low_depth() {
        let data = compressed(&[0, 1, 2, 3, 3, 2, 1, 0], 2);
        assert_eq!(data[0], 2);
        assert_eq!(*data.last().unwrap(), 0);
        assert_eq!(decompress(&data), [0, 1, 2, 3, 3, 2, 1, 0]);
    }

    #[test]
    fn round_trip_depths() {
        // lengths around the point where the code table fills
        for depth in 1..=8 {
            for len in [1, 2, 4095, 4096, 4097, 60_000].iter() {
                let indices = noise(*len, 1u32 << depth);
                let data = compressed(&indices, depth);
                assert_eq!(data[0], depth.max(2));
                assert_eq!(decompress(&data), indices, "depth {} len {}",
                    depth, len);
            }
        }
    }

    #[test]
    fn round_trip_one_bit_runs() {
        // noise at depth 1 fills the table more than once
        let mut indices = noise(100_000, 2);
        indices.extend(std::iter::repeat(1).take(200_000));
        let data = compressed(&indices, 1);
        assert_eq!(decompress(&data), indices);
    }

    #[test]
    fn append_to_sink() {
        let indices = noise(5_000, 16);
        let mut sink = ByteSink::new();
        sink.write_bytes(b"GIF89a");
        Compressor::new(4).compress(&indices, &mut sink).unwrap();
        let data = sink.into_inner();
        assert_eq!(&data[..6], b"GIF89a");
        assert_eq!(&data[6..], &compressed(&indices, 4)[..]);
    }
}
