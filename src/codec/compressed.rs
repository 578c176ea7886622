//! A scratch writer that gzips on `finish()`, and a matching reader that
//! inflates a block before handing out a normal typed `Reader` over it.
//! Several blocks can follow each other in one stream; each is
//! length-prefixed so they never need to agree on size.

use super::reader::Reader;
use super::writer::Writer;
use crate::errors::Result;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::io::{Read, Write as _};

#[derive(Default)]
pub struct CompressedWriter {
    scratch: Writer,
}

impl CompressedWriter {
    #[must_use]
    pub fn new() -> Self {
        Self { scratch: Writer::new() }
    }

    pub fn write_u8(&mut self, v: u8) {
        self.scratch.write_u8(v);
    }
    pub fn write_bool(&mut self, v: bool) {
        self.scratch.write_bool(v);
    }
    pub fn write_u32(&mut self, v: u32) {
        self.scratch.write_u32(v);
    }
    pub fn write_i32(&mut self, v: i32) {
        self.scratch.write_i32(v);
    }
    pub fn write_u64(&mut self, v: u64) {
        self.scratch.write_u64(v);
    }
    pub fn write_i64(&mut self, v: i64) {
        self.scratch.write_i64(v);
    }
    pub fn write_f32(&mut self, v: f32) {
        self.scratch.write_f32(v);
    }
    pub fn write_f64(&mut self, v: f64) {
        self.scratch.write_f64(v);
    }
    pub fn write_string(&mut self, s: &str) {
        self.scratch.write_string(s);
    }
    pub fn write_buffer(&mut self, bytes: &[u8]) {
        self.scratch.write_buffer(bytes);
    }
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.scratch.write_raw(bytes);
    }
    pub fn write_bson<T: Serialize>(&mut self, value: &T) -> Result<()> {
        self.scratch.write_bson(value)
    }

    /// Gzip the buffered bytes and append `[u32 compressed_len][gzip bytes]`
    /// to `parent`.
    pub fn finish(self, parent: &mut Writer) -> Result<()> {
        let raw = self.scratch.into_bytes();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw)?;
        let compressed = encoder.finish()?;
        parent.write_u32(compressed.len() as u32);
        parent.write_raw(&compressed);
        Ok(())
    }
}

/// An inflated block read from a parent `Reader`. Hand out a fresh typed
/// `Reader` over its decompressed bytes with `.reader()`.
pub struct CompressedBlock {
    data: Vec<u8>,
}

impl CompressedBlock {
    pub fn read_from(parent: &mut Reader<'_>) -> Result<Self> {
        let len = parent.read_u32()? as usize;
        let compressed = parent.read_raw(len)?;
        let mut decoder = GzDecoder::new(compressed);
        let mut data = Vec::new();
        decoder.read_to_end(&mut data)?;
        Ok(Self { data })
    }

    #[must_use]
    pub fn reader(&self) -> Reader<'_> {
        Reader::new(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_primitives() {
        let mut parent = Writer::new();
        let mut cw = CompressedWriter::new();
        cw.write_u32(42);
        cw.write_string("hello");
        cw.write_f64(1.5);
        cw.write_f64(f64::NAN);
        cw.finish(&mut parent).unwrap();

        let bytes = parent.into_bytes();
        let mut reader = Reader::new(&bytes);
        let block = CompressedBlock::read_from(&mut reader).unwrap();
        let mut inner = block.reader();
        assert_eq!(inner.read_u32().unwrap(), 42);
        assert_eq!(inner.read_string().unwrap(), "hello");
        assert_eq!(inner.read_f64().unwrap(), 1.5);
        assert!(inner.read_f64().unwrap().is_nan());
    }

    #[test]
    fn consecutive_blocks_read_in_order() {
        let mut parent = Writer::new();
        for i in 0..3u32 {
            let mut cw = CompressedWriter::new();
            cw.write_u32(i);
            cw.finish(&mut parent).unwrap();
        }
        let bytes = parent.into_bytes();
        let mut reader = Reader::new(&bytes);
        for i in 0..3u32 {
            let block = CompressedBlock::read_from(&mut reader).unwrap();
            assert_eq!(block.reader().read_u32().unwrap(), i);
        }
    }
}
