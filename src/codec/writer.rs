//! A growable-buffer writer for the typed binary primitives every
//! on-disk artifact is built from. All multi-byte primitives are
//! little-endian.

use crate::errors::Result;
use serde::Serialize;

#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    #[must_use]
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    #[must_use]
    pub fn with_capacity(cap: usize) -> Self {
        Self { buf: Vec::with_capacity(cap) }
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.push(u8::from(v));
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// u32-length-prefixed UTF-8 string.
    pub fn write_string(&mut self, s: &str) {
        self.write_buffer(s.as_bytes());
    }

    /// u32-length-prefixed opaque buffer.
    pub fn write_buffer(&mut self, bytes: &[u8]) {
        self.write_u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
    }

    /// Unprefixed raw bytes, for footers/checksums whose length is implicit.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// u32-length-prefixed embedded BSON document.
    pub fn write_bson<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let bytes = bson::to_vec(value)?;
        self.write_buffer(&bytes);
        Ok(())
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::codec::Reader;
    use proptest::prelude::*;

    proptest! {
        /// Writing a sequence of typed primitives and reading them back in
        /// the same order yields bit-exact values.
        #[test]
        fn round_trips_mixed_primitive_sequences(
            u32s in prop::collection::vec(any::<u32>(), 0..8),
            i64s in prop::collection::vec(any::<i64>(), 0..8),
            f64s in prop::collection::vec(any::<f64>(), 0..8),
            strings in prop::collection::vec(".{0,32}", 0..8),
            buffers in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..32), 0..8),
        ) {
            let mut writer = Writer::new();
            for v in &u32s { writer.write_u32(*v); }
            for v in &i64s { writer.write_i64(*v); }
            for v in &f64s { writer.write_f64(*v); }
            for s in &strings { writer.write_string(s); }
            for b in &buffers { writer.write_buffer(b); }

            let bytes = writer.into_bytes();
            let mut reader = Reader::new(&bytes);
            for v in &u32s { prop_assert_eq!(reader.read_u32().unwrap(), *v); }
            for v in &i64s { prop_assert_eq!(reader.read_i64().unwrap(), *v); }
            for v in &f64s {
                let read = reader.read_f64().unwrap();
                prop_assert!(read.to_bits() == v.to_bits() || (read.is_nan() && v.is_nan()));
            }
            for s in &strings { prop_assert_eq!(reader.read_string().unwrap(), s.clone()); }
            for b in &buffers { prop_assert_eq!(reader.read_buffer().unwrap(), b.clone()); }
            prop_assert_eq!(reader.remaining(), 0);
        }
    }
}
