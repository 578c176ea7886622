//! The versioned binary serialization layer every on-disk artifact is
//! built from: a typed cursor reader/writer, framed save/load/verify
//! with checksum and migrations, and an optional gzip wrapper.

pub mod compressed;
pub mod framed;
pub mod migration;
pub mod reader;
pub mod writer;

pub use compressed::{CompressedBlock, CompressedWriter};
pub use framed::{DecoderTable, VerifyResult};
pub use migration::MigrationTable;
pub use reader::Reader;
pub use writer::Writer;
