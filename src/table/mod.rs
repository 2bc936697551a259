//! CSV artifacts exchanged between stages.
//!
//! Files are written as UTF-8 with a BOM and every field quoted so they open
//! cleanly in spreadsheet tools. Reading accepts UTF-8 with or without a BOM
//! and falls back to GBK.

pub mod codecs;
pub mod columns;
pub mod io;

pub use codecs::*;
pub use io::{discard_output, prepare_output, read_table, write_table, Table};
