//! # direct-deflate
//!
//! This crate provides a reusable raw deflate compressor/decompressor pair over
//! [libdeflate](https://github.com/ebiggers/libdeflate), working on direct-memory buffers:
//!
//! * A [Buffer] type, owned malloc() memory with a read cursor and a write cursor,
//! growable on demand.
//!
//! * The [DirectBuf] trait, the contract the codec needs from a buffer, so you can bring your own.
//!
//! * [LibdeflateCompressor](compress::libdeflate::LibdeflateCompressor), which owns one native
//! decompressor and one native compressor, and releases both on
//! [dispose()](compress::Compressor::dispose()).
//!
//! Decompression needs the exact decompressed size in advance. Compression grows the
//! destination buffer until the output fits.
//!
//! ## Usage
//!
//! Cargo.toml:
//!
//! ``` toml
//! [dependencies]
//! direct-deflate = "0"
//! ```
//!
//! ``` rust
//! use direct_deflate::Buffer;
//! use direct_deflate::compress::Compressor;
//! use direct_deflate::compress::libdeflate::LibdeflateCompressor;
//!
//! let mut c = LibdeflateCompressor::new(-1).unwrap();
//! let src = Buffer::from_slice(b"hello hello hello hello").unwrap();
//! let mut compressed = Buffer::alloc(0).unwrap();
//! c.deflate(&src, &mut compressed).unwrap();
//!
//! let mut out = Buffer::alloc(0).unwrap();
//! c.inflate(&compressed, &mut out, src.readable_bytes()).unwrap();
//! assert_eq!(&out[..], &src[..]);
//! c.dispose();
//! ```
//!
//! ## Feature flags
//!
//! * compress: enable [Compressor](compress::Compressor) trait and error types
//!
//! * libdeflate: enable libdeflate compression (default)
//!
//! * rand: enable [rand_buffer()]
//!
//! * fail: enable fail points for fault injection

#[macro_use]
extern crate log;

mod buffer;
mod utils;

pub use buffer::{Buffer, DirectBuf, MAX_BUFFER_SIZE, MIN_CAPACITY};
pub use utils::*;

#[cfg(any(feature = "compress", doc))]
/// Enabled with feature `compress`
pub mod compress;
