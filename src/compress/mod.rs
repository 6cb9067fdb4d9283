use crate::buffer::DirectBuf;

mod error;

pub use error::{CodecError, Engine};

/// Which kind of buffer memory a [Compressor] works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferPreference {
    /// Direct memory is faster, heap memory is accepted.
    DirectPreferred,
    /// Only direct memory is accepted, addresses are handed to native code.
    DirectRequired,
    /// Heap memory is faster, direct memory is accepted.
    HeapPreferred,
}

/// A trait for a reusable compressor/decompressor pair
pub trait Compressor {
    /// Decompress the readable region of `src` into `dst`.
    ///
    /// The caller must know the exact decompressed size; on success the write cursor of `dst`
    /// moves forward by exactly `uncompressed_size`.
    fn inflate<S, D>(
        &mut self,
        src: &S,
        dst: &mut D,
        uncompressed_size: usize,
    ) -> Result<(), CodecError>
    where
        S: DirectBuf + ?Sized,
        D: DirectBuf + ?Sized;

    /// Compress the readable region of `src` into `dst`, growing `dst` until the output fits.
    fn deflate<S, D>(&mut self, src: &S, dst: &mut D) -> Result<(), CodecError>
    where
        S: DirectBuf + ?Sized,
        D: DirectBuf + ?Sized;

    /// Release the resources. Calling it again does nothing.
    fn dispose(&mut self);

    fn is_disposed(&self) -> bool;

    fn preferred_buffer_type(&self) -> BufferPreference;
}

#[cfg(feature = "libdeflate")]
mod native;

#[cfg(feature = "libdeflate")]
pub use native::live_engines;

#[cfg(feature = "libdeflate")]
/// Enabled with feature `libdeflate`
pub mod libdeflate;
