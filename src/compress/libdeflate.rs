use super::native::{DeflateEngine, InflateEngine, InflateStatus};
use super::{BufferPreference, CodecError, Compressor, Engine};
use crate::buffer::{DirectBuf, MAX_BUFFER_SIZE};
use nix::errno::Errno;
use std::fmt;

/// Passing this level means [DEFAULT_LEVEL].
pub const DEFAULT_SENTINEL: i32 = -1;
pub const DEFAULT_LEVEL: i32 = 6;
pub const MIN_LEVEL: i32 = 1;
pub const MAX_LEVEL: i32 = 12;

/// The capacity a zero capacity destination grows to, on the first doubling.
pub const MIN_GROWTH: usize = 64;

/// Resolve [DEFAULT_SENTINEL] and check the level is within `MIN_LEVEL..=MAX_LEVEL`.
#[inline]
pub fn resolve_level(level: i32) -> Result<i32, CodecError> {
    let corrected = if level == DEFAULT_SENTINEL { DEFAULT_LEVEL } else { level };
    if !(MIN_LEVEL..=MAX_LEVEL).contains(&corrected) {
        return Err(CodecError::InvalidConfiguration { level });
    }
    Ok(corrected)
}

// Fields drop in declaration order, so the decompressor is released first.
struct Engines {
    inflate: InflateEngine,
    deflate: DeflateEngine,
}

/// Raw deflate compressor and decompressor backed by libdeflate.
///
/// Both native engines are allocated on [LibdeflateCompressor::new()], and released together by
/// [Compressor::dispose()] (or on drop, when the owner never disposed). After disposal every
/// operation fails with [CodecError::UseAfterDispose].
///
/// The session is `Send` but not `Sync`: the engines carry mutable state.
pub struct LibdeflateCompressor {
    engines: Option<Engines>,
    level: i32,
}

impl fmt::Debug for LibdeflateCompressor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "libdeflate compressor level {} disposed {}", self.level, self.is_disposed())
    }
}

impl LibdeflateCompressor {
    /// `level`: 1 to 12, or -1 for the default (6).
    ///
    /// On failure nothing stays allocated.
    pub fn new(level: i32) -> Result<Self, CodecError> {
        let level = resolve_level(level)?;
        let inflate = InflateEngine::new()?;
        // `inflate` is dropped, thus freed, if this fails
        let deflate = DeflateEngine::new(level)?;
        debug!("libdeflate compressor created, level {}", level);
        Ok(Self { engines: Some(Engines { inflate, deflate }), level })
    }

    /// The resolved compression level.
    #[inline]
    pub fn level(&self) -> i32 {
        self.level
    }

    #[inline(always)]
    fn engines(&mut self) -> Result<&mut Engines, CodecError> {
        self.engines.as_mut().ok_or(CodecError::UseAfterDispose)
    }
}

impl Compressor for LibdeflateCompressor {
    fn inflate<S, D>(
        &mut self,
        src: &S,
        dst: &mut D,
        uncompressed_size: usize,
    ) -> Result<(), CodecError>
    where
        S: DirectBuf + ?Sized,
        D: DirectBuf + ?Sized,
    {
        let engines = self.engines()?;
        dst.ensure_writable(uncompressed_size)?;
        // libdeflate may write up to `uncompressed_size` bytes at the writable address
        if dst.writable_bytes() < uncompressed_size {
            return Err(CodecError::DestinationTooSmall);
        }
        let status = unsafe {
            engines.inflate.process(
                src.readable_ptr(),
                src.readable_bytes(),
                dst.writable_ptr(),
                uncompressed_size,
            )
        };
        match status {
            InflateStatus::Success => {
                dst.advance_writer(uncompressed_size);
                Ok(())
            }
            InflateStatus::InsufficientSpace => Err(CodecError::DestinationTooSmall),
            InflateStatus::BadData => Err(CodecError::CorruptInput),
            InflateStatus::Error(code) => {
                Err(CodecError::EngineFailure { engine: Engine::Inflate, code })
            }
        }
    }

    fn deflate<S, D>(&mut self, src: &S, dst: &mut D) -> Result<(), CodecError>
    where
        S: DirectBuf + ?Sized,
        D: DirectBuf + ?Sized,
    {
        let engines = self.engines()?;
        loop {
            let dst_len = dst.writable_bytes();
            let produced = unsafe {
                engines.deflate.process(
                    src.readable_ptr(),
                    src.readable_bytes(),
                    dst.writable_ptr(),
                    dst_len,
                )
            };
            if produced > 0 {
                dst.advance_writer(produced as usize);
                return Ok(());
            }
            if produced < 0 {
                return Err(CodecError::EngineFailure { engine: Engine::Deflate, code: produced });
            }
            // Nothing consumed, retry the same input with twice the room.
            let cap = dst.capacity();
            if cap >= MAX_BUFFER_SIZE - 1 {
                return Err(CodecError::BufferGrowth(Errno::EOVERFLOW));
            }
            let new_cap = cap.saturating_mul(2).max(MIN_GROWTH).min(MAX_BUFFER_SIZE - 1);
            trace!(
                "deflate output does not fit in {} bytes, grow capacity {} -> {}",
                dst_len,
                cap,
                new_cap
            );
            dst.set_capacity(new_cap)?;
            // a buffer that did not grow would retry forever
            if dst.writable_bytes() <= dst_len {
                return Err(CodecError::BufferGrowth(Errno::ENOSPC));
            }
        }
    }

    fn dispose(&mut self) {
        if let Some(engines) = self.engines.take() {
            drop(engines);
            debug!("libdeflate compressor disposed");
        }
    }

    #[inline]
    fn is_disposed(&self) -> bool {
        self.engines.is_none()
    }

    #[inline]
    fn preferred_buffer_type(&self) -> BufferPreference {
        BufferPreference::DirectRequired
    }
}

impl Drop for LibdeflateCompressor {
    fn drop(&mut self) {
        if !self.is_disposed() {
            debug!("libdeflate compressor dropped without dispose()");
            self.dispose();
        }
    }
}
