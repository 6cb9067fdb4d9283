//! libdeflate entry points and the owned engine handles.
//!
//! The entry points are bound into a table once per process, before the first engine is
//! allocated. Each engine handle frees its native state on drop, which is the only release path.

use super::error::{CodecError, Engine};
use libc::c_int;
use libdeflate_sys::{
    libdeflate_alloc_compressor, libdeflate_alloc_decompressor, libdeflate_compressor,
    libdeflate_decompressor, libdeflate_deflate_compress, libdeflate_deflate_decompress,
    libdeflate_free_compressor, libdeflate_free_decompressor,
    libdeflate_result_LIBDEFLATE_BAD_DATA, libdeflate_result_LIBDEFLATE_INSUFFICIENT_SPACE,
    libdeflate_result_LIBDEFLATE_SUCCESS,
};
use std::ptr::{self, NonNull};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Outcome of one decompression call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InflateStatus {
    Success,
    InsufficientSpace,
    BadData,
    Error(i64),
}

impl InflateStatus {
    /// 0 = success, 1 = no space, 2 = bad data, anything else is an error.
    #[cfg(any(test, feature = "fail"))]
    fn from_code(code: i64) -> Self {
        match code {
            0 => InflateStatus::Success,
            1 => InflateStatus::InsufficientSpace,
            2 => InflateStatus::BadData,
            other => InflateStatus::Error(other),
        }
    }
}

type InflateInit = unsafe fn() -> *mut libdeflate_decompressor;
type InflateProcess =
    unsafe fn(*mut libdeflate_decompressor, *const u8, usize, *mut u8, usize) -> InflateStatus;
type InflateFree = unsafe fn(*mut libdeflate_decompressor);
type DeflateInit = unsafe fn(c_int) -> *mut libdeflate_compressor;
type DeflateProcess =
    unsafe fn(*mut libdeflate_compressor, *const u8, usize, *mut u8, usize) -> i64;
type DeflateFree = unsafe fn(*mut libdeflate_compressor);

pub(crate) struct Natives {
    inflate_init: InflateInit,
    inflate_process: InflateProcess,
    inflate_free: InflateFree,
    deflate_init: DeflateInit,
    deflate_process: DeflateProcess,
    deflate_free: DeflateFree,
}

static NATIVES: OnceLock<Natives> = OnceLock::new();

static LIVE_ENGINES: AtomicUsize = AtomicUsize::new(0);

/// Bind the native entry points. Only the first call in the process does the work,
/// concurrent callers wait for it.
pub(crate) fn bind() -> &'static Natives {
    NATIVES.get_or_init(|| {
        debug!("binding libdeflate entry points");
        Natives {
            inflate_init,
            inflate_process,
            inflate_free,
            deflate_init,
            deflate_process,
            deflate_free,
        }
    })
}

/// Number of native engines currently allocated in this process.
pub fn live_engines() -> usize {
    LIVE_ENGINES.load(Ordering::Acquire)
}

unsafe fn inflate_init() -> *mut libdeflate_decompressor {
    #[cfg(feature = "fail")]
    fail::fail_point!("inflate_init", |_| ptr::null_mut());
    unsafe { libdeflate_alloc_decompressor() }
}

unsafe fn inflate_process(
    d: *mut libdeflate_decompressor,
    src: *const u8,
    src_len: usize,
    dst: *mut u8,
    dst_len: usize,
) -> InflateStatus {
    #[cfg(feature = "fail")]
    fail::fail_point!("inflate_process", |code: Option<String>| {
        InflateStatus::from_code(code.and_then(|c| c.parse().ok()).unwrap_or(3))
    });
    // Without actual_out_nbytes_ret, libdeflate must produce exactly dst_len bytes.
    let ret = unsafe {
        libdeflate_deflate_decompress(
            d,
            src.cast(),
            src_len,
            dst.cast(),
            dst_len,
            ptr::null_mut(),
        )
    };
    match ret {
        libdeflate_result_LIBDEFLATE_SUCCESS => InflateStatus::Success,
        libdeflate_result_LIBDEFLATE_INSUFFICIENT_SPACE => InflateStatus::InsufficientSpace,
        libdeflate_result_LIBDEFLATE_BAD_DATA => InflateStatus::BadData,
        other => InflateStatus::Error(other as i64),
    }
}

unsafe fn inflate_free(d: *mut libdeflate_decompressor) {
    unsafe { libdeflate_free_decompressor(d) }
}

unsafe fn deflate_init(level: c_int) -> *mut libdeflate_compressor {
    #[cfg(feature = "fail")]
    fail::fail_point!("deflate_init", |_| ptr::null_mut());
    unsafe { libdeflate_alloc_compressor(level) }
}

/// Return the bytes produced, 0 when `dst_len` is not enough.
unsafe fn deflate_process(
    c: *mut libdeflate_compressor,
    src: *const u8,
    src_len: usize,
    dst: *mut u8,
    dst_len: usize,
) -> i64 {
    #[cfg(feature = "fail")]
    fail::fail_point!("deflate_process", |produced: Option<String>| {
        produced.and_then(|p| p.parse().ok()).unwrap_or(-1)
    });
    let produced =
        unsafe { libdeflate_deflate_compress(c, src.cast(), src_len, dst.cast(), dst_len) };
    produced as i64
}

unsafe fn deflate_free(c: *mut libdeflate_compressor) {
    unsafe { libdeflate_free_compressor(c) }
}

/// Owned libdeflate decompressor.
pub(crate) struct InflateEngine(NonNull<libdeflate_decompressor>);

// The native state has no thread affinity, it only must not be shared.
unsafe impl Send for InflateEngine {}

impl InflateEngine {
    pub(crate) fn new() -> Result<Self, CodecError> {
        let raw = unsafe { (bind().inflate_init)() };
        let ptr = NonNull::new(raw).ok_or(CodecError::InitializationFailure(Engine::Inflate))?;
        LIVE_ENGINES.fetch_add(1, Ordering::AcqRel);
        Ok(Self(ptr))
    }

    /// # Safety
    ///
    /// `src` must be readable for `src_len` bytes, `dst` writable for `dst_len` bytes.
    #[inline]
    pub(crate) unsafe fn process(
        &mut self,
        src: *const u8,
        src_len: usize,
        dst: *mut u8,
        dst_len: usize,
    ) -> InflateStatus {
        unsafe { (bind().inflate_process)(self.0.as_ptr(), src, src_len, dst, dst_len) }
    }
}

impl Drop for InflateEngine {
    fn drop(&mut self) {
        unsafe { (bind().inflate_free)(self.0.as_ptr()) };
        LIVE_ENGINES.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Owned libdeflate compressor, fixed to one level.
pub(crate) struct DeflateEngine(NonNull<libdeflate_compressor>);

unsafe impl Send for DeflateEngine {}

impl DeflateEngine {
    pub(crate) fn new(level: i32) -> Result<Self, CodecError> {
        let raw = unsafe { (bind().deflate_init)(level as c_int) };
        let ptr = NonNull::new(raw).ok_or(CodecError::InitializationFailure(Engine::Deflate))?;
        LIVE_ENGINES.fetch_add(1, Ordering::AcqRel);
        Ok(Self(ptr))
    }

    /// Positive: bytes produced. Zero: `dst_len` too small. Negative: engine error.
    ///
    /// # Safety
    ///
    /// `src` must be readable for `src_len` bytes, `dst` writable for `dst_len` bytes.
    #[inline]
    pub(crate) unsafe fn process(
        &mut self,
        src: *const u8,
        src_len: usize,
        dst: *mut u8,
        dst_len: usize,
    ) -> i64 {
        unsafe { (bind().deflate_process)(self.0.as_ptr(), src, src_len, dst, dst_len) }
    }
}

impl Drop for DeflateEngine {
    fn drop(&mut self) {
        unsafe { (bind().deflate_free)(self.0.as_ptr()) };
        LIVE_ENGINES.fetch_sub(1, Ordering::AcqRel);
    }
}
