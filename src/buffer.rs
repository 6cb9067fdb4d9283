use super::utils::{safe_copy, set_zero};
#[cfg(feature = "fail")]
use super::utils::rand_buffer;
use libc::{c_void, free, malloc, realloc};
use nix::errno::Errno;
use std::slice;
use std::{fmt, ops::Deref, ptr::NonNull};

pub const MAX_BUFFER_SIZE: usize = 1 << 31;

/// Smallest capacity [Buffer::ensure_writable()] grows to.
pub const MIN_CAPACITY: usize = 64;

/// The buffer contract required by the codec.
///
/// The codec hands raw addresses of the buffer to native code, so the memory must be direct
/// (not relocated by anyone else while a call is in progress).
///
/// # Safety
///
/// * `readable_ptr()` must be valid for reads of `readable_bytes()` bytes.
///
/// * `writable_ptr()` must be valid for writes of `writable_bytes()` bytes.
///
/// * Both stay valid until the next `&mut self` call.
///
/// * `advance_writer(n)` must only be called with `n <= writable_bytes()`, and the bytes then
/// become readable.
///
/// * When `ensure_writable(n)` returns `Ok`, `writable_bytes() >= n` holds afterwards.
///
/// * When `set_capacity(cap)` returns `Ok`, `capacity() == cap` holds afterwards, and the
/// pointers reflect the new memory.
pub unsafe trait DirectBuf {
    fn readable_ptr(&self) -> *const u8;

    fn readable_bytes(&self) -> usize;

    fn writable_ptr(&mut self) -> *mut u8;

    fn writable_bytes(&self) -> usize;

    /// Total memory managed by the buffer.
    fn capacity(&self) -> usize;

    /// Guarantee at least `n` writable bytes, growing the storage if needed.
    ///
    /// Return `Err` rather than `Ok` when the room can not be provided.
    fn ensure_writable(&mut self, n: usize) -> Result<(), Errno>;

    /// Change total capacity to `cap`.
    fn set_capacity(&mut self, cap: usize) -> Result<(), Errno>;

    /// Move the write cursor forward by `n` bytes.
    fn advance_writer(&mut self, n: usize);
}

/// Buffer is an owned, growable region of malloc() memory, with a read cursor and a write cursor.
///
/// `reader <= writer <= cap`, all below [MAX_BUFFER_SIZE]. Memory footprint is only 20B.
///
/// Bytes in `reader..writer` are readable, bytes in `writer..cap` are writable.
///
/// A zero capacity buffer does not allocate.
#[repr(C)]
pub struct Buffer {
    buf_ptr: NonNull<c_void>,
    reader: u32,
    writer: u32,
    cap: u32,
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "buffer {:p} reader {} writer {} cap {}",
            self.buf_ptr.as_ptr(),
            self.reader,
            self.writer,
            self.cap
        )
    }
}

unsafe impl Send for Buffer {}

unsafe impl Sync for Buffer {}

impl Buffer {
    /// Allocate an empty buffer by malloc() with capacity `cap`.
    ///
    /// **NOTE**: Be aware that memory allocated is not initialized.
    ///
    /// `cap`: zero is allowed, and will not allocate.
    #[inline]
    pub fn alloc(cap: usize) -> Result<Buffer, Errno> {
        let mut _buf = Self::_alloc(cap)?;
        #[cfg(feature = "fail")]
        {
            if fail::eval("alloc_buf", |_| ()).is_some() {
                rand_buffer(_buf.writable());
            }
        }
        Ok(_buf)
    }

    /// Allocate an empty buffer with capacity `cap`, and fill the memory with zero.
    #[inline]
    pub fn alloc_zeroed(cap: usize) -> Result<Buffer, Errno> {
        let mut buf = Self::_alloc(cap)?;
        set_zero(buf.writable());
        Ok(buf)
    }

    /// Allocate a buffer just big enough to hold a copy of `data`, which is readable.
    #[inline]
    pub fn from_slice(data: &[u8]) -> Result<Buffer, Errno> {
        let mut buf = Self::alloc(data.len())?;
        buf.write_slice(data)?;
        Ok(buf)
    }

    #[inline]
    fn _alloc(cap: usize) -> Result<Self, Errno> {
        if cap >= MAX_BUFFER_SIZE {
            return Err(Errno::EOVERFLOW);
        }
        let buf_ptr = if cap == 0 {
            NonNull::dangling()
        } else {
            let ptr = unsafe { malloc(cap as libc::size_t) };
            NonNull::new(ptr).ok_or(Errno::ENOMEM)?
        };
        Ok(Self { buf_ptr, reader: 0, writer: 0, cap: cap as u32 })
    }

    /// The whole writable region `writer..cap`.
    ///
    /// **NOTE**: the content is not initialized unless the buffer came from
    /// [Buffer::alloc_zeroed()] or was written before.
    #[inline(always)]
    pub fn writable(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.writable_ptr(), self.writable_bytes()) }
    }

    #[inline(always)]
    pub fn reader_index(&self) -> usize {
        self.reader as usize
    }

    #[inline(always)]
    pub fn writer_index(&self) -> usize {
        self.writer as usize
    }

    /// Return the memory capacity managed by buffer's ptr
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.cap as usize
    }

    #[inline(always)]
    pub fn readable_bytes(&self) -> usize {
        (self.writer - self.reader) as usize
    }

    #[inline(always)]
    pub fn writable_bytes(&self) -> usize {
        (self.cap - self.writer) as usize
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.reader == self.writer
    }

    /// The readable region.
    #[inline(always)]
    pub fn readable(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.readable_ptr(), self.readable_bytes()) }
    }

    #[inline(always)]
    pub fn readable_ptr(&self) -> *const u8 {
        unsafe { (self.buf_ptr.as_ptr() as *const u8).add(self.reader as usize) }
    }

    #[inline(always)]
    pub fn writable_ptr(&mut self) -> *mut u8 {
        unsafe { (self.buf_ptr.as_ptr() as *mut u8).add(self.writer as usize) }
    }

    /// Change the write cursor. Panics when out of `reader..=cap`.
    #[inline]
    pub fn set_writer_index(&mut self, index: usize) {
        assert!(
            index >= self.reader as usize && index <= self.cap as usize,
            "writer index {} out of {}..={}",
            index,
            self.reader,
            self.cap
        );
        self.writer = index as u32;
    }

    /// Move the write cursor forward. Panics when `n > writable_bytes()`.
    #[inline]
    pub fn advance_writer(&mut self, n: usize) {
        assert!(n <= self.writable_bytes(), "advance {} > writable {}", n, self.writable_bytes());
        self.writer += n as u32;
    }

    /// Move the read cursor forward. Panics when `n > readable_bytes()`.
    #[inline]
    pub fn advance_reader(&mut self, n: usize) {
        assert!(n <= self.readable_bytes(), "advance {} > readable {}", n, self.readable_bytes());
        self.reader += n as u32;
    }

    /// Reset both cursors, keep the memory.
    #[inline]
    pub fn clear(&mut self) {
        self.reader = 0;
        self.writer = 0;
    }

    /// Append `data` after the write cursor, growing when needed.
    #[inline]
    pub fn write_slice(&mut self, data: &[u8]) -> Result<(), Errno> {
        self.ensure_writable(data.len())?;
        let dst = unsafe { slice::from_raw_parts_mut(self.writable_ptr(), data.len()) };
        let copied = safe_copy(dst, data);
        self.advance_writer(copied);
        Ok(())
    }

    /// Guarantee at least `n` writable bytes.
    ///
    /// Grows to the next power of two of the required size, at least [MIN_CAPACITY].
    pub fn ensure_writable(&mut self, n: usize) -> Result<(), Errno> {
        if self.writable_bytes() >= n {
            return Ok(());
        }
        let required = (self.writer as usize).checked_add(n).ok_or(Errno::EOVERFLOW)?;
        if required >= MAX_BUFFER_SIZE {
            return Err(Errno::EOVERFLOW);
        }
        let new_cap = required.next_power_of_two().max(MIN_CAPACITY).min(MAX_BUFFER_SIZE - 1);
        self.set_capacity(new_cap)
    }

    /// Change the capacity to exactly `cap`, keeping the content.
    ///
    /// When shrinking, both cursors are clamped to the new capacity.
    /// On failure the buffer is left untouched.
    pub fn set_capacity(&mut self, cap: usize) -> Result<(), Errno> {
        if cap >= MAX_BUFFER_SIZE {
            return Err(Errno::EOVERFLOW);
        }
        if cap == self.cap as usize {
            return Ok(());
        }
        if cap == 0 {
            unsafe { free(self.buf_ptr.as_ptr()) };
            self.buf_ptr = NonNull::dangling();
        } else {
            let ptr = unsafe {
                if self.cap == 0 {
                    malloc(cap as libc::size_t)
                } else {
                    realloc(self.buf_ptr.as_ptr(), cap as libc::size_t)
                }
            };
            // realloc() keeps the original block on failure
            self.buf_ptr = NonNull::new(ptr).ok_or(Errno::ENOMEM)?;
        }
        self.cap = cap as u32;
        self.writer = self.writer.min(self.cap);
        self.reader = self.reader.min(self.writer);
        Ok(())
    }
}

/// Automatically free on drop
impl Drop for Buffer {
    fn drop(&mut self) {
        if self.cap > 0 {
            unsafe {
                free(self.buf_ptr.as_ptr());
            }
        }
    }
}

unsafe impl DirectBuf for Buffer {
    #[inline(always)]
    fn readable_ptr(&self) -> *const u8 {
        Buffer::readable_ptr(self)
    }

    #[inline(always)]
    fn readable_bytes(&self) -> usize {
        Buffer::readable_bytes(self)
    }

    #[inline(always)]
    fn writable_ptr(&mut self) -> *mut u8 {
        Buffer::writable_ptr(self)
    }

    #[inline(always)]
    fn writable_bytes(&self) -> usize {
        Buffer::writable_bytes(self)
    }

    #[inline(always)]
    fn capacity(&self) -> usize {
        Buffer::capacity(self)
    }

    #[inline]
    fn ensure_writable(&mut self, n: usize) -> Result<(), Errno> {
        Buffer::ensure_writable(self, n)
    }

    #[inline]
    fn set_capacity(&mut self, cap: usize) -> Result<(), Errno> {
        Buffer::set_capacity(self, cap)
    }

    #[inline]
    fn advance_writer(&mut self, n: usize) {
        Buffer::advance_writer(self, n)
    }
}

/// Deref to the readable region
impl Deref for Buffer {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        self.readable()
    }
}

impl AsRef<[u8]> for Buffer {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.readable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::is_all_zero;

    #[test]
    fn test_zero_capacity() {
        let mut buf = Buffer::alloc(0).unwrap();
        assert_eq!(buf.capacity(), 0);
        assert_eq!(buf.readable_bytes(), 0);
        assert_eq!(buf.writable_bytes(), 0);
        assert!(buf.is_empty());
        assert_eq!(buf.readable(), &[] as &[u8]);
        buf.write_slice(b"hello").unwrap();
        assert_eq!(buf.capacity(), MIN_CAPACITY);
        assert_eq!(&buf[..], b"hello");
    }

    #[test]
    fn test_cursors() {
        let mut buf = Buffer::from_slice(b"0123456789").unwrap();
        assert_eq!(buf.capacity(), 10);
        assert_eq!(buf.writable_bytes(), 0);
        buf.advance_reader(4);
        assert_eq!(buf.reader_index(), 4);
        assert_eq!(buf.readable(), b"456789");
        buf.set_writer_index(8);
        assert_eq!(buf.readable(), b"4567");
        assert_eq!(buf.writable_bytes(), 2);
        buf.clear();
        assert_eq!(buf.readable_bytes(), 0);
        assert_eq!(buf.writable_bytes(), 10);
    }

    #[test]
    #[should_panic]
    fn test_advance_writer_overflow() {
        let mut buf = Buffer::alloc(8).unwrap();
        buf.advance_writer(9);
    }

    #[test]
    #[should_panic]
    fn test_advance_reader_overflow() {
        let mut buf = Buffer::from_slice(b"abc").unwrap();
        buf.advance_reader(4);
    }

    #[test]
    fn test_ensure_writable() {
        let mut buf = Buffer::alloc(16).unwrap();
        buf.write_slice(&[7u8; 10]).unwrap();
        buf.ensure_writable(6).unwrap();
        assert_eq!(buf.capacity(), 16);
        buf.ensure_writable(7).unwrap();
        assert_eq!(buf.capacity(), MIN_CAPACITY);
        buf.ensure_writable(100).unwrap();
        assert_eq!(buf.capacity(), 128);
        assert!(buf.writable_bytes() >= 100);
        assert_eq!(buf.readable(), &[7u8; 10]);
        assert_eq!(buf.ensure_writable(MAX_BUFFER_SIZE), Err(Errno::EOVERFLOW));
        assert_eq!(buf.ensure_writable(usize::MAX), Err(Errno::EOVERFLOW));
        assert_eq!(buf.capacity(), 128);
        assert_eq!(buf.readable(), &[7u8; 10]);
    }

    #[test]
    fn test_set_capacity() {
        let mut buf = Buffer::from_slice(b"abcdefgh").unwrap();
        buf.advance_reader(6);
        buf.set_capacity(32).unwrap();
        assert_eq!(buf.capacity(), 32);
        assert_eq!(buf.readable(), b"gh");
        assert_eq!(buf.writable_bytes(), 24);
        // shrink clamps cursors
        buf.set_capacity(4).unwrap();
        assert_eq!(buf.writer_index(), 4);
        assert_eq!(buf.reader_index(), 4);
        assert!(buf.is_empty());
        buf.set_capacity(0).unwrap();
        assert_eq!(buf.capacity(), 0);
        assert_eq!(buf.set_capacity(MAX_BUFFER_SIZE), Err(Errno::EOVERFLOW));
        buf.set_capacity(3).unwrap();
        buf.write_slice(b"xyz").unwrap();
        assert_eq!(buf.readable(), b"xyz");
    }

    #[test]
    fn test_writable() {
        let mut buf = Buffer::from_slice(b"ab").unwrap();
        buf.ensure_writable(4).unwrap();
        let room = buf.writable_bytes();
        let w = buf.writable();
        assert_eq!(w.len(), room);
        w[..2].copy_from_slice(b"cd");
        buf.advance_writer(2);
        assert_eq!(buf.readable(), b"abcd");
        buf.set_writer_index(buf.capacity());
        assert!(buf.writable().is_empty());
    }

    #[test]
    fn test_alloc_zeroed() {
        let mut buf = Buffer::alloc_zeroed(256).unwrap();
        buf.set_writer_index(256);
        assert!(is_all_zero(&buf));
    }

    #[test]
    fn test_direct_buf() {
        fn grow<B: DirectBuf + ?Sized>(b: &mut B) {
            let cap = b.capacity();
            b.set_capacity(cap * 2).unwrap();
        }
        let mut buf = Buffer::from_slice(b"abc").unwrap();
        grow(&mut buf);
        assert_eq!(DirectBuf::capacity(&buf), 6);
        assert_eq!(DirectBuf::writable_bytes(&buf), 3);
        let dyn_buf: &mut dyn DirectBuf = &mut buf;
        dyn_buf.ensure_writable(5).unwrap();
        assert!(dyn_buf.writable_bytes() >= 5);
        assert_eq!(dyn_buf.readable_bytes(), 3);
    }
}
