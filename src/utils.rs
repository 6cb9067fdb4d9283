/// Only copy the 0..min(dst, src) of src to dst, return the bytes copied.
#[inline]
pub fn safe_copy(dst: &mut [u8], src: &[u8]) -> usize {
    let dst_len = dst.len();
    let src_len = src.len();
    if src_len > dst_len {
        dst.copy_from_slice(&src[0..dst_len]);
        return dst_len;
    } else if src_len < dst_len {
        dst[0..src_len].copy_from_slice(src);
        return src_len;
    } else {
        dst.copy_from_slice(src);
        return dst_len;
    }
}

/// Set a buffer to zero
#[inline(always)]
pub fn set_zero(dst: &mut [u8]) {
    if dst.is_empty() {
        return;
    }
    unsafe {
        libc::memset(dst.as_mut_ptr() as *mut libc::c_void, 0, dst.len());
    }
}

/// Fill with random bytes
#[cfg(feature = "rand")]
#[inline]
pub fn rand_buffer(dst: &mut [u8]) {
    fastrand::fill(dst);
}

/// Test whether a buffer is all set to zero
#[inline(always)]
pub fn is_all_zero(s: &[u8]) -> bool {
    s.iter().all(|c| *c == 0)
}

#[cfg(test)]
mod tests {

    extern crate md5;
    use super::*;

    #[test]
    fn test_safe_copy() {
        let buf1: [u8; 10] = [0; 10];
        let mut buf2: [u8; 10] = [1; 10];
        let mut buf3: [u8; 10] = [2; 10];
        let zero: usize = 0;
        // dst zero size copy should be protected
        assert_eq!(0, safe_copy(&mut buf2[0..zero], &buf3));
        assert_eq!(&buf2, &[1; 10]);
        assert_eq!(0, safe_copy(&mut buf2[10..], &buf3));
        assert_eq!(&buf2, &[1; 10]);

        assert_eq!(10, safe_copy(&mut buf2, &buf1));
        assert_eq!(buf1, buf2);
        assert_eq!(5, safe_copy(&mut buf2[5..], &buf3));
        assert_eq!(buf1[0..5], buf2[0..5]);
        assert_eq!(buf2[5..], buf3[5..]);
        assert_eq!(5, safe_copy(&mut buf3[0..5], &buf1));
        assert_eq!(buf2, buf3);
    }

    #[cfg(feature = "rand")]
    #[test]
    fn test_rand_buffer() {
        let mut buf1: [u8; 32] = [0; 32];
        let mut buf2: [u8; 32] = [0; 32];
        rand_buffer(&mut buf1);
        rand_buffer(&mut buf2);
        assert!(md5::compute(&buf1) != md5::compute(&buf2));
    }

    #[test]
    fn test_set_zero() {
        let mut buf1: [u8; 10] = [1; 10];
        set_zero(&mut buf1);
        assert!(is_all_zero(&buf1));
        set_zero(&mut buf1[0..0]);
        buf1[3] = 1;
        assert!(!is_all_zero(&buf1));
    }
}
