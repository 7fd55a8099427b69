/*
 * Device Abstraction Layer
 *
 * The operation table a character device hands to the registration
 * facility. The host dispatches open/read/write/release on every open
 * file handle straight into it.
 *
 * Offsets are owned by the open file (see fd.rs) and passed in by
 * reference; drivers advance them by the number of bytes they actually
 * moved across the user boundary.
 */

use super::uaccess::{UserAccess, UserPtr};

/// File operations for a character device
///
/// One instance is bound to a device number at registration time and
/// shared by every open file of that device.
pub trait FileOperations: Send + Sync {
    /// Called once per successful open(2)
    fn open(&self) -> Result<(), Errno> {
        Ok(())
    }

    /// Read up to `count` bytes at `*offset` into user memory at `buf`
    ///
    /// Returns the number of bytes copied. 0 means end of stream.
    fn read(
        &self,
        uaccess: &dyn UserAccess,
        buf: UserPtr,
        count: usize,
        offset: &mut u64,
    ) -> Result<usize, Errno>;

    /// Write up to `count` bytes from user memory at `buf` to `*offset`
    ///
    /// Returns the number of bytes stored. 0 means no room left.
    fn write(
        &self,
        uaccess: &dyn UserAccess,
        buf: UserPtr,
        count: usize,
        offset: &mut u64,
    ) -> Result<usize, Errno>;

    /// Called when the last reference to an open file goes away
    fn release(&self) -> Result<(), Errno> {
        Ok(())
    }

    /// Get device metadata
    fn stat(&self) -> Stat;
}

/// POSIX errno values
///
/// Subset of standard POSIX error codes for syscall compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Errno {
    ENOENT = 2,        // No such file or directory
    EBADF = 9,         // Bad file descriptor
    ENOMEM = 12,       // Out of memory
    EFAULT = 14,       // Bad address
    EBUSY = 16,        // Device or resource busy
    EEXIST = 17,       // File exists
    ENODEV = 19,       // No such device
    EINVAL = 22,       // Invalid argument
    EMFILE = 24,       // Too many open files
    ENAMETOOLONG = 36, // File name too long
    ENOSYS = 38,       // Function not implemented
}

impl Errno {
    /// Negative return value as seen by user space
    pub const fn as_ret(self) -> isize {
        -(self as i32 as isize)
    }
}

/// Minimal stat structure
///
/// Subset of POSIX struct stat, focusing on st_mode for type checking.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stat {
    pub st_mode: u32,    // File type and mode
    pub st_size: u64,    // File size in bytes
    pub st_blksize: u64, // Block size for I/O
    pub st_blocks: u64,  // Number of 512B blocks allocated
}

impl Stat {
    /// Size of the user-visible encoding written by fstat(2)
    pub const ENCODED_LEN: usize = 32;

    /// Encode in the `#[repr(C)]` field order (mode, pad, size, blksize, blocks)
    pub fn to_bytes(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        out[0..4].copy_from_slice(&self.st_mode.to_ne_bytes());
        out[8..16].copy_from_slice(&self.st_size.to_ne_bytes());
        out[16..24].copy_from_slice(&self.st_blksize.to_ne_bytes());
        out[24..32].copy_from_slice(&self.st_blocks.to_ne_bytes());
        out
    }
}

// File type constants (POSIX)
pub const S_IFMT: u32 = 0o170000; // File type mask
pub const S_IFCHR: u32 = 0o020000; // Character device

// Seek whence constants (POSIX)
pub const SEEK_SET: i32 = 0; // Seek from beginning
pub const SEEK_CUR: i32 = 1; // Seek from current position
pub const SEEK_END: i32 = 2; // Seek from end

/// Check if mode indicates a character device
#[inline]
#[allow(non_snake_case)]
pub fn S_ISCHR(mode: u32) -> bool {
    (mode & S_IFMT) == S_IFCHR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_return_values_are_negative() {
        assert_eq!(Errno::EFAULT.as_ret(), -14);
        assert_eq!(Errno::ENOSYS.as_ret(), -38);
    }

    #[test]
    fn stat_encoding_layout() {
        let st = Stat {
            st_mode: S_IFCHR | 0o666,
            st_size: 1024,
            st_blksize: 1024,
            st_blocks: 2,
        };
        let bytes = st.to_bytes();
        assert_eq!(u32::from_ne_bytes(bytes[0..4].try_into().unwrap()), S_IFCHR | 0o666);
        assert_eq!(u64::from_ne_bytes(bytes[8..16].try_into().unwrap()), 1024);
        assert_eq!(u64::from_ne_bytes(bytes[24..32].try_into().unwrap()), 2);
        assert!(S_ISCHR(st.st_mode));
    }
}
