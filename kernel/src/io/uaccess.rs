/*
 * User Memory Access
 *
 * Moving bytes across the user/kernel boundary. The address space itself
 * is behind the `UserAccess` trait; this module adds pointer validation
 * and the `simple_*_to/from_buffer` helpers drivers use to serve
 * offset-based reads and writes against a fixed kernel buffer.
 *
 * Transfer accounting:
 * - The copy primitives report how many bytes actually moved
 * - A short copy is a short read/write, not an error
 * - A copy that moves nothing for a non-empty request is a fault
 */

use core::fmt;

use thiserror::Error;

use super::device::Errno;

/// First address past the user half of the address space
pub const USER_SPACE_END: usize = 0x0000_8000_0000_0000;

/// Address in a user process's address space
///
/// Never dereferenced by the kernel; only handed to a `UserAccess`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserPtr(pub usize);

impl UserPtr {
    pub const NULL: UserPtr = UserPtr(0);

    pub const fn addr(self) -> usize {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Pointer `count` bytes further on
    pub const fn add(self, count: usize) -> UserPtr {
        UserPtr(self.0.wrapping_add(count))
    }
}

impl fmt::Display for UserPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Copy primitives for one user address space
pub trait UserAccess: Send + Sync {
    /// Copy `src` into user memory at `dst`
    ///
    /// Returns the number of bytes copied; stops at the first byte that
    /// cannot be written.
    fn copy_to_user(&self, dst: UserPtr, src: &[u8]) -> usize;

    /// Fill `dst` from user memory at `src`
    ///
    /// Returns the number of bytes copied; stops at the first byte that
    /// cannot be read.
    fn copy_from_user(&self, dst: &mut [u8], src: UserPtr) -> usize;
}

/// Failed transfer across the user boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("bad user address {addr} (len {len})")]
    BadAddress { addr: UserPtr, len: usize },

    #[error("user memory fault at {addr}: 0 of {requested} bytes transferred")]
    Fault { addr: UserPtr, requested: usize },
}

impl From<TransferError> for Errno {
    fn from(_: TransferError) -> Self {
        Errno::EFAULT
    }
}

/// Validate a user pointer
///
/// Checks that the range `[ptr, ptr + len)`:
/// - Does not start at NULL
/// - Lies entirely below `USER_SPACE_END`
/// - Does not overflow
pub fn validate_user_ptr(ptr: UserPtr, len: usize) -> Result<(), TransferError> {
    let bad = TransferError::BadAddress { addr: ptr, len };

    if ptr.is_null() {
        return Err(bad);
    }

    match ptr.addr().checked_add(len) {
        Some(end) if end <= USER_SPACE_END => Ok(()),
        _ => Err(bad),
    }
}

/// Serve a read of `from` at `*pos` into user memory
///
/// Copies at most `count` bytes and never past the end of `from`. Returns 0
/// when `*pos` is at or beyond the end (end of stream) or `count` is 0.
/// `*pos` advances by the number of bytes actually copied.
pub fn simple_read_from_buffer(
    uaccess: &dyn UserAccess,
    to: UserPtr,
    count: usize,
    pos: &mut u64,
    from: &[u8],
) -> Result<usize, TransferError> {
    let start = match clamp_start(*pos, from.len()) {
        Some(start) if count > 0 => start,
        _ => return Ok(0),
    };
    let len = count.min(from.len() - start);

    validate_user_ptr(to, len)?;

    let copied = uaccess.copy_to_user(to, &from[start..start + len]).min(len);
    if copied == 0 {
        return Err(TransferError::Fault {
            addr: to,
            requested: len,
        });
    }

    *pos = (start + copied) as u64;
    Ok(copied)
}

/// Serve a write from user memory into `to` at `*pos`
///
/// Stores at most `count` bytes and never past the end of `to`; the buffer
/// does not grow. Returns 0 when `*pos` is at or beyond the end or `count`
/// is 0. `*pos` advances by the number of bytes actually copied.
pub fn simple_write_to_buffer(
    uaccess: &dyn UserAccess,
    to: &mut [u8],
    pos: &mut u64,
    from: UserPtr,
    count: usize,
) -> Result<usize, TransferError> {
    let start = match clamp_start(*pos, to.len()) {
        Some(start) if count > 0 => start,
        _ => return Ok(0),
    };
    let len = count.min(to.len() - start);

    validate_user_ptr(from, len)?;

    let copied = uaccess.copy_from_user(&mut to[start..start + len], from).min(len);
    if copied == 0 {
        return Err(TransferError::Fault {
            addr: from,
            requested: len,
        });
    }

    *pos = (start + copied) as u64;
    Ok(copied)
}

/// Start index for an access at `pos`, or None at/after the end
fn clamp_start(pos: u64, available: usize) -> Option<usize> {
    match usize::try_from(pos) {
        Ok(start) if start < available => Some(start),
        _ => None,
    }
}
