/*
 * Open Files and File Descriptor Table
 *
 * An `OpenFile` is one open(2) of a device: the device's file
 * operations, the access mode, and the offset cursor that read/write
 * advance. Descriptors map integers to shared open files; dup'ed
 * descriptors share one cursor. The device's release() runs when the
 * last reference to the open file is dropped.
 *
 * Standard FDs 0, 1, 2 are reserved; FDs 3+ are allocated dynamically.
 */

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use bitflags::bitflags;
use spin::Mutex;

use super::device::{Errno, FileOperations, SEEK_CUR, SEEK_END, SEEK_SET, Stat};
use super::uaccess::{UserAccess, UserPtr};

/// Most descriptors one table will hand out
pub const MAX_FDS: usize = 256;

bitflags! {
    /// open(2) flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const O_WRONLY = 0o1;
        const O_RDWR = 0o2;
    }
}

impl OpenFlags {
    pub const O_RDONLY: OpenFlags = OpenFlags::empty();

    /// Parse raw flags; unknown bits and O_WRONLY|O_RDWR are rejected
    pub fn parse(raw: u32) -> Result<Self, Errno> {
        let flags = OpenFlags::from_bits(raw).ok_or(Errno::EINVAL)?;
        if flags.contains(OpenFlags::O_WRONLY | OpenFlags::O_RDWR) {
            return Err(Errno::EINVAL);
        }
        Ok(flags)
    }

    pub fn readable(self) -> bool {
        !self.contains(OpenFlags::O_WRONLY)
    }

    pub fn writable(self) -> bool {
        self.intersects(OpenFlags::O_WRONLY | OpenFlags::O_RDWR)
    }
}

/// One open instance of a device
pub struct OpenFile {
    fops: Arc<dyn FileOperations>,
    flags: OpenFlags,
    pos: Mutex<u64>, // Offset cursor, held across each read/write
}

impl OpenFile {
    /// Run the device's open() and wrap the result
    pub fn open(fops: Arc<dyn FileOperations>, flags: OpenFlags) -> Result<Arc<Self>, Errno> {
        fops.open()?;
        Ok(Arc::new(Self {
            fops,
            flags,
            pos: Mutex::new(0),
        }))
    }

    /// Current offset
    pub fn position(&self) -> u64 {
        *self.pos.lock()
    }

    pub fn read(&self, uaccess: &dyn UserAccess, buf: UserPtr, count: usize) -> Result<usize, Errno> {
        if !self.flags.readable() {
            return Err(Errno::EBADF);
        }
        let mut pos = self.pos.lock();
        self.fops.read(uaccess, buf, count, &mut pos)
    }

    pub fn write(&self, uaccess: &dyn UserAccess, buf: UserPtr, count: usize) -> Result<usize, Errno> {
        if !self.flags.writable() {
            return Err(Errno::EBADF);
        }
        let mut pos = self.pos.lock();
        self.fops.write(uaccess, buf, count, &mut pos)
    }

    /// Reposition the offset cursor
    ///
    /// SEEK_END is relative to the size the device reports in stat().
    /// Positions past the end are allowed; I/O there hits end of stream.
    pub fn seek(&self, offset: i64, whence: i32) -> Result<u64, Errno> {
        let mut pos = self.pos.lock();

        let base = match whence {
            SEEK_SET => 0,
            SEEK_CUR => i64::try_from(*pos).map_err(|_| Errno::EINVAL)?,
            SEEK_END => i64::try_from(self.fops.stat().st_size).map_err(|_| Errno::EINVAL)?,
            _ => return Err(Errno::EINVAL),
        };

        let new_pos = base.checked_add(offset).ok_or(Errno::EINVAL)?;
        if new_pos < 0 {
            return Err(Errno::EINVAL);
        }

        *pos = new_pos as u64;
        Ok(*pos)
    }

    pub fn stat(&self) -> Stat {
        self.fops.stat()
    }
}

impl Drop for OpenFile {
    fn drop(&mut self) {
        if let Err(errno) = self.fops.release() {
            log::warn!("release failed: {:?}", errno);
        }
    }
}

/// Per-process file descriptor table
///
/// Uses Arc so several FDs can refer to the same open file.
pub struct FileDescriptorTable {
    fds: BTreeMap<i32, Arc<OpenFile>>,
    next_fd: i32,
}

impl FileDescriptorTable {
    /// Create a new empty file descriptor table
    pub fn new() -> Self {
        Self {
            fds: BTreeMap::new(),
            next_fd: 3, // 0, 1, 2 reserved for stdin/stdout/stderr
        }
    }

    /// Get open file by file descriptor
    ///
    /// Returns a cloned Arc to the file, or EBADF if FD is invalid.
    pub fn get(&self, fd: i32) -> Result<Arc<OpenFile>, Errno> {
        self.fds.get(&fd).cloned().ok_or(Errno::EBADF)
    }

    /// Allocate new file descriptor (auto-assign)
    ///
    /// Assigns the lowest free FD >= 3 below MAX_FDS, or EMFILE if none.
    pub fn alloc(&mut self, file: Arc<OpenFile>) -> Result<i32, Errno> {
        let fd = (self.next_fd..MAX_FDS as i32)
            .find(|fd| !self.fds.contains_key(fd))
            .ok_or(Errno::EMFILE)?;
        self.fds.insert(fd, file);
        Ok(fd)
    }

    /// Close a file descriptor
    ///
    /// Removes the FD from the table. Returns EBADF if FD doesn't exist.
    /// The device's release() runs when the last Arc is dropped.
    pub fn close(&mut self, fd: i32) -> Result<(), Errno> {
        self.take(fd)?;
        Ok(())
    }

    /// Remove a file descriptor and hand back its open file
    ///
    /// Lets the caller decide where the final drop (and release) happens.
    pub fn take(&mut self, fd: i32) -> Result<Arc<OpenFile>, Errno> {
        self.fds.remove(&fd).ok_or(Errno::EBADF)
    }

    /// Duplicate file descriptor (dup2 semantics)
    ///
    /// Makes newfd refer to the same open file as oldfd. newfd must be
    /// below MAX_FDS. Returns the open file newfd referred to before, so
    /// the caller can drop it outside any lock.
    pub fn dup(&mut self, oldfd: i32, newfd: i32) -> Result<Option<Arc<OpenFile>>, Errno> {
        if !(0..MAX_FDS as i32).contains(&newfd) {
            return Err(Errno::EBADF);
        }
        let file = self.get(oldfd)?;
        if oldfd == newfd {
            return Ok(None);
        }
        Ok(self.fds.insert(newfd, file))
    }

    /// Get number of open file descriptors
    pub fn count(&self) -> usize {
        self.fds.len()
    }
}

impl Default for FileDescriptorTable {
    fn default() -> Self {
        Self::new()
    }
}
