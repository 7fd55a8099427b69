/*
 * System Call Handlers
 *
 * File syscalls for one process. Each handler:
 * - Validates arguments from userspace (pointers, file descriptors, flags)
 * - Resolves the open file and calls into the device's file operations
 * - Returns the result or a negative errno
 *
 * Device nodes are named `/dev/<name>` and resolved against the chrdev
 * table by registered name.
 */

use alloc::vec;
use alloc::vec::Vec;

use super::Process;
use crate::io::device::{Errno, Stat};
use crate::io::fd::{OpenFile, OpenFlags};
use crate::io::uaccess::{UserPtr, validate_user_ptr};

/// Directory device nodes live in
pub const DEV_PREFIX: &str = "/dev/";

/// Longest path accepted by sys_open, NUL excluded
pub const PATH_MAX: usize = 256;

fn ret(syscall: &str, result: Result<usize, Errno>) -> isize {
    match result {
        Ok(value) => value as isize,
        Err(errno) => {
            log::warn!("{}: rejected with {:?}", syscall, errno);
            errno.as_ret()
        }
    }
}

impl Process {
    pub fn sys_open(&self, path: UserPtr, flags: u32) -> isize {
        ret("open", self.open(path, flags))
    }

    pub fn sys_read(&self, fd: i32, buf: UserPtr, count: usize) -> isize {
        ret("read", self.file(fd).and_then(|file| file.read(&*self.user, buf, count)))
    }

    pub fn sys_write(&self, fd: i32, buf: UserPtr, count: usize) -> isize {
        ret("write", self.file(fd).and_then(|file| file.write(&*self.user, buf, count)))
    }

    pub fn sys_close(&self, fd: i32) -> isize {
        // Release runs here, after the table lock is gone
        let removed = self.fds.lock().take(fd);
        ret("close", removed.map(|file| {
            drop(file);
            0
        }))
    }

    pub fn sys_lseek(&self, fd: i32, offset: i64, whence: i32) -> isize {
        let result = self
            .file(fd)
            .and_then(|file| file.seek(offset, whence))
            .and_then(|pos| isize::try_from(pos).map(|pos| pos as usize).map_err(|_| Errno::EINVAL));
        ret("lseek", result)
    }

    pub fn sys_fstat(&self, fd: i32, statbuf: UserPtr) -> isize {
        ret("fstat", self.fstat(fd, statbuf).map(|()| 0))
    }

    pub fn sys_dup2(&self, oldfd: i32, newfd: i32) -> isize {
        // A displaced open file is released here, after the table lock is gone
        let displaced = self.fds.lock().dup(oldfd, newfd);
        ret("dup2", displaced.map(|file| {
            drop(file);
            newfd as usize
        }))
    }

    fn open(&self, path: UserPtr, flags: u32) -> Result<usize, Errno> {
        let flags = OpenFlags::parse(flags)?;
        let path = self.read_path(path)?;
        let path = core::str::from_utf8(&path).map_err(|_| Errno::ENOENT)?;
        let name = path.strip_prefix(DEV_PREFIX).ok_or(Errno::ENOENT)?;

        let (_, fops) = self.devices.lookup_name(name).map_err(|_| Errno::ENOENT)?;
        let file = OpenFile::open(fops, flags)?;
        let fd = self.fds.lock().alloc(file)?;
        Ok(fd as usize)
    }

    fn fstat(&self, fd: i32, statbuf: UserPtr) -> Result<(), Errno> {
        let stat = self.file(fd)?.stat();
        validate_user_ptr(statbuf, Stat::ENCODED_LEN)?;
        if self.user.copy_to_user(statbuf, &stat.to_bytes()) != Stat::ENCODED_LEN {
            return Err(Errno::EFAULT);
        }
        Ok(())
    }

    /// Copy a NUL-terminated path out of user memory
    fn read_path(&self, path: UserPtr) -> Result<Vec<u8>, Errno> {
        validate_user_ptr(path, 1)?;
        let mut bytes = vec![0u8; PATH_MAX + 1];
        let copied = self.user.copy_from_user(&mut bytes, path);
        match bytes[..copied].iter().position(|&b| b == 0) {
            Some(len) => {
                bytes.truncate(len);
                Ok(bytes)
            }
            None if copied == 0 => Err(Errno::EFAULT),
            None if copied > PATH_MAX => Err(Errno::ENAMETOOLONG),
            None => Err(Errno::EFAULT),
        }
    }
}
