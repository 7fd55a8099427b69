/*
 * System Call Interface
 *
 * Entry point for file syscalls issued by one user process. A `Process`
 * bundles what the handlers need:
 * - the process's address space (for copies across the user boundary)
 * - its file descriptor table
 * - the chrdev table device nodes are resolved against
 *
 * `syscall` takes the raw number and register arguments and dispatches
 * to the handlers in handlers.rs. Return value: non-negative result, or
 * a negative errno.
 */

pub mod handlers;
pub mod numbers;

use alloc::sync::Arc;
use spin::Mutex;

use crate::io::chrdev::ChrdevTable;
use crate::io::device::Errno;
use crate::io::fd::{FileDescriptorTable, OpenFile};
use crate::io::uaccess::{UserAccess, UserPtr};
use numbers::*;

/// A user process as seen by the file syscalls
pub struct Process {
    user: Arc<dyn UserAccess>,
    fds: Mutex<FileDescriptorTable>,
    devices: Arc<ChrdevTable>,
}

impl Process {
    pub fn new(user: Arc<dyn UserAccess>, devices: Arc<ChrdevTable>) -> Self {
        Self {
            user,
            fds: Mutex::new(FileDescriptorTable::new()),
            devices,
        }
    }

    /// Number of open file descriptors
    pub fn open_fds(&self) -> usize {
        self.fds.lock().count()
    }

    fn file(&self, fd: i32) -> Result<Arc<OpenFile>, Errno> {
        self.fds.lock().get(fd)
    }

    /// Syscall dispatcher
    ///
    /// # Arguments (System V ABI order):
    /// - num: syscall number
    /// - arg1-arg3: RDI, RSI, RDX
    ///
    /// # Returns
    /// Return value (negative = error)
    pub fn syscall(&self, num: usize, arg1: usize, arg2: usize, arg3: usize) -> isize {
        log::debug!("Syscall {} called with args: {:#x}, {:#x}, {:#x}", num, arg1, arg2, arg3);

        let ret = match num {
            SYS_READ => self.sys_read(arg1 as i32, UserPtr(arg2), arg3),
            SYS_WRITE => self.sys_write(arg1 as i32, UserPtr(arg2), arg3),
            SYS_OPEN => self.sys_open(UserPtr(arg1), arg2 as u32),
            SYS_CLOSE => self.sys_close(arg1 as i32),
            SYS_FSTAT => self.sys_fstat(arg1 as i32, UserPtr(arg2)),
            SYS_LSEEK => self.sys_lseek(arg1 as i32, arg2 as i64, arg3 as i32),
            SYS_DUP2 => self.sys_dup2(arg1 as i32, arg2 as i32),
            _ => {
                log::warn!("Unknown syscall number: {}", num);
                Errno::ENOSYS.as_ret()
            }
        };

        log::debug!("Syscall {} returning: {}", num, ret);
        ret
    }
}
