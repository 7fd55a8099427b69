/*
 * mychardev - Simple Character Device Driver
 *
 * A loadable character device backed by a fixed 1024-byte memory buffer.
 * Loading the module registers the device under a dynamically assigned
 * major number; user processes then open it as /dev/mychardev and
 * read/write/seek it like a small file. Every open is counted and logged
 * to the kernel message buffer.
 *
 * Layout:
 * - drivers::mychardev: the device and its file operations
 * - io: operation table, chrdev registration, open files, user copies
 * - module: load/unload lifecycle and module metadata
 * - syscall: per-process open/read/write/close/lseek/fstat/dup2
 * - utils: kernel logger and its ring buffer
 */

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod drivers;
pub mod io;
pub mod module;
pub mod syscall;
pub mod utils;

pub use drivers::mychardev::{BUFFER_SIZE, CharDevice, DEVICE_NAME};
pub use module::{ChardevConfig, ChardevModule, MODULE_INFO, ModuleInfo};
pub use syscall::Process;
