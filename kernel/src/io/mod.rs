/*
 * Input/Output System
 *
 * Device abstraction layer for character devices: the file operation
 * table drivers implement, the chrdev registration table, open files and
 * file descriptors, and the copy helpers for crossing the user boundary.
 */

pub mod chrdev;
pub mod device;
pub mod fd;
pub mod uaccess;
pub mod user_space;

// Re-export device abstraction types
pub use chrdev::{ChrdevRegistry, ChrdevTable, Major, RegistrationError};
pub use device::{Errno, FileOperations, S_IFCHR, S_IFMT, Stat};
pub use fd::{FileDescriptorTable, OpenFile, OpenFlags};
pub use uaccess::{TransferError, UserAccess, UserPtr};
pub use user_space::UserSpace;
