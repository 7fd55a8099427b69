/*
 * Character Device Table
 *
 * Maps major numbers to the file operations registered for them, the
 * way register_chrdev()/unregister_chrdev() do. Drivers only see the
 * `ChrdevRegistry` trait; `ChrdevTable` is the in-kernel implementation
 * the syscall layer resolves device nodes against.
 *
 * Major allocation:
 * - major == 0 asks for a dynamic major, searched from 254 down to 234
 * - any other major in 1..=511 is claimed as-is if free
 * - a device name may only be registered once
 */

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use core::fmt;

use spin::Mutex;
use thiserror::Error;

use super::device::{Errno, FileOperations};

/// Highest dynamic major (searched first)
pub const CHRDEV_MAJOR_DYN_START: u32 = 254;
/// Lowest dynamic major
pub const CHRDEV_MAJOR_DYN_END: u32 = 234;
/// Majors are below this bound
pub const CHRDEV_MAJOR_MAX: u32 = 512;
/// Longest accepted device name
pub const MAX_NAME_LEN: usize = 64;

/// Device handle returned by registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Major(pub u32);

impl fmt::Display for Major {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registration failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("no free major number in {}..={}", CHRDEV_MAJOR_DYN_END, CHRDEV_MAJOR_DYN_START)]
    NoFreeMajor,

    #[error("major {0} already in use")]
    MajorBusy(Major),

    #[error("major {0} out of range")]
    InvalidMajor(u32),

    #[error("device name `{0}` already registered")]
    NameInUse(String),

    #[error("invalid device name")]
    InvalidName,
}

impl RegistrationError {
    /// Diagnostic code reported by the host
    pub fn errno(&self) -> Errno {
        match self {
            RegistrationError::NoFreeMajor | RegistrationError::MajorBusy(_) => Errno::EBUSY,
            RegistrationError::NameInUse(_) => Errno::EEXIST,
            RegistrationError::InvalidMajor(_) | RegistrationError::InvalidName => Errno::EINVAL,
        }
    }
}

impl From<RegistrationError> for Errno {
    fn from(err: RegistrationError) -> Self {
        err.errno()
    }
}

/// Naming and dispatch facility for character devices
pub trait ChrdevRegistry: Send + Sync {
    /// Bind `fops` to a major number under `name`
    ///
    /// `major == 0` requests a dynamically allocated major.
    fn register_chrdev(
        &self,
        major: u32,
        name: &str,
        fops: Arc<dyn FileOperations>,
    ) -> Result<Major, RegistrationError>;

    /// Remove the binding created by `register_chrdev`
    fn unregister_chrdev(&self, major: Major, name: &str);
}

struct ChrdevEntry {
    name: String,
    fops: Arc<dyn FileOperations>,
}

/// Registered character devices, keyed by major
pub struct ChrdevTable {
    entries: Mutex<BTreeMap<Major, ChrdevEntry>>,
}

impl ChrdevTable {
    pub const fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// File operations bound to `major`
    pub fn lookup(&self, major: Major) -> Result<Arc<dyn FileOperations>, Errno> {
        self.entries
            .lock()
            .get(&major)
            .map(|entry| entry.fops.clone())
            .ok_or(Errno::ENODEV)
    }

    /// Major and file operations registered under `name`
    pub fn lookup_name(&self, name: &str) -> Result<(Major, Arc<dyn FileOperations>), Errno> {
        self.entries
            .lock()
            .iter()
            .find(|(_, entry)| entry.name == name)
            .map(|(major, entry)| (*major, entry.fops.clone()))
            .ok_or(Errno::ENODEV)
    }

    /// Number of registered devices
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find_dynamic_major(entries: &BTreeMap<Major, ChrdevEntry>) -> Option<Major> {
        (CHRDEV_MAJOR_DYN_END..=CHRDEV_MAJOR_DYN_START)
            .rev()
            .map(Major)
            .find(|major| !entries.contains_key(major))
    }
}

impl Default for ChrdevTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ChrdevRegistry for ChrdevTable {
    fn register_chrdev(
        &self,
        major: u32,
        name: &str,
        fops: Arc<dyn FileOperations>,
    ) -> Result<Major, RegistrationError> {
        if name.is_empty() || name.len() > MAX_NAME_LEN || name.contains('/') {
            return Err(RegistrationError::InvalidName);
        }
        if major >= CHRDEV_MAJOR_MAX {
            return Err(RegistrationError::InvalidMajor(major));
        }

        let mut entries = self.entries.lock();

        if entries.values().any(|entry| entry.name == name) {
            return Err(RegistrationError::NameInUse(name.to_string()));
        }

        let major = if major == 0 {
            Self::find_dynamic_major(&entries).ok_or(RegistrationError::NoFreeMajor)?
        } else if entries.contains_key(&Major(major)) {
            return Err(RegistrationError::MajorBusy(Major(major)));
        } else {
            Major(major)
        };

        entries.insert(
            major,
            ChrdevEntry {
                name: name.to_string(),
                fops,
            },
        );
        log::debug!("chrdev: {} bound to major {}", name, major);
        Ok(major)
    }

    fn unregister_chrdev(&self, major: Major, name: &str) {
        let mut entries = self.entries.lock();
        let owner = entries.get(&major).map(|entry| entry.name.clone());
        match owner.as_deref() {
            Some(owner) if owner == name => {
                entries.remove(&major);
                log::debug!("chrdev: {} released major {}", name, major);
            }
            Some(owner) => log::warn!(
                "chrdev: major {} belongs to {}, not {}; left registered",
                major,
                owner,
                name
            ),
            None => log::warn!("chrdev: major {} not registered", major),
        }
    }
}
