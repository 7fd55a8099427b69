/*
 * Module Lifecycle
 *
 * Load and unload of the mychardev module. `ChardevModule::init` builds
 * the device context and registers it as a character device; dropping
 * the returned module (or calling `exit`) unregisters it. A module that
 * failed to register never exists, so teardown only ever runs after a
 * successful registration, and exactly once.
 */

use alloc::sync::Arc;
use log::LevelFilter;

use crate::drivers::mychardev::{CharDevice, DEVICE_NAME};
use crate::io::chrdev::{ChrdevRegistry, Major, RegistrationError};
use crate::utils::logger;

/// Module metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: &'static str,
    pub license: &'static str,
    pub author: &'static str,
    pub description: &'static str,
    pub version: &'static str,
}

pub const MODULE_INFO: ModuleInfo = ModuleInfo {
    name: DEVICE_NAME,
    license: "GPL",
    author: env!("CARGO_PKG_AUTHORS"),
    description: env!("CARGO_PKG_DESCRIPTION"),
    version: env!("CARGO_PKG_VERSION"),
};

/// Load-time parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChardevConfig {
    /// Name the device is registered under
    pub name: &'static str,
    /// Requested major, 0 for dynamic allocation
    pub major: u32,
    /// Maximum level passed to the kernel logger
    pub log_level: LevelFilter,
}

impl Default for ChardevConfig {
    fn default() -> Self {
        Self {
            name: DEVICE_NAME,
            major: 0,
            log_level: LevelFilter::Info,
        }
    }
}

/// A loaded, registered mychardev instance
pub struct ChardevModule {
    registry: Arc<dyn ChrdevRegistry>,
    device: Arc<CharDevice>,
    major: Major,
}

impl ChardevModule {
    /// Create the device and register it with `registry`
    ///
    /// Installs the kernel logger if no logger is set yet.
    pub fn init(config: ChardevConfig, registry: Arc<dyn ChrdevRegistry>) -> Result<Self, RegistrationError> {
        // Another logger (the host's) may already own the log facade
        let _ = logger::init(config.log_level);

        let device = Arc::new(CharDevice::new(config.name));

        match registry.register_chrdev(config.major, config.name, device.clone()) {
            Ok(major) => {
                log::info!("{}: Registered with major number {}", config.name, major);
                Ok(Self {
                    registry,
                    device,
                    major,
                })
            }
            Err(err) => {
                log::error!(
                    "{}: Failed to register a major number: {} (errno {:?})",
                    config.name,
                    err,
                    err.errno()
                );
                Err(err)
            }
        }
    }

    /// Device handle from registration
    pub fn major(&self) -> Major {
        self.major
    }

    pub fn device(&self) -> &Arc<CharDevice> {
        &self.device
    }

    /// Unload the module
    pub fn exit(self) {
        drop(self);
    }
}

impl Drop for ChardevModule {
    fn drop(&mut self) {
        let name = self.device.name();
        self.registry.unregister_chrdev(self.major, name);
        log::info!("{}: Unregistered device", name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::chrdev::ChrdevTable;
    use crate::io::device::Errno;

    #[test]
    fn init_registers_and_drop_unregisters() {
        let table = Arc::new(ChrdevTable::new());

        let module = ChardevModule::init(ChardevConfig::default(), table.clone()).unwrap();
        let major = module.major();
        assert_eq!(table.lookup_name(DEVICE_NAME).map(|(m, _)| m), Ok(major));

        module.exit();
        assert!(table.is_empty());
        assert_eq!(table.lookup(major).err(), Some(Errno::ENODEV));
    }

    #[test]
    fn registration_failure_aborts_load() {
        let table = Arc::new(ChrdevTable::new());
        let first = ChardevModule::init(ChardevConfig::default(), table.clone()).unwrap();

        let err = ChardevModule::init(ChardevConfig::default(), table.clone())
            .err()
            .unwrap();

        assert_eq!(err, RegistrationError::NameInUse(DEVICE_NAME.into()));
        assert_eq!(err.errno(), Errno::EEXIST);
        // The failed load must not have torn down the first registration
        assert_eq!(table.len(), 1);
        drop(first);
        assert!(table.is_empty());
    }

    #[test]
    fn explicit_major_is_honored() {
        let table = Arc::new(ChrdevTable::new());
        let config = ChardevConfig {
            major: 240,
            ..ChardevConfig::default()
        };

        let module = ChardevModule::init(config, table.clone()).unwrap();

        assert_eq!(module.major(), Major(240));
        assert_eq!(module.device().capacity(), 1024);
    }

    #[test]
    fn metadata_matches_package() {
        assert_eq!(MODULE_INFO.name, "mychardev");
        assert_eq!(MODULE_INFO.license, "GPL");
        assert_eq!(MODULE_INFO.description, "Simple Character Device Driver");
        assert_eq!(MODULE_INFO.version, "1.0.0");
    }
}
