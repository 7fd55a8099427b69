/*
 * Device Drivers
 *
 * Drivers bound into the chrdev table by their module (see module.rs).
 */

pub mod mychardev;
