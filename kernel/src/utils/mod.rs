pub use self::logger::{dmesg_clear, dmesg_read};

pub mod logger;
pub mod ring_buffer;
