/*
 * Kernel Logging System
 *
 * `log` backend that appends every record to the kernel message ring
 * buffer, readable through `dmesg_read`. Logging is best effort: lines
 * longer than MAX_LINE are truncated and a full ring overwrites its
 * oldest messages. Nothing here ever reports an error to the caller.
 */

use core::fmt::{self, Write};

use heapless::String;
use log::{LevelFilter, Metadata, Record, SetLoggerError};
use spin::Mutex;

use super::ring_buffer::RingBuffer;

/// Longest formatted log line, newline included
pub const MAX_LINE: usize = 256;

/// Kernel message buffer
static LOG_BUFFER: Mutex<RingBuffer> = Mutex::new(RingBuffer::new());

/// Logger writing into LOG_BUFFER
struct KernelLogger;

impl log::Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let line = format_record(record);
            LOG_BUFFER.lock().write(line.as_bytes());
        }
    }

    fn flush(&self) {}
}

/// The KernelLogger instance used for logging.
static LOGGER: KernelLogger = KernelLogger;

/// Install the kernel logger with the given maximum level
///
/// Fails if a logger is already installed; the existing one is kept.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER).map(|()| log::set_max_level(level))
}

/// fmt::Write adapter that keeps whatever fits
struct Truncating<'a>(&'a mut String<MAX_LINE>);

impl Write for Truncating<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            self.0.push(c).map_err(|_| fmt::Error)?;
        }
        Ok(())
    }
}

/// Format a record as `[LEVEL] message\n`, truncated to MAX_LINE
pub fn format_record(record: &Record) -> String<MAX_LINE> {
    let mut line: String<MAX_LINE> = String::new();
    // Overflow only truncates
    let _ = write!(Truncating(&mut line), "[{}] {}", record.level(), record.args());
    if line.push('\n').is_err() {
        line.pop();
        let _ = line.push('\n');
    }
    line
}

/// Drain up to dest.len() bytes of buffered messages
pub fn dmesg_read(dest: &mut [u8]) -> usize {
    LOG_BUFFER.lock().read(dest)
}

/// Discard all buffered messages
pub fn dmesg_clear() {
    LOG_BUFFER.lock().clear();
}
