/*
 * Kernel Message Ring Buffer
 *
 * Fixed-size circular byte buffer backing the kernel log (dmesg).
 *
 * Design:
 * - Fixed-size circular buffer (32KB)
 * - Overwrite on overflow (loses oldest bytes first)
 * - No heap allocations
 * - Not synchronized itself; the logger keeps it behind a spin::Mutex
 */

/// Size of the ring buffer
pub const BUFFER_SIZE: usize = 32 * 1024; // 32KB

/// Ring buffer for log messages
pub struct RingBuffer {
    /// Circular buffer storage
    buffer: [u8; BUFFER_SIZE],

    /// Read position (oldest byte)
    tail: usize,

    /// Number of bytes currently stored
    len: usize,
}

impl RingBuffer {
    /// Create a new empty ring buffer
    pub const fn new() -> Self {
        Self {
            buffer: [0; BUFFER_SIZE],
            tail: 0,
            len: 0,
        }
    }

    /// Append bytes to the ring buffer
    ///
    /// If the buffer is full, the oldest data is overwritten. Input longer
    /// than the buffer keeps only its last BUFFER_SIZE bytes.
    ///
    /// # Returns
    /// Number of bytes actually stored
    pub fn write(&mut self, data: &[u8]) -> usize {
        let data = &data[data.len().saturating_sub(BUFFER_SIZE)..];

        for &byte in data {
            let head = (self.tail + self.len) % BUFFER_SIZE;
            self.buffer[head] = byte;
            if self.len == BUFFER_SIZE {
                self.tail = (self.tail + 1) % BUFFER_SIZE;
            } else {
                self.len += 1;
            }
        }

        data.len()
    }

    /// Drain up to dest.len() bytes, oldest first
    ///
    /// # Returns
    /// Number of bytes actually read
    pub fn read(&mut self, dest: &mut [u8]) -> usize {
        let to_read = self.len.min(dest.len());

        for slot in dest.iter_mut().take(to_read) {
            *slot = self.buffer[self.tail];
            self.tail = (self.tail + 1) % BUFFER_SIZE;
        }
        self.len -= to_read;

        to_read
    }

    /// Check if the ring buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get the number of bytes currently in the buffer
    pub fn len(&self) -> usize {
        self.len
    }

    /// Drop everything stored
    pub fn clear(&mut self) {
        self.tail = 0;
        self.len = 0;
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new()
    }
}
