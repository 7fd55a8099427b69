/*
 * mychardev: Buffer-Backed Character Device
 *
 * One fixed 1024-byte buffer shared by every open file of the device.
 * Reads and writes go through the caller's offset cursor and are clamped
 * to the buffer; at or past the end both return 0 (end of stream). The
 * buffer never grows.
 *
 * Locking:
 * - The buffer and the open counter live behind one spin::Mutex
 * - Each operation holds it for its whole critical section, including
 *   the copy across the user boundary, so overlapping writers never
 *   interleave at byte level
 */

use spin::Mutex;

use crate::io::device::{Errno, FileOperations, S_IFCHR, Stat};
use crate::io::uaccess::{self, UserAccess, UserPtr};

/// Default device name
pub const DEVICE_NAME: &str = "mychardev";

/// Capacity of the device buffer in bytes
pub const BUFFER_SIZE: usize = 1024;

struct DeviceState {
    buffer: [u8; BUFFER_SIZE],
    open_count: u64, // Successful opens, never decremented
}

/// The device context
///
/// Created once at module init and handed to the chrdev registry as the
/// device's file operations.
pub struct CharDevice {
    name: &'static str,
    state: Mutex<DeviceState>,
}

impl CharDevice {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(DeviceState {
                buffer: [0; BUFFER_SIZE],
                open_count: 0,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub const fn capacity(&self) -> usize {
        BUFFER_SIZE
    }

    /// Number of successful opens so far
    pub fn open_count(&self) -> u64 {
        self.state.lock().open_count
    }

    /// Run `f` over the buffer contents under the device lock
    pub fn with_buffer<R>(&self, f: impl FnOnce(&[u8; BUFFER_SIZE]) -> R) -> R {
        f(&self.state.lock().buffer)
    }
}

impl FileOperations for CharDevice {
    fn open(&self) -> Result<(), Errno> {
        let count = {
            let mut state = self.state.lock();
            state.open_count += 1;
            state.open_count
        };
        log::info!("{}: Device opened {} times", self.name, count);
        Ok(())
    }

    fn read(
        &self,
        uaccess: &dyn UserAccess,
        buf: UserPtr,
        count: usize,
        offset: &mut u64,
    ) -> Result<usize, Errno> {
        let result = {
            let state = self.state.lock();
            uaccess::simple_read_from_buffer(uaccess, buf, count, offset, &state.buffer)
        };

        match result {
            Ok(bytes_read) => {
                log::info!("{}: Read {} bytes", self.name, bytes_read);
                Ok(bytes_read)
            }
            Err(err) => {
                log::error!("{}: Read failed: {}", self.name, err);
                Err(err.into())
            }
        }
    }

    fn write(
        &self,
        uaccess: &dyn UserAccess,
        buf: UserPtr,
        count: usize,
        offset: &mut u64,
    ) -> Result<usize, Errno> {
        let result = {
            let mut state = self.state.lock();
            uaccess::simple_write_to_buffer(uaccess, &mut state.buffer, offset, buf, count)
        };

        match result {
            Ok(bytes_written) => {
                log::info!("{}: Written {} bytes", self.name, bytes_written);
                Ok(bytes_written)
            }
            Err(err) => {
                log::error!("{}: Write failed: {}", self.name, err);
                Err(err.into())
            }
        }
    }

    fn release(&self) -> Result<(), Errno> {
        log::info!("{}: Device closed", self.name);
        Ok(())
    }

    fn stat(&self) -> Stat {
        Stat {
            st_mode: S_IFCHR | 0o666, // Character device, rw-rw-rw-
            st_size: BUFFER_SIZE as u64,
            st_blksize: BUFFER_SIZE as u64,
            st_blocks: (BUFFER_SIZE / 512) as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::user_space::UserSpace;
    use alloc::sync::Arc;
    use alloc::vec;
    use alloc::vec::Vec;
    use std::thread;

    fn write_at(dev: &CharDevice, user: &UserSpace, bytes: &[u8], offset: u64) -> Result<usize, Errno> {
        let src = user.alloc(bytes.len()).unwrap();
        user.store(src, bytes).unwrap();
        let mut pos = offset;
        dev.write(user, src, bytes.len(), &mut pos)
    }

    fn read_at(dev: &CharDevice, user: &UserSpace, len: usize, offset: u64) -> Result<Vec<u8>, Errno> {
        let dst = user.alloc(len).unwrap();
        let mut pos = offset;
        let n = dev.read(user, dst, len, &mut pos)?;
        Ok(user.load(dst, n).unwrap())
    }

    #[test]
    fn open_counts_every_session() {
        let dev = CharDevice::new(DEVICE_NAME);
        for _ in 0..5 {
            dev.open().unwrap();
            dev.release().unwrap();
        }
        assert_eq!(dev.open_count(), 5);
    }

    #[test]
    fn hello_round_trip_survives_sessions() {
        let dev = CharDevice::new(DEVICE_NAME);
        let user = UserSpace::new(4096);

        dev.open().unwrap();
        assert_eq!(write_at(&dev, &user, b"hello", 0), Ok(5));
        assert_eq!(dev.with_buffer(|buf| buf[..5].to_vec()), b"hello");
        assert_eq!(read_at(&dev, &user, 5, 0).unwrap(), b"hello");
        dev.release().unwrap();

        dev.open().unwrap();
        assert_eq!(read_at(&dev, &user, 5, 0).unwrap(), b"hello");
        dev.release().unwrap();
        assert_eq!(dev.open_count(), 2);
    }

    #[test]
    fn full_buffer_round_trip() {
        let dev = CharDevice::new(DEVICE_NAME);
        let user = UserSpace::new(8192);
        let data: Vec<u8> = (0..BUFFER_SIZE).map(|i| (i * 7 % 251) as u8).collect();

        assert_eq!(write_at(&dev, &user, &data, 0), Ok(BUFFER_SIZE));
        assert_eq!(read_at(&dev, &user, BUFFER_SIZE, 0).unwrap(), data);
    }

    #[test]
    fn capacity_is_end_of_stream() {
        let dev = CharDevice::new(DEVICE_NAME);
        let user = UserSpace::new(4096);

        assert_eq!(write_at(&dev, &user, b"x", BUFFER_SIZE as u64), Ok(0));
        assert_eq!(read_at(&dev, &user, 1, BUFFER_SIZE as u64).unwrap(), b"");
        assert_eq!(write_at(&dev, &user, b"x", 5000), Ok(0));
    }

    #[test]
    fn oversized_write_is_clamped() {
        let dev = CharDevice::new(DEVICE_NAME);
        let user = UserSpace::new(8192);
        let data: Vec<u8> = (0..2000).map(|i| (i % 256) as u8).collect();

        let src = user.alloc(data.len()).unwrap();
        user.store(src, &data).unwrap();
        let mut pos = 0;

        assert_eq!(dev.write(&user, src, data.len(), &mut pos), Ok(BUFFER_SIZE));
        assert_eq!(pos, BUFFER_SIZE as u64);
        dev.with_buffer(|buf| assert_eq!(&buf[..], &data[..BUFFER_SIZE]));
    }

    #[test]
    fn cursor_advances_sequentially() {
        let dev = CharDevice::new(DEVICE_NAME);
        let user = UserSpace::new(4096);
        write_at(&dev, &user, b"abcdefgh", 0).unwrap();

        let dst = user.alloc(3).unwrap();
        let mut pos = 0;
        assert_eq!(dev.read(&user, dst, 3, &mut pos), Ok(3));
        assert_eq!(dev.read(&user, dst, 3, &mut pos), Ok(3));
        assert_eq!(user.load(dst, 3).unwrap(), b"def");
        assert_eq!(pos, 6);

        pos = BUFFER_SIZE as u64 - 2;
        assert_eq!(dev.read(&user, dst, 3, &mut pos), Ok(2));
        assert_eq!(dev.read(&user, dst, 3, &mut pos), Ok(0));
    }

    #[test]
    fn fault_leaves_buffer_and_cursor_alone() {
        let dev = CharDevice::new(DEVICE_NAME);
        let user = UserSpace::new(4096);
        write_at(&dev, &user, b"keep", 0).unwrap();

        let mut pos = 0;
        let unmapped = user.base().add(1 << 20);
        assert_eq!(dev.write(&user, unmapped, 4, &mut pos), Err(Errno::EFAULT));
        assert_eq!(dev.read(&user, UserPtr::NULL, 4, &mut pos), Err(Errno::EFAULT));
        assert_eq!(pos, 0);

        // The failed calls did not disturb later ones
        assert_eq!(read_at(&dev, &user, 4, 0).unwrap(), b"keep");
    }

    #[test]
    fn stat_reports_char_device_of_capacity() {
        let st = CharDevice::new(DEVICE_NAME).stat();
        assert!(crate::io::device::S_ISCHR(st.st_mode));
        assert_eq!(st.st_size, 1024);
    }

    #[test]
    fn concurrent_opens_are_all_counted() {
        let dev = Arc::new(CharDevice::new(DEVICE_NAME));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let dev = dev.clone();
                thread::spawn(move || {
                    for _ in 0..250 {
                        dev.open().unwrap();
                        dev.release().unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(dev.open_count(), 2000);
    }

    #[test]
    fn disjoint_writers_do_not_corrupt_each_other() {
        let dev = Arc::new(CharDevice::new(DEVICE_NAME));
        let user = Arc::new(UserSpace::new(8192));

        let handles: Vec<_> = (0..4u8)
            .map(|id| {
                let dev = dev.clone();
                let user = user.clone();
                thread::spawn(move || {
                    let chunk = vec![b'a' + id; 256];
                    let src = user.alloc(chunk.len()).unwrap();
                    user.store(src, &chunk).unwrap();
                    for _ in 0..200 {
                        let mut pos = id as u64 * 256;
                        assert_eq!(dev.write(&*user, src, 256, &mut pos), Ok(256));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        dev.with_buffer(|buf| {
            for (id, chunk) in buf.chunks(256).enumerate() {
                assert!(chunk.iter().all(|&b| b == b'a' + id as u8));
            }
        });
    }

    #[test]
    fn overlapping_writers_never_interleave() {
        let dev = Arc::new(CharDevice::new(DEVICE_NAME));
        let user = Arc::new(UserSpace::new(8192));

        let writers: Vec<_> = [b'A', b'B']
            .into_iter()
            .map(|fill| {
                let dev = dev.clone();
                let user = user.clone();
                thread::spawn(move || {
                    let src = user.alloc(BUFFER_SIZE).unwrap();
                    user.store(src, &[fill; BUFFER_SIZE]).unwrap();
                    for _ in 0..200 {
                        let mut pos = 0;
                        dev.write(&*user, src, BUFFER_SIZE, &mut pos).unwrap();
                    }
                })
            })
            .collect();

        let reader = {
            let dev = dev.clone();
            let user = user.clone();
            thread::spawn(move || {
                let dst = user.alloc(BUFFER_SIZE).unwrap();
                for _ in 0..200 {
                    let mut pos = 0;
                    dev.read(&*user, dst, BUFFER_SIZE, &mut pos).unwrap();
                    let seen = user.load(dst, BUFFER_SIZE).unwrap();
                    assert!(seen.iter().all(|&b| b == seen[0]));
                }
            })
        };

        for handle in writers {
            handle.join().unwrap();
        }
        reader.join().unwrap();

        dev.with_buffer(|buf| {
            assert!(buf[0] == b'A' || buf[0] == b'B');
            assert!(buf.iter().all(|&b| b == buf[0]));
        });
    }
}
