/*
 * Flat User Address Space
 *
 * A process's memory as a single contiguous mapping starting at `base`.
 * Implements the user copy primitives: every byte inside the mapped
 * window is accessible, everything else faults. Shrinking the window
 * with `unmap_from` produces partial faults for accesses straddling
 * the new end.
 */

use alloc::vec;
use alloc::vec::Vec;
use spin::Mutex;

use super::device::Errno;
use super::uaccess::{UserAccess, UserPtr};

/// Default load address for user mappings
pub const USER_BASE: usize = 0x4000_0000;

struct Mapping {
    memory: Vec<u8>,
    mapped_len: usize, // Accessible prefix of `memory`
    brk: usize,        // Bump allocation cursor (offset from base)
}

/// User address space backed by kernel memory
pub struct UserSpace {
    base: usize,
    mapping: Mutex<Mapping>,
}

impl UserSpace {
    /// Map `size` zeroed bytes at `USER_BASE`
    pub fn new(size: usize) -> Self {
        Self::with_base(UserPtr(USER_BASE), size)
    }

    /// Map `size` zeroed bytes at `base`
    pub fn with_base(base: UserPtr, size: usize) -> Self {
        Self {
            base: base.addr(),
            mapping: Mutex::new(Mapping {
                memory: vec![0; size],
                mapped_len: size,
                brk: 0,
            }),
        }
    }

    pub fn base(&self) -> UserPtr {
        UserPtr(self.base)
    }

    /// Carve `len` bytes out of the mapping
    pub fn alloc(&self, len: usize) -> Result<UserPtr, Errno> {
        let mut mapping = self.mapping.lock();
        let start = mapping.brk;
        let end = start.checked_add(len).ok_or(Errno::ENOMEM)?;
        if end > mapping.mapped_len {
            return Err(Errno::ENOMEM);
        }
        mapping.brk = end;
        Ok(UserPtr(self.base + start))
    }

    /// Place `bytes` at `addr` (process-side store)
    pub fn store(&self, addr: UserPtr, bytes: &[u8]) -> Result<(), Errno> {
        let mut mapping = self.mapping.lock();
        let start = self.window(&mapping, addr, bytes.len())?;
        mapping.memory[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Fetch `len` bytes at `addr` (process-side load)
    pub fn load(&self, addr: UserPtr, len: usize) -> Result<Vec<u8>, Errno> {
        let mapping = self.mapping.lock();
        let start = self.window(&mapping, addr, len)?;
        Ok(mapping.memory[start..start + len].to_vec())
    }

    /// Unmap everything from `addr` to the end of the mapping
    pub fn unmap_from(&self, addr: UserPtr) {
        let mut mapping = self.mapping.lock();
        let cut = addr.addr().saturating_sub(self.base);
        mapping.mapped_len = mapping.mapped_len.min(cut);
    }

    /// Offset of `[addr, addr + len)` in the mapping, if fully mapped
    fn window(&self, mapping: &Mapping, addr: UserPtr, len: usize) -> Result<usize, Errno> {
        let offset = addr.addr().checked_sub(self.base).ok_or(Errno::EFAULT)?;
        if self.accessible(mapping, addr, len) == len && offset <= mapping.mapped_len {
            Ok(offset)
        } else {
            Err(Errno::EFAULT)
        }
    }

    /// Number of bytes accessible from `addr`, capped at `len`
    fn accessible(&self, mapping: &Mapping, addr: UserPtr, len: usize) -> usize {
        match addr.addr().checked_sub(self.base) {
            Some(offset) if offset < mapping.mapped_len => len.min(mapping.mapped_len - offset),
            _ => 0,
        }
    }
}

impl UserAccess for UserSpace {
    fn copy_to_user(&self, dst: UserPtr, src: &[u8]) -> usize {
        let mut mapping = self.mapping.lock();
        let n = self.accessible(&mapping, dst, src.len());
        if n > 0 {
            let start = dst.addr() - self.base;
            mapping.memory[start..start + n].copy_from_slice(&src[..n]);
        }
        n
    }

    fn copy_from_user(&self, dst: &mut [u8], src: UserPtr) -> usize {
        let mapping = self.mapping.lock();
        let n = self.accessible(&mapping, src, dst.len());
        if n > 0 {
            let start = src.addr() - self.base;
            dst[..n].copy_from_slice(&mapping.memory[start..start + n]);
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_hands_out_disjoint_ranges() {
        let user = UserSpace::new(64);
        let a = user.alloc(16).unwrap();
        let b = user.alloc(16).unwrap();

        assert_eq!(a, user.base());
        assert_eq!(b, user.base().add(16));
        assert_eq!(user.alloc(64), Err(Errno::ENOMEM));
    }

    #[test]
    fn copies_stop_at_mapping_end() {
        let user = UserSpace::new(16);
        let tail = user.base().add(12);

        assert_eq!(user.copy_to_user(tail, b"abcdefgh"), 4);
        assert_eq!(user.load(tail, 4).unwrap(), b"abcd");

        let mut out = [0u8; 8];
        assert_eq!(user.copy_from_user(&mut out, tail), 4);
        assert_eq!(&out[..4], b"abcd");
    }

    #[test]
    fn unmap_turns_accesses_into_faults() {
        let user = UserSpace::new(32);
        user.store(user.base().add(8), b"xy").unwrap();
        user.unmap_from(user.base().add(8));

        let mut out = [0u8; 2];
        assert_eq!(user.copy_from_user(&mut out, user.base().add(8)), 0);
        assert_eq!(user.load(user.base().add(8), 2), Err(Errno::EFAULT));
        assert_eq!(user.copy_to_user(user.base().add(6), b"abcd"), 2);
    }

    #[test]
    fn addresses_below_base_fault() {
        let user = UserSpace::new(32);
        let below = UserPtr(user.base().addr() - 1);

        assert_eq!(user.copy_to_user(below, b"a"), 0);
        assert_eq!(user.store(below, b"a"), Err(Errno::EFAULT));
    }
}
