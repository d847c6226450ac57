//! Services generated code calls back into while it runs.
//!
//! A compiled unit receives a pointer to the guest register file and
//! a `&dyn Runtime`. Everything outside the register file (guest RAM,
//! device windows, other cached units, syscalls) is reached through
//! these traits.

/// Why execution stopped inside a helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Executed a word the decoder does not recognize.
    Illegal { pc: u32, word: u32 },
    /// A trap instruction fired.
    Trap { pc: u32 },
    /// An instruction form the translator refused to lower.
    Unsupported { pc: u32, word: u32 },
    /// The guest requested exit through a syscall.
    Exit { code: i64 },
}

/// Default base of the memory-mapped device window.
pub const MMIO_BASE: u32 = 0xE000_0000;

/// Guest physical memory as seen by generated code.
///
/// `load_raw`/`store_raw` move bytes without any byte swapping; the
/// provided `read`/`write` apply guest (big-endian) order and route
/// addresses inside the device window to `mmio_read`/`mmio_write`.
pub trait GuestMemory: Send + Sync {
    /// Copy `buf.len()` bytes starting at `addr` into `buf`.
    /// Unmapped bytes read as zero.
    fn load_raw(&self, addr: u32, buf: &mut [u8]);

    /// Copy `buf` to guest RAM at `addr`. Writes to unmapped
    /// addresses are dropped.
    fn store_raw(&self, addr: u32, buf: &[u8]);

    /// Device read of `size` bytes, value in guest order.
    fn mmio_read(&self, addr: u32, size: u32) -> u64;

    /// Device write of `size` bytes, value in guest order.
    fn mmio_write(&self, addr: u32, size: u32, val: u64);

    /// First address of the device window; the window extends to
    /// the top of the address space.
    fn mmio_base(&self) -> u32 {
        MMIO_BASE
    }

    fn is_mmio(&self, addr: u32) -> bool {
        addr >= self.mmio_base()
    }

    /// Big-endian read of 1, 2, 4 or 8 bytes.
    fn read(&self, addr: u32, size: u32) -> u64 {
        if self.is_mmio(addr) {
            return self.mmio_read(addr, size);
        }
        let mut buf = [0u8; 8];
        let n = size as usize;
        self.load_raw(addr, &mut buf[..n]);
        buf[..n].iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
    }

    /// Big-endian write of 1, 2, 4 or 8 bytes.
    fn write(&self, addr: u32, size: u32, val: u64) {
        if self.is_mmio(addr) {
            self.mmio_write(addr, size, val);
            return;
        }
        let bytes = val.to_be_bytes();
        let n = size as usize;
        self.store_raw(addr, &bytes[8 - n..]);
    }

    /// Big-endian 16-byte read.
    fn read_u128(&self, addr: u32) -> u128 {
        let mut buf = [0u8; 16];
        self.load_raw(addr, &mut buf);
        u128::from_be_bytes(buf)
    }

    fn write_u128(&self, addr: u32, val: u128) {
        self.store_raw(addr, &val.to_be_bytes());
    }

    /// Fetch one instruction word.
    fn fetch32(&self, addr: u32) -> u32 {
        let mut buf = [0u8; 4];
        self.load_raw(addr, &mut buf);
        u32::from_be_bytes(buf)
    }
}

/// Callbacks available to a running compiled unit.
pub trait Runtime {
    fn memory(&self) -> &dyn GuestMemory;

    /// Execute the unit at `addr` (compiling or interpreting as
    /// needed) until it returns. Yields the exit code of the callee.
    ///
    /// # Safety
    /// `env` must point at the live register file of the calling
    /// thread.
    unsafe fn call_block(&self, env: *mut u8, addr: u32) -> u32;

    /// Service a system call. Returns `false` when execution must
    /// stop.
    ///
    /// # Safety
    /// Same contract as [`Runtime::call_block`].
    unsafe fn system_call(&self, env: *mut u8) -> bool;

    /// Request a halt at the next dispatch point.
    fn stop(&self, reason: StopReason);

    /// Record the target of a computed call made from `site`.
    fn observe_call_target(&self, _site: u32, _target: u32) {}

    /// Count one executed interpreter fallback of class `class`.
    fn note_fallback(&self, _class: u32) {}
}

/// Out-of-line helper called by the `Call` op.
///
/// `env` points at the guest register file; `args` holds the four
/// input operands zero-extended to 64 bits.
pub type HelperFn = unsafe fn(env: *mut u8, rt: &dyn Runtime, args: [u64; 4]) -> u64;
