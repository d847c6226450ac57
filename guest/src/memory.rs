//! Guest physical memory.
//!
//! A flat mmap-backed RAM region starting at guest address 0 plus a
//! device window at the top of the 32-bit space. Guest addresses are
//! offsets into the mapping.

use std::io;
use std::ptr;
use std::sync::Arc;

use ppujit_core::runtime::{GuestMemory, MMIO_BASE};
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to map guest memory: {0}")]
    Map(#[source] io::Error),
    #[error("image does not fit guest RAM: {addr:#x}+{len:#x}")]
    OutOfRange { addr: u64, len: usize },
    #[error("failed to read image: {0}")]
    Io(#[from] io::Error),
    #[error("bad executable: {0}")]
    BadImage(String),
}

/// A device mapped into the MMIO window.
///
/// Values cross this interface in guest (big-endian) order.
pub trait MmioDevice: Send + Sync {
    fn read(&self, addr: u32, size: u32) -> u64;
    fn write(&self, addr: u32, size: u32, val: u64);
}

/// mmap-backed guest RAM.
pub struct GuestRam {
    base: *mut u8,
    size: usize,
    mmio_base: u32,
    device: Option<Arc<dyn MmioDevice>>,
}

// SAFETY: GuestRam owns its mapping; concurrent guest accesses race
// the same way they would on the emulated hardware.
unsafe impl Send for GuestRam {}
unsafe impl Sync for GuestRam {}

impl GuestRam {
    /// Map `size` bytes of zeroed RAM.
    pub fn new(size: usize) -> Result<Self, LoadError> {
        let size = size.min(MMIO_BASE as usize);
        // SAFETY: anonymous private mapping, no file backing.
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(LoadError::Map(io::Error::last_os_error()));
        }
        Ok(Self {
            base: ptr as *mut u8,
            size,
            mmio_base: MMIO_BASE,
            device: None,
        })
    }

    /// Attach a device to the MMIO window.
    pub fn with_device(mut self, device: Arc<dyn MmioDevice>) -> Self {
        self.device = Some(device);
        self
    }

    /// Move the MMIO window boundary.
    pub fn with_mmio_base(mut self, base: u32) -> Self {
        self.mmio_base = base;
        self
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Host view of `[addr, addr + len)` clipped to RAM.
    fn clip(&self, addr: u32, len: usize) -> usize {
        let start = addr as usize;
        if start >= self.size {
            0
        } else {
            len.min(self.size - start)
        }
    }

    /// Copy an image into RAM.
    pub fn load_image(&self, addr: u32, data: &[u8]) -> Result<(), LoadError> {
        if self.clip(addr, data.len()) != data.len() {
            return Err(LoadError::OutOfRange {
                addr: addr as u64,
                len: data.len(),
            });
        }
        self.store_raw(addr, data);
        Ok(())
    }

    /// Store instruction words in guest order starting at `addr`.
    pub fn write_words(&self, addr: u32, words: &[u32]) -> Result<(), LoadError> {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        self.load_image(addr, &bytes)
    }

    /// Copy of `[addr, addr + len)`, zero past the end of RAM.
    pub fn snapshot(&self, addr: u32, len: usize) -> Vec<u8> {
        let mut out = vec![0; len];
        self.load_raw(addr, &mut out);
        out
    }
}

impl GuestMemory for GuestRam {
    fn load_raw(&self, addr: u32, buf: &mut [u8]) {
        let n = self.clip(addr, buf.len());
        if n < buf.len() {
            warn!(
                addr = format_args!("{:#010x}", addr),
                len = buf.len(),
                "read from unmapped guest memory"
            );
            buf[n..].fill(0);
        }
        if n > 0 {
            // SAFETY: [addr, addr+n) lies inside the mapping.
            unsafe {
                ptr::copy_nonoverlapping(self.base.add(addr as usize), buf.as_mut_ptr(), n);
            }
        }
    }

    fn store_raw(&self, addr: u32, buf: &[u8]) {
        let n = self.clip(addr, buf.len());
        if n < buf.len() {
            warn!(
                addr = format_args!("{:#010x}", addr),
                len = buf.len(),
                kept = n,
                "write past the end of guest memory truncated"
            );
        }
        if n > 0 {
            // SAFETY: [addr, addr+n) lies inside the mapping.
            unsafe {
                ptr::copy_nonoverlapping(buf.as_ptr(), self.base.add(addr as usize), n);
            }
        }
    }

    fn mmio_read(&self, addr: u32, size: u32) -> u64 {
        match &self.device {
            Some(dev) => dev.read(addr, size),
            None => {
                warn!(addr = format_args!("{:#010x}", addr), size, "mmio read with no device");
                0
            }
        }
    }

    fn mmio_write(&self, addr: u32, size: u32, val: u64) {
        match &self.device {
            Some(dev) => dev.write(addr, size, val),
            None => {
                warn!(addr = format_args!("{:#010x}", addr), size, "mmio write with no device");
            }
        }
    }

    fn mmio_base(&self) -> u32 {
        self.mmio_base
    }
}

impl Drop for GuestRam {
    fn drop(&mut self) {
        if !self.base.is_null() {
            // SAFETY: unmapping the region mapped in `new`.
            unsafe {
                libc::munmap(self.base as *mut libc::c_void, self.size);
            }
        }
    }
}
