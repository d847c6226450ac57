//! Minimal big-endian ELF64 reader: entry point and PT_LOAD segments.

use ppujit_guest::LoadError;

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const ELFCLASS64: u8 = 2;
const ELFDATA2MSB: u8 = 2;
const PT_LOAD: u32 = 1;
const PF_X: u32 = 1;
const EHDR_SIZE: usize = 64;
const PHDR_SIZE: usize = 56;

pub const EM_PPC64: u16 = 21;

/// A loadable segment, zero-filled up to its memory size.
pub struct Segment {
    pub vaddr: u64,
    pub data: Vec<u8>,
    pub executable: bool,
}

pub struct ElfInfo {
    pub entry: u64,
    pub e_machine: u16,
    pub segments: Vec<Segment>,
}

fn bad(msg: &str) -> LoadError {
    LoadError::BadImage(msg.into())
}

/// Big-endian field reads at fixed offsets.
struct Be<'a>(&'a [u8]);

impl Be<'_> {
    fn u16(&self, off: usize) -> u16 {
        u16::from_be_bytes([self.0[off], self.0[off + 1]])
    }

    fn u32(&self, off: usize) -> u32 {
        let mut b = [0; 4];
        b.copy_from_slice(&self.0[off..off + 4]);
        u32::from_be_bytes(b)
    }

    fn u64(&self, off: usize) -> u64 {
        let mut b = [0; 8];
        b.copy_from_slice(&self.0[off..off + 8]);
        u64::from_be_bytes(b)
    }
}

/// Does `data` start with the ELF magic?
pub fn is_elf(data: &[u8]) -> bool {
    data.starts_with(&ELF_MAGIC)
}

pub fn parse(data: &[u8]) -> Result<ElfInfo, LoadError> {
    if data.len() < EHDR_SIZE {
        return Err(bad("file too small for ELF header"));
    }
    if !is_elf(data) {
        return Err(bad("not an ELF file"));
    }
    if data[4] != ELFCLASS64 {
        return Err(bad("not a 64-bit ELF"));
    }
    if data[5] != ELFDATA2MSB {
        return Err(bad("not a big-endian ELF"));
    }

    let h = Be(data);
    let entry = h.u64(24);
    let ph_off = h.u64(32) as usize;
    let ph_ent = h.u16(54) as usize;
    let ph_num = h.u16(56) as usize;
    if ph_num > 0 && ph_ent < PHDR_SIZE {
        return Err(bad("program header entries too small"));
    }

    let mut segments = Vec::new();
    for i in 0..ph_num {
        let off = ph_off
            .checked_add(i * ph_ent)
            .filter(|o| o.saturating_add(PHDR_SIZE) <= data.len())
            .ok_or_else(|| bad("program header out of bounds"))?;
        let p = Be(&data[off..off + PHDR_SIZE]);
        if p.u32(0) != PT_LOAD {
            continue;
        }
        let flags = p.u32(4);
        let foff = p.u64(8) as usize;
        let vaddr = p.u64(16);
        let fsz = p.u64(32) as usize;
        let msz = p.u64(40) as usize;
        if fsz > msz {
            return Err(bad("segment file size exceeds memory size"));
        }
        let src = foff
            .checked_add(fsz)
            .and_then(|end| data.get(foff..end))
            .ok_or_else(|| bad("segment data out of bounds"))?;
        let mut seg = vec![0u8; msz];
        seg[..fsz].copy_from_slice(src);
        segments.push(Segment {
            vaddr,
            data: seg,
            executable: flags & PF_X != 0,
        });
    }

    Ok(ElfInfo {
        entry,
        e_machine: h.u16(18),
        segments,
    })
}
