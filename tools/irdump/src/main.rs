//! ppujit-irdump: static image to IR dump tool.
//!
//! Loads a big-endian PPC64 ELF (or a raw code image), lowers it
//! unit by unit, and prints the IR with each guest instruction
//! disassembled on its boundary line.

mod elf;

use std::collections::{BTreeSet, VecDeque};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context as _};
use clap::Parser;
use ppujit_core::dump::dump_ops_with;
use ppujit_core::{Context, GuestMemory, MMIO_BASE};
use ppujit_disas::disas_word;
use ppujit_frontend::{translate_block, LogDiagnostics, LowerConfig};
use ppujit_guest::GuestRam;
use tracing::{debug, info};

/// Smallest RAM mapped for an image.
const MIN_RAM: u64 = 1 << 20;

#[derive(Parser, Debug)]
#[command(name = "ppujit-irdump", about = "Dump the IR of translated PPU code units")]
struct Args {
    /// Guest image (big-endian ELF64, or raw code with --raw)
    image: PathBuf,

    /// Treat the input as raw code loaded at --base
    #[arg(long)]
    raw: bool,

    /// Load address of a raw image
    #[arg(long, value_name = "HEX", value_parser = parse_hex, default_value = "0")]
    base: u32,

    /// Write the dump here instead of stdout
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// First unit address (defaults to the ELF entry or --base)
    #[arg(long, value_name = "HEX", value_parser = parse_hex)]
    start: Option<u32>,

    /// Stop after this many units
    #[arg(long)]
    count: Option<usize>,

    /// Also dump statically known callees
    #[arg(long)]
    follow_calls: bool,

    /// Upper bound on instructions per unit
    #[arg(long, default_value_t = 512)]
    max_insns: u32,

    /// Forward branch distance, in bytes, still lowered inside a unit
    #[arg(long, default_value_t = 1024)]
    local_branch_window: u32,

    /// Lower scalar accesses without the device-window check
    #[arg(long)]
    no_mmio_fork: bool,
}

fn parse_hex(s: &str) -> Result<u32, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(digits, 16).map_err(|e| format!("invalid hex address {s:?}: {e}"))
}

/// RAM holding the image, and the address range code is dumped from.
struct Loaded {
    ram: GuestRam,
    entry: u32,
    code: (u32, u32),
}

fn ram_for(end: u64) -> anyhow::Result<GuestRam> {
    if end > MMIO_BASE as u64 {
        bail!("image ends at {end:#x}, inside the device window");
    }
    let size = end.max(MIN_RAM).next_multiple_of(0x1_0000);
    Ok(GuestRam::new(size as usize)?)
}

fn load_elf(data: &[u8]) -> anyhow::Result<Loaded> {
    let info = elf::parse(data)?;
    if info.e_machine != elf::EM_PPC64 {
        bail!("ELF e_machine {} is not PPC64", info.e_machine);
    }
    let end = info
        .segments
        .iter()
        .map(|s| s.vaddr + s.data.len() as u64)
        .max()
        .context("no loadable segments")?;
    let ram = ram_for(end)?;
    let mut code = (u32::MAX, 0);
    for seg in &info.segments {
        let vaddr = seg.vaddr as u32;
        ram.load_image(vaddr, &seg.data)?;
        if seg.executable {
            code.0 = code.0.min(vaddr);
            code.1 = code.1.max(vaddr + seg.data.len() as u32);
        }
    }
    if code.0 >= code.1 {
        bail!("no executable segments found");
    }
    Ok(Loaded {
        ram,
        entry: info.entry as u32,
        code,
    })
}

fn load_raw(data: &[u8], base: u32) -> anyhow::Result<Loaded> {
    let end = base as u64 + data.len() as u64;
    let ram = ram_for(end)?;
    ram.load_image(base, data)?;
    Ok(Loaded {
        ram,
        entry: base,
        code: (base, end as u32),
    })
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let data = fs::read(&args.image)
        .with_context(|| format!("failed to read {}", args.image.display()))?;
    let loaded = if args.raw || !elf::is_elf(&data) {
        load_raw(&data, args.base)?
    } else {
        load_elf(&data)?
    };
    let (lo, hi) = loaded.code;
    info!(
        code = format_args!("{lo:#010x}..{hi:#010x}"),
        entry = format_args!("{:#010x}", loaded.entry),
        "image loaded"
    );

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => {
            let f = fs::File::create(path)
                .with_context(|| format!("cannot create {}", path.display()))?;
            Box::new(BufWriter::new(f))
        }
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let cfg = LowerConfig {
        max_insns: args.max_insns,
        local_branch_window: args.local_branch_window,
        mmio_fork: !args.no_mmio_fork,
    };
    let ram = &loaded.ram;
    let max_count = args.count.unwrap_or(usize::MAX);
    let mut ir = Context::new();
    let mut seen = BTreeSet::new();
    let mut queue = VecDeque::from([args.start.unwrap_or(loaded.entry)]);
    let (mut units, mut insns, mut fallbacks) = (0usize, 0u64, 0u64);

    while let Some(pc) = queue.pop_front() {
        if units >= max_count {
            break;
        }
        if pc < lo || pc >= hi || pc % 4 != 0 || !seen.insert(pc) {
            continue;
        }
        let unit = translate_block(&mut ir, ram, pc, &cfg, &LogDiagnostics, None);
        writeln!(
            out,
            "unit #{units} @ {pc:#010x} insns={} fallbacks={} nesting={}",
            unit.tb.icount, unit.tb.fallbacks, unit.nesting
        )?;
        dump_ops_with(&ir, &mut out, |pc, w| {
            let word = ram.fetch32(pc);
            write!(w, "  {word:08x}  {}", disas_word(pc, word))
        })?;
        writeln!(out)?;

        units += 1;
        insns += unit.tb.icount as u64;
        fallbacks += unit.tb.fallbacks as u64;
        if args.follow_calls {
            for &callee in &unit.info.callees {
                debug!(callee = format_args!("{callee:#010x}"), "queued callee");
                queue.push_back(callee);
            }
        }
        queue.push_back(unit.info.end());
    }
    out.flush()?;
    eprintln!("{units} unit(s), {insns} instruction(s), {fallbacks} fallback(s)");
    Ok(())
}
