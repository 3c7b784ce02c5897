//! Mount an EXT4 image through the kernel's storage stack and look inside.
//!
//! ```text
//! ext4-probe [-v|-vv] <image> [path]
//! ```
//!
//! Prints the volume geometry, then lists `path` if it is a directory or
//! writes its contents to stdout otherwise. `path` defaults to `/`.

mod file_device;
mod logger;

use crate::file_device::FileDevice;
use crate::logger::StderrLogger;
use kernel_alloc::{KERNEL_HEAP_SIZE, SharedHeap};
use kernel_ext4::{Ext4Error, Ext4Fs};
use kernel_vfs::{DirEntry, LookupError, NodeType, VfsNode, lookup};
use log::LevelFilter;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, thiserror::Error)]
enum ProbeError {
    #[error("usage: ext4-probe [-v|-vv] <image> [path]")]
    Usage,
    #[error("cannot open image: {0}")]
    Open(std::io::Error),
    #[error("cannot write output: {0}")]
    Output(#[from] std::io::Error),
    #[error("{0}")]
    Fs(#[from] Ext4Error),
    #[error("{path}: {source}")]
    Lookup {
        path: String,
        source: LookupError<Ext4Error>,
    },
}

struct Args {
    image: PathBuf,
    path: String,
    level: LevelFilter,
}

impl Args {
    fn parse(args: impl Iterator<Item = String>) -> Result<Self, ProbeError> {
        let mut level = LevelFilter::Warn;
        let mut positional = Vec::new();
        for arg in args {
            match arg.as_str() {
                "-v" => level = LevelFilter::Debug,
                "-vv" => level = LevelFilter::Trace,
                s if s.starts_with('-') => return Err(ProbeError::Usage),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let image = positional.next().ok_or(ProbeError::Usage)?;
        let path = positional.next().unwrap_or_else(|| String::from("/"));
        if positional.next().is_some() {
            return Err(ProbeError::Usage);
        }
        Ok(Self {
            image: PathBuf::from(image),
            path,
            level,
        })
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ext4-probe: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), ProbeError> {
    let args = Args::parse(std::env::args().skip(1))?;
    // a second logger can only come from a second call
    let _ = StderrLogger::init(args.level);

    let device = FileDevice::open(&args.image).map_err(ProbeError::Open)?;
    let heap = SharedHeap::new(vec![0u8; KERNEL_HEAP_SIZE]);
    let fs = Ext4Fs::mount(&device, &heap)?;

    let mut out = std::io::stdout().lock();
    print_geometry(&mut out, &fs)?;

    let node = lookup(&fs.root(), &args.path).map_err(|source| ProbeError::Lookup {
        path: args.path.clone(),
        source,
    })?;
    if node.metadata().node_type == NodeType::Directory {
        for entry in node.entries() {
            print_entry(&mut out, &entry?)?;
        }
    } else {
        let mut buf = vec![0u8; fs.block_size() as usize];
        let mut offset = 0u64;
        loop {
            let n = node.read(offset, &mut buf)?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n])?;
            offset += n as u64;
        }
    }
    out.flush()?;

    fs.unmount();
    Ok(())
}

fn print_geometry<D, S>(out: &mut impl Write, fs: &Ext4Fs<'_, D, S>) -> std::io::Result<()>
where
    D: kernel_block::BlockDevice,
    S: kernel_alloc::ArenaStorage,
{
    let sb = fs.superblock();
    writeln!(
        out,
        "# {} ({}): {} blocks of {} bytes, {} groups, {} inodes",
        fs.device().name(),
        sb.volume_name().unwrap_or("unnamed"),
        sb.blocks_count(),
        fs.block_size(),
        fs.groups_count(),
        sb.inodes_count,
    )
}

fn print_entry(out: &mut impl Write, entry: &DirEntry) -> std::io::Result<()> {
    let kind = match entry.node_type() {
        NodeType::Directory => 'd',
        NodeType::Symlink => 'l',
        NodeType::CharDevice => 'c',
        NodeType::BlockDevice => 'b',
        NodeType::Pipe => 'p',
        NodeType::Socket => 's',
        NodeType::File | NodeType::MountPoint => '-',
    };
    writeln!(
        out,
        "{kind} {:>8} {}",
        entry.inode(),
        String::from_utf8_lossy(entry.name())
    )
}
