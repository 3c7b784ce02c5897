//! # Extent Trees
//!
//! An extent-mapped inode keeps the root of a B-tree in its 60-byte
//! `i_block` area. Every node starts with a 12-byte header followed by
//! 12-byte entries: index entries in internal nodes, extents in leaves.
//!
//! ```text
//! i_block: ┌────────┬─────────┬─────────┬─────────┬─────────┐
//!          │ header │ entry 0 │ entry 1 │ entry 2 │ entry 3 │
//!          └────────┴─────────┴─────────┴─────────┴─────────┘
//!                       │ depth > 0: child block
//!                       ▼
//! block:   ┌────────┬─────────┬─────────┬── ... ──┐
//!          │ header │ extent  │ extent  │         │
//!          └────────┴─────────┴─────────┴── ... ──┘
//! ```
//!
//! This module decodes a single node and decides where a lookup continues;
//! reading child blocks is the caller's job.

use crate::Ext4Error;
use crate::bytes::{join_u64, read_u16_le, read_u32_le};
use log::trace;

/// `eh_magic` of every extent node.
pub const EXTENT_MAGIC: u16 = 0xF30A;

/// Size of the node header and of each entry.
pub const EXTENT_ENTRY_SIZE: usize = 12;

/// Leaf lengths above this mark unwritten extents.
pub const EXT_INIT_MAX_LEN: u16 = 1 << 15;

/// Deepest tree the kernel driver ever builds.
pub const MAX_EXTENT_DEPTH: u16 = 5;

/// Extent node header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExtentHeader {
    pub entries: u16,
    pub max: u16,
    pub depth: u16,
    pub generation: u32,
}

impl ExtentHeader {
    /// Decode and check the header at the start of `node`.
    ///
    /// # Errors
    /// [`Ext4Error::CorruptedExtentTree`] for a bad magic, an excessive depth
    /// or more entries than the node can hold.
    pub fn parse(node: &[u8]) -> Result<Self, Ext4Error> {
        const W: &str = "extent header";

        let magic = read_u16_le(node, 0, W)?;
        if magic != EXTENT_MAGIC {
            return Err(Ext4Error::CorruptedExtentTree("bad node magic"));
        }
        let header = Self {
            entries: read_u16_le(node, 2, W)?,
            max: read_u16_le(node, 4, W)?,
            depth: read_u16_le(node, 6, W)?,
            generation: read_u32_le(node, 8, W)?,
        };

        if header.depth > MAX_EXTENT_DEPTH {
            return Err(Ext4Error::CorruptedExtentTree("tree too deep"));
        }
        let capacity = node.len() / EXTENT_ENTRY_SIZE - 1;
        if header.entries > header.max || usize::from(header.entries) > capacity {
            return Err(Ext4Error::CorruptedExtentTree("entry count exceeds node"));
        }
        Ok(header)
    }
}

/// Internal node entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExtentIndex {
    /// First logical block covered by the subtree.
    pub block: u32,
    /// Physical block of the child node.
    pub leaf: u64,
}

impl ExtentIndex {
    fn parse(entry: &[u8]) -> Result<Self, Ext4Error> {
        const W: &str = "extent index";
        Ok(Self {
            block: read_u32_le(entry, 0, W)?,
            leaf: join_u64(read_u32_le(entry, 4, W)?, u32::from(read_u16_le(entry, 8, W)?)),
        })
    }
}

/// Leaf node entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Extent {
    /// First logical block covered.
    pub block: u32,
    /// Number of blocks covered.
    pub len: u16,
    /// Physical block backing `block`.
    pub start: u64,
    /// Preallocated but never written; reads as zeros.
    pub unwritten: bool,
}

impl Extent {
    fn parse(entry: &[u8]) -> Result<Self, Ext4Error> {
        const W: &str = "extent";

        let raw_len = read_u16_le(entry, 4, W)?;
        let (len, unwritten) = if raw_len > EXT_INIT_MAX_LEN {
            (raw_len - EXT_INIT_MAX_LEN, true)
        } else {
            (raw_len, false)
        };
        Ok(Self {
            block: read_u32_le(entry, 0, W)?,
            len,
            start: join_u64(read_u32_le(entry, 8, W)?, u32::from(read_u16_le(entry, 6, W)?)),
            unwritten,
        })
    }

    /// Physical block for `logical` if this extent covers it.
    #[must_use]
    pub fn map(&self, logical: u64) -> Option<u64> {
        let offset = logical.checked_sub(u64::from(self.block))?;
        (offset < u64::from(self.len)).then(|| self.start + offset)
    }
}

/// Result of mapping a logical block.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PhysicalBlock {
    pub block: u64,
    pub unwritten: bool,
}

/// Where a lookup goes after visiting one node.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Step {
    /// Read `block` and continue there; the child must have `depth`.
    Descend { block: u64, depth: u16 },
    /// The leaf mapped the logical block.
    Found(PhysicalBlock),
}

fn entry(node: &[u8], i: usize) -> &[u8] {
    let start = EXTENT_ENTRY_SIZE * (i + 1);
    &node[start..start + EXTENT_ENTRY_SIZE]
}

/// Visit one node on the path to `logical`.
///
/// `expected_depth` is `None` for the root and the parent's depth minus one
/// below it.
///
/// # Errors
/// [`Ext4Error::CorruptedExtentTree`] for malformed nodes, index entries out
/// of order, a depth mismatch or a block no extent covers.
pub fn step(node: &[u8], logical: u64, expected_depth: Option<u16>) -> Result<Step, Ext4Error> {
    let header = ExtentHeader::parse(node)?;
    if expected_depth.is_some_and(|d| d != header.depth) {
        return Err(Ext4Error::CorruptedExtentTree("depth mismatch"));
    }
    let entries = usize::from(header.entries);

    if header.depth == 0 {
        for i in 0..entries {
            let extent = Extent::parse(entry(node, i))?;
            if let Some(block) = extent.map(logical) {
                trace!("Logical block {logical} maps to {block} via {extent:?}");
                return Ok(Step::Found(PhysicalBlock {
                    block,
                    unwritten: extent.unwritten,
                }));
            }
        }
        return Err(Ext4Error::CorruptedExtentTree("block not mapped"));
    }

    if entries == 0 {
        return Err(Ext4Error::CorruptedExtentTree("empty index node"));
    }

    // the last index starting at or before the target
    let first = ExtentIndex::parse(entry(node, 0))?;
    if logical < u64::from(first.block) {
        return Err(Ext4Error::CorruptedExtentTree("block precedes first index"));
    }
    let mut chosen = first;
    let mut previous = first.block;
    for i in 1..entries {
        let next = ExtentIndex::parse(entry(node, i))?;
        if next.block <= previous {
            return Err(Ext4Error::CorruptedExtentTree("index entries out of order"));
        }
        previous = next.block;
        if u64::from(next.block) <= logical {
            chosen = next;
        }
    }

    trace!(
        "Descending from depth {} to block {} for logical block {logical}",
        header.depth, chosen.leaf
    );
    Ok(Step::Descend {
        block: chosen.leaf,
        depth: header.depth - 1,
    })
}
