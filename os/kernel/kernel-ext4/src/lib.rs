//! # Read-only EXT4
//!
//! This crate reads EXT4 volumes from any [`BlockDevice`](kernel_block::BlockDevice)
//! and exposes their files through the [`kernel_vfs`] node interface.
//!
//! ## Volume Layout
//!
//! ```text
//! byte 0      1024          block first_data_block+1
//! ┌──────────┬────────────┬─────────────────────────┬───────── ... ──┐
//! │ boot     │ superblock │ group descriptor table  │ inode tables,  │
//! │          │ (1024 B)   │ (one record per group)  │ data blocks    │
//! └──────────┴────────────┴─────────────────────────┴───────── ... ──┘
//! ```
//!
//! * The [`Superblock`] fixes block size, group geometry and features.
//! * [`GroupDescriptor`]s locate each group's inode table.
//! * [`Inode`] `n` lives in group `(n-1) / inodes_per_group`, slot
//!   `(n-1) % inodes_per_group`.
//! * File contents are located through per-inode extent trees
//!   ([`extent`]); directories are linear lists of records ([`dir`]).
//!
//! ## Memory
//!
//! All scratch buffers come from the kernel heap ([`kernel_alloc::SharedHeap`])
//! as scoped [`HeapBuffer`](kernel_alloc::HeapBuffer)s, so every exit path,
//! including failed mounts, returns them. The only long-lived allocation is
//! the group descriptor table, held by [`Ext4Fs`] until it is unmounted.
//!
//! ## Scope
//!
//! Read-only. Indirect block maps, inline data, hashed directory lookup,
//! journal replay and checksum verification are not supported.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod bytes;
pub mod dir;
pub mod extent;
mod fs;
mod group;
mod inode;
mod node;
mod superblock;

pub use extent::PhysicalBlock;
pub use fs::Ext4Fs;
pub use group::GroupDescriptor;
pub use inode::{INODE_RECORD_SIZE, Inode, InodeFlags, InodeMode, ROOT_INODE};
pub use node::Ext4Node;
pub use superblock::{
    EXT4_SUPER_MAGIC, FeatureIncompat, FeatureRoCompat, SUPERBLOCK_OFFSET, SUPERBLOCK_SIZE,
    Superblock,
};

use kernel_alloc::HeapError;
use kernel_block::BlockError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Ext4Error {
    #[error("invalid argument")]
    InvalidArgument,
    #[error("invalid superblock: {0}")]
    InvalidSuperblock(&'static str),
    #[error("unsupported layout: {0}")]
    UnsupportedLayout(&'static str),
    #[error("corrupted extent tree: {0}")]
    CorruptedExtentTree(&'static str),
    #[error("truncated {0} record")]
    Truncated(&'static str),
    #[error("inode {0} is out of range")]
    InodeOutOfRange(u32),
    #[error("no such entry")]
    NotFound,
    #[error("not a directory")]
    NotADirectory,
    #[error("device error: {0}")]
    Io(#[from] BlockError),
    #[error("heap error: {0}")]
    Heap(#[from] HeapError),
}
