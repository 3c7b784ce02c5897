//! Synthetic EXT4 images.
//!
//! Geometry: 1 KiB blocks, one block group, superblock in block 1,
//! descriptor table in block 2, inode table from block 4 (32 inodes of
//! 256 bytes, eight blocks). Data blocks are free from block 12 on.

#![allow(dead_code)]

use kernel_alloc::SharedHeap;
use kernel_block::RamDisk;

pub const BS: usize = 1024;
pub const BLOCKS: usize = 1024;
pub const INODE_SIZE: usize = 256;
pub const INODES_PER_GROUP: u32 = 32;
pub const INODE_TABLE: usize = 4;
pub const HEAP_SIZE: usize = 64 * 1024;

pub const S_IFREG: u16 = 0o100_000;
pub const S_IFDIR: u16 = 0o040_000;
pub const S_IFLNK: u16 = 0o120_000;

pub const INCOMPAT_FILETYPE: u32 = 0x2;
pub const INCOMPAT_EXTENTS: u32 = 0x40;
pub const INODE_EXTENTS_FL: u32 = 0x8_0000;

pub const FT_REG: u8 = 1;
pub const FT_DIR: u8 = 2;
pub const FT_SYMLINK: u8 = 7;

/// Inode numbers of the standard tree.
pub const SUB_DIR: u32 = 12;
pub const FOO_TXT: u32 = 13;
pub const NESTED_TXT: u32 = 14;
pub const LINK: u32 = 15;

pub const NESTED_CONTENT: &[u8] = b"hello from a nested directory\n";

/// Fields of an inode record; everything not named here stays zero.
#[derive(Debug, Clone, Copy)]
pub struct InodeSpec {
    pub mode: u16,
    pub size: u64,
    pub links: u16,
    pub uid: u32,
    pub gid: u32,
    pub blocks: u64,
    pub flags: u32,
    pub times: [u32; 3],
    pub i_block: [u8; 60],
}

impl InodeSpec {
    pub fn file(size: u64, i_block: [u8; 60]) -> Self {
        Self {
            mode: S_IFREG | 0o644,
            size,
            links: 1,
            uid: 0,
            gid: 0,
            blocks: size.div_ceil(512),
            flags: INODE_EXTENTS_FL,
            times: [0; 3],
            i_block,
        }
    }

    pub fn dir(blocks: u64, i_block: [u8; 60]) -> Self {
        Self {
            mode: S_IFDIR | 0o755,
            links: 2,
            ..Self::file(blocks * BS as u64, i_block)
        }
    }
}

/// A raw image under construction.
pub struct Image {
    pub data: Vec<u8>,
}

impl Image {
    /// An image with a valid superblock and descriptor table, and no inodes.
    pub fn blank() -> Self {
        let mut image = Self {
            data: vec![0; BS * BLOCKS],
        };
        let sb = BS;
        image.put_u32(sb, INODES_PER_GROUP); // inodes_count
        image.put_u32(sb + 0x04, u32::try_from(BLOCKS).unwrap());
        image.put_u32(sb + 0x14, 1); // first_data_block
        image.put_u32(sb + 0x18, 0); // log_block_size
        image.put_u32(sb + 0x20, 8192); // blocks_per_group
        image.put_u32(sb + 0x28, INODES_PER_GROUP);
        image.put_u16(sb + 0x38, 0xEF53);
        image.put_u16(sb + 0x3A, 1);
        image.put_u32(sb + 0x4C, 1); // rev_level
        image.put_u16(sb + 0x58, u16::try_from(INODE_SIZE).unwrap());
        image.put_u32(sb + 0x60, INCOMPAT_FILETYPE | INCOMPAT_EXTENTS);
        image.data[sb + 0x78..sb + 0x78 + 7].copy_from_slice(b"testvol");

        let gd = 2 * BS;
        image.put_u32(gd, 3); // block bitmap
        image.put_u32(gd + 0x04, 3); // inode bitmap
        image.put_u32(gd + 0x08, u32::try_from(INODE_TABLE).unwrap());
        image
    }

    /// The standard tree:
    ///
    /// ```text
    /// /              inode 2,  block 20
    /// ├── foo.txt    inode 13, ten blocks at 500..510
    /// ├── sub/       inode 12, block 21
    /// │   └── nested.txt  inode 14, block 30
    /// └── link       inode 15, symlink
    /// ```
    pub fn standard() -> Self {
        let mut image = Self::blank();
        image.put_inode(2, &InodeSpec::dir(1, extent_root(&[(0, 1, 20)])));
        image.put_dir_block(
            20,
            &[
                (2, FT_DIR, "."),
                (2, FT_DIR, ".."),
                (0, 0, "deleted"),
                (FOO_TXT, FT_REG, "foo.txt"),
                (SUB_DIR, FT_DIR, "sub"),
                (LINK, FT_SYMLINK, "link"),
            ],
        );

        image.put_inode(SUB_DIR, &InodeSpec::dir(1, extent_root(&[(0, 1, 21)])));
        image.put_dir_block(
            21,
            &[
                (SUB_DIR, FT_DIR, "."),
                (2, FT_DIR, ".."),
                (NESTED_TXT, FT_REG, "nested.txt"),
            ],
        );

        image.put_inode(
            FOO_TXT,
            &InodeSpec::file(10 * BS as u64, extent_root(&[(0, 10, 500)])),
        );
        for block in 500..510 {
            image.put_block(block, &pattern(block));
        }

        image.put_inode(
            NESTED_TXT,
            &InodeSpec::file(NESTED_CONTENT.len() as u64, extent_root(&[(0, 1, 30)])),
        );
        image.put_block(30, NESTED_CONTENT);

        image.put_inode(
            LINK,
            &InodeSpec {
                mode: S_IFLNK | 0o777,
                flags: 0,
                ..InodeSpec::file(7, [0; 60])
            },
        );
        image
    }

    pub fn put_u16(&mut self, at: usize, value: u16) {
        self.data[at..at + 2].copy_from_slice(&value.to_le_bytes());
    }

    pub fn put_u32(&mut self, at: usize, value: u32) {
        self.data[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Byte offset of a superblock field.
    pub const fn superblock(field: usize) -> usize {
        BS + field
    }

    pub fn put_block(&mut self, block: usize, bytes: &[u8]) {
        let start = block * BS;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
    }

    pub fn put_inode(&mut self, num: u32, spec: &InodeSpec) {
        let at = INODE_TABLE * BS + (num as usize - 1) * INODE_SIZE;
        let lo = |v: u64| u32::try_from(v & 0xFFFF_FFFF).unwrap();
        let hi = |v: u64| u32::try_from(v >> 32).unwrap();

        self.put_u16(at, spec.mode);
        self.put_u16(at + 0x02, u16::try_from(spec.uid & 0xFFFF).unwrap());
        self.put_u32(at + 0x04, lo(spec.size));
        self.put_u32(at + 0x08, spec.times[0]);
        self.put_u32(at + 0x0C, spec.times[1]);
        self.put_u32(at + 0x10, spec.times[2]);
        self.put_u16(at + 0x18, u16::try_from(spec.gid & 0xFFFF).unwrap());
        self.put_u16(at + 0x1A, spec.links);
        self.put_u32(at + 0x1C, lo(spec.blocks));
        self.put_u32(at + 0x20, spec.flags);
        self.data[at + 0x28..at + 0x28 + 60].copy_from_slice(&spec.i_block);
        self.put_u32(at + 0x6C, hi(spec.size));
        self.put_u16(at + 0x74, u16::try_from(hi(spec.blocks)).unwrap());
        self.put_u16(at + 0x78, u16::try_from(spec.uid >> 16).unwrap());
        self.put_u16(at + 0x7A, u16::try_from(spec.gid >> 16).unwrap());
    }

    /// Write directory records into `block`; the last record spans the rest
    /// of the block.
    pub fn put_dir_block(&mut self, block: usize, entries: &[(u32, u8, &str)]) {
        let mut raw = vec![0u8; BS];
        let mut at = 0;
        for (i, (inode, file_type, name)) in entries.iter().enumerate() {
            let rec_len = if i + 1 == entries.len() {
                BS - at
            } else {
                (8 + name.len()).next_multiple_of(4)
            };
            raw[at..at + 4].copy_from_slice(&inode.to_le_bytes());
            raw[at + 4..at + 6].copy_from_slice(&u16::try_from(rec_len).unwrap().to_le_bytes());
            raw[at + 6] = u8::try_from(name.len()).unwrap();
            raw[at + 7] = *file_type;
            raw[at + 8..at + 8 + name.len()].copy_from_slice(name.as_bytes());
            at += rec_len;
        }
        self.put_block(block, &raw);
    }

    pub fn into_disk(self) -> RamDisk<Vec<u8>> {
        RamDisk::new("test-image", self.data)
    }
}

/// Recognizable content of data block `block`.
pub fn pattern(block: usize) -> Vec<u8> {
    (0..BS)
        .map(|i| u8::try_from((block * 7 + i) % 251).unwrap())
        .collect()
}

/// A depth-0 extent root holding `(logical, len, physical)` leaves.
pub fn extent_root(extents: &[(u32, u16, u64)]) -> [u8; 60] {
    let mut node = [0u8; 60];
    write_header(&mut node, extents.len(), 4, 0);
    for (i, &(block, len, start)) in extents.iter().enumerate() {
        write_leaf(&mut node[12 * (i + 1)..], block, len, start);
    }
    node
}

/// An extent root of the given `depth` holding `(logical, child)` indices.
pub fn index_root(depth: u16, indices: &[(u32, u64)]) -> [u8; 60] {
    let mut node = [0u8; 60];
    write_header(&mut node, indices.len(), 4, depth);
    for (i, &(block, leaf)) in indices.iter().enumerate() {
        let e = &mut node[12 * (i + 1)..];
        e[0..4].copy_from_slice(&block.to_le_bytes());
        e[4..8].copy_from_slice(&u32::try_from(leaf & 0xFFFF_FFFF).unwrap().to_le_bytes());
        e[8..10].copy_from_slice(&u16::try_from(leaf >> 32).unwrap().to_le_bytes());
    }
    node
}

/// A full-block depth-0 extent node.
pub fn leaf_block(extents: &[(u32, u16, u64)]) -> Vec<u8> {
    let mut node = vec![0u8; BS];
    write_header(&mut node, extents.len(), u16::try_from(BS / 12 - 1).unwrap(), 0);
    for (i, &(block, len, start)) in extents.iter().enumerate() {
        write_leaf(&mut node[12 * (i + 1)..], block, len, start);
    }
    node
}

fn write_header(node: &mut [u8], entries: usize, max: u16, depth: u16) {
    node[0..2].copy_from_slice(&0xF30Au16.to_le_bytes());
    node[2..4].copy_from_slice(&u16::try_from(entries).unwrap().to_le_bytes());
    node[4..6].copy_from_slice(&max.to_le_bytes());
    node[6..8].copy_from_slice(&depth.to_le_bytes());
}

fn write_leaf(entry: &mut [u8], block: u32, len: u16, start: u64) {
    entry[0..4].copy_from_slice(&block.to_le_bytes());
    entry[4..6].copy_from_slice(&len.to_le_bytes());
    entry[6..8].copy_from_slice(&u16::try_from(start >> 32).unwrap().to_le_bytes());
    entry[8..12].copy_from_slice(&u32::try_from(start & 0xFFFF_FFFF).unwrap().to_le_bytes());
}

pub fn heap() -> SharedHeap<Vec<u8>> {
    let heap = SharedHeap::new(vec![0; HEAP_SIZE]);
    heap.init().unwrap();
    heap
}

pub fn heap_used(heap: &SharedHeap<Vec<u8>>) -> usize {
    heap.stats().unwrap().used
}
