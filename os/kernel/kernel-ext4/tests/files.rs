mod common;

use common::{
    BS, FOO_TXT, INCOMPAT_FILETYPE, Image, InodeSpec, LINK, extent_root, heap, heap_used,
    index_root, leaf_block, pattern,
};
use kernel_ext4::{Ext4Error, Ext4Fs, PhysicalBlock};

const TREE_FILE: u32 = 20;

/// The standard image plus inode 20 with the given extent root and size.
fn with_file(blocks: u64, i_block: [u8; 60]) -> Image {
    let mut image = Image::standard();
    image.put_inode(TREE_FILE, &InodeSpec::file(blocks * BS as u64, i_block));
    image
}

#[test]
fn reads_through_a_single_extent() {
    let disk = Image::standard().into_disk();
    let heap = heap();
    let fs = Ext4Fs::mount(&disk, &heap).unwrap();
    let inode = fs.read_inode(FOO_TXT).unwrap();

    let mut buf = [0u8; 50];
    let n = fs
        .read_file_data(&inode, (BS * 9 + 100) as u64, &mut buf)
        .unwrap();
    assert_eq!(n, 50);
    assert_eq!(&buf[..], &pattern(509)[100..150]);

    assert_eq!(
        fs.map_file_block(&inode, 3).unwrap(),
        Some(PhysicalBlock {
            block: 503,
            unwritten: false
        })
    );
    let mut block = vec![0u8; BS];
    fs.read_file_block(&inode, 3, &mut block).unwrap();
    assert_eq!(block, pattern(503));
}

#[test]
fn reads_spanning_blocks_are_stitched() {
    let disk = Image::standard().into_disk();
    let heap = heap();
    let fs = Ext4Fs::mount(&disk, &heap).unwrap();
    let inode = fs.read_inode(FOO_TXT).unwrap();

    let mut buf = [0u8; 30];
    let n = fs
        .read_file_data(&inode, (BS - 10) as u64, &mut buf)
        .unwrap();
    assert_eq!(n, 30);
    assert_eq!(&buf[..10], &pattern(500)[BS - 10..]);
    assert_eq!(&buf[10..], &pattern(501)[..20]);
}

#[test]
fn blocks_past_the_end_read_as_zeros() {
    let disk = Image::standard().into_disk();
    let heap = heap();
    let fs = Ext4Fs::mount(&disk, &heap).unwrap();
    let inode = fs.read_inode(FOO_TXT).unwrap();

    assert_eq!(fs.map_file_block(&inode, 10).unwrap(), None);
    let mut block = vec![0xAAu8; BS];
    fs.read_file_block(&inode, 10, &mut block).unwrap();
    assert!(block.iter().all(|&b| b == 0));

    let mut small = [0u8; 10];
    assert_eq!(
        fs.read_file_block(&inode, 0, &mut small),
        Err(Ext4Error::InvalidArgument)
    );
}

#[test]
fn reads_are_clipped_to_the_file_size() {
    let disk = Image::standard().into_disk();
    let heap = heap();
    let fs = Ext4Fs::mount(&disk, &heap).unwrap();
    let inode = fs.read_inode(FOO_TXT).unwrap();
    let size = inode.size();
    assert_eq!(size, (10 * BS) as u64);

    let mut buf = [0u8; 100];
    assert_eq!(fs.read_file_data(&inode, size - 20, &mut buf).unwrap(), 20);
    assert_eq!(&buf[..20], &pattern(509)[BS - 20..]);
    assert_eq!(fs.read_file_data(&inode, size, &mut buf).unwrap(), 0);
    assert_eq!(fs.read_file_data(&inode, size + 5000, &mut buf).unwrap(), 0);
    assert_eq!(fs.read_file_data(&inode, 0, &mut []).unwrap(), 0);
}

#[test]
fn depth_one_trees_resolve() {
    let mut image = with_file(3, index_root(1, &[(0, 40), (2, 41)]));
    image.put_block(40, &leaf_block(&[(0, 2, 600)]));
    image.put_block(41, &leaf_block(&[(2, 1, 700)]));
    for block in [600, 601, 700] {
        image.put_block(block, &pattern(block));
    }
    let disk = image.into_disk();
    let heap = heap();
    let fs = Ext4Fs::mount(&disk, &heap).unwrap();
    let inode = fs.read_inode(TREE_FILE).unwrap();

    let mut block = vec![0u8; BS];
    fs.read_file_block(&inode, 1, &mut block).unwrap();
    assert_eq!(block, pattern(601));
    fs.read_file_block(&inode, 2, &mut block).unwrap();
    assert_eq!(block, pattern(700));
}

#[test]
fn unordered_index_entries_are_corruption() {
    let mut image = with_file(10, index_root(1, &[(5, 40), (2, 41)]));
    image.put_block(40, &leaf_block(&[(5, 5, 600)]));
    image.put_block(41, &leaf_block(&[(2, 3, 700)]));
    let disk = image.into_disk();
    let heap = heap();
    let fs = Ext4Fs::mount(&disk, &heap).unwrap();
    let inode = fs.read_inode(TREE_FILE).unwrap();

    assert!(matches!(
        fs.read_extent_block(&inode, 6),
        Err(Ext4Error::CorruptedExtentTree(_))
    ));
}

#[test]
fn blocks_before_the_first_index_are_corruption() {
    let mut image = with_file(10, index_root(1, &[(4, 40)]));
    image.put_block(40, &leaf_block(&[(4, 6, 600)]));
    let disk = image.into_disk();
    let heap = heap();
    let fs = Ext4Fs::mount(&disk, &heap).unwrap();
    let inode = fs.read_inode(TREE_FILE).unwrap();

    assert!(matches!(
        fs.read_extent_block(&inode, 1),
        Err(Ext4Error::CorruptedExtentTree(_))
    ));
    assert!(fs.read_extent_block(&inode, 4).is_ok());
}

#[test]
fn child_depth_and_magic_are_checked() {
    // root claims depth 2, child is a leaf
    let mut image = with_file(2, index_root(2, &[(0, 40)]));
    image.put_block(40, &leaf_block(&[(0, 2, 600)]));
    let disk = image.into_disk();
    let heap = heap();
    let fs = Ext4Fs::mount(&disk, &heap).unwrap();
    let inode = fs.read_inode(TREE_FILE).unwrap();
    assert!(matches!(
        fs.read_extent_block(&inode, 0),
        Err(Ext4Error::CorruptedExtentTree(_))
    ));

    // child block without a header
    let disk = with_file(2, index_root(1, &[(0, 40)])).into_disk();
    let fs = Ext4Fs::mount(&disk, &heap).unwrap();
    let inode = fs.read_inode(TREE_FILE).unwrap();
    assert!(matches!(
        fs.read_extent_block(&inode, 0),
        Err(Ext4Error::CorruptedExtentTree(_))
    ));
}

#[test]
fn unmapped_blocks_inside_the_file_are_corruption() {
    let disk = with_file(4, extent_root(&[(0, 2, 600)])).into_disk();
    let heap = heap();
    let fs = Ext4Fs::mount(&disk, &heap).unwrap();
    let inode = fs.read_inode(TREE_FILE).unwrap();

    let mut buf = [0u8; 16];
    assert!(matches!(
        fs.read_file_data(&inode, (3 * BS) as u64, &mut buf),
        Err(Ext4Error::CorruptedExtentTree(_))
    ));
}

#[test]
fn unwritten_extents_read_as_zeros() {
    let mut image = with_file(2, extent_root(&[(0, 0x8000 + 2, 800)]));
    image.put_block(800, &pattern(800));
    let disk = image.into_disk();
    let heap = heap();
    let fs = Ext4Fs::mount(&disk, &heap).unwrap();
    let inode = fs.read_inode(TREE_FILE).unwrap();

    assert_eq!(
        fs.read_extent_block(&inode, 0).unwrap(),
        PhysicalBlock {
            block: 800,
            unwritten: true
        }
    );
    let mut buf = [0xFFu8; 64];
    assert_eq!(fs.read_file_data(&inode, 0, &mut buf).unwrap(), 64);
    assert!(buf.iter().all(|&b| b == 0));
}

#[test]
fn inodes_without_extents_are_unsupported() {
    let disk = Image::standard().into_disk();
    let heap = heap();
    let fs = Ext4Fs::mount(&disk, &heap).unwrap();
    let inode = fs.read_inode(LINK).unwrap();

    let mut buf = [0u8; 7];
    assert!(matches!(
        fs.read_file_data(&inode, 0, &mut buf),
        Err(Ext4Error::UnsupportedLayout(_))
    ));
}

#[test]
fn volumes_without_extents_are_unsupported() {
    let mut image = Image::standard();
    image.put_u32(Image::superblock(0x60), INCOMPAT_FILETYPE);
    let disk = image.into_disk();
    let heap = heap();
    let fs = Ext4Fs::mount(&disk, &heap).unwrap();
    let inode = fs.read_inode(FOO_TXT).unwrap();

    assert!(matches!(
        fs.read_extent_block(&inode, 0),
        Err(Ext4Error::UnsupportedLayout(_))
    ));
}

#[test]
fn reads_return_their_scratch_memory() {
    let mut image = with_file(2, index_root(1, &[(0, 40)]));
    image.put_block(40, &leaf_block(&[(0, 2, 600)]));
    let disk = image.into_disk();
    let heap = heap();
    let fs = Ext4Fs::mount(&disk, &heap).unwrap();
    let mounted = heap_used(&heap);

    let tree = fs.read_inode(TREE_FILE).unwrap();
    let foo = fs.read_inode(FOO_TXT).unwrap();
    let link = fs.read_inode(LINK).unwrap();
    let mut buf = vec![0u8; 3 * BS];
    fs.read_file_data(&tree, 0, &mut buf).unwrap();
    fs.read_file_data(&foo, 100, &mut buf).unwrap();
    assert!(fs.read_file_data(&link, 0, &mut buf).is_err());

    assert_eq!(heap_used(&heap), mounted);
}
