use kernel_vfs::{
    DirEntry, LookupError, NodeMetadata, NodeType, OpenFlags, PathError, Stat, VfsNode, lookup,
};

/// A fixed in-memory tree: `(inode, parent, name, type, contents)`.
const TREE: &[(u32, u32, &str, NodeType, &[u8])] = &[
    (2, 2, "", NodeType::Directory, b""),
    (11, 2, "etc", NodeType::Directory, b""),
    (12, 11, "hostname", NodeType::File, b"freecore\n"),
    (13, 2, "readme", NodeType::File, b"hello"),
    (14, 11, "net", NodeType::Directory, b""),
    (15, 14, "hosts", NodeType::File, b"127.0.0.1 localhost\n"),
];

#[derive(Debug, PartialEq, Eq)]
enum MemError {
    NotADirectory,
}

#[derive(Debug, Clone)]
struct MemNode {
    index: usize,
}

impl MemNode {
    fn root() -> Self {
        Self { index: 0 }
    }

    fn entry(&self) -> &'static (u32, u32, &'static str, NodeType, &'static [u8]) {
        &TREE[self.index]
    }

    fn children(&self) -> impl Iterator<Item = usize> + '_ {
        let inode = self.entry().0;
        TREE.iter()
            .enumerate()
            .filter(move |(i, e)| e.1 == inode && *i != self.index)
            .map(|(i, _)| i)
    }
}

impl VfsNode for MemNode {
    type Error = MemError;

    fn metadata(&self) -> NodeMetadata {
        let (inode, _, _, node_type, data) = *self.entry();
        NodeMetadata {
            inode,
            node_type,
            permissions: 0o644,
            uid: 0,
            gid: 0,
            size: data.len() as u64,
            links: 1,
            atime: 0,
            mtime: 0,
            ctime: 0,
        }
    }

    fn open(&self, _flags: OpenFlags) -> Result<(), Self::Error> {
        Ok(())
    }

    fn close(&self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let data = self.entry().4;
        let start = usize::try_from(offset).unwrap().min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn write(&self, _offset: u64, _buf: &[u8]) -> Result<usize, Self::Error> {
        Ok(0)
    }

    fn readdir(&self, index: u32) -> Result<Option<DirEntry>, Self::Error> {
        if self.entry().3 != NodeType::Directory {
            return Err(MemError::NotADirectory);
        }
        Ok(self.children().nth(index as usize).map(|i| {
            let (inode, _, name, node_type, _) = TREE[i];
            DirEntry::new(inode, node_type, name.as_bytes())
        }))
    }

    fn finddir(&self, name: &[u8]) -> Result<Option<Self>, Self::Error> {
        if self.entry().3 != NodeType::Directory {
            return Err(MemError::NotADirectory);
        }
        Ok(self
            .children()
            .find(|&i| TREE[i].2.as_bytes() == name)
            .map(|index| Self { index }))
    }

    fn stat(&self) -> Result<Stat, Self::Error> {
        let meta = self.metadata();
        Ok(Stat {
            ino: meta.inode,
            size: meta.size,
            ..Stat::default()
        })
    }
}

#[test]
fn root_paths_resolve_to_root() {
    let root = MemNode::root();
    for path in ["", "/", ".", "/./", "/.."] {
        assert_eq!(lookup(&root, path).unwrap().metadata().inode, 2, "{path}");
    }
}

#[test]
fn nested_lookup_follows_directories() {
    let root = MemNode::root();
    let hosts = lookup(&root, "/etc/net/hosts").unwrap();
    assert_eq!(hosts.metadata().inode, 15);

    let mut buf = [0u8; 64];
    let n = hosts.read(0, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"127.0.0.1 localhost\n");
}

#[test]
fn dot_dot_is_resolved_before_lookup() {
    let root = MemNode::root();
    let node = lookup(&root, "/etc/net/../hostname").unwrap();
    assert_eq!(node.metadata().inode, 12);
}

#[test]
fn missing_components_are_not_found() {
    let root = MemNode::root();
    assert_eq!(
        lookup(&root, "/etc/passwd").unwrap_err(),
        LookupError::NotFound
    );
}

#[test]
fn files_cannot_be_traversed() {
    let root = MemNode::root();
    assert_eq!(
        lookup(&root, "/readme/x").unwrap_err(),
        LookupError::NotADirectory
    );
}

#[test]
fn malformed_paths_are_rejected() {
    let root = MemNode::root();
    let long = "x".repeat(300);
    assert_eq!(
        lookup(&root, &long).unwrap_err(),
        LookupError::Path(PathError::NameTooLong)
    );
}

#[test]
fn entries_enumerate_in_order() {
    let root = MemNode::root();
    let etc = lookup(&root, "etc").unwrap();
    let names: Vec<String> = etc
        .entries()
        .map(|e| e.unwrap().name_str().unwrap().to_owned())
        .collect();
    assert_eq!(names, ["hostname", "net"]);
}

#[test]
fn entries_stop_at_first_error() {
    let file = lookup(&MemNode::root(), "/readme").unwrap();
    let mut it = file.entries();
    assert_eq!(it.next(), Some(Err(MemError::NotADirectory)));
    assert_eq!(it.next(), None);
}
