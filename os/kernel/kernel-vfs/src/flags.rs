use bitfield_struct::bitfield;

/// Access mode of an open request (bits 0..=1 of [`OpenFlags`]).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum AccessMode {
    ReadOnly = 0,
    WriteOnly = 1,
    ReadWrite = 2,
}

impl AccessMode {
    const fn into_bits(self) -> u8 {
        self as u8
    }

    /// The reserved encoding `3` reads as read-write.
    const fn from_bits(value: u8) -> Self {
        match value {
            0 => Self::ReadOnly,
            1 => Self::WriteOnly,
            _ => Self::ReadWrite,
        }
    }
}

/// Flags passed to [`VfsNode::open`](crate::VfsNode::open).
#[bitfield(u32, order = Lsb)]
#[derive(PartialEq, Eq)]
pub struct OpenFlags {
    /// Bits 0..=1: access mode.
    #[bits(2, default = AccessMode::ReadOnly)]
    pub access: AccessMode,

    #[bits(1)]
    __: u8,

    /// Bit 3: writes go to the end of the file.
    pub append: bool,

    #[bits(4)]
    __: u8,

    /// Bit 8: create the file if it does not exist.
    pub create: bool,

    /// Bit 9: truncate to zero length on open.
    pub truncate: bool,

    /// Bit 10: with `create`, fail if the file exists.
    pub exclusive: bool,

    /// Bit 11: do not follow a trailing symlink.
    pub no_follow: bool,

    /// Bit 12: fail unless the node is a directory.
    pub directory: bool,

    #[bits(19)]
    __: u32,
}

impl OpenFlags {
    /// Whether the request asks for any kind of write access.
    #[must_use]
    pub const fn wants_write(&self) -> bool {
        !matches!(self.access(), AccessMode::ReadOnly)
            || self.append()
            || self.create()
            || self.truncate()
    }
}
