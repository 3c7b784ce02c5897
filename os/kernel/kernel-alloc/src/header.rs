//! # Block Header Encoding

use bitfield_struct::bitfield;

/// Magic tag carried by every live block header.
pub const ALLOC_MAGIC: u32 = 0xABCD_1234;

/// Size of the on-arena block header in bytes.
pub const HEADER_SIZE: usize = size_of::<u128>();

/// Header stored at the beginning of **every** block, free or used.
///
/// ```text
/// +---------+----------+------+-----------+-------------------------+
/// | size    | magic    | used | reserved  |      payload ...        |
/// | 64 bits | 32 bits  | 1    | 31 bits   |                         |
/// +---------+----------+------+-----------+-------------------------+
/// ^ block offset                          ^ block offset + HEADER_SIZE
/// ```
///
/// - `size` is the total size of the block **including** the header.
/// - `magic` equals [`ALLOC_MAGIC`] for every block reachable by walking the
///   arena; merged-away blocks have it cleared.
#[bitfield(u128, order = Lsb)]
#[derive(Eq, PartialEq)]
pub struct BlockHeader {
    /// Total block size in bytes, header included.
    pub size: u64,

    /// Validation tag, see [`ALLOC_MAGIC`].
    pub magic: u32,

    /// Whether the block is handed out.
    pub used: bool,

    #[bits(31)]
    __: u32,
}

impl BlockHeader {
    /// A valid header for a block of `size` bytes.
    #[inline]
    pub const fn tagged(size: usize, used: bool) -> Self {
        Self::new()
            .with_size(size as u64)
            .with_magic(ALLOC_MAGIC)
            .with_used(used)
    }

    /// Decode a header from its little-endian arena representation.
    #[inline]
    pub const fn decode(bytes: [u8; HEADER_SIZE]) -> Self {
        Self::from_bits(u128::from_le_bytes(bytes))
    }

    /// Encode the header into its little-endian arena representation.
    #[inline]
    pub const fn encode(self) -> [u8; HEADER_SIZE] {
        self.into_bits().to_le_bytes()
    }
}
