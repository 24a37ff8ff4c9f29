use core::mem;

use byteorder::LittleEndian;
use static_assertions::const_assert;
use zerocopy::byteorder::U32;
use zerocopy::{AsBytes, FromBytes, LayoutVerified, Unaligned};

use crate::bio::Block;
use crate::error::{corrupt, Result};
use crate::param::{BSIZE, FSMAGIC};

/// Block 0. Everything after these fields is zero-filled.
#[repr(C)]
#[derive(Clone, FromBytes, AsBytes, Unaligned)]
pub(crate) struct Superblock {
    /// Must be FSMAGIC.
    magic: [u8; 4],

    /// Total blocks ever allocated in the image, superblock included.
    total_blocks: U32<LittleEndian>,

    /// First free block, or 0 if the free list is empty.
    free_head: U32<LittleEndian>,
}

const_assert!(mem::size_of::<Superblock>() <= BSIZE);

impl Superblock {
    pub fn new(total_blocks: u32, free_head: u32) -> Self {
        Self {
            magic: FSMAGIC,
            total_blocks: U32::new(total_blocks),
            free_head: U32::new(free_head),
        }
    }

    /// Decode block 0, validating the magic.
    pub fn load(block: &Block) -> Result<Self> {
        let view = LayoutVerified::<_, Self>::new_unaligned(&block.0[..mem::size_of::<Self>()])
            .ok_or_else(|| corrupt("superblock too short"))?;
        let sb = (*view).clone();
        if sb.magic != FSMAGIC {
            return Err(corrupt("bad image magic"));
        }
        if sb.total_blocks.get() < 2 {
            return Err(corrupt("image holds fewer than two blocks"));
        }
        Ok(sb)
    }

    pub fn to_block(&self) -> Block {
        let mut block = Block::zeroed();
        block.0[..mem::size_of::<Self>()].copy_from_slice(self.as_bytes());
        block
    }

    pub fn total_blocks(&self) -> u32 {
        self.total_blocks.get()
    }

    pub fn free_head(&self) -> u32 {
        self.free_head.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_a_block() {
        let sb = Superblock::new(17, 9);
        let block = sb.to_block();
        let back = Superblock::load(&block).unwrap();
        assert_eq!(back.total_blocks(), 17);
        assert_eq!(back.free_head(), 9);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut block = Superblock::new(2, 0).to_block();
        block.0[0] ^= 0xff;
        assert!(Superblock::load(&block).is_err());
    }
}
