//! Block I/O through the three-file staging scheme.
//!
//! All block access from the layers above funnels through [`Store`]. Outside
//! a transaction only the image is consulted. Inside one, modified copies of
//! existing blocks live in the `cp` side file and blocks allocated past the
//! committed `total_blocks` live in the `add` side file, so the image itself
//! is never mutated before commit — with one deliberate exception: writing a
//! block for the first time patches that block's 4-byte `journal_slot`
//! prefix in the image to point at its cp slot. The patch is what lets a
//! later `read` find the staged copy; it is recoverable noise to any mount
//! that never replays the transaction, because slot lookups are cross-checked
//! against the slot's recorded owner.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::error::{corrupt, Result};
use crate::journal::Record;
use crate::param::{BSIZE, SLOT_SIZE};
use crate::superblock::Superblock;

/// One 512-byte block, with accessors for the common header fields.
#[derive(Clone)]
pub(crate) struct Block(pub(crate) [u8; BSIZE]);

impl Block {
    pub fn zeroed() -> Self {
        Block([0; BSIZE])
    }

    fn get_u32(&self, at: usize) -> u32 {
        u32::from_le_bytes([self.0[at], self.0[at + 1], self.0[at + 2], self.0[at + 3]])
    }

    fn put_u32(&mut self, at: usize, v: u32) {
        self.0[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }

    pub fn next(&self) -> u32 {
        self.get_u32(4)
    }

    pub fn set_next(&mut self, v: u32) {
        self.put_u32(4, v);
    }

    pub fn prev(&self) -> u32 {
        self.get_u32(8)
    }

    pub fn set_prev(&mut self, v: u32) {
        self.put_u32(8, v);
    }
}

/// The logical block store: image plus cp/add staging.
pub(crate) struct Store {
    image: File,
    cp: File,
    add: File,

    /// Committed counters, mirroring the superblock.
    total_blocks: u32,
    free_head: u32,

    /// Transaction-local counters, promoted at commit.
    new_total_blocks: u32,
    new_free_head: u32,

    /// Valid slots in the cp side file.
    cp_len: u32,

    staging: bool,
}

impl Store {
    pub fn new(image: File, cp: File, add: File, sb: &Superblock) -> Self {
        Self {
            image,
            cp,
            add,
            total_blocks: sb.total_blocks(),
            free_head: sb.free_head(),
            new_total_blocks: sb.total_blocks(),
            new_free_head: sb.free_head(),
            cp_len: 0,
            staging: false,
        }
    }

    /// Upper bound on valid block indices, staged growth included. Chain
    /// walks use it as a cycle guard.
    pub fn block_count(&self) -> u32 {
        self.new_total_blocks.max(self.total_blocks)
    }

    pub fn image_mut(&mut self) -> &mut File {
        &mut self.image
    }

    fn add_len(&self) -> u32 {
        self.new_total_blocks - self.total_blocks
    }

    fn read_image(&mut self, idx: u32) -> io::Result<[u8; BSIZE]> {
        let mut buf = [0; BSIZE];
        self.image.seek(SeekFrom::Start(idx as u64 * BSIZE as u64))?;
        self.image.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_slot(file: &mut File, slot: u32) -> io::Result<(u32, Block)> {
        let mut owner = [0; 4];
        let mut block = Block::zeroed();
        file.seek(SeekFrom::Start(slot as u64 * SLOT_SIZE as u64))?;
        file.read_exact(&mut owner)?;
        file.read_exact(&mut block.0)?;
        Ok((u32::from_le_bytes(owner), block))
    }

    fn write_slot(file: &mut File, slot: u32, owner: u32, bytes: &[u8; BSIZE]) -> io::Result<()> {
        file.seek(SeekFrom::Start(slot as u64 * SLOT_SIZE as u64))?;
        file.write_all(&owner.to_le_bytes())?;
        file.write_all(bytes)?;
        Ok(())
    }

    /// Read block `idx`, preferring its staged copy while a transaction is
    /// open. The returned block always carries a zero `journal_slot`.
    pub fn read(&mut self, idx: u32) -> Result<Block> {
        debug_assert_ne!(idx, 0, "superblock is not read through the store");

        if !self.staging {
            if idx >= self.total_blocks {
                return Err(corrupt("block index past end of image"));
            }
            let mut block = Block(self.read_image(idx)?);
            block.put_u32(0, 0);
            return Ok(block);
        }

        if idx >= self.total_blocks {
            // Added within this transaction.
            if idx >= self.new_total_blocks {
                return Err(corrupt("block index past end of transaction"));
            }
            let (owner, block) = Self::read_slot(&mut self.add, idx - self.total_blocks)?;
            if owner != idx {
                return Err(corrupt("add slot owner mismatch"));
            }
            return Ok(block);
        }

        let mut raw = Block(self.read_image(idx)?);
        let slot = raw.get_u32(0);
        if slot < self.cp_len {
            // The prefix may be stale from an earlier, discarded
            // transaction; trust it only if the slot agrees.
            let (owner, staged) = Self::read_slot(&mut self.cp, slot)?;
            if owner == idx {
                return Ok(staged);
            }
        }
        raw.put_u32(0, 0);
        Ok(raw)
    }

    /// Stage new contents for block `idx`.
    pub fn write(&mut self, idx: u32, block: &Block) -> Result<()> {
        debug_assert_ne!(idx, 0, "superblock is not written through the store");
        if !self.staging {
            return Err(corrupt("block write outside a transaction"));
        }

        let mut bytes = block.0;
        bytes[..4].copy_from_slice(&0u32.to_le_bytes());

        if idx >= self.total_blocks {
            if idx >= self.new_total_blocks {
                return Err(corrupt("block index past end of transaction"));
            }
            Self::write_slot(&mut self.add, idx - self.total_blocks, idx, &bytes)?;
            return Ok(());
        }

        let prefix = {
            let raw = self.read_image(idx)?;
            u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])
        };
        if prefix < self.cp_len {
            let (owner, _) = Self::read_slot(&mut self.cp, prefix)?;
            if owner == idx {
                Self::write_slot(&mut self.cp, prefix, idx, &bytes)?;
                return Ok(());
            }
        }

        // First write of this block in this transaction: append a cp slot
        // and point the image prefix at it.
        let slot = self.cp_len;
        Self::write_slot(&mut self.cp, slot, idx, &bytes)?;
        self.image.seek(SeekFrom::Start(idx as u64 * BSIZE as u64))?;
        self.image.write_all(&slot.to_le_bytes())?;
        self.cp_len += 1;
        Ok(())
    }

    /// Allocate a zeroed block: pop the free list, or grow the image.
    pub fn alloc(&mut self) -> Result<u32> {
        if !self.staging {
            return Err(corrupt("allocation outside a transaction"));
        }

        if self.new_free_head != 0 {
            let idx = self.new_free_head;
            let block = self.read(idx)?;
            self.new_free_head = block.next();
            self.write(idx, &Block::zeroed())?;
            return Ok(idx);
        }

        let idx = self.new_total_blocks;
        let add_len = self.add_len();
        Self::write_slot(&mut self.add, add_len, idx, &[0; BSIZE])?;
        self.new_total_blocks = self
            .new_total_blocks
            .checked_add(1)
            .ok_or_else(|| corrupt("image full"))?;
        Ok(idx)
    }

    /// Push a block onto the free list. Its old contents become irrelevant.
    pub fn free(&mut self, idx: u32) -> Result<()> {
        let mut block = Block::zeroed();
        block.set_next(self.new_free_head);
        self.write(idx, &block)?;
        self.new_free_head = idx;
        Ok(())
    }

    pub fn begin_staging(&mut self) -> Result<()> {
        debug_assert!(!self.staging);
        self.reset_side_files()?;
        self.new_total_blocks = self.total_blocks;
        self.new_free_head = self.free_head;
        self.staging = true;
        Ok(())
    }

    /// `tmpstop`: drop everything staged; the image keeps only stale,
    /// harmless prefix patches.
    pub fn discard_staging(&mut self) -> Result<()> {
        self.new_total_blocks = self.total_blocks;
        self.new_free_head = self.free_head;
        self.staging = false;
        self.reset_side_files()
    }

    /// Everything the journal must carry for this transaction, superblock
    /// record first when the counters moved.
    pub fn staged_records(&mut self) -> Result<Vec<Record>> {
        let mut records = Vec::with_capacity(1 + self.cp_len as usize + self.add_len() as usize);
        if self.new_total_blocks != self.total_blocks || self.new_free_head != self.free_head {
            let sb = Superblock::new(self.new_total_blocks, self.new_free_head);
            records.push(Record {
                owner: 0,
                block: sb.to_block(),
            });
        }
        for slot in 0..self.cp_len {
            let (owner, block) = Self::read_slot(&mut self.cp, slot)?;
            records.push(Record { owner, block });
        }
        for slot in 0..self.add_len() {
            let (owner, block) = Self::read_slot(&mut self.add, slot)?;
            records.push(Record { owner, block });
        }
        Ok(records)
    }

    /// Promote the transaction-local counters after the journal has been
    /// installed into the image.
    pub fn finish_commit(&mut self) -> Result<()> {
        self.total_blocks = self.new_total_blocks;
        self.free_head = self.new_free_head;
        self.staging = false;
        self.reset_side_files()
    }

    fn reset_side_files(&mut self) -> Result<()> {
        self.cp_len = 0;
        self.cp.set_len(0)?;
        self.add.set_len(0)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::path::PathBuf;

    struct Scratch {
        paths: Vec<PathBuf>,
    }

    impl Scratch {
        fn file(&mut self, tag: &str) -> File {
            let path = std::env::temp_dir().join(format!(
                "filefs-bio-{}-{}-{}",
                std::process::id(),
                self.paths.len(),
                tag
            ));
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)
                .unwrap();
            self.paths.push(path);
            file
        }
    }

    impl Drop for Scratch {
        fn drop(&mut self) {
            for p in &self.paths {
                let _ = std::fs::remove_file(p);
            }
        }
    }

    fn store(scratch: &mut Scratch, tag: &str) -> Store {
        let mut image = scratch.file(&format!("{}-img", tag));
        let sb = Superblock::new(2, 0);
        image.write_all(&sb.to_block().0).unwrap();
        image.write_all(&[0; BSIZE]).unwrap();
        let cp = scratch.file(&format!("{}-cp", tag));
        let add = scratch.file(&format!("{}-add", tag));
        Store::new(image, cp, add, &sb)
    }

    #[test]
    fn staged_writes_are_read_back() {
        let mut scratch = Scratch { paths: Vec::new() };
        let mut s = store(&mut scratch, "rw");
        s.begin_staging().unwrap();

        let mut b = Block::zeroed();
        b.0[100] = 0xab;
        s.write(1, &b).unwrap();
        assert_eq!(s.read(1).unwrap().0[100], 0xab);

        // The image itself still holds the old contents (plus the prefix
        // patch).
        let raw = s.read_image(1).unwrap();
        assert_eq!(raw[100], 0);
    }

    #[test]
    fn alloc_grows_then_reuses_freed_blocks() {
        let mut scratch = Scratch { paths: Vec::new() };
        let mut s = store(&mut scratch, "alloc");
        s.begin_staging().unwrap();

        let a = s.alloc().unwrap();
        let b = s.alloc().unwrap();
        assert_eq!((a, b), (2, 3));

        s.free(a).unwrap();
        assert_eq!(s.alloc().unwrap(), a);
        assert_eq!(s.alloc().unwrap(), 4);
    }

    #[test]
    fn discard_forgets_staged_state() {
        let mut scratch = Scratch { paths: Vec::new() };
        let mut s = store(&mut scratch, "discard");
        s.begin_staging().unwrap();

        let mut b = Block::zeroed();
        b.0[20] = 7;
        s.write(1, &b).unwrap();
        let idx = s.alloc().unwrap();
        assert_eq!(idx, 2);
        s.discard_staging().unwrap();

        // A fresh transaction sees the committed state; the stale prefix
        // patch fails its owner cross-check once cp grows again.
        s.begin_staging().unwrap();
        assert_eq!(s.read(1).unwrap().0[20], 0);
        assert_eq!(s.alloc().unwrap(), 2);
    }

    #[test]
    fn records_carry_superblock_when_counters_move() {
        let mut scratch = Scratch { paths: Vec::new() };
        let mut s = store(&mut scratch, "records");
        s.begin_staging().unwrap();

        let idx = s.alloc().unwrap();
        let records = s.staged_records().unwrap();
        assert_eq!(records[0].owner, 0);
        let sb = Superblock::load(&records[0].block).unwrap();
        assert_eq!(sb.total_blocks(), 3);
        assert!(records.iter().any(|r| r.owner == idx));
    }
}
