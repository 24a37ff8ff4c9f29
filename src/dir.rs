//! Directory chains.
//!
//! A directory is a chain of blocks holding packed 25-byte entries. The head
//! block's first entry is `.` and doubles as the chain metadata: its `start`
//! is the head's own index, its `stop` the current tail block, and its
//! `end_offset` the used byte count inside that tail. The second entry is
//! `..`, whose `start` is the parent head (0 at the root). Every non-tail
//! block is full; removal compacts by moving the tail's last entry into the
//! hole, so entry order is not significant.

use core::mem;

use byteorder::LittleEndian;
use static_assertions::const_assert_eq;
use zerocopy::byteorder::{U16, U32};
use zerocopy::{AsBytes, FromBytes, LayoutVerified, Unaligned};

use crate::bio::{Block, Store};
use crate::error::{corrupt, Result};
use crate::param::{BLOCK_HDR, BSIZE, DIRENTS_PER_BLOCK, DIRENT_SIZE, DIRSIZ};

/// `state` low bit: set for files, clear for directories.
const STATE_FILE: u8 = 0x01;
const STATE_DIR: u8 = 0x00;

/// Byte offset of the `.` metadata entry in a head block.
const META_OFF: usize = BLOCK_HDR;

/// Byte offset of the `..` parent entry in a head block.
const PARENT_OFF: usize = BLOCK_HDR + DIRENT_SIZE;

/// Tail byte count of a directory holding only `.` and `..`.
pub(crate) const EMPTY_DIR_END: usize = BLOCK_HDR + 2 * DIRENT_SIZE;

/// On-disk directory entry.
#[repr(C)]
#[derive(Clone, FromBytes, AsBytes, Unaligned)]
pub(crate) struct Dirent {
    state: u8,
    name: [u8; DIRSIZ],
    start: U32<LittleEndian>,
    stop: U32<LittleEndian>,
    end_offset: U16<LittleEndian>,
}

const_assert_eq!(mem::size_of::<Dirent>(), DIRENT_SIZE);
const_assert_eq!(BLOCK_HDR + DIRENTS_PER_BLOCK * DIRENT_SIZE, BSIZE);

impl Dirent {
    fn new(state: u8, name: &[u8], start: u32, stop: u32, end_offset: u16) -> Self {
        let mut ent = Self {
            state,
            name: [0; DIRSIZ],
            start: U32::new(start),
            stop: U32::new(stop),
            end_offset: U16::new(end_offset),
        };
        ent.set_name(name);
        ent
    }

    pub fn new_dir(name: &[u8], head: u32) -> Self {
        Self::new(STATE_DIR, name, head, 0, 0)
    }

    pub fn new_file(name: &[u8]) -> Self {
        Self::new(STATE_FILE, name, 0, 0, 0)
    }

    pub fn is_dir(&self) -> bool {
        self.state & STATE_FILE == 0
    }

    /// Fill in name. If name is shorter than DIRSIZ a NUL terminator is
    /// appended; longer input is truncated (callers validate length first).
    pub fn set_name(&mut self, name: &[u8]) {
        let n = name.len().min(DIRSIZ);
        self.name = [0; DIRSIZ];
        self.name[..n].copy_from_slice(&name[..n]);
    }

    /// The name without its NUL padding.
    pub fn name_bytes(&self) -> &[u8] {
        let len = self.name.iter().position(|ch| *ch == 0).unwrap_or(DIRSIZ);
        &self.name[..len]
    }

    pub fn start(&self) -> u32 {
        self.start.get()
    }

    pub fn set_start(&mut self, v: u32) {
        self.start.set(v);
    }

    pub fn stop(&self) -> u32 {
        self.stop.get()
    }

    pub fn set_stop(&mut self, v: u32) {
        self.stop.set(v);
    }

    pub fn end_offset(&self) -> u16 {
        self.end_offset.get()
    }

    pub fn set_end_offset(&mut self, v: u16) {
        self.end_offset.set(v);
    }
}

/// Where an entry lives: block index plus in-block byte offset.
#[derive(Clone, Copy)]
pub(crate) struct EntrySlot {
    pub block: u32,
    pub offset: usize,
}

pub(crate) enum Lookup {
    Found { slot: EntrySlot, ent: Dirent },
    Absent,
}

fn entry_at(block: &Block, off: usize) -> Dirent {
    let view = LayoutVerified::<_, Dirent>::new_unaligned(&block.0[off..off + DIRENT_SIZE])
        .expect("dirent slice");
    (*view).clone()
}

fn put_entry(block: &mut Block, off: usize, ent: &Dirent) {
    block.0[off..off + DIRENT_SIZE].copy_from_slice(ent.as_bytes());
}

/// A fresh directory head: `.` pointing at itself, `..` at the parent.
pub(crate) fn fresh_head(own: u32, parent: u32) -> Block {
    let mut block = Block::zeroed();
    put_entry(
        &mut block,
        META_OFF,
        &Dirent::new(STATE_DIR, b".", own, own, EMPTY_DIR_END as u16),
    );
    put_entry(
        &mut block,
        PARENT_OFF,
        &Dirent::new(STATE_DIR, b"..", parent, 0, 0),
    );
    block
}

pub(crate) fn init(store: &mut Store, head: u32, parent: u32) -> Result<()> {
    store.write(head, &fresh_head(head, parent))
}

/// Chain metadata out of the head's `.` entry: (tail block, tail used bytes).
fn chain_meta(store: &mut Store, head: u32) -> Result<(u32, usize)> {
    let block = store.read(head)?;
    let meta = entry_at(&block, META_OFF);
    let used = meta.end_offset() as usize;
    let floor = if meta.stop() == head {
        EMPTY_DIR_END
    } else {
        BLOCK_HDR + DIRENT_SIZE
    };
    if meta.start() != head || used < floor || used > BSIZE {
        return Err(corrupt("directory head metadata"));
    }
    Ok((meta.stop(), used))
}

fn update_meta(store: &mut Store, head: u32, stop: u32, end: usize) -> Result<()> {
    let mut block = store.read(head)?;
    let mut meta = entry_at(&block, META_OFF);
    meta.set_stop(stop);
    meta.set_end_offset(end as u16);
    put_entry(&mut block, META_OFF, &meta);
    store.write(head, &block)
}

/// Look for `name` in the directory rooted at `head`.
pub(crate) fn lookup(store: &mut Store, head: u32, name: &[u8]) -> Result<Lookup> {
    let (tail, used) = chain_meta(store, head)?;
    let mut cur = head;
    for _ in 0..store.block_count() {
        let block = store.read(cur)?;
        let limit = if cur == tail { used } else { BSIZE };
        let mut off = BLOCK_HDR;
        while off + DIRENT_SIZE <= limit {
            let ent = entry_at(&block, off);
            if ent.name_bytes() == name {
                return Ok(Lookup::Found {
                    slot: EntrySlot { block: cur, offset: off },
                    ent,
                });
            }
            off += DIRENT_SIZE;
        }
        if cur == tail {
            return Ok(Lookup::Absent);
        }
        cur = block.next();
        if cur == 0 {
            return Err(corrupt("directory chain ends before its tail"));
        }
    }
    Err(corrupt("directory chain cycle"))
}

/// Append an entry, growing an extension block when the tail is full.
pub(crate) fn append(store: &mut Store, head: u32, ent: &Dirent) -> Result<EntrySlot> {
    let (tail, used) = chain_meta(store, head)?;

    if used < BSIZE {
        let mut block = store.read(tail)?;
        put_entry(&mut block, used, ent);
        if tail == head {
            let mut meta = entry_at(&block, META_OFF);
            meta.set_end_offset((used + DIRENT_SIZE) as u16);
            put_entry(&mut block, META_OFF, &meta);
            store.write(head, &block)?;
        } else {
            store.write(tail, &block)?;
            update_meta(store, head, tail, used + DIRENT_SIZE)?;
        }
        return Ok(EntrySlot { block: tail, offset: used });
    }

    let grown = store.alloc()?;
    let mut block = store.read(grown)?;
    block.set_prev(tail);
    put_entry(&mut block, BLOCK_HDR, ent);
    store.write(grown, &block)?;

    let mut old_tail = store.read(tail)?;
    old_tail.set_next(grown);
    store.write(tail, &old_tail)?;
    update_meta(store, head, grown, BLOCK_HDR + DIRENT_SIZE)?;
    Ok(EntrySlot { block: grown, offset: BLOCK_HDR })
}

/// Remove the entry at `slot` by moving the tail's last entry into the hole.
/// An emptied extension block is unlinked and freed.
pub(crate) fn remove(store: &mut Store, head: u32, slot: EntrySlot) -> Result<()> {
    let (tail, used) = chain_meta(store, head)?;
    if used < BLOCK_HDR + DIRENT_SIZE {
        return Err(corrupt("removal from empty directory block"));
    }
    let last_off = used - DIRENT_SIZE;

    if slot.block != tail || slot.offset != last_off {
        let tail_block = store.read(tail)?;
        let last = entry_at(&tail_block, last_off);
        let mut hole = store.read(slot.block)?;
        put_entry(&mut hole, slot.offset, &last);
        store.write(slot.block, &hole)?;
    }

    if last_off == BLOCK_HDR && tail != head {
        // Tail emptied: the predecessor (always full) becomes the tail.
        let tail_block = store.read(tail)?;
        let pred = tail_block.prev();
        if pred == 0 {
            return Err(corrupt("directory chain backpointer missing"));
        }
        let mut pred_block = store.read(pred)?;
        pred_block.set_next(0);
        store.write(pred, &pred_block)?;
        store.free(tail)?;
        update_meta(store, head, pred, BSIZE)
    } else {
        update_meta(store, head, tail, last_off)
    }
}

/// Overwrite the name of the entry at `slot`.
pub(crate) fn rename_slot(store: &mut Store, slot: EntrySlot, name: &[u8]) -> Result<()> {
    let mut block = store.read(slot.block)?;
    let mut ent = entry_at(&block, slot.offset);
    ent.set_name(name);
    put_entry(&mut block, slot.offset, &ent);
    store.write(slot.block, &block)
}

pub(crate) fn read_slot(store: &mut Store, slot: EntrySlot) -> Result<Dirent> {
    let block = store.read(slot.block)?;
    Ok(entry_at(&block, slot.offset))
}

pub(crate) fn write_slot(store: &mut Store, slot: EntrySlot, ent: &Dirent) -> Result<()> {
    let mut block = store.read(slot.block)?;
    put_entry(&mut block, slot.offset, ent);
    store.write(slot.block, &block)
}

/// The parent head recorded in this directory's `..` entry; 0 at the root.
pub(crate) fn parent_of(store: &mut Store, head: u32) -> Result<u32> {
    let block = store.read(head)?;
    Ok(entry_at(&block, PARENT_OFF).start())
}

/// Repoint the `..` entry after the directory moves.
pub(crate) fn set_parent(store: &mut Store, head: u32, parent: u32) -> Result<()> {
    let mut block = store.read(head)?;
    let mut ent = entry_at(&block, PARENT_OFF);
    ent.set_start(parent);
    put_entry(&mut block, PARENT_OFF, &ent);
    store.write(head, &block)
}

/// Only `.` and `..` left?
pub(crate) fn is_empty(store: &mut Store, head: u32) -> Result<bool> {
    let (tail, used) = chain_meta(store, head)?;
    Ok(tail == head && used == EMPTY_DIR_END)
}

/// Snapshot every entry in chain order.
pub(crate) fn entries(store: &mut Store, head: u32) -> Result<Vec<Dirent>> {
    let (tail, used) = chain_meta(store, head)?;
    let mut out = Vec::new();
    let mut cur = head;
    for _ in 0..store.block_count() {
        let block = store.read(cur)?;
        let limit = if cur == tail { used } else { BSIZE };
        let mut off = BLOCK_HDR;
        while off + DIRENT_SIZE <= limit {
            out.push(entry_at(&block, off));
            off += DIRENT_SIZE;
        }
        if cur == tail {
            return Ok(out);
        }
        cur = block.next();
        if cur == 0 {
            return Err(corrupt("directory chain ends before its tail"));
        }
    }
    Err(corrupt("directory chain cycle"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_nul_padded() {
        let mut ent = Dirent::new_file(b"hello");
        assert_eq!(ent.name_bytes(), b"hello");
        ent.set_name(b"fourteen-bytes");
        assert_eq!(ent.name_bytes(), b"fourteen-bytes");
        ent.set_name(b"x");
        assert_eq!(ent.name_bytes(), b"x");
    }

    #[test]
    fn fresh_head_holds_dot_and_dotdot() {
        let block = fresh_head(7, 3);
        let dot = entry_at(&block, META_OFF);
        let dotdot = entry_at(&block, PARENT_OFF);
        assert_eq!(dot.name_bytes(), b".");
        assert_eq!(dot.start(), 7);
        assert_eq!(dot.stop(), 7);
        assert_eq!(dot.end_offset() as usize, EMPTY_DIR_END);
        assert_eq!(dotdot.name_bytes(), b"..");
        assert_eq!(dotdot.start(), 3);
    }
}
