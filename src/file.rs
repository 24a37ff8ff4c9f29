//! Open-file handles.
//!
//! An [`FfsFile`] is a plain value object: the decoded open mode, the
//! location of the file's directory entry (for writing back the chain
//! bounds), the chain bounds themselves, and the current position. Closing
//! one is a client-side drop with no block I/O.

use std::io::{self, SeekFrom};

use bitflags::bitflags;

use crate::bio::Store;
use crate::dir::{self, Dirent, EntrySlot, Lookup};
use crate::error::{corrupt, FsError, Result};
use crate::fs::{resolve_parent, FileFs};
use crate::param::{BLOCK_HDR, BSIZE, PAYLOAD};
use crate::path::check_fresh_name;

bitflags! {
    pub(crate) struct OpenFlags: u8 {
        const READ   = 0b0000_0001;
        const WRITE  = 0b0000_0010;
        const CREATE = 0b0000_0100;
        const TRUNC  = 0b0000_1000;
        const APPEND = 0b0001_0000;
    }
}

impl OpenFlags {
    /// Decode a C-stdio mode string.
    pub fn from_mode(mode: &str) -> Result<Self> {
        Ok(match mode {
            "r" => Self::READ,
            "r+" => Self::READ | Self::WRITE,
            "w" => Self::WRITE | Self::CREATE | Self::TRUNC,
            "w+" => Self::READ | Self::WRITE | Self::CREATE | Self::TRUNC,
            "a" => Self::WRITE | Self::CREATE | Self::APPEND,
            "a+" => Self::READ | Self::WRITE | Self::CREATE | Self::APPEND,
            _ => return Err(FsError::NameFormat),
        })
    }
}

/// Position within a content chain. `block` is 0 only while the file is
/// empty; `off` stays within `BLOCK_HDR..=BSIZE`.
#[derive(Clone, Copy)]
struct Pos {
    block: u32,
    off: usize,
    byte: u64,
}

impl Pos {
    fn start_of(start: u32) -> Self {
        Self {
            block: start,
            off: BLOCK_HDR,
            byte: 0,
        }
    }
}

/// An open file.
pub struct FfsFile {
    flags: OpenFlags,

    /// Where the directory entry lives, for chain-bound write-back.
    ent: EntrySlot,

    start: u32,
    stop: u32,
    end_offset: usize,
    size: u64,
    pos: Pos,
}

fn denied(what: &'static str) -> FsError {
    FsError::Io(io::Error::new(io::ErrorKind::PermissionDenied, what))
}

impl FileFs {
    /// Open `path` with a C-stdio `mode` (`r`, `r+`, `w`, `w+`, `a`, `a+`).
    pub fn open(&mut self, path: &str, mode: &str) -> Result<FfsFile> {
        let flags = OpenFlags::from_mode(mode)?;
        self.with_tx(|m| {
            let (phead, name, forces_dir) = resolve_parent(m, path)?;
            if forces_dir || name == "." || name == ".." {
                return Err(FsError::NameFormat);
            }

            let (ent_slot, ent) = match dir::lookup(&mut m.store, phead, name.as_bytes())? {
                Lookup::Found { slot, ent } => {
                    if ent.is_dir() {
                        return Err(FsError::TypeMismatch);
                    }
                    (slot, ent)
                }
                Lookup::Absent => {
                    if !flags.contains(OpenFlags::CREATE) {
                        return Err(FsError::FileNotFound);
                    }
                    check_fresh_name(&name)?;
                    let fresh = Dirent::new_file(name.as_bytes());
                    let slot = dir::append(&mut m.store, phead, &fresh)?;
                    (slot, fresh)
                }
            };

            let (mut start, mut stop, mut end) =
                (ent.start(), ent.stop(), ent.end_offset() as usize);
            if flags.contains(OpenFlags::TRUNC) && start != 0 {
                free_chain(&mut m.store, start, stop)?;
                let mut cleared = ent;
                cleared.set_start(0);
                cleared.set_stop(0);
                cleared.set_end_offset(0);
                dir::write_slot(&mut m.store, ent_slot, &cleared)?;
                start = 0;
                stop = 0;
                end = 0;
            }

            let size = if start == 0 {
                0
            } else {
                chain_size(&mut m.store, start, stop, end)?
            };
            let pos = if start == 0 {
                Pos { block: 0, off: BLOCK_HDR, byte: 0 }
            } else if flags.contains(OpenFlags::APPEND) {
                Pos { block: stop, off: end, byte: size }
            } else {
                Pos::start_of(start)
            };

            Ok(FfsFile {
                flags,
                ent: ent_slot,
                start,
                stop,
                end_offset: end,
                size,
                pos,
            })
        })
    }

    /// Closing a handle is a pure client-side deallocation.
    pub fn close(&mut self, file: FfsFile) {
        drop(file);
    }

    /// Read up to `buf.len()` bytes from the current position; returns how
    /// many were actually read (0 at end of file).
    pub fn read(&mut self, f: &mut FfsFile, buf: &mut [u8]) -> Result<usize> {
        let m = self.mounted_mut()?;
        if !f.flags.contains(OpenFlags::READ) {
            return Err(denied("file not open for reading"));
        }
        if f.start == 0 {
            return Ok(0);
        }

        let mut done = 0;
        while done < buf.len() && f.pos.byte < f.size {
            let block = m.store.read(f.pos.block)?;
            let limit = if f.pos.block == f.stop {
                f.end_offset
            } else {
                BSIZE
            };
            if f.pos.off >= limit {
                if f.pos.block == f.stop {
                    break;
                }
                f.pos.block = block.next();
                f.pos.off = BLOCK_HDR;
                if f.pos.block == 0 {
                    return Err(corrupt("content chain ends before its stop"));
                }
                continue;
            }
            let n = (limit - f.pos.off).min(buf.len() - done);
            buf[done..done + n].copy_from_slice(&block.0[f.pos.off..f.pos.off + n]);
            done += n;
            f.pos.off += n;
            f.pos.byte += n as u64;
        }
        Ok(done)
    }

    /// Write `buf` at the current position, extending the chain as needed;
    /// returns the number of bytes written (all of them, or an error).
    pub fn write(&mut self, f: &mut FfsFile, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.with_tx(|m| {
            if !f.flags.contains(OpenFlags::WRITE) {
                return Err(denied("file not open for writing"));
            }

            if f.start == 0 {
                let first = m.store.alloc()?;
                f.start = first;
                f.stop = first;
                f.end_offset = BLOCK_HDR;
                f.pos = Pos::start_of(first);
            }

            let mut done = 0;
            while done < buf.len() {
                if f.pos.off >= BSIZE {
                    if f.pos.block != f.stop {
                        let block = m.store.read(f.pos.block)?;
                        f.pos.block = block.next();
                        f.pos.off = BLOCK_HDR;
                        if f.pos.block == 0 {
                            return Err(corrupt("content chain ends before its stop"));
                        }
                        continue;
                    }
                    // Tail is full: grow the chain.
                    let grown = m.store.alloc()?;
                    let mut tail = m.store.read(f.pos.block)?;
                    tail.set_next(grown);
                    m.store.write(f.pos.block, &tail)?;
                    let mut fresh = m.store.read(grown)?;
                    fresh.set_prev(f.pos.block);
                    m.store.write(grown, &fresh)?;
                    f.stop = grown;
                    f.end_offset = BLOCK_HDR;
                    f.pos.block = grown;
                    f.pos.off = BLOCK_HDR;
                }

                let n = (BSIZE - f.pos.off).min(buf.len() - done);
                let mut block = m.store.read(f.pos.block)?;
                block.0[f.pos.off..f.pos.off + n].copy_from_slice(&buf[done..done + n]);
                m.store.write(f.pos.block, &block)?;
                done += n;
                f.pos.off += n;
                f.pos.byte += n as u64;
                if f.pos.block == f.stop && f.pos.off > f.end_offset {
                    f.end_offset = f.pos.off;
                }
            }
            if f.pos.byte > f.size {
                f.size = f.pos.byte;
            }

            // Write the chain bounds back into the directory entry.
            let mut ent = dir::read_slot(&mut m.store, f.ent)?;
            ent.set_start(f.start);
            ent.set_stop(f.stop);
            ent.set_end_offset(f.end_offset as u16);
            dir::write_slot(&mut m.store, f.ent, &ent)?;
            Ok(done)
        })
    }

    /// Reposition within the file, clamping to `[0, size]`. Forward walks
    /// follow `next`; backward walks follow `prev`.
    pub fn seek(&mut self, f: &mut FfsFile, from: SeekFrom) -> Result<u64> {
        let m = self.mounted_mut()?;
        let target = match from {
            SeekFrom::Start(n) => n.min(f.size),
            SeekFrom::Current(d) => clamp_offset(f.pos.byte, d, f.size),
            SeekFrom::End(d) => clamp_offset(f.size, d, f.size),
        };

        if f.start == 0 {
            f.pos = Pos { block: 0, off: BLOCK_HDR, byte: 0 };
            return Ok(0);
        }

        let last_ordinal = (f.size - (f.end_offset as u64 - BLOCK_HDR as u64)) / PAYLOAD as u64;
        let target_ordinal = if target == f.size {
            last_ordinal
        } else {
            target / PAYLOAD as u64
        };
        let mut cur_ordinal = (f.pos.byte - (f.pos.off as u64 - BLOCK_HDR as u64)) / PAYLOAD as u64;

        while cur_ordinal < target_ordinal {
            let block = m.store.read(f.pos.block)?;
            f.pos.block = block.next();
            if f.pos.block == 0 {
                return Err(corrupt("content chain ends before its stop"));
            }
            cur_ordinal += 1;
        }
        while cur_ordinal > target_ordinal {
            let block = m.store.read(f.pos.block)?;
            f.pos.block = block.prev();
            if f.pos.block == 0 {
                return Err(corrupt("content chain backpointer missing"));
            }
            cur_ordinal -= 1;
        }

        f.pos.off = BLOCK_HDR + (target - target_ordinal * PAYLOAD as u64) as usize;
        f.pos.byte = target;
        Ok(target)
    }

    /// The current byte position.
    pub fn tell(&self, f: &FfsFile) -> u64 {
        f.pos.byte
    }

    pub fn rewind(&mut self, f: &mut FfsFile) -> Result<()> {
        self.seek(f, SeekFrom::Start(0)).map(|_| ())
    }
}

fn clamp_offset(base: u64, delta: i64, size: u64) -> u64 {
    let moved = base as i64 + delta;
    if moved < 0 {
        0
    } else {
        (moved as u64).min(size)
    }
}

/// Every block of a content chain, in order.
pub(crate) fn chain_blocks(store: &mut Store, start: u32, stop: u32) -> Result<Vec<u32>> {
    let mut blocks = Vec::new();
    let mut cur = start;
    for _ in 0..store.block_count() {
        blocks.push(cur);
        if cur == stop {
            return Ok(blocks);
        }
        cur = store.read(cur)?.next();
        if cur == 0 {
            return Err(corrupt("content chain ends before its stop"));
        }
    }
    Err(corrupt("content chain cycle"))
}

/// Byte length described by chain bounds.
pub(crate) fn chain_size(store: &mut Store, start: u32, stop: u32, end: usize) -> Result<u64> {
    if end < BLOCK_HDR || end > BSIZE {
        return Err(corrupt("content chain end offset"));
    }
    let blocks = chain_blocks(store, start, stop)?.len() as u64;
    Ok((blocks - 1) * PAYLOAD as u64 + (end - BLOCK_HDR) as u64)
}

/// Return a whole content chain to the free list.
pub(crate) fn free_chain(store: &mut Store, start: u32, stop: u32) -> Result<()> {
    let mut cur = start;
    for _ in 0..store.block_count() {
        let next = store.read(cur)?.next();
        store.free(cur)?;
        if cur == stop {
            return Ok(());
        }
        cur = next;
        if cur == 0 {
            return Err(corrupt("content chain ends before its stop"));
        }
    }
    Err(corrupt("content chain cycle"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_strings_decode() {
        let r = OpenFlags::from_mode("r").unwrap();
        assert!(r.contains(OpenFlags::READ) && !r.contains(OpenFlags::WRITE));

        let w = OpenFlags::from_mode("w").unwrap();
        assert!(w.contains(OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNC));
        assert!(!w.contains(OpenFlags::READ));

        let a_plus = OpenFlags::from_mode("a+").unwrap();
        assert!(a_plus.contains(OpenFlags::READ | OpenFlags::WRITE | OpenFlags::APPEND));
        assert!(!a_plus.contains(OpenFlags::TRUNC));

        assert!(OpenFlags::from_mode("rw").is_err());
        assert!(OpenFlags::from_mode("").is_err());
    }

    #[test]
    fn offsets_clamp_at_both_ends() {
        assert_eq!(clamp_offset(10, -20, 100), 0);
        assert_eq!(clamp_offset(10, 5, 100), 15);
        assert_eq!(clamp_offset(10, 1000, 100), 100);
        assert_eq!(clamp_offset(0, -1, 0), 0);
    }
}
