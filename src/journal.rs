//! The transaction journal.
//!
//! Commit stages every dirty block into `<image>-j`, then promotes the file
//! with a single state byte: until `0xff` is durable the journal is
//! discardable and the image is untouched; after it, every mount will replay
//! the same records until one succeeds. Replay is idempotent because each
//! record names its own target block.
//!
//! On-disk layout: `block_count: u32 LE`, `state: u8`, then `block_count`
//! records of `{owner_index: u32 LE, block: [u8; 512]}`.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use log::{debug, warn};

use crate::bio::Block;
use crate::error::{corrupt, FsError, Result};
use crate::param::{BSIZE, SLOT_SIZE};

/// State byte marking a journal that must be replayed.
const STATE_READY: u8 = 0xff;

/// Offset of the first record: count word plus state byte.
const RECORDS_AT: u64 = 5;

/// One journalled block: where it goes, and its full contents.
pub(crate) struct Record {
    pub owner: u32,
    pub block: Block,
}

/// How a failed commit left the journal.
pub(crate) enum CommitError {
    /// The commit marker never became durable; the staging was discarded
    /// and the image is untouched.
    Unstaged(FsError),

    /// The commit marker is durable but installing into the image failed.
    /// The journal must be preserved so the next mount can finish the work.
    Committed(FsError),
}

pub(crate) struct Journal {
    file: File,
    path: PathBuf,
}

impl Journal {
    pub fn open(path: PathBuf) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Mount-time recovery. Replays a ready journal into the image and
    /// empties it; discards anything else. Returns whether a replay ran.
    pub fn recover(&mut self, image: &mut File) -> Result<bool> {
        let len = self.file.metadata()?.len();
        if len < RECORDS_AT {
            self.clear()?;
            return Ok(false);
        }

        self.file.seek(SeekFrom::Start(0))?;
        let mut count = [0; 4];
        let mut state = [0; 1];
        self.file.read_exact(&mut count)?;
        self.file.read_exact(&mut state)?;
        let count = u32::from_le_bytes(count);

        if state[0] != STATE_READY {
            self.clear()?;
            return Ok(false);
        }
        if len < RECORDS_AT + count as u64 * SLOT_SIZE as u64 {
            return Err(corrupt("journal marked ready but truncated"));
        }

        warn!("replaying committed journal: {} blocks", count);
        self.install(count, image)?;
        image.sync_all()?;
        self.clear()?;
        Ok(true)
    }

    /// Run the full commit protocol for one transaction.
    pub fn commit(
        &mut self,
        records: &[Record],
        image: &mut File,
    ) -> std::result::Result<(), CommitError> {
        if records.is_empty() {
            return Ok(());
        }
        match self.stage(records) {
            Ok(()) => {}
            Err(e) => {
                // Not yet promoted; make sure it stays discardable.
                let _ = self.clear();
                return Err(CommitError::Unstaged(e));
            }
        }

        // The marker is durable: from here on the transaction has happened
        // and only installation can still fail.
        debug!("committed journal: {} blocks", records.len());
        self.install(records.len() as u32, image)
            .and_then(|()| Ok(image.sync_all()?))
            .and_then(|()| self.clear())
            .map_err(CommitError::Committed)
    }

    /// Steps 1–5: write records with a not-ready header, fsync, patch in the
    /// real count, fsync, set the commit marker, fsync.
    fn stage(&mut self, records: &[Record]) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&0u32.to_le_bytes())?;
        self.file.write_all(&[0])?;
        for record in records {
            self.file.write_all(&record.owner.to_le_bytes())?;
            self.file.write_all(&record.block.0)?;
        }
        self.file.sync_all()?;

        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&(records.len() as u32).to_le_bytes())?;
        self.file.sync_all()?;

        self.file.seek(SeekFrom::Start(4))?;
        self.file.write_all(&[STATE_READY])?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Step 6: copy every journalled block to its home location.
    fn install(&mut self, count: u32, image: &mut File) -> Result<()> {
        self.file.seek(SeekFrom::Start(RECORDS_AT))?;
        for _ in 0..count {
            let mut owner = [0; 4];
            let mut block = [0; BSIZE];
            self.file.read_exact(&mut owner)?;
            self.file.read_exact(&mut block)?;
            let owner = u32::from_le_bytes(owner);
            image.seek(SeekFrom::Start(owner as u64 * BSIZE as u64))?;
            image.write_all(&block)?;
        }
        Ok(())
    }

    /// Step 7 (and rollback): the journal carries no intent.
    pub fn clear(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        Ok(())
    }
}
