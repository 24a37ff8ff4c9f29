//! filefs: a hierarchical POSIX-like filesystem stored inside one host file.
//!
//! The entire state — superblock, free list, directory tree and file
//! contents — lives in a single image of 512-byte blocks. Clients get the
//! familiar primitives (open/read/write/seek, mkdir/rmdir, rename/move/copy,
//! opendir/readdir) plus explicit multi-operation transactions with
//! crash-atomic durability: mutations stage into side files, a journal with
//! a single commit-marker byte makes them durable all-or-nothing, and mount
//! replays any journal a crash left behind.
//!
//! ```no_run
//! use filefs::FileFs;
//!
//! # fn main() -> filefs::Result<()> {
//! FileFs::mkfs(std::path::Path::new("data.img"))?;
//! let mut fs = FileFs::new();
//! fs.mount(std::path::Path::new("data.img"))?;
//! fs.mkdir("/docs")?;
//! let mut f = fs.open("/docs/hello", "w")?;
//! fs.write(&mut f, b"hello")?;
//! fs.close(f);
//! fs.umount()?;
//! # Ok(())
//! # }
//! ```

mod bio;
mod dir;
mod error;
mod file;
mod fs;
mod journal;
pub mod param;
mod path;
mod superblock;

pub use error::{FsError, Result};
pub use file::FfsFile;
pub use fs::{DirEntry, EntryKind, FfsDir, FileFs};
