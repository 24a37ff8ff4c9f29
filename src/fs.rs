//! The filesystem instance. Five layers:
//!   + Blocks: the image/cp/add staging store.
//!   + Journal: crash recovery for multi-step updates.
//!   + Directories: block chains of packed name entries.
//!   + Files: content chains behind open handles.
//!   + Names: paths like /usr/share/dict for convenient naming.
//!
//! Every public mutator either layers its block writes onto the caller's
//! explicit transaction or opens a single-operation transaction of its own
//! and commits before returning.

use std::borrow::Cow;
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path as HostPath, PathBuf};

use arrayvec::ArrayVec;
use itertools::Itertools;
use log::info;

use crate::bio::{Block, Store};
use crate::dir::{self, Dirent, EntrySlot, Lookup};
use crate::error::{corrupt, FsError, Result};
use crate::file;
use crate::journal::{CommitError, Journal};
use crate::param::{ADD_SUFFIX, BLOCK_HDR, CP_SUFFIX, DIRSIZ, JOURNAL_SUFFIX, ROOTBLK};
use crate::path::{check_component, check_fresh_name, Path};
use crate::superblock::Superblock;

/// Per-session naming state; shadowed for the lifetime of an explicit
/// transaction and promoted or discarded with it.
#[derive(Clone)]
pub(crate) struct Session {
    pub cwd: String,
    pub home: String,
    pub work: String,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            cwd: "/".into(),
            home: "/".into(),
            work: "/".into(),
        }
    }
}

pub(crate) struct Mounted {
    pub store: Store,
    journal: Journal,
    cp_path: PathBuf,
    add_path: PathBuf,
    session: Session,
    tx_session: Option<Session>,
    explicit_tx: bool,

    /// Set when a commit marker became durable but installing it into the
    /// image failed; only a remount (which replays the journal) clears it.
    poisoned: bool,
}

impl Mounted {
    pub(crate) fn session(&self) -> &Session {
        self.tx_session.as_ref().unwrap_or(&self.session)
    }

    fn session_mut(&mut self) -> &mut Session {
        match self.tx_session.as_mut() {
            Some(shadow) => shadow,
            None => &mut self.session,
        }
    }

    /// Journal and install everything staged, then promote the counters.
    fn commit_staged(&mut self) -> Result<()> {
        let records = match self.store.staged_records() {
            Ok(records) => records,
            Err(e) => {
                let _ = self.store.discard_staging();
                return Err(e);
            }
        };
        match self.journal.commit(&records, self.store.image_mut()) {
            Ok(()) => self.store.finish_commit(),
            Err(CommitError::Unstaged(e)) => {
                let _ = self.store.discard_staging();
                Err(e)
            }
            Err(CommitError::Committed(e)) => {
                self.poisoned = true;
                Err(e)
            }
        }
    }
}

/// A mounted single-file filesystem.
pub struct FileFs {
    inner: Option<Mounted>,
}

impl Default for FileFs {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FileFs {
    fn drop(&mut self) {
        if self.inner.is_some() {
            let _ = self.umount();
        }
    }
}

fn side_path(image: &HostPath, suffix: &str) -> PathBuf {
    let mut os = image.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

impl FileFs {
    pub fn new() -> Self {
        Self { inner: None }
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.is_some()
    }

    /// Format `image`: a superblock and an empty root directory.
    pub fn mkfs(image: &HostPath) -> Result<()> {
        // Side files of an earlier image under the same name must not leak
        // into the fresh one.
        for suffix in [JOURNAL_SUFFIX, CP_SUFFIX, ADD_SUFFIX] {
            let _ = fs::remove_file(side_path(image, suffix));
        }

        let mut f = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(image)?;
        let unfinished = scopeguard::guard(image.to_path_buf(), |p| {
            let _ = fs::remove_file(&p);
        });

        f.write_all(&Superblock::new(2, 0).to_block().0)?;
        f.write_all(&dir::fresh_head(ROOTBLK, 0).0)?;
        f.sync_all()?;

        let _ = scopeguard::ScopeGuard::into_inner(unfinished);
        info!("formatted image {}", image.display());
        Ok(())
    }

    /// Open `image`, replaying a committed journal first if one survives
    /// from a crashed process.
    pub fn mount(&mut self, image: &HostPath) -> Result<()> {
        if self.inner.is_some() {
            self.umount()?;
        }

        let mut image_f = OpenOptions::new().read(true).write(true).open(image)?;
        let mut journal = Journal::open(side_path(image, JOURNAL_SUFFIX))?;
        journal.recover(&mut image_f)?;

        let mut block0 = Block::zeroed();
        image_f.seek(SeekFrom::Start(0))?;
        image_f.read_exact(&mut block0.0)?;
        let sb = Superblock::load(&block0)?;

        let cp_path = side_path(image, CP_SUFFIX);
        let add_path = side_path(image, ADD_SUFFIX);
        let open_side = |p: &HostPath| {
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(p)
        };
        let cp = open_side(&cp_path)?;
        let add = open_side(&add_path)?;

        self.inner = Some(Mounted {
            store: Store::new(image_f, cp, add, &sb),
            journal,
            cp_path,
            add_path,
            session: Session::default(),
            tx_session: None,
            explicit_tx: false,
            poisoned: false,
        });
        info!("mounted image {}", image.display());
        Ok(())
    }

    /// Close the image, rolling back any open explicit transaction.
    pub fn umount(&mut self) -> Result<()> {
        let mut m = self.inner.take().ok_or(FsError::NotMounted)?;
        if m.explicit_tx && !m.poisoned {
            let _ = m.journal.clear();
            let _ = m.store.discard_staging();
        }
        let poisoned = m.poisoned;
        let journal_path = m.journal.path().clone();
        let cp_path = m.cp_path.clone();
        let add_path = m.add_path.clone();
        drop(m);

        let _ = fs::remove_file(&cp_path);
        let _ = fs::remove_file(&add_path);
        if !poisoned {
            // An empty journal carries no intent; a poisoned one must stay
            // for the next mount to replay.
            let _ = fs::remove_file(&journal_path);
        }
        info!("unmounted image");
        Ok(())
    }

    pub(crate) fn mounted(&self) -> Result<&Mounted> {
        self.inner.as_ref().ok_or(FsError::NotMounted)
    }

    pub(crate) fn mounted_mut(&mut self) -> Result<&mut Mounted> {
        let m = self.inner.as_mut().ok_or(FsError::NotMounted)?;
        if m.poisoned {
            return Err(corrupt("journal committed but not installed; remount"));
        }
        Ok(m)
    }

    /// Run `op` inside the caller's explicit transaction, or inside a fresh
    /// auto-transaction committed before returning. An auto-transaction
    /// error discards the staging; an explicit one stays open for rollback.
    pub(crate) fn with_tx<T>(
        &mut self,
        op: impl FnOnce(&mut Mounted) -> Result<T>,
    ) -> Result<T> {
        let m = self.mounted_mut()?;
        if m.explicit_tx {
            return op(m);
        }
        m.store.begin_staging()?;
        match op(m) {
            Ok(v) => m.commit_staged().map(|()| v),
            Err(e) => {
                let _ = m.store.discard_staging();
                Err(e)
            }
        }
    }

    // Transactions

    pub fn begin(&mut self) -> Result<()> {
        let m = self.mounted_mut()?;
        if m.explicit_tx {
            return Err(FsError::TxAlreadyActive);
        }
        m.store.begin_staging()?;
        m.tx_session = Some(m.session.clone());
        m.explicit_tx = true;
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        let m = self.mounted_mut()?;
        if !m.explicit_tx {
            return Err(FsError::TxNotActive);
        }
        let result = m.commit_staged();
        m.explicit_tx = false;
        match m.tx_session.take() {
            Some(shadow) if result.is_ok() => m.session = shadow,
            _ => {}
        }
        result
    }

    pub fn rollback(&mut self) -> Result<()> {
        let m = self.mounted_mut()?;
        if !m.explicit_tx {
            return Err(FsError::TxNotActive);
        }
        m.journal.clear()?;
        m.store.discard_staging()?;
        m.tx_session = None;
        m.explicit_tx = false;
        Ok(())
    }

    // Namespace

    pub fn mkdir(&mut self, path: &str) -> Result<()> {
        self.with_tx(|m| {
            let (phead, name, _) = resolve_parent(m, path)?;
            check_fresh_name(&name)?;
            if let Lookup::Found { .. } = dir::lookup(&mut m.store, phead, name.as_bytes())? {
                return Err(FsError::Exists);
            }
            let head = m.store.alloc()?;
            dir::init(&mut m.store, head, phead)?;
            dir::append(&mut m.store, phead, &Dirent::new_dir(name.as_bytes(), head))?;
            Ok(())
        })
    }

    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        self.with_tx(|m| {
            let (phead, name, _) = resolve_parent(m, path)?;
            if name == "." || name == ".." {
                return Err(FsError::NameFormat);
            }
            let (slot, ent) = match dir::lookup(&mut m.store, phead, name.as_bytes())? {
                Lookup::Found { slot, ent } => (slot, ent),
                Lookup::Absent => return Err(FsError::FileNotFound),
            };
            if !ent.is_dir() {
                return Err(FsError::TypeMismatch);
            }
            if !dir::is_empty(&mut m.store, ent.start())? {
                return Err(FsError::NotEmpty);
            }
            m.store.free(ent.start())?;
            dir::remove(&mut m.store, phead, slot)
        })
    }

    /// Delete a file, returning its content blocks to the free list.
    pub fn remove(&mut self, path: &str) -> Result<()> {
        self.with_tx(|m| {
            let (phead, name, forces_dir) = resolve_parent(m, path)?;
            if name == "." || name == ".." {
                return Err(FsError::NameFormat);
            }
            let (slot, ent) = match dir::lookup(&mut m.store, phead, name.as_bytes())? {
                Lookup::Found { slot, ent } => (slot, ent),
                Lookup::Absent => return Err(FsError::FileNotFound),
            };
            if ent.is_dir() || forces_dir {
                return Err(FsError::TypeMismatch);
            }
            if ent.start() != 0 {
                file::free_chain(&mut m.store, ent.start(), ent.stop())?;
            }
            dir::remove(&mut m.store, phead, slot)
        })
    }

    /// Rename `old` to `new`. Within one directory this overwrites the name
    /// in place; across directories the entry migrates and a moved
    /// directory's `..` is repointed.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        self.with_tx(|m| {
            let (ophead, oname, oslash) = resolve_parent(m, old)?;
            if oname == "." || oname == ".." {
                return Err(FsError::NameFormat);
            }
            let (oslot, oent) = match dir::lookup(&mut m.store, ophead, oname.as_bytes())? {
                Lookup::Found { slot, ent } => (slot, ent),
                Lookup::Absent => return Err(FsError::FileNotFound),
            };
            let (nphead, nname, nslash) = resolve_parent(m, new)?;
            check_fresh_name(&nname)?;
            if (oslash || nslash) && !oent.is_dir() {
                return Err(FsError::TypeMismatch);
            }
            if let Lookup::Found { .. } = dir::lookup(&mut m.store, nphead, nname.as_bytes())? {
                return Err(FsError::Exists);
            }
            if ophead == nphead {
                return dir::rename_slot(&mut m.store, oslot, nname.as_bytes());
            }
            if oent.is_dir() {
                ensure_not_subtree(m, oent.start(), nphead)?;
            }
            migrate(m, ophead, oslot, &oent, nphead, &nname)
        })
    }

    /// Relocate `src` into the existing directory `dst`, keeping its name.
    pub fn mv(&mut self, src: &str, dst: &str) -> Result<()> {
        self.with_tx(|m| {
            let (sphead, sname, sslash) = resolve_parent(m, src)?;
            if sname == "." || sname == ".." {
                return Err(FsError::NameFormat);
            }
            let (slot, ent) = match dir::lookup(&mut m.store, sphead, sname.as_bytes())? {
                Lookup::Found { slot, ent } => (slot, ent),
                Lookup::Absent => return Err(FsError::FileNotFound),
            };
            if sslash && !ent.is_dir() {
                return Err(FsError::TypeMismatch);
            }
            let (dhead, _) = resolve_dir(m, dst)?;
            if let Lookup::Found { .. } = dir::lookup(&mut m.store, dhead, sname.as_bytes())? {
                return Err(FsError::Exists);
            }
            if ent.is_dir() {
                ensure_not_subtree(m, ent.start(), dhead)?;
            }
            migrate(m, sphead, slot, &ent, dhead, &sname)
        })
    }

    /// Duplicate the file at `src`. A `dst` naming an existing directory
    /// receives the copy under the source's name.
    pub fn copy(&mut self, src: &str, dst: &str) -> Result<()> {
        self.with_tx(|m| {
            let (sphead, sname, sslash) = resolve_parent(m, src)?;
            if sname == "." || sname == ".." {
                return Err(FsError::NameFormat);
            }
            let ent = match dir::lookup(&mut m.store, sphead, sname.as_bytes())? {
                Lookup::Found { ent, .. } => ent,
                Lookup::Absent => return Err(FsError::FileNotFound),
            };
            if ent.is_dir() || sslash {
                return Err(FsError::TypeMismatch);
            }

            let (dhead, dname) = match Path::new(dst).split_last() {
                None => {
                    let (dhead, _) = resolve_dir(m, dst)?;
                    (dhead, sname.clone())
                }
                Some((_, last)) if last == "." || last == ".." => {
                    let (dhead, _) = resolve_dir(m, dst)?;
                    (dhead, sname.clone())
                }
                Some(_) => {
                    let (dp, dn, dslash) = resolve_parent(m, dst)?;
                    match dir::lookup(&mut m.store, dp, dn.as_bytes())? {
                        Lookup::Found { ent: dent, .. } if dent.is_dir() => {
                            (dent.start(), sname.clone())
                        }
                        Lookup::Found { .. } => return Err(FsError::Exists),
                        Lookup::Absent => {
                            if dslash {
                                return Err(FsError::TypeMismatch);
                            }
                            check_fresh_name(&dn)?;
                            (dp, dn)
                        }
                    }
                }
            };
            if let Lookup::Found { .. } = dir::lookup(&mut m.store, dhead, dname.as_bytes())? {
                return Err(FsError::Exists);
            }

            let mut copied = Dirent::new_file(dname.as_bytes());
            if ent.start() != 0 {
                let src_blocks = file::chain_blocks(&mut m.store, ent.start(), ent.stop())?;
                let mut dst_blocks = Vec::with_capacity(src_blocks.len());
                for &sb in &src_blocks {
                    let db = m.store.alloc()?;
                    let from = m.store.read(sb)?;
                    let mut to = m.store.read(db)?;
                    to.0[BLOCK_HDR..].copy_from_slice(&from.0[BLOCK_HDR..]);
                    m.store.write(db, &to)?;
                    dst_blocks.push(db);
                }
                for (&a, &b) in dst_blocks.iter().tuple_windows::<(_, _)>() {
                    let mut ablk = m.store.read(a)?;
                    ablk.set_next(b);
                    m.store.write(a, &ablk)?;
                    let mut bblk = m.store.read(b)?;
                    bblk.set_prev(a);
                    m.store.write(b, &bblk)?;
                }
                copied.set_start(dst_blocks[0]);
                copied.set_stop(dst_blocks[dst_blocks.len() - 1]);
                copied.set_end_offset(ent.end_offset());
            }
            dir::append(&mut m.store, dhead, &copied)?;
            Ok(())
        })
    }

    pub fn file_exists(&mut self, path: &str) -> Result<bool> {
        let m = self.mounted_mut()?;
        if Path::new(path).forces_dir() {
            return Ok(false);
        }
        let (phead, name, _) = match resolve_parent(m, path) {
            Ok(v) => v,
            Err(FsError::Io(e)) => return Err(FsError::Io(e)),
            Err(_) => return Ok(false),
        };
        if name == "." || name == ".." {
            return Ok(false);
        }
        match dir::lookup(&mut m.store, phead, name.as_bytes())? {
            Lookup::Found { ent, .. } => Ok(!ent.is_dir()),
            Lookup::Absent => Ok(false),
        }
    }

    pub fn dir_exists(&mut self, path: &str) -> Result<bool> {
        let m = self.mounted_mut()?;
        match resolve_dir(m, path) {
            Ok(_) => Ok(true),
            Err(FsError::Io(e)) => Err(FsError::Io(e)),
            Err(_) => Ok(false),
        }
    }

    // Directory iteration

    pub fn open_dir(&mut self, path: &str) -> Result<FfsDir> {
        let m = self.mounted_mut()?;
        let (head, resolved) = resolve_dir(m, path)?;
        let entries = dir::entries(&mut m.store, head)?
            .iter()
            .map(|ent| {
                let bytes = ent.name_bytes();
                let kind = if head == ROOTBLK && (bytes == b"." || bytes == b"..") {
                    EntryKind::Root
                } else if ent.is_dir() {
                    EntryKind::Dir
                } else {
                    EntryKind::File
                };
                let mut name = ArrayVec::new();
                name.try_extend_from_slice(bytes).expect("name within bound");
                DirEntry { kind, name }
            })
            .collect();
        Ok(FfsDir {
            path: resolved,
            entries,
            pos: 0,
        })
    }

    pub fn close_dir(&mut self, dir: FfsDir) {
        drop(dir);
    }

    // Working directory

    pub fn chdir(&mut self, path: &str) -> Result<()> {
        let m = self.mounted_mut()?;
        let (_, resolved) = resolve_dir(m, path)?;
        m.session_mut().cwd = resolved;
        Ok(())
    }

    pub fn getcwd(&self) -> Result<&str> {
        Ok(&self.mounted()?.session().cwd)
    }

    pub fn set_home(&mut self, path: &str) -> Result<()> {
        let m = self.mounted_mut()?;
        let (_, resolved) = resolve_dir(m, path)?;
        m.session_mut().home = resolved;
        Ok(())
    }

    pub fn home(&self) -> Result<&str> {
        Ok(&self.mounted()?.session().home)
    }

    /// Save the current working directory for a later [`FileFs::ch_work`].
    pub fn set_work(&mut self) -> Result<()> {
        let m = self.mounted_mut()?;
        let cwd = m.session().cwd.clone();
        m.session_mut().work = cwd;
        Ok(())
    }

    /// Restore the working directory saved by [`FileFs::set_work`].
    pub fn ch_work(&mut self) -> Result<()> {
        let m = self.mounted_mut()?;
        let work = m.session().work.clone();
        m.session_mut().cwd = work;
        Ok(())
    }
}

/// Copy an entry into `dst_head`, drop it from its old directory, and for a
/// moved directory repoint its `..` at the new parent.
fn migrate(
    m: &mut Mounted,
    src_head: u32,
    src_slot: EntrySlot,
    ent: &Dirent,
    dst_head: u32,
    new_name: &str,
) -> Result<()> {
    let mut moved = ent.clone();
    moved.set_name(new_name.as_bytes());
    dir::append(&mut m.store, dst_head, &moved)?;
    dir::remove(&mut m.store, src_head, src_slot)?;
    if ent.is_dir() {
        dir::set_parent(&mut m.store, ent.start(), dst_head)?;
    }
    Ok(())
}

/// Reject moving a directory beneath itself by walking `..` ancestry from
/// the candidate parent.
fn ensure_not_subtree(m: &mut Mounted, moved: u32, mut cur: u32) -> Result<()> {
    for _ in 0..m.store.block_count() {
        if cur == moved {
            return Err(FsError::NameFormat);
        }
        if cur == ROOTBLK {
            return Ok(());
        }
        let parent = dir::parent_of(&mut m.store, cur)?;
        cur = if parent == 0 { ROOTBLK } else { parent };
    }
    Err(corrupt("directory ancestry cycle"))
}

/// Walk an already-canonical absolute path (a stored cwd or home string).
fn walk_canonical(m: &mut Mounted, abs: &str) -> Result<(u32, Vec<String>)> {
    let mut cur = ROOTBLK;
    let mut canon = Vec::new();
    let mut p = Path::new(abs);
    while let Some((rest, name)) = p.skipelem() {
        match dir::lookup(&mut m.store, cur, name.as_bytes())? {
            Lookup::Found { ent, .. } if ent.is_dir() => {
                cur = ent.start();
                canon.push(name.to_string());
            }
            _ => return Err(FsError::PathNotFound),
        }
        p = rest;
    }
    Ok((cur, canon))
}

/// The directory a path starts from, with its canonical components.
fn start_of<'p>(m: &mut Mounted, path: &'p Path) -> Result<(u32, Vec<String>, &'p Path)> {
    if path.is_absolute() {
        Ok((ROOTBLK, Vec::new(), path))
    } else if path.is_home_rooted() {
        let s = path.as_str();
        if s != "~" && !s[1..].starts_with('/') {
            return Err(FsError::NameFormat);
        }
        let home = m.session().home.clone();
        let (cur, canon) = walk_canonical(m, &home)?;
        Ok((cur, canon, Path::new(&s[1..])))
    } else {
        let cwd = m.session().cwd.clone();
        let (cur, canon) = walk_canonical(m, &cwd)?;
        Ok((cur, canon, path))
    }
}

/// Resolve a path that must name a directory. Returns its head block and the
/// canonical absolute form (dot components folded away).
pub(crate) fn resolve_dir(m: &mut Mounted, path: &str) -> Result<(u32, String)> {
    let path = Path::new(path);
    if path.is_empty_string() {
        return Err(FsError::NameFormat);
    }
    let (mut cur, mut canon, mut p) = start_of(m, path)?;
    while let Some((rest, name)) = p.skipelem() {
        let last = rest.is_empty_string();
        match name {
            "." => {}
            ".." => {
                let parent = dir::parent_of(&mut m.store, cur)?;
                cur = if parent == 0 { ROOTBLK } else { parent };
                canon.pop();
            }
            _ => {
                check_component(name)?;
                match dir::lookup(&mut m.store, cur, name.as_bytes())? {
                    Lookup::Found { ent, .. } => {
                        if !ent.is_dir() {
                            return Err(if last {
                                FsError::TypeMismatch
                            } else {
                                FsError::PathNotFound
                            });
                        }
                        cur = ent.start();
                        canon.push(name.to_string());
                    }
                    Lookup::Absent => return Err(FsError::PathNotFound),
                }
            }
        }
        p = rest;
    }
    let mut rendered = String::from("/");
    rendered.push_str(&canon.join("/"));
    Ok((cur, rendered))
}

/// Resolve everything but the final component. Returns the parent directory
/// head, the final name, and whether a trailing slash demands a directory.
pub(crate) fn resolve_parent(m: &mut Mounted, path: &str) -> Result<(u32, String, bool)> {
    let p = Path::new(path);
    if p.is_empty_string() {
        return Err(FsError::NameFormat);
    }
    let forces_dir = p.forces_dir();
    let (parent, name) = p.split_last().ok_or(FsError::NameFormat)?;
    check_component(name)?;
    let parent_str = if parent.is_empty_string() {
        "."
    } else {
        parent.as_str()
    };
    let (head, _) = resolve_dir(m, parent_str)?;
    Ok((head, name.to_string(), forces_dir))
}

/// What kind of name a directory entry carries. `Root` tags the synthetic
/// `.`/`..` entries of the root directory itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Root,
}

/// One entry yielded while iterating a directory.
#[derive(Clone, Debug)]
pub struct DirEntry {
    kind: EntryKind,
    name: ArrayVec<u8, DIRSIZ>,
}

impl DirEntry {
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn name_bytes(&self) -> &[u8] {
        &self.name
    }

    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }
}

/// An open directory: a snapshot of its entries plus a cursor.
pub struct FfsDir {
    path: String,
    entries: Vec<DirEntry>,
    pos: usize,
}

impl FfsDir {
    /// The canonical absolute path this directory resolved to.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn read_entry(&mut self) -> Option<&DirEntry> {
        if self.pos >= self.entries.len() {
            return None;
        }
        self.pos += 1;
        Some(&self.entries[self.pos - 1])
    }

    pub fn rewind(&mut self) {
        self.pos = 0;
    }
}
