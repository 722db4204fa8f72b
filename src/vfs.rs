//! The backing-filesystem contract: what a storage implementation must
//! provide to be exported over NFSv3 by this crate.
//!
//! The protocol engine is stateless with respect to storage. It addresses
//! every object by a path below the export root, resolved through the handle
//! registry, and calls into these traits for all actual I/O:
//!
//! - [`MountHandler`] answers MNT requests, choosing the filesystem a client
//!   gets and the authentication flavors offered, and fills FSSTAT totals.
//! - [`NfsFileSystem`] is the path-addressed filesystem itself: metadata,
//!   directory listing, file open/create, namespace mutation.
//! - [`NfsFile`] is an open file supporting positional reads and writes.
//! - [`Change`] is the attribute-mutation capability; a filesystem that
//!   returns `None` from [`NfsFileSystem::change`] is read-only.
//!
//! All operations report failure as [`nfsstat3`] values, which the procedure
//! handlers embed into replies unchanged. Implementations should pick the
//! closest status rather than defaulting everything to `NFS3ERR_IO`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::protocol::xdr::nfs3;

/// What a filesystem implementation can do. Write procedures check `write`
/// before touching the store and answer `NFS3ERR_ROFS` when it is absent.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub read: bool,
    pub write: bool,
    pub seek: bool,
}

impl Capabilities {
    pub const fn read_only() -> Capabilities {
        Capabilities { read: true, write: false, seek: true }
    }

    pub const fn read_write() -> Capabilities {
        Capabilities { read: true, write: true, seek: true }
    }
}

/// Object kinds a backing store can report.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FileKind {
    #[default]
    Regular,
    Directory,
    Block,
    Char,
    Symlink,
    Socket,
    Fifo,
}

impl From<FileKind> for nfs3::ftype3 {
    fn from(kind: FileKind) -> nfs3::ftype3 {
        match kind {
            FileKind::Regular => nfs3::ftype3::NF3REG,
            FileKind::Directory => nfs3::ftype3::NF3DIR,
            FileKind::Block => nfs3::ftype3::NF3BLK,
            FileKind::Char => nfs3::ftype3::NF3CHR,
            FileKind::Symlink => nfs3::ftype3::NF3LNK,
            FileKind::Socket => nfs3::ftype3::NF3SOCK,
            FileKind::Fifo => nfs3::ftype3::NF3FIFO,
        }
    }
}

/// Object metadata as reported by the backing store.
///
/// There is no file id here on purpose: `fileid3` values visible to clients
/// are synthesized from the first 8 octets of the object's handle, so the
/// store never needs stable inode numbers.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    pub kind: FileKind,
    /// Permission bits, `0o777`-masked.
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    /// Bytes allocated; stores without the notion report `size`.
    pub used: u64,
    /// Major/minor device numbers for special files.
    pub rdev: (u32, u32),
    pub atime: nfs3::nfstime3,
    pub mtime: nfs3::nfstime3,
    pub ctime: nfs3::nfstime3,
}

impl Metadata {
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::Regular
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == FileKind::Symlink
    }

    /// Full attribute record for the wire, under the given synthesized id.
    pub fn to_fattr3(&self, fileid: nfs3::fileid3) -> nfs3::fattr3 {
        nfs3::fattr3 {
            ftype: self.kind.into(),
            mode: self.mode,
            nlink: self.nlink,
            uid: self.uid,
            gid: self.gid,
            size: self.size,
            used: self.used,
            rdev: nfs3::specdata3 { specdata1: self.rdev.0, specdata2: self.rdev.1 },
            fsid: 0,
            fileid,
            atime: self.atime,
            mtime: self.mtime,
            ctime: self.ctime,
        }
    }

    /// The pre-operation attribute subset used in wcc data.
    pub fn to_wcc_attr(&self) -> nfs3::wcc_attr {
        nfs3::wcc_attr { size: self.size, mtime: self.mtime, ctime: self.ctime }
    }
}

/// One directory entry as returned by [`NfsFileSystem::read_dir`]: the bare
/// name (no path components) and the object's metadata.
#[derive(Clone, Debug)]
pub struct DirEntry {
    pub name: Vec<u8>,
    pub meta: Metadata,
}

/// An open file. Reads and writes are positional, so no seek state is
/// shared between concurrent requests; the file closes when dropped.
#[async_trait]
pub trait NfsFile: Send + Sync {
    /// Reads up to `count` bytes at `offset`. Short reads at end of file are
    /// expected; reads past the end return an empty buffer.
    async fn read_at(&self, offset: u64, count: u32) -> Result<Vec<u8>, nfs3::nfsstat3>;

    /// Writes `data` at `offset`, extending the file as needed. Returns the
    /// number of bytes written.
    async fn write_at(&self, offset: u64, data: &[u8]) -> Result<u32, nfs3::nfsstat3>;

    /// Truncates or extends the file to `size` bytes.
    async fn truncate(&self, size: u64) -> Result<(), nfs3::nfsstat3>;
}

/// Attribute mutation operations, split from [`NfsFileSystem`] so read-only
/// stores simply do not provide them.
#[async_trait]
pub trait Change: Send + Sync {
    async fn chmod(&self, path: &str, mode: u32) -> Result<(), nfs3::nfsstat3>;

    async fn chown(
        &self,
        path: &str,
        uid: Option<u32>,
        gid: Option<u32>,
    ) -> Result<(), nfs3::nfsstat3>;

    /// Sets access and/or modification times; `None` leaves a time untouched.
    async fn chtimes(
        &self,
        path: &str,
        atime: Option<nfs3::nfstime3>,
        mtime: Option<nfs3::nfstime3>,
    ) -> Result<(), nfs3::nfsstat3>;
}

/// A path-addressed filesystem exported over NFS.
///
/// Paths handed to these methods are produced by [`NfsFileSystem::join`]
/// over the component lists the handle registry stores; the empty component
/// list is the export root. Implementations must be safe for concurrent
/// calls — every in-flight request on every connection shares the same
/// instance.
#[async_trait]
pub trait NfsFileSystem: Send + Sync {
    /// What this filesystem can do. Consulted by every write procedure.
    fn capabilities(&self) -> Capabilities;

    /// Joins path components into the canonical path string understood by
    /// the other methods.
    fn join(&self, parts: &[String]) -> String;

    /// Object metadata, following symlinks.
    async fn stat(&self, path: &str) -> Result<Metadata, nfs3::nfsstat3>;

    /// Object metadata, not following symlinks.
    async fn lstat(&self, path: &str) -> Result<Metadata, nfs3::nfsstat3>;

    /// Lists a directory. Order is not significant; the protocol engine
    /// sorts by name before paging.
    async fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, nfs3::nfsstat3>;

    /// Opens an existing file for reading.
    async fn open(&self, path: &str) -> Result<Box<dyn NfsFile>, nfs3::nfsstat3>;

    /// Opens an existing file for reading and writing, without truncation.
    async fn open_file(&self, path: &str) -> Result<Box<dyn NfsFile>, nfs3::nfsstat3>;

    /// Creates (or truncates) a regular file and opens it.
    async fn create(&self, path: &str) -> Result<Box<dyn NfsFile>, nfs3::nfsstat3>;

    /// Creates a directory, including missing ancestors.
    async fn mkdir_all(&self, path: &str) -> Result<(), nfs3::nfsstat3>;

    /// Removes a file or directory. Removing a non-empty directory fails
    /// with `NFS3ERR_NOTEMPTY`.
    async fn remove(&self, path: &str) -> Result<(), nfs3::nfsstat3>;

    /// Atomically renames `from` to `to`, replacing an existing target.
    async fn rename(&self, from: &str, to: &str) -> Result<(), nfs3::nfsstat3>;

    /// Creates a symbolic link at `link` pointing at `target`.
    async fn symlink(&self, target: &[u8], link: &str) -> Result<(), nfs3::nfsstat3>;

    /// Reads the target of a symbolic link.
    async fn readlink(&self, path: &str) -> Result<Vec<u8>, nfs3::nfsstat3>;

    /// The attribute-mutation capability. `None` marks the filesystem
    /// read-only.
    fn change(&self) -> Option<&dyn Change>;
}

impl std::fmt::Debug for dyn NfsFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NfsFileSystem").field("ptr", &(self as *const Self)).finish()
    }
}

impl PartialEq for dyn NfsFileSystem {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self as *const Self as *const (), other as *const Self as *const ())
    }
}

/// FSSTAT totals. Defaults are the 2^62 "unknown" caps; a [`MountHandler`]
/// overwrites whichever fields its store can answer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FsStat {
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub avail_bytes: u64,
    pub total_files: u64,
    pub free_files: u64,
    pub avail_files: u64,
}

impl Default for FsStat {
    fn default() -> FsStat {
        const UNKNOWN: u64 = 1 << 62;
        FsStat {
            total_bytes: UNKNOWN,
            free_bytes: UNKNOWN,
            avail_bytes: UNKNOWN,
            total_files: UNKNOWN,
            free_files: UNKNOWN,
            avail_files: UNKNOWN,
        }
    }
}

/// Outcome of a MNT request.
pub struct MountResult {
    pub status: crate::protocol::xdr::mount::mountstat3,
    /// The filesystem whose root the client mounted; `None` unless the
    /// status is `MNT3_OK`.
    pub fs: Option<Arc<dyn NfsFileSystem>>,
    /// Authentication flavors to advertise in the MNT reply.
    pub auth_flavors: Vec<u32>,
}

impl MountResult {
    /// A failed mount carrying only a status.
    pub fn denied(status: crate::protocol::xdr::mount::mountstat3) -> MountResult {
        MountResult { status, fs: None, auth_flavors: Vec::new() }
    }
}

/// The export policy the server runs on: which filesystem each client gets,
/// and optionally real FSSTAT totals.
#[async_trait]
pub trait MountHandler: Send + Sync {
    /// Answers a MNT request for `dirpath` from `client_addr`. On success
    /// the returned filesystem's root (empty component list) is registered
    /// and handed to the client as the mount's root handle.
    async fn mount(&self, client_addr: &str, dirpath: &[u8]) -> MountResult;

    /// Fills filesystem totals for FSSTAT. The default leaves the
    /// 2^62-capped "unknown" values in place.
    async fn fsstat(
        &self,
        _fs: &Arc<dyn NfsFileSystem>,
        _out: &mut FsStat,
    ) -> Result<(), nfs3::nfsstat3> {
        Ok(())
    }
}

/// Applies a `sattr3` to an object through the filesystem's [`Change`]
/// capability. Size changes go through [`NfsFileSystem::open_file`] +
/// truncate; absent fields are left untouched.
pub(crate) async fn apply_sattr(
    fs: &Arc<dyn NfsFileSystem>,
    path: &str,
    sattr: &nfs3::sattr3,
) -> Result<(), nfs3::nfsstat3> {
    let change = match fs.change() {
        Some(change) => change,
        None => return Err(nfs3::nfsstat3::NFS3ERR_ROFS),
    };

    if let Some(mode) = sattr.mode {
        change.chmod(path, mode & 0o777).await?;
    }
    if sattr.uid.is_some() || sattr.gid.is_some() {
        change.chown(path, sattr.uid, sattr.gid).await?;
    }

    let atime = match sattr.atime {
        nfs3::set_atime::DONT_CHANGE => None,
        nfs3::set_atime::SET_TO_SERVER_TIME => Some(now_nfstime()),
        nfs3::set_atime::SET_TO_CLIENT_TIME(t) => Some(t),
    };
    let mtime = match sattr.mtime {
        nfs3::set_mtime::DONT_CHANGE => None,
        nfs3::set_mtime::SET_TO_SERVER_TIME => Some(now_nfstime()),
        nfs3::set_mtime::SET_TO_CLIENT_TIME(t) => Some(t),
    };
    if atime.is_some() || mtime.is_some() {
        change.chtimes(path, atime, mtime).await?;
    }

    if let Some(size) = sattr.size {
        let file = fs.open_file(path).await?;
        file.truncate(size).await?;
    }
    Ok(())
}

/// Server clock as an NFS timestamp.
pub(crate) fn now_nfstime() -> nfs3::nfstime3 {
    match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        Ok(elapsed) => nfs3::nfstime3 {
            seconds: elapsed.as_secs() as u32,
            nseconds: elapsed.subsec_nanos(),
        },
        Err(_) => nfs3::nfstime3::default(),
    }
}
