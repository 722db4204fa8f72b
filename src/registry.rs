//! The handle registry: opaque file handles in and out of `(filesystem,
//! path)` pairs, plus the directory-listing verifier cache used by READDIR
//! paging.
//!
//! NFSv3 handles are stateless from the client's point of view: any handle
//! received from the server may be presented at any later time, on any
//! connection. This registry makes that work for path-addressed backing
//! stores by minting a random 16-octet id per `(filesystem, path)` pair and
//! remembering the association in both directions:
//!
//! - `id -> (fs, path components)` in an LRU bounded by the configured
//!   handle limit, and
//! - `(fs, joined path) -> id` in a reverse index kept exactly in sync.
//!
//! [`HandleRegistry::to_handle`] is idempotent while the entry is resident,
//! which is what keeps `fileid3` values (the first 8 octets of the handle)
//! stable across repeated lookups. Under LRU pressure old entries are
//! evicted together with their reverse mapping and later presentations of
//! the evicted handle answer `NFS3ERR_STALE`; resolving a handle touches
//! every strict-prefix ancestor of its path so a subtree in active use keeps
//! its ancestors warm.
//!
//! The verifier sub-registry hashes sorted directory listings (SHA-256,
//! leading 8 octets) into the cookie verifier and keeps the listing itself
//! so later pages of a paged READDIR can be served against the exact
//! snapshot the verifier describes. A verifier hit is only trusted when the
//! stored path matches the queried one; hash collisions therefore degrade
//! into cache misses.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use byteorder::ByteOrder;
use lru::LruCache;
use sha2::{Digest, Sha256};

use crate::protocol::xdr::nfs3;
use crate::protocol::xdr::XdrEndian;
use crate::vfs::{DirEntry, NfsFileSystem};

/// Raw registry handle id. Random, structure-free, 16 octets — well under
/// the 64-octet protocol maximum.
pub(crate) const HANDLE_SIZE: usize = 16;

type HandleId = [u8; HANDLE_SIZE];

/// How many cached directory listings are kept for cookie-verifier reuse.
const LISTING_CACHE_SIZE: usize = 256;

struct HandleEntry {
    fs: Arc<dyn NfsFileSystem>,
    path: Vec<String>,
}

/// A directory listing frozen at verifier-computation time.
pub struct Listing {
    pub path: String,
    /// Entries sorted bytewise by name.
    pub entries: Arc<Vec<DirEntry>>,
}

struct Inner {
    handles: LruCache<HandleId, HandleEntry>,
    paths: HashMap<(usize, String), HandleId>,
    listings: LruCache<u64, Listing>,
}

/// Bidirectional handle/path registry with LRU eviction. One per server;
/// shared by every connection.
pub struct HandleRegistry {
    inner: Mutex<Inner>,
    limit: usize,
}

/// Identity key for a filesystem instance. Mount handlers hand out
/// `Arc<dyn NfsFileSystem>` clones, so pointer identity of the shared
/// allocation is exactly "the same filesystem".
fn fs_key(fs: &Arc<dyn NfsFileSystem>) -> usize {
    Arc::as_ptr(fs) as *const () as usize
}

impl HandleRegistry {
    /// Creates a registry bounded at `limit` resident handles.
    pub fn new(limit: usize) -> HandleRegistry {
        let cap = NonZeroUsize::new(limit.max(2)).expect("handle limit must be non-zero");
        let listings = NonZeroUsize::new(LISTING_CACHE_SIZE).expect("listing cache size");
        HandleRegistry {
            inner: Mutex::new(Inner {
                handles: LruCache::new(cap),
                paths: HashMap::new(),
                listings: LruCache::new(listings),
            }),
            limit: cap.get(),
        }
    }

    /// How many handles can be resident at once. Directory paging caps each
    /// page at half this value so a single listing cannot evict the handles
    /// it just minted.
    pub fn handle_limit(&self) -> usize {
        self.limit
    }

    /// Returns the handle for `(fs, path)`, minting a fresh id only when the
    /// pair is not already registered. Repeated calls within LRU capacity
    /// return equal handles.
    pub fn to_handle(&self, fs: &Arc<dyn NfsFileSystem>, path: &[String]) -> nfs3::nfs_fh3 {
        let key = (fs_key(fs), fs.join(path));
        let mut inner = self.inner.lock().expect("unable to lock handle registry");

        if let Some(&id) = inner.paths.get(&key) {
            if inner.handles.get(&id).is_some() {
                return nfs3::nfs_fh3 { data: id.to_vec() };
            }
        }

        let id: HandleId = rand::random();
        let entry = HandleEntry { fs: Arc::clone(fs), path: path.to_vec() };
        if let Some((evicted_id, evicted)) = inner.handles.push(id, entry) {
            if evicted_id != id {
                let evicted_key = (fs_key(&evicted.fs), evicted.fs.join(&evicted.path));
                inner.paths.remove(&evicted_key);
            }
        }
        inner.paths.insert(key, id);
        nfs3::nfs_fh3 { data: id.to_vec() }
    }

    /// Resolves a handle back to its `(fs, path)` pair.
    ///
    /// A malformed handle is `NFS3ERR_BADHANDLE`; a well-formed handle that
    /// is no longer resident is `NFS3ERR_STALE`. On a hit, the entry and all
    /// its strict-prefix ancestors are promoted in the LRU so that deep
    /// working directories do not let the path to them decay.
    pub fn from_handle(
        &self,
        fh: &nfs3::nfs_fh3,
    ) -> Result<(Arc<dyn NfsFileSystem>, Vec<String>), nfs3::nfsstat3> {
        let id: HandleId = fh
            .data
            .as_slice()
            .try_into()
            .map_err(|_| nfs3::nfsstat3::NFS3ERR_BADHANDLE)?;

        let mut inner = self.inner.lock().expect("unable to lock handle registry");
        let (fs, path) = match inner.handles.get(&id) {
            Some(entry) => (Arc::clone(&entry.fs), entry.path.clone()),
            None => return Err(nfs3::nfsstat3::NFS3ERR_STALE),
        };

        let key = fs_key(&fs);
        for depth in 0..path.len() {
            let ancestor = (key, fs.join(&path[..depth]));
            if let Some(&ancestor_id) = inner.paths.get(&ancestor) {
                inner.handles.get(&ancestor_id);
            }
        }

        Ok((fs, path))
    }

    /// Drops the registration for `(fs, path)` in both directions. Used
    /// after REMOVE/RMDIR so a deleted object's handle answers stale.
    pub fn invalidate_handle(&self, fs: &Arc<dyn NfsFileSystem>, path: &[String]) {
        let key = (fs_key(fs), fs.join(path));
        let mut inner = self.inner.lock().expect("unable to lock handle registry");
        if let Some(id) = inner.paths.remove(&key) {
            inner.handles.pop(&id);
        }
    }

    /// Rebinds the handle registered at `from` to `to`, keeping the id.
    /// RENAME uses this so a client holding the pre-rename handle keeps a
    /// working reference to the moved object. A handle previously minted for
    /// an overwritten target is dropped.
    pub fn update_handle(&self, fs: &Arc<dyn NfsFileSystem>, from: &[String], to: &[String]) {
        let key = fs_key(fs);
        let old_key = (key, fs.join(from));
        let new_key = (key, fs.join(to));
        let mut inner = self.inner.lock().expect("unable to lock handle registry");

        let id = match inner.paths.remove(&old_key) {
            Some(id) => id,
            None => return,
        };
        if let Some(entry) = inner.handles.get_mut(&id) {
            entry.path = to.to_vec();
        }
        if let Some(replaced) = inner.paths.insert(new_key, id) {
            if replaced != id {
                inner.handles.pop(&replaced);
            }
        }
    }

    /// Computes the cookie verifier for a sorted listing of `path` and
    /// caches the listing under it. Equal listings under a path always hash
    /// equally, so an unchanged directory keeps its verifier across pages.
    pub fn verifier_for(&self, path: &str, entries: Arc<Vec<DirEntry>>) -> u64 {
        let mut hash = Sha256::new();
        hash.update((path.len() as u64).to_be_bytes());
        hash.update(path.as_bytes());
        for entry in entries.iter() {
            hash.update(&entry.name);
        }
        let digest = hash.finalize();
        let verifier = XdrEndian::read_u64(&digest[0..8]);

        let mut inner = self.inner.lock().expect("unable to lock handle registry");
        inner
            .listings
            .put(verifier, Listing { path: path.to_string(), entries });
        verifier
    }

    /// Drops every cached listing computed for `path`. The
    /// directory-mutating procedures call this after changing a directory's
    /// contents, so a client paging that directory observes
    /// `NFS3ERR_BAD_COOKIE` on its next page instead of a stale snapshot.
    pub fn invalidate_listings(&self, path: &str) {
        let mut inner = self.inner.lock().expect("unable to lock handle registry");
        let stale: Vec<u64> = inner
            .listings
            .iter()
            .filter(|(_, listing)| listing.path == path)
            .map(|(verifier, _)| *verifier)
            .collect();
        for verifier in stale {
            inner.listings.pop(&verifier);
        }
    }

    /// Returns the listing previously cached under `verifier`, or `None`
    /// when it was evicted or was computed for a different path (hash
    /// collisions are treated as misses).
    pub fn data_for_verifier(&self, path: &str, verifier: u64) -> Option<Arc<Vec<DirEntry>>> {
        let mut inner = self.inner.lock().expect("unable to lock handle registry");
        match inner.listings.get(&verifier) {
            Some(listing) if listing.path == path => Some(Arc::clone(&listing.entries)),
            _ => None,
        }
    }
}
