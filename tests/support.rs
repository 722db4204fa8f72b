//! Shared test fixtures: an in-memory filesystem implementing the vfs
//! contract, a mount handler exporting it, and helpers for driving the
//! procedure handlers with serialized arguments and parsing their replies.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;

use nfs_gate::protocol::nfs::mount::handle_mount;
use nfs_gate::protocol::nfs::v3::handle_nfs;
use nfs_gate::protocol::rpc::Context;
use nfs_gate::registry::HandleRegistry;
use nfs_gate::vfs::{
    self, Capabilities, Change, DirEntry, FileKind, Metadata, MountHandler, MountResult, NfsFile,
    NfsFileSystem,
};
use nfs_gate::xdr::{self, deserialize, mount, nfs3, Serialize};

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

#[derive(Clone)]
enum Node {
    File { data: Vec<u8>, mode: u32, atime: nfs3::nfstime3, mtime: nfs3::nfstime3, ctime: nfs3::nfstime3 },
    Dir { mode: u32, atime: nfs3::nfstime3, mtime: nfs3::nfstime3, ctime: nfs3::nfstime3 },
    Symlink { target: Vec<u8>, ctime: nfs3::nfstime3 },
}

struct State {
    nodes: BTreeMap<String, Node>,
    clock: u32,
}

impl State {
    fn tick(&mut self) -> nfs3::nfstime3 {
        self.clock += 1;
        nfs3::nfstime3 { seconds: self.clock, nseconds: 0 }
    }
}

/// A small in-memory tree addressed with `/`-joined relative paths, the
/// export root being the empty path.
pub struct MemFs {
    state: Arc<Mutex<State>>,
    writable: bool,
}

impl MemFs {
    pub fn new() -> MemFs {
        let mut nodes = BTreeMap::new();
        let t = nfs3::nfstime3 { seconds: 1, nseconds: 0 };
        nodes.insert(
            String::new(),
            Node::Dir { mode: 0o755, atime: t, mtime: t, ctime: t },
        );
        MemFs { state: Arc::new(Mutex::new(State { nodes, clock: 1 })), writable: true }
    }

    pub fn read_only() -> MemFs {
        let mut fs = MemFs::new();
        fs.writable = false;
        fs
    }

    /// Seeds a file directly, bypassing the protocol. Also used to mutate a
    /// directory behind a paging client's back.
    pub fn add_file(&self, path: &str, data: &[u8]) {
        let mut state = self.state.lock().unwrap();
        let t = state.tick();
        state.nodes.insert(
            path.to_string(),
            Node::File { data: data.to_vec(), mode: 0o644, atime: t, mtime: t, ctime: t },
        );
    }

    pub fn add_dir(&self, path: &str) {
        let mut state = self.state.lock().unwrap();
        let t = state.tick();
        state
            .nodes
            .insert(path.to_string(), Node::Dir { mode: 0o755, atime: t, mtime: t, ctime: t });
    }

    pub fn has_node(&self, path: &str) -> bool {
        self.state.lock().unwrap().nodes.contains_key(path)
    }

    pub fn file_data(&self, path: &str) -> Option<Vec<u8>> {
        match self.state.lock().unwrap().nodes.get(path) {
            Some(Node::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    fn metadata(node: &Node) -> Metadata {
        match node {
            Node::File { data, mode, atime, mtime, ctime } => Metadata {
                kind: FileKind::Regular,
                mode: *mode,
                nlink: 1,
                uid: 1000,
                gid: 1000,
                size: data.len() as u64,
                used: data.len() as u64,
                rdev: (0, 0),
                atime: *atime,
                mtime: *mtime,
                ctime: *ctime,
            },
            Node::Dir { mode, atime, mtime, ctime } => Metadata {
                kind: FileKind::Directory,
                mode: *mode,
                nlink: 2,
                uid: 1000,
                gid: 1000,
                size: 4096,
                used: 4096,
                rdev: (0, 0),
                atime: *atime,
                mtime: *mtime,
                ctime: *ctime,
            },
            Node::Symlink { target, ctime } => Metadata {
                kind: FileKind::Symlink,
                mode: 0o777,
                nlink: 1,
                uid: 1000,
                gid: 1000,
                size: target.len() as u64,
                used: target.len() as u64,
                rdev: (0, 0),
                atime: *ctime,
                mtime: *ctime,
                ctime: *ctime,
            },
        }
    }

    fn parent_of(path: &str) -> &str {
        match path.rfind('/') {
            Some(idx) => &path[..idx],
            None => "",
        }
    }
}

struct MemFile {
    state: Arc<Mutex<State>>,
    path: String,
    writable: bool,
}

#[async_trait]
impl NfsFile for MemFile {
    async fn read_at(&self, offset: u64, count: u32) -> Result<Vec<u8>, nfs3::nfsstat3> {
        let state = self.state.lock().unwrap();
        match state.nodes.get(&self.path) {
            Some(Node::File { data, .. }) => {
                let start = (offset as usize).min(data.len());
                let end = (start + count as usize).min(data.len());
                Ok(data[start..end].to_vec())
            }
            _ => Err(nfs3::nfsstat3::NFS3ERR_STALE),
        }
    }

    async fn write_at(&self, offset: u64, buf: &[u8]) -> Result<u32, nfs3::nfsstat3> {
        if !self.writable {
            return Err(nfs3::nfsstat3::NFS3ERR_ROFS);
        }
        let mut state = self.state.lock().unwrap();
        let t = state.tick();
        match state.nodes.get_mut(&self.path) {
            Some(Node::File { data, mtime, ctime, .. }) => {
                let end = offset as usize + buf.len();
                if data.len() < end {
                    data.resize(end, 0);
                }
                data[offset as usize..end].copy_from_slice(buf);
                *mtime = t;
                *ctime = t;
                Ok(buf.len() as u32)
            }
            _ => Err(nfs3::nfsstat3::NFS3ERR_STALE),
        }
    }

    async fn truncate(&self, size: u64) -> Result<(), nfs3::nfsstat3> {
        if !self.writable {
            return Err(nfs3::nfsstat3::NFS3ERR_ROFS);
        }
        let mut state = self.state.lock().unwrap();
        let t = state.tick();
        match state.nodes.get_mut(&self.path) {
            Some(Node::File { data, mtime, ctime, .. }) => {
                data.resize(size as usize, 0);
                *mtime = t;
                *ctime = t;
                Ok(())
            }
            _ => Err(nfs3::nfsstat3::NFS3ERR_STALE),
        }
    }
}

#[async_trait]
impl NfsFileSystem for MemFs {
    fn capabilities(&self) -> Capabilities {
        if self.writable {
            Capabilities::read_write()
        } else {
            Capabilities::read_only()
        }
    }

    fn join(&self, parts: &[String]) -> String {
        parts.join("/")
    }

    async fn stat(&self, path: &str) -> Result<Metadata, nfs3::nfsstat3> {
        self.lstat(path).await
    }

    async fn lstat(&self, path: &str) -> Result<Metadata, nfs3::nfsstat3> {
        let state = self.state.lock().unwrap();
        state
            .nodes
            .get(path)
            .map(MemFs::metadata)
            .ok_or(nfs3::nfsstat3::NFS3ERR_NOENT)
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, nfs3::nfsstat3> {
        let state = self.state.lock().unwrap();
        match state.nodes.get(path) {
            Some(Node::Dir { .. }) => {}
            Some(_) => return Err(nfs3::nfsstat3::NFS3ERR_NOTDIR),
            None => return Err(nfs3::nfsstat3::NFS3ERR_NOENT),
        }
        let prefix = if path.is_empty() { String::new() } else { format!("{path}/") };
        let mut entries = Vec::new();
        for (key, node) in state.nodes.iter() {
            if key.is_empty() {
                continue;
            }
            let rest = match key.strip_prefix(&prefix) {
                Some(rest) => rest,
                None => continue,
            };
            if rest.is_empty() || rest.contains('/') {
                continue;
            }
            entries.push(DirEntry { name: rest.as_bytes().to_vec(), meta: MemFs::metadata(node) });
        }
        Ok(entries)
    }

    async fn open(&self, path: &str) -> Result<Box<dyn NfsFile>, nfs3::nfsstat3> {
        let state = self.state.lock().unwrap();
        match state.nodes.get(path) {
            Some(Node::File { .. }) => Ok(Box::new(MemFile {
                state: Arc::clone(&self.state),
                path: path.to_string(),
                writable: false,
            })),
            Some(Node::Dir { .. }) => Err(nfs3::nfsstat3::NFS3ERR_ISDIR),
            Some(Node::Symlink { .. }) => Err(nfs3::nfsstat3::NFS3ERR_INVAL),
            None => Err(nfs3::nfsstat3::NFS3ERR_NOENT),
        }
    }

    async fn open_file(&self, path: &str) -> Result<Box<dyn NfsFile>, nfs3::nfsstat3> {
        if !self.writable {
            return Err(nfs3::nfsstat3::NFS3ERR_ROFS);
        }
        let state = self.state.lock().unwrap();
        match state.nodes.get(path) {
            Some(Node::File { .. }) => Ok(Box::new(MemFile {
                state: Arc::clone(&self.state),
                path: path.to_string(),
                writable: true,
            })),
            Some(_) => Err(nfs3::nfsstat3::NFS3ERR_INVAL),
            None => Err(nfs3::nfsstat3::NFS3ERR_NOENT),
        }
    }

    async fn create(&self, path: &str) -> Result<Box<dyn NfsFile>, nfs3::nfsstat3> {
        if !self.writable {
            return Err(nfs3::nfsstat3::NFS3ERR_ROFS);
        }
        let mut state = self.state.lock().unwrap();
        let t = state.tick();
        state.nodes.insert(
            path.to_string(),
            Node::File { data: Vec::new(), mode: 0o644, atime: t, mtime: t, ctime: t },
        );
        Ok(Box::new(MemFile {
            state: Arc::clone(&self.state),
            path: path.to_string(),
            writable: true,
        }))
    }

    async fn mkdir_all(&self, path: &str) -> Result<(), nfs3::nfsstat3> {
        if !self.writable {
            return Err(nfs3::nfsstat3::NFS3ERR_ROFS);
        }
        let mut state = self.state.lock().unwrap();
        let t = state.tick();
        let mut current = String::new();
        for part in path.split('/') {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(part);
            if !state.nodes.contains_key(&current) {
                state.nodes.insert(
                    current.clone(),
                    Node::Dir { mode: 0o755, atime: t, mtime: t, ctime: t },
                );
            }
        }
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), nfs3::nfsstat3> {
        if !self.writable {
            return Err(nfs3::nfsstat3::NFS3ERR_ROFS);
        }
        let mut state = self.state.lock().unwrap();
        match state.nodes.get(path) {
            Some(Node::Dir { .. }) => {
                let prefix = format!("{path}/");
                if state.nodes.keys().any(|k| k.starts_with(&prefix)) {
                    return Err(nfs3::nfsstat3::NFS3ERR_NOTEMPTY);
                }
            }
            Some(_) => {}
            None => return Err(nfs3::nfsstat3::NFS3ERR_NOENT),
        }
        state.nodes.remove(path);
        let t = state.tick();
        let parent = MemFs::parent_of(path).to_string();
        if let Some(Node::Dir { mtime, ctime, .. }) = state.nodes.get_mut(&parent) {
            *mtime = t;
            *ctime = t;
        }
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), nfs3::nfsstat3> {
        if !self.writable {
            return Err(nfs3::nfsstat3::NFS3ERR_ROFS);
        }
        let mut state = self.state.lock().unwrap();
        if !state.nodes.contains_key(from) {
            return Err(nfs3::nfsstat3::NFS3ERR_NOENT);
        }
        let from_prefix = format!("{from}/");
        let moved: Vec<String> = state
            .nodes
            .keys()
            .filter(|k| k.as_str() == from || k.starts_with(&from_prefix))
            .cloned()
            .collect();
        state.nodes.remove(to);
        for key in moved {
            if let Some(node) = state.nodes.remove(&key) {
                let new_key = format!("{to}{}", &key[from.len()..]);
                state.nodes.insert(new_key, node);
            }
        }
        let t = state.tick();
        for dir in [MemFs::parent_of(from).to_string(), MemFs::parent_of(to).to_string()] {
            if let Some(Node::Dir { mtime, ctime, .. }) = state.nodes.get_mut(&dir) {
                *mtime = t;
                *ctime = t;
            }
        }
        Ok(())
    }

    async fn symlink(&self, target: &[u8], link: &str) -> Result<(), nfs3::nfsstat3> {
        if !self.writable {
            return Err(nfs3::nfsstat3::NFS3ERR_ROFS);
        }
        let mut state = self.state.lock().unwrap();
        let t = state.tick();
        state
            .nodes
            .insert(link.to_string(), Node::Symlink { target: target.to_vec(), ctime: t });
        Ok(())
    }

    async fn readlink(&self, path: &str) -> Result<Vec<u8>, nfs3::nfsstat3> {
        let state = self.state.lock().unwrap();
        match state.nodes.get(path) {
            Some(Node::Symlink { target, .. }) => Ok(target.clone()),
            Some(_) => Err(nfs3::nfsstat3::NFS3ERR_INVAL),
            None => Err(nfs3::nfsstat3::NFS3ERR_NOENT),
        }
    }

    fn change(&self) -> Option<&dyn Change> {
        if self.writable {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl Change for MemFs {
    async fn chmod(&self, path: &str, new_mode: u32) -> Result<(), nfs3::nfsstat3> {
        let mut state = self.state.lock().unwrap();
        let t = state.tick();
        match state.nodes.get_mut(path) {
            Some(Node::File { mode, ctime, .. }) | Some(Node::Dir { mode, ctime, .. }) => {
                *mode = new_mode;
                *ctime = t;
                Ok(())
            }
            Some(Node::Symlink { .. }) => Ok(()),
            None => Err(nfs3::nfsstat3::NFS3ERR_NOENT),
        }
    }

    async fn chown(
        &self,
        path: &str,
        _uid: Option<u32>,
        _gid: Option<u32>,
    ) -> Result<(), nfs3::nfsstat3> {
        if self.state.lock().unwrap().nodes.contains_key(path) {
            Ok(())
        } else {
            Err(nfs3::nfsstat3::NFS3ERR_NOENT)
        }
    }

    async fn chtimes(
        &self,
        path: &str,
        new_atime: Option<nfs3::nfstime3>,
        new_mtime: Option<nfs3::nfstime3>,
    ) -> Result<(), nfs3::nfsstat3> {
        let mut state = self.state.lock().unwrap();
        match state.nodes.get_mut(path) {
            Some(Node::File { atime, mtime, .. }) | Some(Node::Dir { atime, mtime, .. }) => {
                if let Some(t) = new_atime {
                    *atime = t;
                }
                if let Some(t) = new_mtime {
                    *mtime = t;
                }
                Ok(())
            }
            Some(Node::Symlink { .. }) => Ok(()),
            None => Err(nfs3::nfsstat3::NFS3ERR_NOENT),
        }
    }
}

/// Export policy handing every client the same filesystem.
pub struct TestMount {
    pub fs: Arc<dyn NfsFileSystem>,
}

#[async_trait]
impl MountHandler for TestMount {
    async fn mount(&self, _client_addr: &str, _dirpath: &[u8]) -> MountResult {
        MountResult {
            status: mount::mountstat3::MNT3_OK,
            fs: Some(Arc::clone(&self.fs)),
            auth_flavors: vec![xdr::rpc::AUTH_FLAVOR_NONE],
        }
    }

    async fn fsstat(
        &self,
        _fs: &Arc<dyn NfsFileSystem>,
        out: &mut vfs::FsStat,
    ) -> Result<(), nfs3::nfsstat3> {
        out.total_bytes = 1 << 30;
        out.free_bytes = 1 << 29;
        out.avail_bytes = 1 << 29;
        Ok(())
    }
}

pub const TEST_WRITE_VERIFIER: nfs3::writeverf3 = [9, 9, 9, 9, 2, 0, 4, 9];

pub fn test_context(fs: &Arc<MemFs>) -> Context {
    test_context_with_limit(fs, 16384)
}

pub fn test_context_with_limit(fs: &Arc<MemFs>, handle_limit: usize) -> Context {
    let fs: Arc<dyn NfsFileSystem> = Arc::clone(fs) as Arc<dyn NfsFileSystem>;
    Context {
        local_port: 0,
        client_addr: "127.0.0.1:1234".to_string(),
        handler: Arc::new(TestMount { fs }),
        registry: Arc::new(HandleRegistry::new(handle_limit)),
        mount_signal: None,
        write_verifier: TEST_WRITE_VERIFIER,
    }
}

/// Runs one NFS procedure against the handlers and returns the raw reply.
pub async fn call_nfs(context: &Context, proc: nfs3::NfsProcedure, args: Vec<u8>) -> Vec<u8> {
    let call = xdr::rpc::call_body {
        rpcvers: 2,
        prog: nfs3::PROGRAM,
        vers: nfs3::VERSION,
        proc: proc as u32,
        cred: xdr::rpc::opaque_auth::default(),
        verf: xdr::rpc::opaque_auth::default(),
    };
    let mut input = Cursor::new(args);
    let mut output = Vec::new();
    handle_nfs(77, call, &mut input, &mut output, context).await.expect("handler failed");
    output
}

/// Runs one MOUNT procedure against the handlers and returns the raw reply.
pub async fn call_mount(context: &Context, proc: mount::MountProcedure, args: Vec<u8>) -> Vec<u8> {
    let call = xdr::rpc::call_body {
        rpcvers: 2,
        prog: mount::PROGRAM,
        vers: mount::VERSION,
        proc: proc as u32,
        cred: xdr::rpc::opaque_auth::default(),
        verf: xdr::rpc::opaque_auth::default(),
    };
    let mut input = Cursor::new(args);
    let mut output = Vec::new();
    handle_mount(77, call, &mut input, &mut output, context).await.expect("handler failed");
    output
}

/// Consumes the RPC reply header, asserting an accepted SUCCESS, and leaves
/// the cursor at the procedure body.
pub fn open_reply(buf: Vec<u8>) -> Cursor<Vec<u8>> {
    let mut cursor = Cursor::new(buf);
    let msg: xdr::rpc::rpc_msg = deserialize(&mut cursor).expect("deserialize reply header");
    match msg.body {
        xdr::rpc::rpc_body::REPLY(xdr::rpc::reply_body::MSG_ACCEPTED(accepted)) => {
            match accepted.reply_data {
                xdr::rpc::accept_body::SUCCESS => {}
                other => panic!("expected SUCCESS accept body, got {:?}", other),
            }
        }
        other => panic!("expected accepted reply, got {:?}", other),
    }
    cursor
}

pub fn read_status(cursor: &mut Cursor<Vec<u8>>) -> nfs3::nfsstat3 {
    deserialize(cursor).expect("deserialize nfsstat3")
}

/// MNT the export root and return its root file handle.
pub async fn mount_root(context: &Context) -> nfs3::nfs_fh3 {
    let mut args = Vec::new();
    b"/".to_vec().serialize(&mut args).unwrap();
    let reply = call_mount(context, mount::MountProcedure::MOUNTPROC3_MNT, args).await;
    let mut cursor = open_reply(reply);
    let status: mount::mountstat3 = deserialize(&mut cursor).expect("mount status");
    assert_eq!(status, mount::mountstat3::MNT3_OK);
    let res: mount::mountres3_ok = deserialize(&mut cursor).expect("mount result");
    nfs3::nfs_fh3 { data: res.fhandle }
}

/// LOOKUP one name, returning the child handle or the error status.
pub async fn lookup(
    context: &Context,
    dir: &nfs3::nfs_fh3,
    name: &str,
) -> Result<nfs3::nfs_fh3, nfs3::nfsstat3> {
    let dirops = nfs3::diropargs3 { dir: dir.clone(), name: name.into() };
    let mut args = Vec::new();
    dirops.serialize(&mut args).unwrap();
    let reply = call_nfs(context, nfs3::NfsProcedure::NFSPROC3_LOOKUP, args).await;
    let mut cursor = open_reply(reply);
    match read_status(&mut cursor) {
        nfs3::nfsstat3::NFS3_OK => {
            let handle: nfs3::nfs_fh3 = deserialize(&mut cursor).expect("lookup handle");
            Ok(handle)
        }
        stat => Err(stat),
    }
}

/// READ a byte range, returning `(data, eof)` on success.
pub async fn read_file(
    context: &Context,
    file: &nfs3::nfs_fh3,
    offset: u64,
    count: u32,
) -> Result<(Vec<u8>, bool), nfs3::nfsstat3> {
    let req = nfs3::file::READ3args { file: file.clone(), offset, count };
    let mut args = Vec::new();
    req.serialize(&mut args).unwrap();
    let reply = call_nfs(context, nfs3::NfsProcedure::NFSPROC3_READ, args).await;
    let mut cursor = open_reply(reply);
    match read_status(&mut cursor) {
        nfs3::nfsstat3::NFS3_OK => {
            let res: nfs3::file::READ3resok = deserialize(&mut cursor).expect("read result");
            Ok((res.data, res.eof))
        }
        stat => Err(stat),
    }
}
