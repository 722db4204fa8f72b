//! Small shared pieces of the procedure handlers: attribute capture for
//! `post_op_attr`/wcc data, name validation, and path arithmetic over the
//! component lists the registry stores.

use std::sync::Arc;

use crate::protocol::rpc;
use crate::protocol::xdr::nfs3;
use crate::vfs::NfsFileSystem;

/// Stats an object and returns its wire attributes, or `None` when the stat
/// fails. The synthesized `fileid3` comes from the object's handle, so the
/// handle is minted (or refreshed) as a side effect.
pub(crate) async fn try_stat(
    context: &rpc::Context,
    fs: &Arc<dyn NfsFileSystem>,
    path: &[String],
) -> nfs3::post_op_attr {
    let joined = fs.join(path);
    match fs.lstat(&joined).await {
        Ok(meta) => {
            let fh = context.registry.to_handle(fs, path);
            Some(meta.to_fattr3(fh.fileid()))
        }
        Err(_) => None,
    }
}

/// Captures the pre-operation attribute subset of an object for wcc data.
/// Must run before the mutation it brackets.
pub(crate) async fn pre_op_wcc(fs: &Arc<dyn NfsFileSystem>, path: &[String]) -> nfs3::pre_op_attr {
    let joined = fs.join(path);
    fs.lstat(&joined).await.map(|meta| meta.to_wcc_attr()).ok()
}

/// Validates a name component from the wire: length-limited, UTF-8, and not
/// a path. Backing stores are addressed with `String` paths, so names that
/// are not valid UTF-8 are rejected as `NFS3ERR_INVAL`.
pub(crate) fn name_component(name: &nfs3::filename3) -> Result<String, nfs3::nfsstat3> {
    if name.len() > nfs3::PATHNAME_MAX {
        return Err(nfs3::nfsstat3::NFS3ERR_NAMETOOLONG);
    }
    let name =
        std::str::from_utf8(name).map_err(|_| nfs3::nfsstat3::NFS3ERR_INVAL)?;
    if name.is_empty() || name.contains('/') {
        return Err(nfs3::nfsstat3::NFS3ERR_INVAL);
    }
    Ok(name.to_string())
}

/// Appends one component to a directory's component list.
pub(crate) fn child_path(parent: &[String], name: String) -> Vec<String> {
    let mut path = Vec::with_capacity(parent.len() + 1);
    path.extend_from_slice(parent);
    path.push(name);
    path
}

/// Produces the sorted listing and cookie verifier READDIR and READDIRPLUS
/// page over.
///
/// A caller resuming with a non-zero verifier is served the cached listing
/// that verifier was computed from, so pagination stays coherent while the
/// cache entry lives. Otherwise the directory is listed afresh, sorted
/// bytewise by name, and registered under its new verifier; a resuming
/// caller whose verifier no longer matches the recomputed one gets
/// `NFS3ERR_BAD_COOKIE` and is expected to restart from cookie 0.
pub(crate) async fn sorted_listing(
    context: &rpc::Context,
    fs: &Arc<dyn NfsFileSystem>,
    joined: &str,
    cookie: u64,
    caller_verf: u64,
) -> Result<(Arc<Vec<crate::vfs::DirEntry>>, u64), nfs3::nfsstat3> {
    if caller_verf != 0 {
        if let Some(entries) = context.registry.data_for_verifier(joined, caller_verf) {
            return Ok((entries, caller_verf));
        }
    }

    let mut list = fs.read_dir(joined).await?;
    list.sort_by(|a, b| a.name.cmp(&b.name));
    let entries = Arc::new(list);
    let verifier = context.registry.verifier_for(joined, Arc::clone(&entries));
    if cookie != 0 && caller_verf != 0 && verifier != caller_verf {
        return Err(nfs3::nfsstat3::NFS3ERR_BAD_COOKIE);
    }
    Ok((entries, verifier))
}
