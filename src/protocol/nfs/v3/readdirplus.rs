//! READDIRPLUS (procedure 17): paged directory listing with per-entry
//! attributes and handles.
//!
//! Identical paging rules to READDIR, with two extra budgets: `maxcount`
//! bounds the whole serialized reply while `dircount` bounds just the
//! fileid/name/cookie portion, and every emitted entry additionally carries
//! its attributes and file handle so the client skips a LOOKUP per name.
//! The synthesized `.` and `..` entries carry neither attributes nor
//! handles, matching what clients expect from them.

use std::io::{Read, Write};

use byteorder::ByteOrder;
use tracing::{debug, error, trace};

use crate::protocol::nfs::v3::helpers::{child_path, sorted_listing, try_stat};
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize, XdrEndian};
use crate::write_counter::WriteCounter;

/// Floors below which the client's budgets cannot produce a useful page.
const MIN_DIRCOUNT: u32 = 512;
const MIN_MAXCOUNT: u32 = 4096;

/// Headroom reserved for the list terminator and eof flag.
const REPLY_TAIL_RESERVE: usize = 128;

/// Approximate dircount cost of one entry: fileid, cookie, and the name
/// with its length prefix.
fn dircount_cost(name_len: usize) -> usize {
    name_len + 20
}

pub async fn nfsproc3_readdirplus(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::dir::READDIRPLUS3args>(input)?;
    debug!("nfsproc3_readdirplus({:?},{:?})", xid, args);

    let (fs, dir_path) = match context.registry.from_handle(&args.dir) {
        Ok(resolved) => resolved,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::None.serialize(output)?;
            return Ok(());
        }
    };

    let dir_attr = try_stat(context, &fs, &dir_path).await;

    if args.dircount < MIN_DIRCOUNT || args.maxcount < MIN_MAXCOUNT {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_TOOSMALL.serialize(output)?;
        dir_attr.serialize(output)?;
        return Ok(());
    }

    let joined = fs.join(&dir_path);
    let caller_verf = XdrEndian::read_u64(&args.cookieverf);
    let (entries, verifier) =
        match sorted_listing(context, &fs, &joined, args.cookie, caller_verf).await {
            Ok(listing) => listing,
            Err(stat) => {
                error!("readdirplus listing error {:?} --> {:?}", xid, stat);
                xdr::rpc::make_success_reply(xid).serialize(output)?;
                stat.serialize(output)?;
                dir_attr.serialize(output)?;
                return Ok(());
            }
        };

    let resume_index = match args.cookie {
        0 | 1 => 0,
        c => c as usize - 1,
    };
    if resume_index > entries.len() {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_BAD_COOKIE.serialize(output)?;
        dir_attr.serialize(output)?;
        return Ok(());
    }

    let max_bytes_allowed = args.maxcount as usize - REPLY_TAIL_RESERVE;
    let max_dircount_bytes = args.dircount as usize;
    let entry_cap = context.registry.handle_limit() / 2;

    let mut counting_output = WriteCounter::new(output);
    xdr::rpc::make_success_reply(xid).serialize(&mut counting_output)?;
    nfs3::nfsstat3::NFS3_OK.serialize(&mut counting_output)?;
    dir_attr.serialize(&mut counting_output)?;
    verifier.to_be_bytes().serialize(&mut counting_output)?;

    if args.cookie == 0 {
        let parent_fileid = if dir_path.is_empty() {
            0
        } else {
            context.registry.to_handle(&fs, &dir_path[..dir_path.len() - 1]).fileid()
        };
        true.serialize(&mut counting_output)?;
        nfs3::dir::entryplus3 {
            fileid: args.dir.fileid(),
            name: nfs3::filename3::from("."),
            cookie: 0,
            name_attributes: nfs3::post_op_attr::None,
            name_handle: nfs3::post_op_fh3::None,
        }
        .serialize(&mut counting_output)?;
        true.serialize(&mut counting_output)?;
        nfs3::dir::entryplus3 {
            fileid: parent_fileid,
            name: nfs3::filename3::from(".."),
            cookie: 1,
            name_attributes: nfs3::post_op_attr::None,
            name_handle: nfs3::post_op_fh3::None,
        }
        .serialize(&mut counting_output)?;
    }

    let mut written = 0_usize;
    let mut accumulated_dircount = 0_usize;
    let mut all_entries_written = true;
    for (index, dir_entry) in entries.iter().enumerate().skip(resume_index) {
        let name = match std::str::from_utf8(&dir_entry.name) {
            Ok(name) => name.to_string(),
            Err(_) => continue,
        };
        let entry_path = child_path(&dir_path, name);
        let entry_handle = context.registry.to_handle(&fs, &entry_path);
        let fileid = entry_handle.fileid();
        let entry = nfs3::dir::entryplus3 {
            fileid,
            name: dir_entry.name.clone().into(),
            cookie: index as u64 + 2,
            name_attributes: Some(dir_entry.meta.to_fattr3(fileid)),
            name_handle: Some(entry_handle),
        };

        let mut write_buf: Vec<u8> = Vec::new();
        true.serialize(&mut write_buf)?;
        entry.serialize(&mut write_buf)?;
        let added_dircount = dircount_cost(entry.name.len());

        if counting_output.bytes_written() + write_buf.len() < max_bytes_allowed
            && accumulated_dircount + added_dircount < max_dircount_bytes
            && written < entry_cap
        {
            trace!("  -- dirent {:?}", entry.name);
            counting_output.write_all(&write_buf)?;
            accumulated_dircount += added_dircount;
            written += 1;
        } else {
            trace!("  -- insufficient space, truncating at {}", index);
            all_entries_written = false;
            break;
        }
    }

    false.serialize(&mut counting_output)?;
    let eof = all_entries_written;
    eof.serialize(&mut counting_output)?;
    debug!(
        "readdirplus {:?}: cookie {}, emitted {} of {} entries, eof {}",
        xid,
        args.cookie,
        written,
        entries.len(),
        eof
    );
    Ok(())
}
