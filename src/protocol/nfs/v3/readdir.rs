//! READDIR (procedure 16): paged directory listing.
//!
//! Paging works over the sorted listing frozen when the cookie verifier was
//! computed. `.` and `..` are synthesized at cookies 0 and 1 on the first
//! page; the real entry at sorted index `i` carries cookie `i + 2`, and a
//! client resumes by sending back the cookie of the last entry it consumed.
//! Entries are emitted until the serialized reply would exceed the client's
//! byte budget or the page reaches half the registry's handle limit; the
//! eof flag is set only when the listing was emitted to its end.

use std::io::{Read, Write};

use byteorder::ByteOrder;
use tracing::{debug, error, trace};

use crate::protocol::nfs::v3::helpers::{child_path, sorted_listing, try_stat};
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize, XdrEndian};
use crate::write_counter::WriteCounter;

/// Clients must offer at least this much reply space.
const MIN_COUNT: u32 = 1024;

/// Headroom reserved for the list terminator and eof flag.
const REPLY_TAIL_RESERVE: usize = 128;

pub async fn nfsproc3_readdir(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::dir::READDIR3args>(input)?;
    debug!("nfsproc3_readdir({:?},{:?})", xid, args);

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

    if args.count < MIN_COUNT {
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
                error!("readdir listing error {:?} --> {:?}", xid, stat);
                xdr::rpc::make_success_reply(xid).serialize(output)?;
                stat.serialize(output)?;
                dir_attr.serialize(output)?;
                return Ok(());
            }
        };

    // cookie 0 is a fresh listing; cookie 1 resumes right after "..";
    // cookie i+2 resumes after sorted entry i.
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

    let max_bytes_allowed = args.count as usize - REPLY_TAIL_RESERVE;
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
        nfs3::dir::entry3 {
            fileid: args.dir.fileid(),
            name: nfs3::filename3::from("."),
            cookie: 0,
        }
        .serialize(&mut counting_output)?;
        true.serialize(&mut counting_output)?;
        nfs3::dir::entry3 {
            fileid: parent_fileid,
            name: nfs3::filename3::from(".."),
            cookie: 1,
        }
        .serialize(&mut counting_output)?;
    }

    let mut written = 0_usize;
    let mut all_entries_written = true;
    for (index, dir_entry) in entries.iter().enumerate().skip(resume_index) {
        let name = match std::str::from_utf8(&dir_entry.name) {
            Ok(name) => name.to_string(),
            Err(_) => continue,
        };
        let entry_path = child_path(&dir_path, name);
        let entry_handle = context.registry.to_handle(&fs, &entry_path);
        let entry = nfs3::dir::entry3 {
            fileid: entry_handle.fileid(),
            name: dir_entry.name.clone().into(),
            cookie: index as u64 + 2,
        };

        let mut write_buf: Vec<u8> = Vec::new();
        true.serialize(&mut write_buf)?;
        entry.serialize(&mut write_buf)?;

        if counting_output.bytes_written() + write_buf.len() < max_bytes_allowed
            && written < entry_cap
        {
            trace!("  -- dirent {:?}", entry);
            counting_output.write_all(&write_buf)?;
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
        "readdir {:?}: cookie {}, emitted {} of {} entries, eof {}",
        xid,
        args.cookie,
        written,
        entries.len(),
        eof
    );
    Ok(())
}
