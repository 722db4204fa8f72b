//! Mount, lookup, read and rename flows driven end to end through the
//! procedure handlers.

mod support;

use std::sync::Arc;

use nfs_gate::xdr::{deserialize, nfs3, Serialize};

use support::{
    call_nfs, lookup, mount_root, open_reply, read_file, read_status, test_context, MemFs,
};

#[tokio::test]
async fn mount_lookup_read() {
    support::init_tracing();
    let fs = Arc::new(MemFs::new());
    fs.add_file("hello.txt", b"hello world");
    let context = test_context(&fs);

    let root = mount_root(&context).await;
    let file = lookup(&context, &root, "hello.txt").await.expect("lookup hello.txt");

    let (data, eof) = read_file(&context, &file, 0, 11).await.expect("read");
    assert_eq!(data, b"hello world");
    assert!(eof);
}

#[tokio::test]
async fn read_past_eof_returns_empty_data() {
    let fs = Arc::new(MemFs::new());
    fs.add_file("hello.txt", b"hello world");
    let context = test_context(&fs);

    let root = mount_root(&context).await;
    let file = lookup(&context, &root, "hello.txt").await.unwrap();

    let (data, eof) = read_file(&context, &file, 6, 100).await.expect("tail read");
    assert_eq!(data, b"world");
    assert!(eof);

    let (data, eof) = read_file(&context, &file, 50, 10).await.expect("read past end");
    assert!(data.is_empty());
    assert!(eof);
}

#[tokio::test]
async fn getattr_reports_size_and_type() {
    let fs = Arc::new(MemFs::new());
    fs.add_file("hello.txt", b"hello world");
    let context = test_context(&fs);

    let root = mount_root(&context).await;
    let file = lookup(&context, &root, "hello.txt").await.unwrap();

    let mut args = Vec::new();
    file.serialize(&mut args).unwrap();
    let reply = call_nfs(&context, nfs3::NfsProcedure::NFSPROC3_GETATTR, args).await;
    let mut cursor = open_reply(reply);
    assert_eq!(read_status(&mut cursor), nfs3::nfsstat3::NFS3_OK);
    let attr: nfs3::fattr3 = deserialize(&mut cursor).expect("fattr3");
    assert_eq!(attr.ftype, nfs3::ftype3::NF3REG);
    assert_eq!(attr.size, 11);
    assert_eq!(attr.fileid, file.fileid());
}

#[tokio::test]
async fn lookup_missing_name_is_noent() {
    let fs = Arc::new(MemFs::new());
    let context = test_context(&fs);

    let root = mount_root(&context).await;
    assert_eq!(
        lookup(&context, &root, "missing.txt").await,
        Err(nfs3::nfsstat3::NFS3ERR_NOENT)
    );
}

#[tokio::test]
async fn lookup_dot_returns_the_directory_itself() {
    let fs = Arc::new(MemFs::new());
    fs.add_dir("sub");
    let context = test_context(&fs);

    let root = mount_root(&context).await;
    let sub = lookup(&context, &root, "sub").await.unwrap();

    assert_eq!(lookup(&context, &sub, ".").await.unwrap(), sub);
    assert_eq!(lookup(&context, &sub, "..").await.unwrap(), root);
}

#[tokio::test]
async fn lookup_dotdot_at_export_root_is_refused() {
    let fs = Arc::new(MemFs::new());
    let context = test_context(&fs);

    let root = mount_root(&context).await;
    assert_eq!(lookup(&context, &root, "..").await, Err(nfs3::nfsstat3::NFS3ERR_ACCES));
}

#[tokio::test]
async fn lookup_overlong_name_is_nametoolong() {
    let fs = Arc::new(MemFs::new());
    let context = test_context(&fs);

    let root = mount_root(&context).await;
    let long = "x".repeat(300);
    assert_eq!(
        lookup(&context, &root, &long).await,
        Err(nfs3::nfsstat3::NFS3ERR_NAMETOOLONG)
    );
}

#[tokio::test]
async fn rename_preserves_the_object_handle() {
    let fs = Arc::new(MemFs::new());
    fs.add_file("f-0010.txt", b"payload");
    let context = test_context(&fs);

    let root = mount_root(&context).await;
    let before = lookup(&context, &root, "f-0010.txt").await.expect("lookup before rename");

    let from = nfs3::diropargs3 { dir: root.clone(), name: "f-0010.txt".into() };
    let to = nfs3::diropargs3 { dir: root.clone(), name: "g-0010.txt".into() };
    let mut args = Vec::new();
    from.serialize(&mut args).unwrap();
    to.serialize(&mut args).unwrap();
    let reply = call_nfs(&context, nfs3::NfsProcedure::NFSPROC3_RENAME, args).await;
    let mut cursor = open_reply(reply);
    assert_eq!(read_status(&mut cursor), nfs3::nfsstat3::NFS3_OK);
    let _from_wcc: nfs3::wcc_data = deserialize(&mut cursor).expect("from wcc");
    let _to_wcc: nfs3::wcc_data = deserialize(&mut cursor).expect("to wcc");

    let after = lookup(&context, &root, "g-0010.txt").await.expect("lookup after rename");
    assert_eq!(before, after);
    assert_eq!(
        lookup(&context, &root, "f-0010.txt").await,
        Err(nfs3::nfsstat3::NFS3ERR_NOENT)
    );

    // the pre-rename handle still reads the moved file
    let (data, _) = read_file(&context, &before, 0, 7).await.expect("read via old handle");
    assert_eq!(data, b"payload");
}

#[tokio::test]
async fn access_mask_is_reduced_on_read_only_filesystems() {
    let fs = Arc::new(MemFs::read_only());
    fs.add_file("hello.txt", b"hi");
    let context = test_context(&fs);

    let root = mount_root(&context).await;
    let mut args = Vec::new();
    root.serialize(&mut args).unwrap();
    0x3f_u32.serialize(&mut args).unwrap();
    let reply = call_nfs(&context, nfs3::NfsProcedure::NFSPROC3_ACCESS, args).await;
    let mut cursor = open_reply(reply);
    assert_eq!(read_status(&mut cursor), nfs3::nfsstat3::NFS3_OK);
    let _attr: nfs3::post_op_attr = deserialize(&mut cursor).expect("post op attr");
    let mask: u32 = deserialize(&mut cursor).expect("mask");
    assert_eq!(mask, nfs3::ACCESS3_READ | nfs3::ACCESS3_LOOKUP | nfs3::ACCESS3_EXECUTE);
}

#[tokio::test]
async fn readlink_follows_only_symlinks() {
    let fs = Arc::new(MemFs::new());
    fs.add_file("file.txt", b"x");
    let context = test_context(&fs);

    let root = mount_root(&context).await;

    // create the link through the protocol
    let args3 = nfs3::dir::SYMLINK3args {
        dirops: nfs3::diropargs3 { dir: root.clone(), name: "link".into() },
        symlink: nfs3::symlinkdata3 {
            symlink_attributes: nfs3::sattr3::default(),
            symlink_data: "file.txt".into(),
        },
    };
    let mut args = Vec::new();
    args3.serialize(&mut args).unwrap();
    let reply = call_nfs(&context, nfs3::NfsProcedure::NFSPROC3_SYMLINK, args).await;
    let mut cursor = open_reply(reply);
    assert_eq!(read_status(&mut cursor), nfs3::nfsstat3::NFS3_OK);

    let link = lookup(&context, &root, "link").await.expect("lookup link");
    let mut args = Vec::new();
    link.serialize(&mut args).unwrap();
    let reply = call_nfs(&context, nfs3::NfsProcedure::NFSPROC3_READLINK, args).await;
    let mut cursor = open_reply(reply);
    assert_eq!(read_status(&mut cursor), nfs3::nfsstat3::NFS3_OK);
    let _attr: nfs3::post_op_attr = deserialize(&mut cursor).expect("post op attr");
    let target: nfs3::nfspath3 = deserialize(&mut cursor).expect("target");
    assert_eq!(target.as_ref(), b"file.txt");

    // READLINK on a regular file is INVAL
    let file = lookup(&context, &root, "file.txt").await.unwrap();
    let mut args = Vec::new();
    file.serialize(&mut args).unwrap();
    let reply = call_nfs(&context, nfs3::NfsProcedure::NFSPROC3_READLINK, args).await;
    let mut cursor = open_reply(reply);
    assert_eq!(read_status(&mut cursor), nfs3::nfsstat3::NFS3ERR_INVAL);
}

#[tokio::test]
async fn stale_handle_after_remove() {
    let fs = Arc::new(MemFs::new());
    fs.add_file("doomed.txt", b"bye");
    let context = test_context(&fs);

    let root = mount_root(&context).await;
    let doomed = lookup(&context, &root, "doomed.txt").await.unwrap();

    let dirops = nfs3::diropargs3 { dir: root.clone(), name: "doomed.txt".into() };
    let mut args = Vec::new();
    dirops.serialize(&mut args).unwrap();
    let reply = call_nfs(&context, nfs3::NfsProcedure::NFSPROC3_REMOVE, args).await;
    let mut cursor = open_reply(reply);
    assert_eq!(read_status(&mut cursor), nfs3::nfsstat3::NFS3_OK);

    let mut args = Vec::new();
    doomed.serialize(&mut args).unwrap();
    let reply = call_nfs(&context, nfs3::NfsProcedure::NFSPROC3_GETATTR, args).await;
    let mut cursor = open_reply(reply);
    assert_eq!(read_status(&mut cursor), nfs3::nfsstat3::NFS3ERR_STALE);
}

#[tokio::test]
async fn fsstat_reports_handler_totals() {
    let fs = Arc::new(MemFs::new());
    let context = test_context(&fs);

    let root = mount_root(&context).await;
    let mut args = Vec::new();
    root.serialize(&mut args).unwrap();
    let reply = call_nfs(&context, nfs3::NfsProcedure::NFSPROC3_FSSTAT, args).await;
    let mut cursor = open_reply(reply);
    assert_eq!(read_status(&mut cursor), nfs3::nfsstat3::NFS3_OK);
    let res: nfs3::fs::FSSTAT3resok = deserialize(&mut cursor).expect("fsstat result");
    assert_eq!(res.tbytes, 1 << 30);
    assert_eq!(res.fbytes, 1 << 29);
    // fields the handler left alone keep the 2^62 "unknown" cap
    assert_eq!(res.tfiles, 1 << 62);
}

#[tokio::test]
async fn pathconf_is_static() {
    let fs = Arc::new(MemFs::new());
    let context = test_context(&fs);

    let root = mount_root(&context).await;
    let mut args = Vec::new();
    root.serialize(&mut args).unwrap();
    let reply = call_nfs(&context, nfs3::NfsProcedure::NFSPROC3_PATHCONF, args).await;
    let mut cursor = open_reply(reply);
    assert_eq!(read_status(&mut cursor), nfs3::nfsstat3::NFS3_OK);
    let res: nfs3::fs::PATHCONF3resok = deserialize(&mut cursor).expect("pathconf result");
    assert_eq!(res.linkmax, 1);
    assert_eq!(res.name_max, 255);
    assert!(res.no_trunc);
    assert!(!res.chown_restricted);
    assert!(!res.case_insensitive);
    assert!(res.case_preserving);
}

#[tokio::test]
async fn mknod_and_link_are_notsupp() {
    let fs = Arc::new(MemFs::new());
    let context = test_context(&fs);
    let _root = mount_root(&context).await;

    let reply = call_nfs(&context, nfs3::NfsProcedure::NFSPROC3_MKNOD, Vec::new()).await;
    let mut cursor = open_reply(reply);
    assert_eq!(read_status(&mut cursor), nfs3::nfsstat3::NFS3ERR_NOTSUPP);

    let reply = call_nfs(&context, nfs3::NfsProcedure::NFSPROC3_LINK, Vec::new()).await;
    let mut cursor = open_reply(reply);
    assert_eq!(read_status(&mut cursor), nfs3::nfsstat3::NFS3ERR_NOTSUPP);
}
