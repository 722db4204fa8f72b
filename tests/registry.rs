//! Handle-registry invariants: idempotent minting, resolution freshness,
//! rename rebinding, LRU eviction with ancestor warming, and the listing
//! verifier cache.

mod support;

use std::sync::Arc;

use nfs_gate::registry::HandleRegistry;
use nfs_gate::vfs::{DirEntry, Metadata, NfsFileSystem};
use nfs_gate::xdr::nfs3;

use support::MemFs;

fn fs() -> Arc<dyn NfsFileSystem> {
    Arc::new(MemFs::new())
}

fn path(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

fn entries(names: &[&str]) -> Arc<Vec<DirEntry>> {
    Arc::new(
        names
            .iter()
            .map(|n| DirEntry { name: n.as_bytes().to_vec(), meta: Metadata::default() })
            .collect(),
    )
}

#[test]
fn to_handle_is_idempotent() {
    let registry = HandleRegistry::new(64);
    let fs = fs();
    let p = path(&["a", "b.txt"]);

    let first = registry.to_handle(&fs, &p);
    let second = registry.to_handle(&fs, &p);
    assert_eq!(first, second);
    assert_eq!(first.data.len(), 16);
}

#[test]
fn from_handle_returns_the_registered_pair() {
    let registry = HandleRegistry::new(64);
    let fs = fs();
    let p = path(&["a", "b.txt"]);

    let handle = registry.to_handle(&fs, &p);
    let (resolved_fs, resolved_path) = registry.from_handle(&handle).expect("resolve");
    assert!(Arc::ptr_eq(&fs, &resolved_fs));
    assert_eq!(resolved_path, p);
}

#[test]
fn unknown_handle_is_stale_and_malformed_is_badhandle() {
    let registry = HandleRegistry::new(64);

    let unknown = nfs3::nfs_fh3 { data: vec![7; 16] };
    assert_eq!(registry.from_handle(&unknown), Err(nfs3::nfsstat3::NFS3ERR_STALE));

    let malformed = nfs3::nfs_fh3 { data: vec![7; 5] };
    assert_eq!(registry.from_handle(&malformed), Err(nfs3::nfsstat3::NFS3ERR_BADHANDLE));
}

#[test]
fn distinct_paths_get_distinct_handles() {
    let registry = HandleRegistry::new(64);
    let fs = fs();

    let a = registry.to_handle(&fs, &path(&["a"]));
    let b = registry.to_handle(&fs, &path(&["b"]));
    assert_ne!(a, b);
}

#[test]
fn lru_pressure_evicts_and_later_presentation_is_stale() {
    let registry = HandleRegistry::new(4);
    let fs = fs();

    let first = registry.to_handle(&fs, &path(&["f-0"]));
    for i in 1..10 {
        registry.to_handle(&fs, &[format!("f-{i}")]);
    }

    assert_eq!(registry.from_handle(&first), Err(nfs3::nfsstat3::NFS3ERR_STALE));

    // the reverse index was cleaned too: re-registering mints a fresh id
    let reminted = registry.to_handle(&fs, &path(&["f-0"]));
    assert_ne!(first, reminted);
}

#[test]
fn resolving_a_handle_keeps_ancestors_warm() {
    let registry = HandleRegistry::new(3);
    let fs = fs();

    let top = registry.to_handle(&fs, &path(&["a"]));
    let deep = registry.to_handle(&fs, &path(&["a", "b"]));
    let bystander = registry.to_handle(&fs, &path(&["x"]));

    // touches a/b and promotes its ancestor "a" above the bystander
    registry.from_handle(&deep).expect("deep resolves");

    // one more insert evicts exactly the coldest entry: the bystander
    registry.to_handle(&fs, &path(&["y"]));

    assert!(registry.from_handle(&top).is_ok());
    assert_eq!(registry.from_handle(&bystander), Err(nfs3::nfsstat3::NFS3ERR_STALE));
}

#[test]
fn update_handle_rebinds_across_rename() {
    let registry = HandleRegistry::new(64);
    let fs = fs();
    let from = path(&["dir_a", "f.txt"]);
    let to = path(&["dir_b", "g.txt"]);

    let handle = registry.to_handle(&fs, &from);
    registry.update_handle(&fs, &from, &to);

    let (_, resolved) = registry.from_handle(&handle).expect("resolve after rename");
    assert_eq!(resolved, to);

    // the old reverse entry is gone: the old path now mints a fresh id
    let fresh = registry.to_handle(&fs, &from);
    assert_ne!(fresh, handle);

    // and the new path answers with the preserved id
    assert_eq!(registry.to_handle(&fs, &to), handle);
}

#[test]
fn update_handle_drops_an_overwritten_target() {
    let registry = HandleRegistry::new(64);
    let fs = fs();
    let from = path(&["f.txt"]);
    let to = path(&["g.txt"]);

    let moved = registry.to_handle(&fs, &from);
    let replaced = registry.to_handle(&fs, &to);
    registry.update_handle(&fs, &from, &to);

    assert_eq!(registry.from_handle(&moved).expect("moved resolves").1, to);
    assert_eq!(registry.from_handle(&replaced), Err(nfs3::nfsstat3::NFS3ERR_STALE));
}

#[test]
fn invalidate_handle_removes_both_directions() {
    let registry = HandleRegistry::new(64);
    let fs = fs();
    let p = path(&["f.txt"]);

    let handle = registry.to_handle(&fs, &p);
    registry.invalidate_handle(&fs, &p);

    assert_eq!(registry.from_handle(&handle), Err(nfs3::nfsstat3::NFS3ERR_STALE));
    assert_ne!(registry.to_handle(&fs, &p), handle);
}

#[test]
fn equal_listings_hash_equally_and_changes_change_the_verifier() {
    let registry = HandleRegistry::new(64);

    let v1 = registry.verifier_for("photos", entries(&["a.jpg", "b.jpg"]));
    let v2 = registry.verifier_for("photos", entries(&["a.jpg", "b.jpg"]));
    assert_eq!(v1, v2);

    let v3 = registry.verifier_for("photos", entries(&["a.jpg", "b.jpg", "c.jpg"]));
    assert_ne!(v1, v3);

    // the path participates in the hash
    let v4 = registry.verifier_for("backup", entries(&["a.jpg", "b.jpg"]));
    assert_ne!(v1, v4);
}

#[test]
fn verifier_cache_serves_matching_path_only() {
    let registry = HandleRegistry::new(64);

    let listing = entries(&["a.jpg", "b.jpg"]);
    let verifier = registry.verifier_for("photos", Arc::clone(&listing));

    let hit = registry.data_for_verifier("photos", verifier).expect("cache hit");
    assert_eq!(hit.len(), 2);
    assert_eq!(hit[0].name, b"a.jpg");

    // a different path under the same verifier is treated as a miss
    assert!(registry.data_for_verifier("backup", verifier).is_none());
    assert!(registry.data_for_verifier("photos", verifier ^ 1).is_none());
}

#[test]
fn invalidate_listings_forgets_a_directory() {
    let registry = HandleRegistry::new(64);

    let verifier = registry.verifier_for("photos", entries(&["a.jpg"]));
    let other = registry.verifier_for("backup", entries(&["b.jpg"]));

    registry.invalidate_listings("photos");
    assert!(registry.data_for_verifier("photos", verifier).is_none());
    assert!(registry.data_for_verifier("backup", other).is_some());
}
