//! Where real AIA files and scratch directories come from in tests.
//!
//! Full-disk level-1 files are tens of megabytes and are not checked in.
//! Tests that need one look in a short list of places and skip when none
//! has it.

use std::path::PathBuf;

/// The workspace root: two levels above this crate's manifest.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .ancestors()
        .nth(2)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// `crates/<crate_name>/testdata` under the workspace root.
pub fn crate_testdata_dir(crate_name: &str) -> PathBuf {
    workspace_root()
        .join("crates")
        .join(crate_name)
        .join("testdata")
}

/// Locate a downloaded observation by file name.
///
/// Search order: `$TEST_DATA_DIR`, `crates/calibration/testdata`,
/// `testdata` at the workspace root, then the sunpy download cache in
/// `~/sunpy/data`, so files fetched with `Fido` are picked up as-is.
pub fn find_test_file(name: &str) -> Option<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(dir) = std::env::var("TEST_DATA_DIR") {
        candidates.push(PathBuf::from(dir).join(name));
    }

    candidates.extend([
        crate_testdata_dir("calibration").join(name),
        workspace_root().join("testdata").join(name),
    ]);
    if let Some(home) = std::env::var_os("HOME") {
        candidates.push(PathBuf::from(home).join("sunpy/data").join(name));
    }

    candidates.into_iter().find(|path| path.exists())
}

/// Scratch data directory, removed on drop.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temporary test directory")
}

/// Scratch data directory whose name starts with `prefix`, handy when a
/// failing test leaves the directory behind for inspection.
pub fn temp_test_dir_with_prefix(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("Failed to create temporary test directory")
}
