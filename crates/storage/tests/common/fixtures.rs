use reel_storage::FilesystemBackend;
use tempfile::TempDir;

/// Filesystem backend rooted in a fresh temporary directory.
pub async fn new_backend() -> (FilesystemBackend, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let backend = FilesystemBackend::new(temp_dir.path()).await.unwrap();
    (backend, temp_dir)
}

/// Deterministic payload so offset mistakes show up in comparisons.
pub fn patterned_bytes(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}
