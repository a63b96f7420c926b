use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Generate deterministic test data using a seeded pseudo-random generator
/// Same seed produces same output (reproducible tests)
pub fn seeded_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    let mut state = seed;

    // Simple LCG (Linear Congruential Generator)
    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    data
}

/// A folder of fake documents under a temp base directory.
pub struct FolderFixture {
    pub base: tempfile::TempDir,
    pub cache: tempfile::TempDir,
    pub name: String,
}

impl FolderFixture {
    /// Create `<base>/<name>` holding `files` as `(relative path, size)`.
    pub fn new(name: &str, files: &[(&str, usize)]) -> Self {
        let fixture = Self {
            base: tempfile::tempdir().unwrap(),
            cache: tempfile::tempdir().unwrap(),
            name: name.to_string(),
        };
        std::fs::create_dir_all(fixture.folder_path()).unwrap();
        for (i, (rel, size)) in files.iter().enumerate() {
            fixture.write(rel, &seeded_bytes(i as u64, *size));
        }
        fixture
    }

    pub fn folder_path(&self) -> PathBuf {
        self.base.path().join(&self.name)
    }

    pub fn write(&self, rel: &str, data: &[u8]) {
        let path = self.folder_path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, data).unwrap();
    }

    /// Push the folder's mtime forward so the next fingerprint differs even
    /// on filesystems with coarse timestamps.
    pub fn touch_folder(&self, ahead: Duration) {
        set_mtime(&self.folder_path(), SystemTime::now() + ahead);
    }
}

pub fn set_mtime(path: &Path, time: SystemTime) {
    let file = if path.is_dir() {
        std::fs::File::open(path).unwrap()
    } else {
        std::fs::File::options().write(true).open(path).unwrap()
    };
    file.set_modified(time).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_bytes_deterministic() {
        let data1 = seeded_bytes(42, 1000);
        let data2 = seeded_bytes(42, 1000);
        assert_eq!(data1, data2);
    }

    #[test]
    fn test_seeded_bytes_different_seeds() {
        let data1 = seeded_bytes(42, 1000);
        let data2 = seeded_bytes(43, 1000);
        assert_ne!(data1, data2);
    }
}
