//! Test data helpers.

use std::io::Read;
use std::path::Path;

/// Generate deterministic test data using a seeded pseudo-random generator
/// Same seed produces same output (reproducible tests)
#[allow(dead_code)]
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

/// Write `files` (`(relative path, size)`) under `dir`, seeding each by index.
#[allow(dead_code)]
pub fn write_files(dir: &Path, files: &[(&str, usize)]) {
    for (i, (rel, size)) in files.iter().enumerate() {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create fixture directory");
        }
        std::fs::write(&path, seeded_bytes(i as u64, *size)).expect("Failed to write fixture");
    }
}

/// Unpack an in-memory zip into `(name, contents)` pairs.
#[allow(dead_code)]
pub fn unzip(data: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(data)).expect("response is not a zip archive");
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).expect("Failed to read zip entry");
            let mut contents = Vec::new();
            file.read_to_end(&mut contents)
                .expect("Failed to read zip entry data");
            (file.name().to_string(), contents)
        })
        .collect()
}
