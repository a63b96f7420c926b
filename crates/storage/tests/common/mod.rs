pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::{FolderFixture, seeded_bytes, set_mtime};
