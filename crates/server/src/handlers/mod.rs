//! HTTP request handlers.

pub mod download;
pub mod folders;
pub mod health;

pub use download::*;
pub use folders::*;
pub use health::*;
