//! Deduplicating, collision-safe persistence of downloaded content.
//!
//! State is derived from the filesystem on every call; nothing about
//! previously seen content is remembered between calls or runs.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use avatar_downloader_core::store::{Persisted, SlotPolicy, persist};
//!
//! # fn example(bytes: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! match persist(Path::new("./mii/Alex"), "Mii_Alex_face_normal.png", bytes, SlotPolicy::KeepOriginal)? {
//!     Persisted::Saved(path) => println!("saved {}", path.display()),
//!     Persisted::Skipped(path) => println!("already have {}", path.display()),
//!     Persisted::Refused(path) => println!("refused to overwrite {}", path.display()),
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod filename;
mod fingerprint;
mod placement;
mod writer;

pub use error::StoreError;
pub use filename::sanitize_filename;
pub use fingerprint::{
    ContentSource, EMPTY_CONTENT_DIGEST, FileFingerprint, identical_or_same_size, is_identical,
};
pub use placement::{PlacementDecision, SlotPolicy, find_next_available_path};
pub use writer::{Persisted, WriteOutcome, persist, write_file};
