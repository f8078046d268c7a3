//! Image pipeline components.
//!
//! - **discovery**: Find image files in directories by glob pattern
//! - **hash**: SHA-256 content addressing for dedup and resume
//! - **mime**: Extension-based MIME lookup
//! - **imaging**: Optional decode-dependent work (orientation, resize, dimensions)
//! - **prepare**: Read, normalize and encode assets for upload

pub mod discovery;
pub mod hash;
pub mod imaging;
pub mod mime;
pub mod prepare;

// Re-exports for convenient access
pub use discovery::FileDiscovery;
pub use hash::Hasher;
pub use mime::guess_mime;
pub use prepare::{to_data_url, AssetPreparer, PreparedAsset};
