//! Image asset preparation: read, normalize, encode, describe.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::path::{Path, PathBuf};

use crate::config::ImageConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::types::FileMeta;

use super::hash::Hasher;
use super::imaging;
use super::mime::guess_mime;

/// An image ready to be placed in a chat message.
#[derive(Debug, Clone)]
pub struct PreparedAsset {
    /// Where the bytes came from
    pub path: PathBuf,
    /// `data:<mime>;base64,<payload>`
    pub data_url: String,
    /// Metadata written alongside the model output
    pub meta: FileMeta,
}

/// Turns file paths into encoded payloads plus metadata.
#[derive(Debug, Clone, Default)]
pub struct AssetPreparer {
    image: ImageConfig,
}

impl AssetPreparer {
    pub fn new(image: ImageConfig) -> Self {
        Self { image }
    }

    /// Read and encode one file.
    ///
    /// Only an unreadable file is an error. Normalization and dimension
    /// probing are best-effort and never fail preparation.
    pub fn prepare(&self, path: &Path) -> PipelineResult<PreparedAsset> {
        let raw = std::fs::read(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let sha256 = Hasher::content_hash_from_bytes(&raw);
        let mime = guess_mime(path);

        let payload = if imaging::normalization_requested(&self.image) {
            imaging::normalize(&raw, &mime, &self.image).unwrap_or(raw)
        } else {
            raw
        };

        let (width, height) = match imaging::dimensions(&payload) {
            Some((w, h)) => (Some(w), Some(h)),
            None => (None, None),
        };

        let meta = FileMeta {
            file: path.display().to_string(),
            size_bytes: payload.len() as u64,
            mime: mime.clone(),
            sha256,
            width,
            height,
        };

        Ok(PreparedAsset {
            path: path.to_path_buf(),
            data_url: to_data_url(&mime, &payload),
            meta,
        })
    }
}

/// Encode bytes as a base64 data URL.
pub fn to_data_url(mime: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(data))
}
