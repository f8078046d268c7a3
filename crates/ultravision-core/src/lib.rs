//! UltraVision Core - batch image description against OpenAI-compatible
//! vision endpoints.
//!
//! A directory of images goes in; one output record per request comes out.
//! Images are deduplicated by content hash, grouped into batches, sent with
//! bounded concurrency and retried with exponential backoff.
//!
//! # Architecture
//!
//! ```text
//! Discover files → Hash (dedup/resume) → Batch → Prepare (data URLs)
//!     → Dispatch (retry) → jsonl | json | text | markdown | csv
//! ```
//!
//! LAN discovery of LM Studio and Ollama servers lives in [`network`] and
//! can feed an endpoint and model into the run configuration.
//!
//! # Usage
//!
//! ```rust,ignore
//! use ultravision_core::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> ultravision_core::Result<()> {
//!     let config = Config::load()?;
//!     let summary = Orchestrator::from_config(config)
//!         .run("./photos".as_ref())
//!         .await?;
//!     println!("{} batch(es) written to {:?}", summary.succeeded, summary.output_path);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod dispatch;
pub mod error;
pub mod llm;
pub mod network;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod types;

// Re-exports for convenient access
pub use config::Config;
pub use dispatch::{run_all, DispatchStats};
pub use error::{
    ConfigError, PipelineError, PipelineResult, RemoteCallError, Result, UltravisionError,
};
pub use llm::{extract_text, ChatClient, ChatRequest, OpenAiCompatClient};
pub use network::{first_target, DiscoveredServer, DiscoveryMap, ServiceKind, VisionModelDiscovery};
pub use orchestrator::{Orchestrator, RunEvent};
pub use output::{already_done_hashes, OutputFormat, ResultWriter};
pub use pipeline::{AssetPreparer, FileDiscovery, Hasher, PreparedAsset};
pub use types::{Batch, BatchResult, FailedBatch, FileMeta, OutputRecord, RunSummary};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
