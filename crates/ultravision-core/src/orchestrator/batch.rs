//! Batch planning with content dedup, and delivery of a single batch.

use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::error::ConfigError;
use crate::llm::{backoff_delay, build_messages, ChatClient, ChatRequest};
use crate::pipeline::{AssetPreparer, Hasher, PreparedAsset};
use crate::types::{Batch, BatchResult};

/// Batches for a run plus what was left out of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchPlan {
    pub batches: Vec<Batch>,
    /// Files whose content already appeared earlier in this run
    pub duplicates: usize,
    /// Files whose hash was recorded by a previous run
    pub resumed: usize,
    /// Files that could not be read for hashing
    pub unreadable: usize,
}

/// Group `files` into batches of `per_request`, first occurrence of each
/// content hash wins.
///
/// `done` seeds the dedup set with hashes from earlier output. Unreadable
/// files are skipped with a warning.
pub fn plan_batches(files: &[PathBuf], per_request: usize, done: &HashSet<String>) -> BatchPlan {
    let per_request = per_request.max(1);
    let mut plan = BatchPlan::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut chunk: Vec<PathBuf> = Vec::with_capacity(per_request);

    for path in files {
        let hash = match Hasher::content_hash(path) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!("Skipping unreadable {}: {e}", path.display());
                plan.unreadable += 1;
                continue;
            }
        };
        if done.contains(&hash) {
            plan.resumed += 1;
            continue;
        }
        if !seen.insert(hash) {
            tracing::debug!("Duplicate content skipped: {}", path.display());
            plan.duplicates += 1;
            continue;
        }

        chunk.push(path.clone());
        if chunk.len() >= per_request {
            push_batch(&mut plan.batches, std::mem::take(&mut chunk));
        }
    }
    if !chunk.is_empty() {
        push_batch(&mut plan.batches, chunk);
    }
    plan
}

fn push_batch(batches: &mut Vec<Batch>, files: Vec<PathBuf>) {
    let index = batches.len();
    batches.push(Batch { index, files });
}

/// Request parameters shared by every batch of a run.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub extra: Option<Map<String, Value>>,
    /// Attempts after the first one
    pub retries: u32,
    pub backoff_base: f64,
    pub backoff_cap_secs: f64,
}

impl BatchSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            model: config.api.model.clone(),
            system_prompt: config.prompts.system.clone(),
            user_prompt: config.prompts.user.clone(),
            temperature: config.api.temperature,
            max_tokens: config.api.max_tokens,
            extra: config.extra_fields()?,
            retries: config.batch.retries,
            backoff_base: config.batch.backoff_base,
            backoff_cap_secs: config.batch.backoff_cap_secs,
        })
    }
}

/// Prepares a batch's images and delivers them with retry.
pub struct BatchRunner {
    client: Arc<dyn ChatClient>,
    preparer: AssetPreparer,
    settings: BatchSettings,
}

impl BatchRunner {
    pub fn new(client: Arc<dyn ChatClient>, preparer: AssetPreparer, settings: BatchSettings) -> Self {
        Self {
            client,
            preparer,
            settings,
        }
    }

    /// Run one batch to completion. Never panics on remote or file errors;
    /// every outcome is a `BatchResult`.
    pub async fn run_batch(&self, batch: Batch) -> BatchResult {
        let preparer = self.preparer.clone();
        let files = batch.files.clone();
        let assets = match tokio::task::spawn_blocking(move || prepare_all(&preparer, &files)).await
        {
            Ok(assets) => assets,
            Err(e) => {
                return BatchResult::Failure {
                    files: batch.files,
                    metas: Vec::new(),
                    error: format!("image preparation failed: {e}"),
                }
            }
        };

        if assets.is_empty() {
            return BatchResult::Failure {
                files: batch.files,
                metas: Vec::new(),
                error: "no readable images in batch".to_string(),
            };
        }

        let data_urls: Vec<String> = assets.iter().map(|a| a.data_url.clone()).collect();
        let files: Vec<PathBuf> = assets.iter().map(|a| a.path.clone()).collect();
        let metas: Vec<_> = assets.into_iter().map(|a| a.meta).collect();

        let request = ChatRequest {
            model: self.settings.model.clone(),
            messages: build_messages(
                &self.settings.system_prompt,
                &self.settings.user_prompt,
                &data_urls,
            ),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            extra: self.settings.extra.clone(),
        };

        let mut attempt = 0u32;
        loop {
            match self.client.complete(&request).await {
                Ok(response) => {
                    return BatchResult::Success {
                        files,
                        metas,
                        response,
                    }
                }
                Err(e) if attempt < self.settings.retries => {
                    attempt += 1;
                    tracing::error!("Batch error (attempt {attempt}): {e}");
                    let delay = backoff_delay(
                        attempt,
                        self.settings.backoff_base,
                        self.settings.backoff_cap_secs,
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return BatchResult::Failure {
                        files,
                        metas,
                        error: e.to_string(),
                    }
                }
            }
        }
    }
}

fn prepare_all(preparer: &AssetPreparer, files: &[PathBuf]) -> Vec<PreparedAsset> {
    files
        .iter()
        .filter_map(|path| prepare_one(preparer, path))
        .collect()
}

fn prepare_one(preparer: &AssetPreparer, path: &Path) -> Option<PreparedAsset> {
    match preparer.prepare(path) {
        Ok(asset) => Some(asset),
        Err(e) => {
            tracing::warn!("Skipping unreadable {}: {e}", path.display());
            None
        }
    }
}
