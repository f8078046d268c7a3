//! End-to-end run: discover, dedup, dispatch, persist.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::dispatch::run_all;
use crate::error::{ConfigError, Result, UltravisionError};
use crate::llm::{ChatClient, OpenAiCompatClient};
use crate::output::{already_done_hashes, write_failure_log, OutputFormat, ResultWriter};
use crate::pipeline::{AssetPreparer, FileDiscovery};
use crate::types::{display_paths, BatchResult, FailedBatch, RunSummary};

use super::batch::{plan_batches, BatchRunner, BatchSettings};

/// Progress notifications emitted while a run is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEvent {
    /// Batches are planned and about to be dispatched
    Planned { batches: usize },
    /// One batch reached a final outcome
    BatchFinished { succeeded: bool, images: usize },
}

/// Drives a complete batch run against one chat client.
pub struct Orchestrator {
    config: Config,
    client: Arc<dyn ChatClient>,
}

impl Orchestrator {
    pub fn new(config: Config, client: Arc<dyn ChatClient>) -> Self {
        Self { config, client }
    }

    /// Orchestrator talking to the configured OpenAI-compatible endpoint.
    pub fn from_config(config: Config) -> Self {
        let client = OpenAiCompatClient::new(
            &config.api.base_url,
            &config.api_key(),
            Duration::from_secs(config.api.timeout_secs),
        );
        Self::new(config, Arc::new(client))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn run(&self, input_dir: &Path) -> Result<RunSummary> {
        self.run_with_progress(input_dir, |_| {}).await
    }

    /// Process every matching image under `input_dir`.
    ///
    /// Configuration problems are reported before any file is touched. Once
    /// the output is open it is finalized on every path out of this function.
    pub async fn run_with_progress<F>(&self, input_dir: &Path, mut progress: F) -> Result<RunSummary>
    where
        F: FnMut(RunEvent),
    {
        self.config.validate()?;
        if !input_dir.is_dir() {
            return Err(ConfigError::NotADirectory(input_dir.to_path_buf()).into());
        }

        let format = self.config.output_format()?;
        let output_path = self.config.output_path()?;
        let settings = BatchSettings::from_config(&self.config)?;
        let discovery = FileDiscovery::new(&self.config.input)?;

        let mut summary = RunSummary {
            output_path: output_path.clone(),
            format: format.to_string(),
            ..RunSummary::default()
        };

        let files = discovery.find_images(input_dir);
        summary.discovered = files.len();
        if files.is_empty() {
            tracing::warn!("No matching images found.");
            return Ok(summary);
        }
        tracing::info!("Found {} image(s) in {}", files.len(), input_dir.display());

        let resume = self.config.output.resume;
        let done = if resume && format == OutputFormat::Jsonl {
            already_done_hashes(&output_path, format)
        } else {
            if resume {
                tracing::warn!("Resume only applies to jsonl output; ignoring for {format}");
            }
            HashSet::new()
        };
        if !done.is_empty() {
            tracing::info!(
                "Resume enabled: {} already in {}, will skip duplicates.",
                done.len(),
                output_path.display()
            );
        }

        let mut writer = ResultWriter::create(&output_path, format, resume)?;

        let per_request = self.config.batch.per_request;
        let plan = tokio::task::spawn_blocking(move || plan_batches(&files, per_request, &done))
            .await
            .map_err(|e| UltravisionError::Io(std::io::Error::other(e)))?;

        summary.duplicates = plan.duplicates;
        summary.resumed = plan.resumed;
        summary.unreadable = plan.unreadable;
        summary.batches = plan.batches.len();
        progress(RunEvent::Planned {
            batches: plan.batches.len(),
        });

        let runner = Arc::new(BatchRunner::new(
            self.client.clone(),
            AssetPreparer::new(self.config.image.clone()),
            settings,
        ));
        let mut failures: Vec<FailedBatch> = Vec::new();
        let mut succeeded = 0usize;

        let stats = run_all(
            plan.batches,
            move |batch| {
                let runner = runner.clone();
                async move { runner.run_batch(batch).await }
            },
            self.config.batch.concurrency.max(1),
            |result| {
                let images = result.files().len();
                let ok = match result {
                    BatchResult::Success {
                        files,
                        metas,
                        response,
                    } => match writer.write_record(&files, &metas, &response) {
                        Ok(()) => {
                            tracing::info!("✓ {images} image(s) processed");
                            true
                        }
                        Err(e) => {
                            tracing::error!("Failed to write output record: {e}");
                            failures.push(FailedBatch {
                                files: display_paths(&files),
                                error: format!("output write failed: {e}"),
                            });
                            false
                        }
                    },
                    BatchResult::Failure { files, error, .. } => {
                        tracing::error!("Batch failed: {error}");
                        failures.push(FailedBatch {
                            files: display_paths(&files),
                            error,
                        });
                        false
                    }
                };
                if ok {
                    succeeded += 1;
                }
                progress(RunEvent::BatchFinished {
                    succeeded: ok,
                    images,
                });
            },
        )
        .await;

        writer.finish()?;

        summary.succeeded = succeeded;
        summary.failed = failures.len() + stats.panicked;

        if !failures.is_empty() {
            let fail_log = self.config.fail_log_path();
            write_failure_log(&fail_log, &failures)?;
            tracing::warn!(
                "{} batch(es) failed. See {}",
                failures.len(),
                fail_log.display()
            );
            summary.fail_log = Some(fail_log);
        }

        tracing::info!("Done. Results → {} ({format})", output_path.display());
        Ok(summary)
    }
}
