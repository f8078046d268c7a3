//! The `ultravision process` command: describe a directory of images.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use ultravision_core::{
    first_target, Config, ConfigError, DiscoveryMap, Orchestrator, OutputFormat, RunEvent,
    RunSummary, VisionModelDiscovery,
};

/// Arguments for the `process` command.
///
/// Every option left unset keeps the value from the config file.
#[derive(Args, Debug, Default)]
pub struct ProcessArgs {
    /// Directory containing images
    pub directory: PathBuf,

    /// Model id (e.g. qwen/qwen3-vl-8b)
    #[arg(long)]
    pub model: Option<String>,

    /// Server base URL, without /v1
    #[arg(long)]
    pub api_base: Option<String>,

    /// Bearer token (LM Studio ignores the value)
    #[arg(long, env = "ULTRAVISION_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// User prompt sent with every batch
    #[arg(long)]
    pub prompt: Option<String>,

    /// System prompt
    #[arg(long)]
    pub system_prompt: Option<String>,

    /// Images per request
    #[arg(long)]
    pub per_request: Option<usize>,

    /// Scan subdirectories
    #[arg(long)]
    pub recursive: bool,

    /// Glob patterns matched against file names (e.g. *.png *.jpg)
    #[arg(long, num_args = 1..)]
    pub patterns: Option<Vec<String>>,

    /// Maximum number of images to consider (0 means no limit)
    #[arg(long)]
    pub limit: Option<usize>,

    /// Skip images already recorded in the jsonl output (by sha256)
    #[arg(long)]
    pub resume: bool,

    /// Output format: jsonl, json, text, markdown or csv
    #[arg(long, value_parser = parse_format)]
    pub format: Option<OutputFormat>,

    /// Output file (defaults to outputs.<ext>)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Where to record failed batches
    #[arg(long)]
    pub fail_log: Option<PathBuf>,

    /// Maximum tokens in each model reply
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f64>,

    /// HTTP timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Retries after the first failed call; a batch makes at most retries + 1 calls
    #[arg(long)]
    pub retries: Option<u32>,

    /// Extra JSON object merged into each request body (e.g. '{"top_p":0.9}')
    #[arg(long)]
    pub extra: Option<String>,

    /// Requests in flight at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Apply EXIF orientation before sending
    #[arg(long)]
    pub autorotate: bool,

    /// Downscale so the longest side is at most this many pixels
    #[arg(long)]
    pub max_side: Option<u32>,

    /// Use the first vision server found on localhost or the LAN
    #[arg(long)]
    pub auto_discover: bool,
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    OutputFormat::parse(s).ok_or_else(|| {
        format!("unknown format '{s}' (expected jsonl, json, text, markdown or csv)")
    })
}

impl ProcessArgs {
    /// Layer command line values over the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(model) = &self.model {
            config.api.model = model.clone();
        }
        if let Some(base) = &self.api_base {
            config.api.base_url = base.clone();
        }
        if let Some(key) = &self.api_key {
            config.api.api_key = key.clone();
        }
        if let Some(temperature) = self.temperature {
            config.api.temperature = temperature;
        }
        if let Some(max_tokens) = self.max_tokens {
            config.api.max_tokens = max_tokens;
        }
        if let Some(timeout) = self.timeout {
            config.api.timeout_secs = timeout;
        }
        if let Some(extra) = &self.extra {
            config.api.extra = Some(extra.clone());
        }

        if let Some(prompt) = &self.prompt {
            config.prompts.user = prompt.clone();
        }
        if let Some(system) = &self.system_prompt {
            config.prompts.system = system.clone();
        }

        config.input.recursive |= self.recursive;
        if let Some(patterns) = &self.patterns {
            config.input.patterns = patterns.clone();
        }
        if self.limit.is_some() {
            config.input.limit = self.limit;
        }

        if let Some(per_request) = self.per_request {
            config.batch.per_request = per_request;
        }
        if let Some(concurrency) = self.concurrency {
            config.batch.concurrency = concurrency;
        }
        if let Some(retries) = self.retries {
            config.batch.retries = retries;
        }

        config.image.autorotate |= self.autorotate;
        if self.max_side.is_some() {
            config.image.max_side = self.max_side;
        }

        if let Some(format) = self.format {
            config.output.format = format.as_str().to_string();
            // A path from the config file belongs to the configured format.
            if self.out.is_none() {
                config.output.path = None;
            }
        }
        if let Some(out) = &self.out {
            config.output.path = Some(out.clone());
        }
        if let Some(fail_log) = &self.fail_log {
            config.output.fail_log = fail_log.clone();
        }
        config.output.resume |= self.resume;

        config.discovery.auto |= self.auto_discover;
    }
}

/// Execute the process command.
pub async fn execute(args: ProcessArgs, mut config: Config) -> anyhow::Result<()> {
    args.apply(&mut config);
    config.validate()?;

    let directory = expand_path(&args.directory);
    if !directory.is_dir() {
        return Err(ConfigError::NotADirectory(directory).into());
    }

    if config.discovery.auto {
        let discovery = VisionModelDiscovery::new(&config.discovery)?;
        tracing::info!("Auto-discovering vision servers...");
        let servers = discovery.discover().await;
        if !apply_discovered(&mut config, &servers) {
            tracing::warn!(
                "No vision servers discovered; using {} with {}",
                config.api.base_url,
                config.api.model
            );
        }
    }

    tracing::info!(
        "Using {} at {} ({} per request, {} concurrent)",
        config.api.model,
        config.api.base_url,
        config.batch.per_request,
        config.batch.concurrency
    );

    let orchestrator = Orchestrator::from_config(config);
    let start = Instant::now();
    let mut bar: Option<ProgressBar> = None;

    let result = orchestrator
        .run_with_progress(&directory, |event| match event {
            RunEvent::Planned { batches } => {
                bar = Some(create_progress_bar(batches as u64));
            }
            RunEvent::BatchFinished { succeeded, images } => {
                if let Some(bar) = &bar {
                    let outcome = if succeeded { "✓" } else { "✗" };
                    bar.set_message(format!("{outcome} {images} image(s)"));
                    bar.inc(1);
                }
            }
        })
        .await;

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    let summary = result?;
    if summary.discovered > 0 {
        print_summary(&summary, start.elapsed());
    }
    Ok(())
}

/// Point the run at the first discovered server and its first vision model.
///
/// Returns false when nothing usable was found, leaving `config` untouched.
fn apply_discovered(config: &mut Config, servers: &DiscoveryMap) -> bool {
    match first_target(servers) {
        Some((address, model)) => {
            tracing::info!("Auto-discovered {model} at {address}");
            config.api.base_url = address;
            config.api.model = model;
            true
        }
        None => false,
    }
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    match ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches {msg}",
    ) {
        Ok(style) => pb.set_style(style.progress_chars("##-")),
        Err(e) => tracing::debug!("Progress bar template rejected: {e}"),
    }
    pb.set_message("starting...");
    pb
}

/// Print a summary table to stderr after a run.
fn print_summary(summary: &RunSummary, elapsed: std::time::Duration) {
    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Images found:  {:>8}", summary.discovered);
    if summary.duplicates > 0 {
        eprintln!("    Duplicates:    {:>8}", summary.duplicates);
    }
    if summary.resumed > 0 {
        eprintln!("    Resumed:       {:>8}", summary.resumed);
    }
    if summary.unreadable > 0 {
        eprintln!("    Unreadable:    {:>8}", summary.unreadable);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Batches:       {:>8}", summary.batches);
    eprintln!("    Succeeded:     {:>8}", summary.succeeded);
    if summary.failed > 0 {
        eprintln!("    Failed:        {:>8}", summary.failed);
    }
    eprintln!("    Duration:      {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("  ====================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use ultravision_core::{DiscoveredServer, ServiceKind};

    fn server(kind: ServiceKind, address: &str, models: &[&str]) -> DiscoveredServer {
        DiscoveredServer {
            service_kind: kind,
            address: address.to_string(),
            vision_models: models.iter().map(|m| m.to_string()).collect(),
            local_aliases: Vec::new(),
        }
    }

    #[test]
    fn unset_flags_keep_config_values() {
        let mut config = Config::default();
        config.api.model = "configured".into();
        config.batch.concurrency = 6;

        ProcessArgs::default().apply(&mut config);
        assert_eq!(config.api.model, "configured");
        assert_eq!(config.batch.concurrency, 6);
        assert!(!config.output.resume);
    }

    #[test]
    fn flags_override_config_values() {
        let args = ProcessArgs {
            model: Some("qwen/qwen2.5-vl-7b".into()),
            api_base: Some("http://10.0.0.2:1234".into()),
            per_request: Some(4),
            temperature: Some(0.7),
            extra: Some(r#"{"top_p":0.9}"#.into()),
            resume: true,
            format: Some(OutputFormat::Csv),
            max_side: Some(1024),
            ..ProcessArgs::default()
        };
        let mut config = Config::default();
        config.output.path = Some(PathBuf::from("configured.jsonl"));
        args.apply(&mut config);

        assert_eq!(config.api.model, "qwen/qwen2.5-vl-7b");
        assert_eq!(config.api.base_url, "http://10.0.0.2:1234");
        assert_eq!(config.batch.per_request, 4);
        assert_eq!(config.api.temperature, 0.7);
        assert!(config.output.resume);
        assert_eq!(config.output.format, "csv");
        assert_eq!(config.image.max_side, Some(1024));
        assert_eq!(config.output_path().unwrap(), PathBuf::from("outputs.csv"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_extra_is_a_config_error() {
        let args = ProcessArgs {
            extra: Some("{not json}".into()),
            ..ProcessArgs::default()
        };
        let mut config = Config::default();
        args.apply(&mut config);

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidExtra(_))
        ));
    }

    #[tokio::test]
    async fn execute_rejects_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let args = ProcessArgs {
            directory: dir.path().join("missing"),
            ..ProcessArgs::default()
        };

        let err = execute(args, Config::default()).await.unwrap_err();
        assert!(err.is::<ConfigError>());
    }

    #[tokio::test]
    async fn execute_with_no_images_succeeds_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("results.jsonl");
        let args = ProcessArgs {
            directory: dir.path().to_path_buf(),
            out: Some(out.clone()),
            ..ProcessArgs::default()
        };

        execute(args, Config::default()).await.unwrap();
        assert!(!out.exists());
    }

    #[test]
    fn discovered_target_overrides_base_url_and_model() {
        let servers = DiscoveryMap::from([
            (
                ServiceKind::LmStudio,
                vec![server(
                    ServiceKind::LmStudio,
                    "http://10.0.0.5:7777",
                    &["autopilot", "qwen2-vl"],
                )],
            ),
            (ServiceKind::Ollama, Vec::new()),
        ]);
        let mut config = Config::default();

        assert!(apply_discovered(&mut config, &servers));
        assert_eq!(config.api.base_url, "http://10.0.0.5:7777");
        assert_eq!(config.api.model, "autopilot");
    }

    #[test]
    fn empty_discovery_keeps_configured_target() {
        let servers = DiscoveryMap::from([
            (ServiceKind::LmStudio, Vec::new()),
            (ServiceKind::Ollama, Vec::new()),
        ]);
        let mut config = Config::default();

        assert!(!apply_discovered(&mut config, &servers));
        assert_eq!(config.api.base_url, "http://localhost:1234");
        assert_eq!(config.api.model, "qwen/qwen3-vl-8b");
    }

    #[test]
    fn format_aliases_parse() {
        assert_eq!(parse_format("ndjson"), Ok(OutputFormat::Jsonl));
        assert_eq!(parse_format("md"), Ok(OutputFormat::Markdown));
        assert!(parse_format("xml").is_err());
    }
}
