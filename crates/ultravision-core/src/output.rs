//! Result persistence in five formats, plus the resume scan and failure log.
//!
//! `jsonl`, `text`, `markdown` and `csv` stream one entry per successful
//! batch. `json` buffers records and writes a single array when the writer
//! is finished or dropped.

use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::llm::extract_text;
use crate::types::{display_paths, FailedBatch, FileMeta, OutputRecord};

/// CSV column order.
pub const CSV_HEADER: [&str; 7] = ["files", "sha256", "mime", "size_bytes", "width", "height", "text"];

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One JSON object per line (newline-delimited JSON)
    Jsonl,
    /// One pretty-printed JSON array, written at the end
    Json,
    /// `# files` heading followed by the text
    Text,
    /// Files list and output section per batch
    Markdown,
    /// Spreadsheet-friendly rows keyed by the first file's metadata
    Csv,
}

impl OutputFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::Jsonl),
            "json" => Some(Self::Json),
            "text" | "txt" => Some(Self::Text),
            "markdown" | "md" => Some(Self::Markdown),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jsonl => "jsonl",
            Self::Json => "json",
            Self::Text => "text",
            Self::Markdown => "markdown",
            Self::Csv => "csv",
        }
    }

    /// File extension for the default output path.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jsonl => "jsonl",
            Self::Json => "json",
            Self::Text => "txt",
            Self::Markdown => "md",
            Self::Csv => "csv",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum Sink<W: Write> {
    Plain(W),
    Csv(csv::Writer<W>),
}

/// Format-aware writer for successful batches.
pub struct ResultWriter<W: Write> {
    sink: Sink<W>,
    format: OutputFormat,
    pending: Vec<OutputRecord>,
    records_written: usize,
    finished: bool,
}

impl<W: Write> ResultWriter<W> {
    /// Wrap `writer`; for csv the header row is written immediately.
    pub fn new(writer: W, format: OutputFormat) -> io::Result<Self> {
        let sink = if format == OutputFormat::Csv {
            let mut csv = csv::Writer::from_writer(writer);
            csv.write_record(CSV_HEADER)?;
            Sink::Csv(csv)
        } else {
            Sink::Plain(writer)
        };

        Ok(Self {
            sink,
            format,
            pending: Vec::new(),
            records_written: 0,
            finished: false,
        })
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Persist one successful batch.
    pub fn write_record(
        &mut self,
        files: &[PathBuf],
        metas: &[FileMeta],
        response: &Value,
    ) -> io::Result<()> {
        self.write(OutputRecord {
            files: display_paths(files),
            text: extract_text(response),
            raw: response.clone(),
            meta: metas.to_vec(),
        })
    }

    pub fn write(&mut self, record: OutputRecord) -> io::Result<()> {
        match (&mut self.sink, self.format) {
            (Sink::Plain(w), OutputFormat::Jsonl) => {
                serde_json::to_writer(&mut *w, &record).map_err(io::Error::other)?;
                writeln!(w)?;
                w.flush()?;
            }
            (Sink::Plain(_), OutputFormat::Json) => self.pending.push(record),
            (Sink::Plain(w), OutputFormat::Text) => {
                write!(w, "# {}\n{}\n\n", record.files.join(", "), record.text)?;
            }
            (Sink::Plain(w), OutputFormat::Markdown) => {
                write!(w, "### Files\n- {}\n\n", record.files.join("\n- "))?;
                write!(w, "### Output\n{}\n\n---\n\n", record.text.trim())?;
            }
            (Sink::Csv(csv), _) => csv.write_record(csv_row(&record))?,
            (Sink::Plain(_), OutputFormat::Csv) => {
                return Err(io::Error::other("csv output without a csv sink"));
            }
        }
        self.records_written += 1;
        Ok(())
    }

    /// Records accepted so far (json records count before they hit disk).
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Write any buffered array and flush.
    pub fn finish(mut self) -> io::Result<()> {
        self.finalize()
    }

    fn finalize(&mut self) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        match &mut self.sink {
            Sink::Plain(w) => {
                if self.format == OutputFormat::Json {
                    serde_json::to_writer_pretty(&mut *w, &self.pending)
                        .map_err(io::Error::other)?;
                    writeln!(w)?;
                }
                w.flush()
            }
            Sink::Csv(csv) => csv.flush(),
        }
    }
}

impl ResultWriter<BufWriter<File>> {
    /// Open `path` for writing, creating parent directories.
    ///
    /// With `append` a jsonl file is extended instead of truncated; other
    /// formats always start fresh.
    pub fn create(path: &Path, format: OutputFormat, append: bool) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = if append && format == OutputFormat::Jsonl {
            drop_partial_line(path)?;
            OpenOptions::new().create(true).append(true).open(path)?
        } else {
            File::create(path)?
        };
        Self::new(BufWriter::new(file), format)
    }
}

/// Truncate an interrupted trailing line so appended records start on a
/// line of their own. A missing file is left alone.
pub(crate) fn drop_partial_line(path: &Path) -> io::Result<()> {
    let mut file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    let len = file.metadata()?.len();

    let mut keep = 0u64;
    let mut end = len;
    let mut buffer = [0u8; 8192];
    while end > 0 {
        let start = end.saturating_sub(buffer.len() as u64);
        let chunk = &mut buffer[..(end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(chunk)?;
        if let Some(pos) = chunk.iter().rposition(|&b| b == b'\n') {
            keep = start + pos as u64 + 1;
            break;
        }
        end = start;
    }

    if keep < len {
        tracing::warn!(
            "Dropping {} byte(s) of an incomplete last record in {}",
            len - keep,
            path.display()
        );
        file.set_len(keep)?;
    }
    Ok(())
}

impl<W: Write> Drop for ResultWriter<W> {
    fn drop(&mut self) {
        if let Err(e) = self.finalize() {
            tracing::warn!("Failed to finalize {} output: {e}", self.format);
        }
    }
}

fn csv_row(record: &OutputRecord) -> [String; 7] {
    let first = record.meta.first();
    let opt = |v: Option<u32>| v.map(|n| n.to_string()).unwrap_or_default();

    [
        record.files.join(", "),
        first.map(|m| m.sha256.clone()).unwrap_or_default(),
        first.map(|m| m.mime.clone()).unwrap_or_default(),
        first.map(|m| m.size_bytes.to_string()).unwrap_or_default(),
        opt(first.and_then(|m| m.width)),
        opt(first.and_then(|m| m.height)),
        record.text.replace('\n', " ").trim().to_string(),
    ]
}

/// Content hashes recorded in an existing jsonl output.
///
/// Only jsonl output is scanned. A missing file, unparsable lines and
/// lines without `meta` contribute nothing.
pub fn already_done_hashes(path: &Path, format: OutputFormat) -> HashSet<String> {
    let mut done = HashSet::new();
    if format != OutputFormat::Jsonl {
        return done;
    }
    let file = match File::open(path) {
        Ok(file) => file,
        Err(_) => return done,
    };

    for line in BufReader::new(file).lines() {
        let Ok(line) = line else { continue };
        let Ok(record) = serde_json::from_str::<Value>(&line) else {
            continue;
        };
        let Some(metas) = record.get("meta").and_then(Value::as_array) else {
            continue;
        };
        done.extend(
            metas
                .iter()
                .filter_map(|m| m.get("sha256").and_then(Value::as_str))
                .map(str::to_string),
        );
    }
    done
}

/// Write failed batches as NDJSON `{files, error}` lines, replacing the file.
pub fn write_failure_log(path: &Path, failures: &[FailedBatch]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut w = BufWriter::new(File::create(path)?);
    for failure in failures {
        serde_json::to_writer(&mut w, failure).map_err(io::Error::other)?;
        writeln!(w)?;
    }
    w.flush()
}
