//! File discovery for finding images in directories.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::InputConfig;
use crate::error::ConfigError;

/// Patterns used when none are configured.
pub const DEFAULT_PATTERNS: &[&str] = &[
    "*.png", "*.jpg", "*.jpeg", "*.webp", "*.gif", "*.bmp", "*.tiff",
];

/// Discovers image files in a directory by file-name glob patterns.
pub struct FileDiscovery {
    patterns: GlobSet,
    recursive: bool,
    limit: Option<usize>,
}

impl FileDiscovery {
    /// Create a discovery instance from input settings.
    pub fn new(config: &InputConfig) -> Result<Self, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        if config.patterns.is_empty() {
            for pattern in DEFAULT_PATTERNS {
                builder.add(build_glob(pattern)?);
            }
        } else {
            for pattern in &config.patterns {
                builder.add(build_glob(pattern)?);
            }
        }
        let patterns = builder
            .build()
            .map_err(|e| ConfigError::ValidationError(format!("input.patterns: {e}")))?;

        Ok(Self {
            patterns,
            recursive: config.recursive,
            // 0 means no limit
            limit: config.limit.filter(|&n| n > 0),
        })
    }

    /// Find matching files under `root`.
    ///
    /// Returns canonical, unique paths in sorted order, truncated to the
    /// configured limit.
    pub fn find_images(&self, root: &Path) -> Vec<PathBuf> {
        let walker = if self.recursive {
            WalkDir::new(root).follow_links(true)
        } else {
            WalkDir::new(root).max_depth(1)
        };

        let mut found = BTreeSet::new();
        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            let entry_path = entry.path();
            if !entry_path.is_file() || !self.matches(entry_path) {
                continue;
            }
            let resolved =
                std::fs::canonicalize(entry_path).unwrap_or_else(|_| entry_path.to_path_buf());
            found.insert(resolved);
        }

        let mut files: Vec<PathBuf> = found.into_iter().collect();
        if let Some(limit) = self.limit {
            files.truncate(limit);
        }
        files
    }

    /// Check a path's file name against the patterns.
    fn matches(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| self.patterns.is_match(name))
            .unwrap_or(false)
    }
}

fn build_glob(pattern: &str) -> Result<Glob, ConfigError> {
    Glob::new(pattern)
        .map_err(|e| ConfigError::ValidationError(format!("invalid pattern '{pattern}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"\x89PNG fake").unwrap();
    }

    fn input(recursive: bool, patterns: &[&str], limit: Option<usize>) -> InputConfig {
        InputConfig {
            recursive,
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            limit,
        }
    }

    #[test]
    fn test_default_patterns() {
        let discovery = FileDiscovery::new(&InputConfig::default()).unwrap();

        assert!(discovery.matches(Path::new("test.jpg")));
        assert!(discovery.matches(Path::new("test.jpeg")));
        assert!(discovery.matches(Path::new("test.png")));
        assert!(discovery.matches(Path::new("test.webp")));
        assert!(discovery.matches(Path::new("test.tiff")));
        assert!(!discovery.matches(Path::new("test.txt")));
        assert!(!discovery.matches(Path::new("test.pdf")));
    }

    #[test]
    fn test_patterns_and_recursion() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        let one = root.join("one.png");
        let two = root.join("nested").join("two.jpg");
        let ignored = root.join("ignore.gif");
        touch(&one);
        touch(&two);
        touch(&ignored);

        let flat = FileDiscovery::new(&input(false, &["*.png", "*.jpg"], None)).unwrap();
        let found = flat.find_images(&root);
        assert_eq!(found, vec![std::fs::canonicalize(&one).unwrap()]);

        let deep = FileDiscovery::new(&input(true, &["*.png", "*.jpg"], None)).unwrap();
        let found = deep.find_images(&root);
        assert_eq!(found.len(), 2);
        assert!(found.contains(&std::fs::canonicalize(&one).unwrap()));
        assert!(found.contains(&std::fs::canonicalize(&two).unwrap()));
        assert!(!found.contains(&std::fs::canonicalize(&ignored).unwrap()));
    }

    #[test]
    fn test_results_sorted_and_limited() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.png", "a.png", "b.png"] {
            touch(&dir.path().join(name));
        }

        let discovery = FileDiscovery::new(&input(false, &[], Some(2))).unwrap();
        let found = discovery.find_images(dir.path());
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.png", "b.png"]);
    }

    #[test]
    fn test_zero_limit_keeps_everything() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.png", "b.png", "c.png"] {
            touch(&dir.path().join(name));
        }

        let discovery = FileDiscovery::new(&input(false, &[], Some(0))).unwrap();
        assert_eq!(discovery.find_images(dir.path()).len(), 3);
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let result = FileDiscovery::new(&input(false, &["[unclosed"], None));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
