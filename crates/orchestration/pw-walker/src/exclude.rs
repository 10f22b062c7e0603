//! Exclusion rules for walked prefixes and discovered files.

use std::collections::HashSet;

/// Extension value that stands for "the name has no extension".
pub const NO_EXTENSION: &str = "none";

/// Extensions excluded by `--default-exclude-exts`.
pub const DEFAULT_EXCLUDED_EXTENSIONS: &[&str] = &[
    "mp3",
    "woff",
    "woff2",
    "css",
    "mp4",
    "jpg",
    "jpeg",
    "png",
    "avi",
    "mov",
    NO_EXTENSION,
];

/// Directory names excluded by `--default-exclude-keys`.
pub const DEFAULT_EXCLUDED_KEYWORDS: &[&str] = &["chunks", "temp", "cache"];

/// Case-insensitive file-extension and directory-segment exclusions.
///
/// Built once per run and shared read-only between all walk tasks.
///
/// # Example
///
/// ```
/// use pw_walker::ExclusionSet;
///
/// let exclusions = ExclusionSet::new(["MP4", "none"], ["temp"], "/");
///
/// assert!(exclusions.should_exclude_file("clip.mp4"));
/// assert!(exclusions.should_exclude_file("Makefile"));
/// assert!(exclusions.should_exclude_dir("a/temp/b/"));
/// assert!(!exclusions.should_exclude_dir("a/template/"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    extensions: HashSet<String>,
    keywords: HashSet<String>,
    delimiter: String,
}

impl ExclusionSet {
    /// Create an exclusion set.
    ///
    /// Entries are trimmed and lower-cased; empty entries are dropped and a
    /// leading `.` on an extension is ignored.
    pub fn new<E, K>(extensions: E, keywords: K, delimiter: impl Into<String>) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        K: IntoIterator,
        K::Item: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| normalize(ext.as_ref().trim().trim_start_matches('.')))
            .filter(|ext| !ext.is_empty())
            .collect();
        let keywords = keywords
            .into_iter()
            .map(|key| normalize(key.as_ref()))
            .filter(|key| !key.is_empty())
            .collect();

        Self {
            extensions,
            keywords,
            delimiter: delimiter.into(),
        }
    }

    /// Returns true if a file with this name should not be emitted.
    pub fn should_exclude_file(&self, name: &str) -> bool {
        if self.extensions.is_empty() {
            return false;
        }

        let ext = match name.rfind('.') {
            Some(idx) => name[idx + 1..].to_lowercase(),
            None => String::new(),
        };
        let ext = if ext.is_empty() {
            NO_EXTENSION.to_string()
        } else {
            ext
        };

        self.extensions.contains(&ext)
    }

    /// Returns true if any segment of `prefix` is an excluded keyword.
    ///
    /// Segments match exactly: `temp` excludes `a/temp/` but not `a/template/`.
    pub fn should_exclude_dir(&self, prefix: &str) -> bool {
        if self.keywords.is_empty() {
            return false;
        }

        if self.delimiter.is_empty() {
            return self.keywords.contains(&normalize(prefix));
        }

        prefix
            .strip_suffix(self.delimiter.as_str())
            .unwrap_or(prefix)
            .split(self.delimiter.as_str())
            .map(normalize)
            .filter(|segment| !segment.is_empty())
            .any(|segment| self.keywords.contains(&segment))
    }

    /// Returns true when neither rule can exclude anything.
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty() && self.keywords.is_empty()
    }

    /// Sorted excluded extensions, for logging.
    pub fn extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self.extensions.iter().map(String::as_str).collect();
        exts.sort_unstable();
        exts
    }

    /// Sorted excluded directory keywords, for logging.
    pub fn keywords(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.keywords.iter().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Final path segment of a key, used for extension matching.
///
/// A trailing delimiter is ignored, so `a/b/` yields `b`.
pub fn file_name<'a>(key: &'a str, delimiter: &str) -> &'a str {
    if delimiter.is_empty() {
        return key;
    }
    let trimmed = key.strip_suffix(delimiter).unwrap_or(key);
    trimmed.rsplit(delimiter).next().unwrap_or(trimmed)
}
