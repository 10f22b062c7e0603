//! Directory-tree output.
//!
//! Keys are folded into one tree per bucket while the walk runs. Nothing is
//! written until [`Sink::finish`], when the trees are rendered as indented
//! text and/or pretty-printed JSON.

use async_trait::async_trait;
use parking_lot::Mutex;
use pw_error::{PwError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

use super::Sink;

/// A node of a rendered directory tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Segment name (the bucket name for a root)
    pub name: String,

    /// Whether the node is a directory
    pub is_dir: bool,

    /// Full key or prefix; empty for a root
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub full_path: String,

    /// Directories first, then files, each sorted by name
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

#[derive(Default)]
struct DirBuilder {
    dirs: BTreeMap<String, DirBuilder>,
    files: BTreeSet<String>,
}

impl DirBuilder {
    /// Empty segments (`a//b`) become unnamed directories so every file's
    /// `full_path` reproduces its key.
    fn insert(&mut self, key: &str, delimiter: &str) {
        let (dirs, file) = if delimiter.is_empty() {
            (Vec::new(), Some(key))
        } else {
            let mut segments: Vec<&str> = key.split(delimiter).collect();
            let file = segments.pop().filter(|s| !s.is_empty());
            (segments, file)
        };

        let mut node = self;
        for dir in dirs {
            node = node.dirs.entry(dir.to_string()).or_default();
        }
        if let Some(file) = file {
            node.files.insert(file.to_string());
        }
    }

    fn build(&self, name: &str, path: &str, delimiter: &str) -> TreeNode {
        let mut children = Vec::with_capacity(self.dirs.len() + self.files.len());

        for (dir, builder) in &self.dirs {
            let full_path = format!("{path}{dir}{delimiter}");
            children.push(builder.build(dir, &full_path, delimiter));
        }
        for file in &self.files {
            children.push(TreeNode {
                name: file.clone(),
                is_dir: false,
                full_path: format!("{path}{file}"),
                children: Vec::new(),
            });
        }

        TreeNode {
            name: name.to_string(),
            is_dir: true,
            full_path: path.to_string(),
            children,
        }
    }
}

/// Builds per-bucket directory trees from discovered keys.
pub struct TreeSink {
    delimiter: String,
    text_path: Option<PathBuf>,
    json_path: Option<PathBuf>,
    trees: Mutex<BTreeMap<String, DirBuilder>>,
}

impl TreeSink {
    /// Create a tree sink splitting keys on `delimiter`.
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
            text_path: None,
            json_path: None,
            trees: Mutex::new(BTreeMap::new()),
        }
    }

    /// Render the text tree to `path` on finish.
    pub fn with_text_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.text_path = Some(path.into());
        self
    }

    /// Render the JSON tree to `path` on finish.
    pub fn with_json_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.json_path = Some(path.into());
        self
    }

    /// Snapshot of the trees built so far, one root per bucket in name order.
    pub fn trees(&self) -> Vec<TreeNode> {
        self.trees
            .lock()
            .iter()
            .map(|(bucket, builder)| builder.build(bucket, "", &self.delimiter))
            .collect()
    }
}

/// Render trees as indented text with box-drawing connectors.
///
/// Directories carry a trailing `/`.
pub fn render_tree(trees: &[TreeNode]) -> String {
    let mut out = String::new();
    for tree in trees {
        render_node(&mut out, tree, "", true);
    }
    out
}

fn render_node(out: &mut String, node: &TreeNode, indent: &str, is_last: bool) {
    let connector = if is_last { "└── " } else { "├── " };
    let suffix = if node.is_dir { "/" } else { "" };
    let _ = writeln!(out, "{indent}{connector}{}{suffix}", node.name);

    let child_indent = if is_last {
        format!("{indent}    ")
    } else {
        format!("{indent}│   ")
    };
    let count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        render_node(out, child, &child_indent, i + 1 == count);
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| PwError::Output(format!("Failed to create {}: {e}", parent.display())))?;
    }
    std::fs::write(path, contents)
        .map_err(|e| PwError::Output(format!("Failed to write {}: {e}", path.display())))
}

#[async_trait]
impl Sink for TreeSink {
    async fn write(&self, bucket: &str, key: &str) -> Result<()> {
        self.trees
            .lock()
            .entry(bucket.to_string())
            .or_default()
            .insert(key, &self.delimiter);
        Ok(())
    }

    async fn finish(&self) -> Result<()> {
        let trees = self.trees();

        if let Some(path) = &self.text_path {
            write_file(path, &render_tree(&trees))?;
            info!(path = %path.display(), "Wrote text tree");
        }

        if let Some(path) = &self.json_path {
            let mut json = serde_json::to_string_pretty(&trees)
                .map_err(|e| PwError::Output(format!("JSON serialization failed: {e}")))?;
            json.push('\n');
            write_file(path, &json)?;
            info!(path = %path.display(), "Wrote JSON tree");
        }

        Ok(())
    }
}
