use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
        }
    }
}

/// One node of a repository tree. Directories own their children; `parent_path`
/// is a plain back-reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FileEntry>,
}

impl FileEntry {
    pub fn file(path: &str, download_ref: Option<String>) -> Self {
        Self {
            name: leaf_name(path).to_string(),
            path: path.to_string(),
            kind: EntryKind::File,
            download_ref,
            parent_path: parent_of(path).map(str::to_string),
            children: Vec::new(),
        }
    }

    pub fn directory(path: &str, children: Vec<FileEntry>) -> Self {
        Self {
            name: leaf_name(path).to_string(),
            path: path.to_string(),
            kind: EntryKind::Directory,
            download_ref: None,
            parent_path: parent_of(path).map(str::to_string),
            children,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// Pre-order list of every file under `roots`; directories are walked but not
/// emitted. Uses an explicit stack so tree depth never touches the call stack.
pub fn flatten(roots: &[FileEntry]) -> Vec<&FileEntry> {
    let mut files = Vec::new();
    let mut stack: Vec<&FileEntry> = roots.iter().rev().collect();

    while let Some(entry) = stack.pop() {
        match entry.kind {
            EntryKind::File => files.push(entry),
            EntryKind::Directory => stack.extend(entry.children.iter().rev()),
        }
    }

    files
}

pub fn find_file<'a>(roots: &'a [FileEntry], path: &str) -> Option<&'a FileEntry> {
    flatten(roots).into_iter().find(|entry| entry.path == path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchLimits {
    pub max_entries: usize,
    pub max_depth: usize,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            max_entries: 100,
            max_depth: 5,
        }
    }
}

/// A flat listing row as produced by a transport, in pre-order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedEntry {
    pub path: String,
    pub kind: EntryKind,
    pub download_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltTree {
    pub roots: Vec<FileEntry>,
    pub entry_count: usize,
    pub truncated: bool,
}

struct PendingNode {
    entry: FileEntry,
    children: Vec<usize>,
}

/// Assembles a nested tree from a pre-order listing, keeping at most
/// `limits.max_entries` entries and nothing deeper than `limits.max_depth`
/// (top-level entries are depth 0).
pub fn build_tree(listing: &[ListedEntry], limits: FetchLimits) -> BuiltTree {
    let mut nodes = Vec::<PendingNode>::new();
    let mut index_by_path = HashMap::<String, usize>::new();
    let mut roots = Vec::<usize>::new();
    let mut truncated = false;

    for listed in listing {
        let path = listed.path.trim_matches('/');
        if path.is_empty() {
            continue;
        }

        if depth_of(path) > limits.max_depth {
            truncated = true;
            continue;
        }

        if nodes.len() >= limits.max_entries {
            truncated = true;
            break;
        }

        let parent_index = match parent_of(path) {
            None => None,
            Some(parent) => match index_by_path.get(parent) {
                Some(index) if nodes[*index].entry.kind == EntryKind::Directory => Some(*index),
                _ => {
                    truncated = true;
                    continue;
                }
            },
        };

        let entry = match listed.kind {
            EntryKind::File => FileEntry::file(path, listed.download_ref.clone()),
            EntryKind::Directory => FileEntry::directory(path, Vec::new()),
        };

        let index = nodes.len();
        nodes.push(PendingNode {
            entry,
            children: Vec::new(),
        });
        index_by_path.insert(path.to_string(), index);

        match parent_index {
            Some(parent) => nodes[parent].children.push(index),
            None => roots.push(index),
        }
    }

    let entry_count = nodes.len();
    let mut slots: Vec<Option<PendingNode>> = nodes.into_iter().map(Some).collect();
    let roots = roots
        .into_iter()
        .filter_map(|index| assemble(&mut slots, index))
        .collect();

    BuiltTree {
        roots,
        entry_count,
        truncated,
    }
}

// Recursion depth is bounded by `FetchLimits::max_depth`.
fn assemble(slots: &mut [Option<PendingNode>], index: usize) -> Option<FileEntry> {
    let node = slots.get_mut(index)?.take()?;
    let mut entry = node.entry;
    entry.children = node
        .children
        .into_iter()
        .filter_map(|child| assemble(slots, child))
        .collect();
    Some(entry)
}

fn depth_of(path: &str) -> usize {
    path.matches('/').count()
}

fn leaf_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn parent_of(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(parent, _)| parent)
}
