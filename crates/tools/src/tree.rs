//! Tree rendering with truncation guards.
//!
//! Directories come first, then files, each group sorted by name. A render
//! never emits more than its node budget; when a guard fires the partial
//! tree is returned with `truncated` set.

use repolens_github::TreeEntry;
use std::collections::BTreeMap;

const DIR: &str = "📁";
const FILE: &str = "📄";

/// A rendered listing plus what the guards did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    /// Entry lines emitted (footers excluded).
    pub nodes: usize,
    pub truncated: bool,
}

/// Top-level directories plus allow-listed root files, capped at
/// `max_entries` lines.
pub fn render_root(entries: &[TreeEntry], root_files: &[String], max_entries: usize) -> Rendered {
    let mut dirs: Vec<&str> = Vec::new();
    let mut files: Vec<&str> = Vec::new();
    for entry in entries.iter().filter(|e| !e.path.contains('/')) {
        if entry.is_dir() {
            dirs.push(&entry.path);
        } else if root_files.iter().any(|f| f == &entry.path) {
            files.push(&entry.path);
        }
    }
    dirs.sort_unstable();
    files.sort_unstable();

    let lines: Vec<String> = dirs
        .iter()
        .map(|d| format!("{DIR} {d}"))
        .chain(files.iter().map(|f| format!("{FILE} {f}")))
        .collect();

    if lines.is_empty() {
        return Rendered {
            text: format!("{DIR} (empty repository)"),
            nodes: 0,
            truncated: false,
        };
    }

    let total = lines.len();
    let shown = total.min(max_entries);
    let mut text = lines[..shown].join("\n");
    let truncated = total > shown;
    if truncated {
        text.push_str(&format!("\n... (+{} more entries omitted)", total - shown));
    }

    Rendered {
        text,
        nodes: shown,
        truncated,
    }
}

/// Outcome of looking up `base` in a recursive tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subtree {
    Rendered(Rendered),
    /// Nothing at that path.
    Missing,
    /// The path is a file.
    NotADirectory,
}

/// Render the part of a recursive tree below `base`, bounded by
/// `max_nodes` entry lines and `max_depth` levels.
pub fn render_subtree(
    entries: &[TreeEntry],
    base: &str,
    max_nodes: usize,
    max_depth: usize,
) -> Subtree {
    let base = base.trim_matches('/');
    let prefix = format!("{base}/");

    if entries.iter().any(|e| e.path == base && !e.is_dir()) {
        return Subtree::NotADirectory;
    }

    let mut children: BTreeMap<&str, Vec<&TreeEntry>> = BTreeMap::new();
    let mut found = entries.iter().any(|e| e.path == base && e.is_dir());
    for entry in entries {
        let Some(rel) = entry.path.strip_prefix(&prefix) else {
            continue;
        };
        found = true;
        let parent = rel.rsplit_once('/').map(|(p, _)| p).unwrap_or("");
        children.entry(parent).or_default().push(entry);
    }
    if !found {
        return Subtree::Missing;
    }

    for list in children.values_mut() {
        list.sort_by(|a, b| b.is_dir().cmp(&a.is_dir()).then_with(|| a.name().cmp(b.name())));
    }

    let mut walk = Walk {
        children: &children,
        prefix_len: prefix.len(),
        max_nodes,
        max_depth,
        lines: Vec::new(),
        nodes: 0,
        node_limit_hit: false,
        depth_limit_hit: false,
    };
    walk.dir("", "", 0);

    if walk.lines.is_empty() {
        return Subtree::Rendered(Rendered {
            text: format!("{DIR} (empty directory)"),
            nodes: 0,
            truncated: false,
        });
    }

    let mut text = walk.lines.join("\n");
    if walk.node_limit_hit {
        text.push_str(&format!(
            "\n... (truncated after {} entries; request a narrower path or a specific file)",
            walk.nodes
        ));
    } else if walk.depth_limit_hit {
        text.push_str(&format!(
            "\n... (directories deeper than {max_depth} levels not expanded)"
        ));
    }

    Subtree::Rendered(Rendered {
        text,
        nodes: walk.nodes,
        truncated: walk.node_limit_hit || walk.depth_limit_hit,
    })
}

struct Walk<'a> {
    children: &'a BTreeMap<&'a str, Vec<&'a TreeEntry>>,
    prefix_len: usize,
    max_nodes: usize,
    max_depth: usize,
    lines: Vec<String>,
    nodes: usize,
    node_limit_hit: bool,
    depth_limit_hit: bool,
}

impl Walk<'_> {
    /// Returns `false` once the node budget is spent, unwinding the walk.
    fn dir(&mut self, rel: &str, indent: &str, depth: usize) -> bool {
        let children = self.children;
        let Some(list) = children.get(rel) else {
            return true;
        };
        let count = list.len();
        for (i, entry) in list.iter().enumerate() {
            if self.nodes >= self.max_nodes {
                self.node_limit_hit = true;
                return false;
            }

            let last = i + 1 == count;
            let connector = if last { "└── " } else { "├── " };
            let child_rel = &entry.path[self.prefix_len..];

            if entry.is_dir() {
                let has_children = children.contains_key(child_rel);
                let expand = depth + 1 < self.max_depth;
                let note = if has_children && !expand {
                    self.depth_limit_hit = true;
                    " (not expanded)"
                } else {
                    ""
                };
                self.lines
                    .push(format!("{indent}{connector}{DIR} {}{note}", entry.name()));
                self.nodes += 1;

                if expand {
                    let child_indent = format!("{indent}{}", if last { "    " } else { "│   " });
                    if !self.dir(child_rel, &child_indent, depth + 1) {
                        return false;
                    }
                }
            } else {
                let size = match entry.size {
                    Some(bytes) if bytes > 0 => format!(" ({bytes} bytes)"),
                    _ => String::new(),
                };
                self.lines
                    .push(format!("{indent}{connector}{FILE} {}{size}", entry.name()));
                self.nodes += 1;
            }
        }
        true
    }
}
