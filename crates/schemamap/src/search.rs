//! Flat, searchable view over a tree.

use serde::{Deserialize, Serialize};

use crate::node::TreeNode;

const ELLIPSIS: char = '…';

/// Search tunables.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Characters of context kept before a match.
    pub before: usize,
    /// Characters of context kept after a match.
    pub after: usize,
    pub max_results: usize,
    /// Joins node names into an entry path.
    pub path_separator: String,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            before: 40,
            after: 60,
            max_results: 20,
            path_separator: ".".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEntry {
    pub id: String,
    /// Names from below the root down to this node. Empty for the root.
    pub path: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(flatten)]
    pub entry: SearchEntry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// Pre-order entries using the default path separator.
pub fn flatten(tree: &TreeNode) -> Vec<SearchEntry> {
    flatten_with(tree, &SearchOptions::default())
}

pub fn flatten_with(tree: &TreeNode, options: &SearchOptions) -> Vec<SearchEntry> {
    let mut entries = Vec::new();
    let mut names = Vec::new();
    collect(tree, &mut names, options, &mut entries);
    entries
}

fn collect<'a>(
    node: &'a TreeNode,
    names: &mut Vec<&'a str>,
    options: &SearchOptions,
    out: &mut Vec<SearchEntry>,
) {
    out.push(SearchEntry {
        id: node.id.clone(),
        path: names.join(&options.path_separator),
        name: node.name.clone(),
        description: node.description.clone(),
        rules_text: node.rules.as_ref().map(|rules| rules.join(" ")),
    });
    for child in node.children() {
        names.push(&child.name);
        collect(child, names, options, out);
        names.pop();
    }
}

/// Case-insensitive substring search with default options.
pub fn search(entries: &[SearchEntry], query: &str) -> Vec<SearchResult> {
    search_with(entries, query, &SearchOptions::default())
}

/// Match `query` against path, description and rules text, keeping flatten order.
///
/// The snippet comes from the description if it matches there, else from the
/// rules text; a path-only match has no snippet. An empty query matches nothing.
pub fn search_with(entries: &[SearchEntry], query: &str, options: &SearchOptions) -> Vec<SearchResult> {
    let needle = fold(query);
    if needle.is_empty() {
        return Vec::new();
    }

    entries
        .iter()
        .filter_map(|entry| {
            let in_path = find_folded(&entry.path, &needle).is_some();
            let snippet = [&entry.description, &entry.rules_text]
                .into_iter()
                .flatten()
                .find_map(|text| {
                    find_folded(text, &needle).map(|at| window(text, at, needle.len(), options))
                });
            (in_path || snippet.is_some()).then(|| SearchResult {
                entry: entry.clone(),
                snippet,
            })
        })
        .take(options.max_results)
        .collect()
}

/// Per-character lowercase. Characters whose lowercase form expands keep
/// their first char so indices stay aligned with the source text.
fn fold(s: &str) -> Vec<char> {
    s.chars()
        .map(|c| c.to_lowercase().next().unwrap_or(c))
        .collect()
}

/// Char index of the first occurrence of `needle` in `haystack`, compared case-insensitively.
fn find_folded(haystack: &str, needle: &[char]) -> Option<usize> {
    let hay = fold(haystack);
    if needle.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()] == *needle)
}

fn window(text: &str, at: usize, len: usize, options: &SearchOptions) -> String {
    let chars: Vec<char> = text.chars().collect();
    let start = at.saturating_sub(options.before);
    let end = (at + len + options.after).min(chars.len());

    let mut out = String::new();
    if start > 0 {
        out.push(ELLIPSIS);
    }
    out.extend(&chars[start..end]);
    if end < chars.len() {
        out.push(ELLIPSIS);
    }
    out
}
