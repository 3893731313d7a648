#![forbid(unsafe_code)]

use crate::model::RenderedNode;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Effective titles of the enclosing folders, outermost first.
    pub path: Vec<String>,
    pub is_folder: bool,
}

/// Case-insensitive substring match over effective titles and URLs, in pre-order.
pub fn search(roots: &[RenderedNode], query: &str) -> Vec<SearchHit> {
    let needle = query.trim().to_lowercase();
    let mut hits = Vec::new();
    if needle.is_empty() {
        return hits;
    }
    let mut path = Vec::new();
    for root in roots {
        walk(root, &needle, &mut path, &mut hits);
    }
    hits
}

fn walk(node: &RenderedNode, needle: &str, path: &mut Vec<String>, hits: &mut Vec<SearchHit>) {
    if matches(node, needle) {
        hits.push(SearchHit {
            id: node.id.clone(),
            title: node.title.clone(),
            url: node.url.clone(),
            path: path.clone(),
            is_folder: node.is_folder(),
        });
    }
    if let Some(children) = &node.children {
        path.push(node.title.clone());
        for child in children {
            walk(child, needle, path, hits);
        }
        path.pop();
    }
}

fn matches(node: &RenderedNode, needle: &str) -> bool {
    node.title.to_lowercase().contains(needle)
        || node
            .url
            .as_deref()
            .is_some_and(|url| url.to_lowercase().contains(needle))
}
