#![forbid(unsafe_code)]

use sm_core::search::SearchHit;
use sm_core::{ExpandedState, RenderedNode};
use std::fmt::Write as _;

/// Indented text view. Top-level containers always show their children; deeper folders only
/// when expanded.
pub(crate) fn tree_text(roots: &[RenderedNode], expanded: &ExpandedState) -> String {
    let mut out = String::new();
    for root in roots {
        write_node(&mut out, root, expanded, 0, true);
    }
    out.trim_end().to_string()
}

fn write_node(
    out: &mut String,
    node: &RenderedNode,
    expanded: &ExpandedState,
    depth: usize,
    force_open: bool,
) {
    let indent = "  ".repeat(depth);
    let hidden = if node.is_hidden { " (hidden)" } else { "" };
    match &node.children {
        Some(children) => {
            let open = force_open || expanded.is_expanded(&node.id);
            let marker = if open { "-" } else { "+" };
            let _ = writeln!(out, "{indent}[{marker}] {} #{}{hidden}", node.title, node.id);
            if open {
                for child in children {
                    write_node(out, child, expanded, depth + 1, false);
                }
            }
        }
        None => {
            let url = node.url.as_deref().unwrap_or_default();
            let _ = writeln!(out, "{indent}    {} #{} <{url}>{hidden}", node.title, node.id);
        }
    }
}

pub(crate) fn hits_text(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "no matches".to_string();
    }
    let mut out = String::new();
    for hit in hits {
        let path = hit.path.join(" / ");
        let _ = match &hit.url {
            Some(url) => writeln!(out, "#{} {} <{url}>  in {path}", hit.id, hit.title),
            None => writeln!(out, "#{} {}/  in {path}", hit.id, hit.title),
        };
    }
    out.trim_end().to_string()
}
