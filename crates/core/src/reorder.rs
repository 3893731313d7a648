#![forbid(unsafe_code)]

//! Index arithmetic shared by drag-and-drop and moves.
//!
//! Indices handed to a move are expressed against the sibling list as it looks *before* the
//! dragged id is taken out of it, the same convention the host tree store uses.

/// Insertion index for dropping the item at `source_index` onto the item at `target_index`
/// within one parent.
///
/// Dragging downwards lands after the target, dragging upwards lands before it. The `+ 1`
/// compensates for the source being removed ahead of the insert.
pub fn drop_insert_index(source_index: usize, target_index: usize) -> usize {
    if source_index < target_index {
        target_index + 1
    } else {
        target_index
    }
}

/// Removes `id` from `list` and reinserts it at `index` (pre-removal convention, clamped to
/// the list length, `None` appends).
pub fn place(list: &mut Vec<String>, id: &str, index: Option<usize>) {
    let previous = list.iter().position(|entry| entry == id);
    list.retain(|entry| entry != id);
    let at = match index {
        Some(index) => {
            let shifted = match previous {
                Some(previous) if previous < index => index - 1,
                _ => index,
            };
            shifted.min(list.len())
        }
        None => list.len(),
    };
    list.insert(at, id.to_string());
}

/// Inserts `id` at `index` clamped to `[0, len]`; `None` appends. Existing copies are dropped
/// first.
pub fn splice(list: &mut Vec<String>, id: &str, index: Option<usize>) {
    list.retain(|entry| entry != id);
    let at = index.unwrap_or(list.len()).min(list.len());
    list.insert(at, id.to_string());
}
