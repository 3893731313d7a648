#![forbid(unsafe_code)]

//! Collaborator seams. The engine only ever talks to the host through these traits.

use crate::ShelfError;
use crate::model::{BookmarkNode, ChangeEvent, CreateNode, Tab, TabId, WindowRef};
use std::sync::mpsc::Sender;

/// The host's authoritative bookmark tree.
pub trait TreeStore {
    /// Top-level containers, each with its full subtree.
    fn get_tree(&self) -> Result<Vec<BookmarkNode>, ShelfError>;

    /// Direct children of `parent_id` in authoritative order. Folder children are shallow.
    fn get_children(&self, parent_id: &str) -> Result<Vec<BookmarkNode>, ShelfError>;

    fn create(&mut self, request: CreateNode) -> Result<BookmarkNode, ShelfError>;

    /// Exact placement is not relied upon by callers; `None` appends.
    fn move_node(
        &mut self,
        id: &str,
        parent_id: &str,
        index: Option<usize>,
    ) -> Result<(), ShelfError>;

    /// Removes a bookmark or an empty folder.
    fn remove(&mut self, id: &str) -> Result<(), ShelfError>;

    fn remove_subtree(&mut self, id: &str) -> Result<(), ShelfError>;

    /// Registers a sink for `ChangeEvent::Tree` notifications.
    fn subscribe(&mut self, sink: Sender<ChangeEvent>);
}

/// Key-value persistence with change notifications for cross-instance sync.
pub trait PersistenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, ShelfError>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), ShelfError>;

    fn remove(&mut self, key: &str) -> Result<(), ShelfError>;

    /// Registers a sink for `ChangeEvent::Storage` notifications.
    fn subscribe(&mut self, sink: Sender<ChangeEvent>);
}

pub trait TabController {
    fn create_tab(&mut self, url: &str, active: bool) -> Result<Tab, ShelfError>;

    fn query_active_tab(&self, window: WindowRef) -> Result<Option<Tab>, ShelfError>;

    fn update_tab(&mut self, tab_id: TabId, url: &str) -> Result<(), ShelfError>;

    fn query_all_tabs(&self, window: WindowRef) -> Result<Vec<Tab>, ShelfError>;
}
