#![forbid(unsafe_code)]

//! User-initiated edits. Each operation writes the authoritative tree first and the overlay
//! second; the overlay is always a whole-record load-modify-save.

use sm_core::ports::{PersistenceStore, TabController, TreeStore};
use sm_core::reconcile::{EffectiveTree, SnapshotIndex, effective_children};
use sm_core::{
    BookmarkNode, CreateNode, OpenFlag, ROOT_ID, ShelfError, WindowRef, normalize_title, reorder,
};
use sm_storage::OverlayStore;
use time::OffsetDateTime;
use time::macros::format_description;

const DEFAULT_FOLDER_TITLE: &str = "New Folder";

/// Folder created by [`MutationEngine::save_session`] and the bookmarks placed inside it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavedSession {
    pub folder: BookmarkNode,
    pub bookmarks: Vec<BookmarkNode>,
}

pub struct MutationEngine<'a, T, P> {
    tree: &'a mut T,
    overlay: &'a mut OverlayStore<P>,
}

impl<'a, T: TreeStore, P: PersistenceStore> MutationEngine<'a, T, P> {
    pub fn new(tree: &'a mut T, overlay: &'a mut OverlayStore<P>) -> Self {
        Self { tree, overlay }
    }

    /// Moves `id` under `target_parent_id` and records its rendered position.
    ///
    /// `index` counts positions in the target's rendered child list as it looks before the
    /// move; `None` appends.
    pub fn move_node(
        &mut self,
        id: &str,
        target_parent_id: &str,
        index: Option<usize>,
    ) -> Result<(), ShelfError> {
        let snapshot = self.tree.get_tree()?;
        let mut overlay = self.overlay.load()?;

        let mut list: Vec<String> = {
            let effective = EffectiveTree::build(&snapshot, &overlay);
            match effective.parent_of(id) {
                None => return Err(ShelfError::not_found(id)),
                Some(ROOT_ID) => {
                    return Err(ShelfError::InvalidOperation(format!(
                        "top-level container cannot be moved: {id}"
                    )));
                }
                Some(_) => {}
            }
            if target_parent_id != ROOT_ID && !effective.index().contains(target_parent_id) {
                return Err(ShelfError::not_found(target_parent_id));
            }
            effective
                .children_of(target_parent_id)
                .into_iter()
                .map(str::to_string)
                .collect()
        };

        self.tree.move_node(id, target_parent_id, None)?;

        overlay.virtual_parent.remove(id);
        overlay.remove_from_orders(id);
        reorder::place(&mut list, id, index);
        overlay.order.insert(target_parent_id.to_string(), list);
        self.overlay.save(&overlay)?;

        tracing::debug!(id, target_parent_id, ?index, "moved node");
        Ok(())
    }

    /// Drag-and-drop of `dragged` onto `target`. A collapsed folder target receives the node at
    /// its end; anything else places the node beside the target.
    pub fn drop_on(
        &mut self,
        dragged: &str,
        target: &str,
        target_expanded: bool,
    ) -> Result<(), ShelfError> {
        if dragged == target {
            return Ok(());
        }
        let snapshot = self.tree.get_tree()?;
        let overlay = self.overlay.load()?;

        let (parent, index) = {
            let effective = EffectiveTree::build(&snapshot, &overlay);
            let index = effective.index();
            if !index.contains(dragged) {
                return Err(ShelfError::not_found(dragged));
            }
            if !index.contains(target) {
                return Err(ShelfError::not_found(target));
            }

            let into_folder =
                index.is_folder(target) && (!target_expanded || index.is_top_level(target));
            if into_folder {
                (target.to_string(), None)
            } else {
                let parent = effective.parent_of(target).unwrap_or(ROOT_ID);
                let siblings = effective.children_of(parent);
                let target_index = siblings
                    .iter()
                    .position(|id| *id == target)
                    .unwrap_or(siblings.len());
                let insert = match siblings.iter().position(|id| *id == dragged) {
                    Some(source_index) => reorder::drop_insert_index(source_index, target_index),
                    None => target_index,
                };
                (parent.to_string(), Some(insert))
            }
        };

        self.move_node(dragged, &parent, index)
    }

    /// Sets a title override. A blank title drops the override.
    pub fn rename(&mut self, id: &str, title: &str) -> Result<(), ShelfError> {
        let title = normalize_title(title)
            .map_err(|err| ShelfError::InvalidOperation(err.message().to_string()))?;
        self.ensure_exists(id)?;

        let mut overlay = self.overlay.load()?;
        match title {
            Some(title) => {
                overlay.titles.insert(id.to_string(), title);
            }
            None => {
                overlay.titles.remove(id);
            }
        }
        self.overlay.save(&overlay)
    }

    pub fn hide(&mut self, id: &str) -> Result<(), ShelfError> {
        self.ensure_exists(id)?;
        let mut overlay = self.overlay.load()?;
        if overlay.hidden.insert(id.to_string()) {
            self.overlay.save(&overlay)?;
        }
        Ok(())
    }

    pub fn restore(&mut self, id: &str) -> Result<(), ShelfError> {
        let mut overlay = self.overlay.load()?;
        if overlay.hidden.remove(id) {
            self.overlay.save(&overlay)?;
        }
        Ok(())
    }

    pub fn create_folder(
        &mut self,
        parent_id: &str,
        index: Option<usize>,
        title: &str,
    ) -> Result<BookmarkNode, ShelfError> {
        self.create(parent_id, index, title, None)
    }

    pub fn create_bookmark(
        &mut self,
        parent_id: &str,
        index: Option<usize>,
        title: &str,
        url: &str,
    ) -> Result<BookmarkNode, ShelfError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ShelfError::InvalidOperation(
                "bookmark url must not be empty".to_string(),
            ));
        }
        self.create(parent_id, index, title, Some(url.to_string()))
    }

    /// Removes a node and its subtree from the authoritative tree, then forgets every overlay
    /// entry and open flag that mentioned any of the removed ids.
    pub fn delete(&mut self, id: &str) -> Result<(), ShelfError> {
        let snapshot = self.tree.get_tree()?;
        let (removed, is_folder) = {
            let index = SnapshotIndex::build(&snapshot);
            if !index.contains(id) {
                return Err(ShelfError::not_found(id));
            }
            if index.is_top_level(id) {
                return Err(ShelfError::InvalidOperation(format!(
                    "top-level container cannot be deleted: {id}"
                )));
            }
            (index.subtree_ids(id), index.is_folder(id))
        };

        if is_folder {
            self.tree.remove_subtree(id)?;
        } else {
            self.tree.remove(id)?;
        }

        let mut overlay = self.overlay.load()?;
        let before = overlay.clone();
        overlay.purge(&removed);
        if overlay != before {
            self.overlay.save(&overlay)?;
        }

        let mut flags = self.overlay.load_flags()?;
        let count = flags.len();
        flags.retain(|bookmark_id, _| !removed.contains(bookmark_id));
        if flags.len() != count {
            self.overlay.save_flags(&flags)?;
        }

        let mut expanded = self.overlay.load_expanded()?;
        let count = expanded.0.len();
        expanded.0.retain(|folder_id| !removed.contains(folder_id));
        if expanded.0.len() != count {
            self.overlay.save_expanded(&expanded)?;
        }

        tracing::debug!(id, removed = removed.len(), "deleted subtree");
        Ok(())
    }

    /// Writes `flag` for every bookmark under `folder_id` in one batch. Returns how many
    /// bookmarks were updated.
    pub fn bulk_set_flag(
        &mut self,
        folder_id: &str,
        flag: OpenFlag,
        recursive: bool,
    ) -> Result<usize, ShelfError> {
        let snapshot = self.tree.get_tree()?;
        let leaves = {
            let index = SnapshotIndex::build(&snapshot);
            if !index.contains(folder_id) {
                return Err(ShelfError::not_found(folder_id));
            }
            if !index.is_folder(folder_id) {
                return Err(ShelfError::InvalidOperation(format!(
                    "not a folder: {folder_id}"
                )));
            }
            index.leaf_ids(folder_id, recursive)
        };

        let mut flags = self.overlay.load_flags()?;
        for leaf in &leaves {
            if flag == OpenFlag::Unset {
                flags.remove(leaf);
            } else {
                flags.insert(leaf.clone(), flag);
            }
        }
        self.overlay.save_flags(&flags)?;
        Ok(leaves.len())
    }

    pub fn set_flag(&mut self, id: &str, flag: OpenFlag) -> Result<(), ShelfError> {
        self.ensure_exists(id)?;
        let mut flags = self.overlay.load_flags()?;
        if flag == OpenFlag::Unset {
            flags.remove(id);
        } else {
            flags.insert(id.to_string(), flag);
        }
        self.overlay.save_flags(&flags)
    }

    pub fn set_default_flag(&mut self, flag: OpenFlag) -> Result<(), ShelfError> {
        self.overlay.save_default_flag(flag)
    }

    /// Bookmarks every tab of the current window into a fresh timestamped folder.
    ///
    /// Creations are not rolled back: a failure part-way leaves the folder with whatever was
    /// already added.
    pub fn save_session<C: TabController>(
        &mut self,
        tabs: &C,
        parent_id: &str,
    ) -> Result<SavedSession, ShelfError> {
        let open_tabs = tabs.query_all_tabs(WindowRef::Current)?;
        let title = session_title(OffsetDateTime::now_utc());
        let folder = self.create_folder(parent_id, None, &title)?;

        let mut bookmarks = Vec::with_capacity(open_tabs.len());
        for tab in open_tabs {
            let title = if tab.title.trim().is_empty() {
                tab.url.clone()
            } else {
                tab.title
            };
            bookmarks.push(self.tree.create(CreateNode {
                parent_id: folder.id.clone(),
                title,
                url: Some(tab.url),
                index: None,
            })?);
        }

        tracing::debug!(folder = %folder.id, tabs = bookmarks.len(), "saved session");
        Ok(SavedSession { folder, bookmarks })
    }

    pub fn reset_overlay(&mut self) -> Result<(), ShelfError> {
        self.overlay.clear()
    }

    fn create(
        &mut self,
        parent_id: &str,
        index: Option<usize>,
        title: &str,
        url: Option<String>,
    ) -> Result<BookmarkNode, ShelfError> {
        let title = normalize_title(title)
            .map_err(|err| ShelfError::InvalidOperation(err.message().to_string()))?;
        let title = match (title, &url) {
            (Some(title), _) => title,
            (None, Some(url)) => url.clone(),
            (None, None) => DEFAULT_FOLDER_TITLE.to_string(),
        };

        // A stored order may be partial or name removed ids; `index` counts rendered positions.
        let mut overlay = self.overlay.load()?;
        let rendered = if overlay.order.contains_key(parent_id) {
            let snapshot = self.tree.get_tree()?;
            Some(effective_children(&snapshot, &overlay, parent_id))
        } else {
            None
        };

        let node = self.tree.create(CreateNode {
            parent_id: parent_id.to_string(),
            title,
            url,
            index,
        })?;

        if let Some(mut list) = rendered {
            reorder::splice(&mut list, &node.id, index);
            overlay.order.insert(parent_id.to_string(), list);
            self.overlay.save(&overlay)?;
        }
        Ok(node)
    }

    fn ensure_exists(&self, id: &str) -> Result<(), ShelfError> {
        let snapshot = self.tree.get_tree()?;
        if SnapshotIndex::build(&snapshot).contains(id) {
            Ok(())
        } else {
            Err(ShelfError::not_found(id))
        }
    }
}

/// `Session YYYY-MM-DD HH:MM:SS`, in UTC.
pub fn session_title(at: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    match at.format(format) {
        Ok(stamp) => format!("Session {stamp}"),
        Err(_) => "Session".to_string(),
    }
}
