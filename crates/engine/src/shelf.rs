#![forbid(unsafe_code)]

use crate::mutation::{MutationEngine, SavedSession};
use crate::open::{OpenOutcome, open_bookmark};
use crate::sync::{RefreshMode, RenderedTree, SyncCoordinator, TreeUpdate};
use sm_core::ports::{PersistenceStore, TabController, TreeStore};
use sm_core::reconcile::SnapshotIndex;
use sm_core::search::{SearchHit, search};
use sm_core::{BookmarkNode, OpenFlag, ShelfError, ViewState};
use sm_storage::OverlayStore;
use std::sync::Arc;
use std::sync::mpsc::Receiver;

/// The assembled bookmark view: stores, coordinator and view state behind one handle.
///
/// Every mutation is followed by a pump of the coordinator inbox. A failed mutation forces a
/// visible refresh so the view cannot drift from the stores; `NotFound` failures are then
/// treated as no-ops (`Ok(None)` for value-returning calls).
pub struct Shelf<T, P, C> {
    tree: T,
    overlay: OverlayStore<P>,
    tabs: C,
    coordinator: SyncCoordinator,
    view: ViewState,
}

impl<T: TreeStore, P: PersistenceStore, C: TabController> Shelf<T, P, C> {
    pub fn new(mut tree: T, mut persistence: P, tabs: C) -> Self {
        let coordinator = SyncCoordinator::new();
        tree.subscribe(coordinator.sink());
        persistence.subscribe(coordinator.sink());

        let overlay = OverlayStore::new(persistence);
        let expanded = overlay.load_expanded().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "expanded state unreadable; starting collapsed");
            Default::default()
        });

        Self {
            tree,
            overlay,
            tabs,
            coordinator,
            view: ViewState {
                show_hidden: false,
                expanded,
            },
        }
    }

    pub fn with_show_hidden(mut self, show_hidden: bool) -> Self {
        self.view.show_hidden = show_hidden;
        self
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn tabs(&self) -> &C {
        &self.tabs
    }

    pub fn subscribe(&mut self) -> Receiver<TreeUpdate> {
        self.coordinator.subscribe()
    }

    pub fn mount(&mut self) -> Result<Arc<RenderedTree>, ShelfError> {
        self.coordinator.discard_pending();
        self.coordinator
            .mount(&self.tree, &self.overlay, self.view.show_hidden)
    }

    /// Latest published tree, if any pass has succeeded yet.
    pub fn rendered(&self) -> Option<Arc<RenderedTree>> {
        self.coordinator.current()
    }

    pub fn refresh(&mut self, mode: RefreshMode) -> Result<Arc<RenderedTree>, ShelfError> {
        self.coordinator
            .refresh(mode, &self.tree, &self.overlay, self.view.show_hidden)
    }

    /// Runs passes for whatever the stores reported since the last call.
    pub fn pump(&mut self) -> Result<usize, ShelfError> {
        self.coordinator
            .pump(&self.tree, &self.overlay, self.view.show_hidden)
    }

    /// Records a folder as expanded or collapsed. Returns whether the state changed.
    pub fn toggle_node(&mut self, id: &str, expanded: bool) -> Result<bool, ShelfError> {
        if !self.view.expanded.toggle(id, expanded) {
            return Ok(false);
        }
        self.overlay.save_expanded(&self.view.expanded)?;
        Ok(true)
    }

    pub fn set_show_hidden(&mut self, show_hidden: bool) -> Result<Arc<RenderedTree>, ShelfError> {
        self.view.show_hidden = show_hidden;
        self.refresh(RefreshMode::Silent)
    }

    pub fn move_node(
        &mut self,
        id: &str,
        target_parent_id: &str,
        index: Option<usize>,
    ) -> Result<(), ShelfError> {
        self.apply(|engine| engine.move_node(id, target_parent_id, index))
            .map(drop)
    }

    /// Drop of `dragged` onto `target`, using the current expanded state of `target`.
    pub fn drop_on(&mut self, dragged: &str, target: &str) -> Result<(), ShelfError> {
        let expanded = self.view.expanded.is_expanded(target);
        self.apply(|engine| engine.drop_on(dragged, target, expanded))
            .map(drop)
    }

    pub fn rename(&mut self, id: &str, title: &str) -> Result<(), ShelfError> {
        self.apply(|engine| engine.rename(id, title)).map(drop)
    }

    pub fn hide(&mut self, id: &str) -> Result<(), ShelfError> {
        self.apply(|engine| engine.hide(id)).map(drop)
    }

    pub fn restore(&mut self, id: &str) -> Result<(), ShelfError> {
        self.apply(|engine| engine.restore(id)).map(drop)
    }

    pub fn create_folder(
        &mut self,
        parent_id: &str,
        index: Option<usize>,
        title: &str,
    ) -> Result<Option<BookmarkNode>, ShelfError> {
        self.apply(|engine| engine.create_folder(parent_id, index, title))
    }

    pub fn create_bookmark(
        &mut self,
        parent_id: &str,
        index: Option<usize>,
        title: &str,
        url: &str,
    ) -> Result<Option<BookmarkNode>, ShelfError> {
        self.apply(|engine| engine.create_bookmark(parent_id, index, title, url))
    }

    pub fn delete(&mut self, id: &str) -> Result<(), ShelfError> {
        if self.apply(|engine| engine.delete(id))?.is_some() {
            match self.overlay.load_expanded() {
                Ok(expanded) => self.view.expanded = expanded,
                Err(err) => tracing::warn!(error = %err, "expanded state unreadable after delete"),
            }
        }
        Ok(())
    }

    pub fn bulk_set_flag(
        &mut self,
        folder_id: &str,
        flag: OpenFlag,
        recursive: bool,
    ) -> Result<Option<usize>, ShelfError> {
        self.apply(|engine| engine.bulk_set_flag(folder_id, flag, recursive))
    }

    pub fn set_flag(&mut self, id: &str, flag: OpenFlag) -> Result<(), ShelfError> {
        self.apply(|engine| engine.set_flag(id, flag)).map(drop)
    }

    pub fn set_default_flag(&mut self, flag: OpenFlag) -> Result<(), ShelfError> {
        self.apply(|engine| engine.set_default_flag(flag)).map(drop)
    }

    pub fn save_session(&mut self, parent_id: &str) -> Result<Option<SavedSession>, ShelfError> {
        let result = {
            let mut engine = MutationEngine::new(&mut self.tree, &mut self.overlay);
            engine.save_session(&self.tabs, parent_id)
        };
        self.settle(result)
    }

    pub fn reset_overlay(&mut self) -> Result<(), ShelfError> {
        self.apply(|engine| engine.reset_overlay()).map(drop)
    }

    /// Opens bookmark `id` in a tab according to its open flag.
    pub fn open(&mut self, id: &str, force_background: bool) -> Result<OpenOutcome, ShelfError> {
        let snapshot = self.tree.get_tree()?;
        let index = SnapshotIndex::build(&snapshot);
        let node = index.get(id).ok_or_else(|| ShelfError::not_found(id))?;
        let Some(url) = node.url.as_deref() else {
            return Err(ShelfError::InvalidOperation(format!(
                "folders cannot be opened: {id}"
            )));
        };

        let flags = self.overlay.load_flags()?;
        let default_flag = self.overlay.load_default_flag()?;
        open_bookmark(&mut self.tabs, &flags, default_flag, id, url, force_background)
    }

    /// Substring search over the latest rendered tree.
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        match self.coordinator.current() {
            Some(rendered) => search(&rendered.roots, query),
            None => Vec::new(),
        }
    }

    fn apply<R>(
        &mut self,
        op: impl FnOnce(&mut MutationEngine<'_, T, P>) -> Result<R, ShelfError>,
    ) -> Result<Option<R>, ShelfError> {
        let result = {
            let mut engine = MutationEngine::new(&mut self.tree, &mut self.overlay);
            op(&mut engine)
        };
        self.settle(result)
    }

    fn settle<R>(&mut self, result: Result<R, ShelfError>) -> Result<Option<R>, ShelfError> {
        match result {
            Ok(value) => {
                if let Err(err) = self.pump() {
                    tracing::warn!(error = %err, "pass after committed mutation failed");
                }
                Ok(Some(value))
            }
            Err(err) => {
                tracing::warn!(code = err.code(), error = %err, "mutation failed; forcing refresh");
                self.coordinator.discard_pending();
                if let Err(refresh_err) = self.refresh(RefreshMode::Loading) {
                    tracing::warn!(error = %refresh_err, "forced refresh failed");
                }
                if err.is_not_found() { Ok(None) } else { Err(err) }
            }
        }
    }
}
