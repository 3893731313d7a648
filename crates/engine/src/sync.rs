#![forbid(unsafe_code)]

use serde::Serialize;
use sm_core::ports::{PersistenceStore, TreeStore};
use sm_core::reconcile::reconcile;
use sm_core::{ChangeEvent, RenderedNode, ShelfError};
use sm_storage::{OVERLAY_KEY, OverlayStore};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

/// One published reconciliation result. `generation` grows by one per pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RenderedTree {
    pub generation: u64,
    pub roots: Vec<RenderedNode>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeUpdate {
    Loading,
    Ready(Arc<RenderedTree>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Refreshing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshMode {
    /// Publish `Loading` before the result.
    Loading,
    Silent,
}

/// Turns store notifications into rendered trees.
///
/// Both stores push into one inbox (see [`SyncCoordinator::sink`]); [`SyncCoordinator::pump`]
/// drains it and runs one pass per relevant event. Passes never overlap.
#[derive(Debug)]
pub struct SyncCoordinator {
    state: SyncState,
    inbox: Receiver<ChangeEvent>,
    inbox_tx: Sender<ChangeEvent>,
    subscribers: Vec<Sender<TreeUpdate>>,
    current: Option<Arc<RenderedTree>>,
    generation: u64,
}

impl Default for SyncCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncCoordinator {
    pub fn new() -> Self {
        let (inbox_tx, inbox) = mpsc::channel();
        Self {
            state: SyncState::Idle,
            inbox,
            inbox_tx,
            subscribers: Vec::new(),
            current: None,
            generation: 0,
        }
    }

    /// A sender to hand to `TreeStore::subscribe` / `PersistenceStore::subscribe`.
    pub fn sink(&self) -> Sender<ChangeEvent> {
        self.inbox_tx.clone()
    }

    pub fn subscribe(&mut self) -> Receiver<TreeUpdate> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn current(&self) -> Option<Arc<RenderedTree>> {
        self.current.clone()
    }

    pub fn mount<T: TreeStore, P: PersistenceStore>(
        &mut self,
        tree: &T,
        overlay: &OverlayStore<P>,
        show_hidden: bool,
    ) -> Result<Arc<RenderedTree>, ShelfError> {
        self.refresh(RefreshMode::Loading, tree, overlay, show_hidden)
    }

    /// Drains pending notifications. Returns the number of passes run.
    ///
    /// A failed pass does not stop the drain; the first failure is returned once the inbox is
    /// empty.
    pub fn pump<T: TreeStore, P: PersistenceStore>(
        &mut self,
        tree: &T,
        overlay: &OverlayStore<P>,
        show_hidden: bool,
    ) -> Result<usize, ShelfError> {
        let mut passes = 0usize;
        let mut first_error = None;
        loop {
            let event = match self.inbox.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            };
            if !is_relevant(&event) {
                continue;
            }
            passes += 1;
            if let Err(err) = self.refresh(RefreshMode::Silent, tree, overlay, show_hidden) {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(passes),
        }
    }

    /// Drops queued notifications without running passes.
    pub fn discard_pending(&mut self) -> usize {
        self.inbox.try_iter().count()
    }

    pub fn refresh<T: TreeStore, P: PersistenceStore>(
        &mut self,
        mode: RefreshMode,
        tree: &T,
        overlay: &OverlayStore<P>,
        show_hidden: bool,
    ) -> Result<Arc<RenderedTree>, ShelfError> {
        self.state = SyncState::Refreshing;
        if mode == RefreshMode::Loading {
            self.publish(TreeUpdate::Loading);
        }
        let result = self.pass(tree, overlay, show_hidden);
        self.state = SyncState::Idle;
        result
    }

    fn pass<T: TreeStore, P: PersistenceStore>(
        &mut self,
        tree: &T,
        overlay: &OverlayStore<P>,
        show_hidden: bool,
    ) -> Result<Arc<RenderedTree>, ShelfError> {
        let snapshot = tree.get_tree().map_err(|err| {
            tracing::warn!(error = %err, "tree snapshot unavailable; keeping previous render");
            err
        })?;
        let state = overlay.load().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "overlay unreadable; rendering without it");
            Default::default()
        });

        self.generation += 1;
        let rendered = Arc::new(RenderedTree {
            generation: self.generation,
            roots: reconcile(&snapshot, &state, show_hidden),
        });
        self.current = Some(rendered.clone());
        self.publish(TreeUpdate::Ready(rendered.clone()));

        tracing::debug!(generation = self.generation, "reconciled");
        Ok(rendered)
    }

    fn publish(&mut self, update: TreeUpdate) {
        self.subscribers
            .retain(|subscriber| subscriber.send(update.clone()).is_ok());
    }
}

fn is_relevant(event: &ChangeEvent) -> bool {
    match event {
        ChangeEvent::Tree(_) => true,
        ChangeEvent::Storage(change) => change.key == OVERLAY_KEY,
    }
}
