#![forbid(unsafe_code)]

pub mod mutation;
pub mod open;
pub mod shelf;
pub mod sync;

pub use mutation::{MutationEngine, SavedSession, session_title};
pub use open::{OpenOutcome, execute, open_bookmark};
pub use shelf::Shelf;
pub use sync::{RefreshMode, RenderedTree, SyncCoordinator, SyncState, TreeUpdate};
