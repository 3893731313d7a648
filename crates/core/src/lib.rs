#![forbid(unsafe_code)]

mod error;
pub mod ids;
pub mod model;
pub mod open_policy;
pub mod ports;
pub mod reconcile;
pub mod reorder;
pub mod search;

pub use error::ShelfError;
pub use ids::{NodeId, NodeIdError, ROOT_ID, TitleError, normalize_title};
pub use model::*;
