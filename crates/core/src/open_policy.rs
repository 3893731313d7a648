#![forbid(unsafe_code)]

use crate::model::{ActionableOpenFlag, OpenFlag, OpenFlagMap};

/// Local flag when set, else the global default when set, else a background tab.
pub fn resolve(local: OpenFlag, global: OpenFlag) -> ActionableOpenFlag {
    local
        .actionable()
        .or_else(|| global.actionable())
        .unwrap_or(ActionableOpenFlag::NewBackgroundTab)
}

pub fn resolve_for(flags: &OpenFlagMap, global: OpenFlag, bookmark_id: &str) -> ActionableOpenFlag {
    let local = flags.get(bookmark_id).copied().unwrap_or_default();
    resolve(local, global)
}
