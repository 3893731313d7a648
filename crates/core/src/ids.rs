#![forbid(unsafe_code)]

/// Id of the synthetic root. Its direct children are the host's top-level containers.
pub const ROOT_ID: &str = "0";

const MAX_ID_LEN: usize = 256;
const MAX_TITLE_LEN: usize = 4096;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_ID
    }

    pub fn try_new(value: impl Into<String>) -> Result<Self, NodeIdError> {
        let value = value.into();
        validate_node_id(&value)?;
        Ok(Self(value.trim().to_string()))
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeIdError {
    Empty,
    TooLong,
    ContainsControl,
}

impl NodeIdError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "node id must not be empty",
            Self::TooLong => "node id is too long",
            Self::ContainsControl => "node id contains control characters",
        }
    }
}

fn validate_node_id(value: &str) -> Result<(), NodeIdError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(NodeIdError::Empty);
    }
    if trimmed.len() > MAX_ID_LEN {
        return Err(NodeIdError::TooLong);
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(NodeIdError::ContainsControl);
    }
    Ok(())
}

/// Trims a user-supplied title. Returns `Ok(None)` for a blank title.
pub fn normalize_title(value: &str) -> Result<Option<String>, TitleError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.len() > MAX_TITLE_LEN {
        return Err(TitleError::TooLong);
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(TitleError::ContainsControl);
    }
    Ok(Some(trimmed.to_string()))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TitleError {
    TooLong,
    ContainsControl,
}

impl TitleError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::TooLong => "title is too long",
            Self::ContainsControl => "title contains control characters",
        }
    }
}
