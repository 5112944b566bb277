use thiserror::Error;

/// Structural violations raised by [`crate::tree::Tree`] mutations.
///
/// These are fatal to the single operation that raised them, never to the
/// caller: the chat adapter logs them and keeps reconciling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("cannot insert {id}: parent {parent_id} is not in the tree")]
    MissingParent { id: String, parent_id: String },
    #[error("cannot insert {id}: a new node needs a parent id")]
    MissingParentId { id: String },
    #[error("cannot remove {id}: it is the root")]
    RootRemoval { id: String },
    #[error("cannot append {id}: parent {parent_id} already has children")]
    WouldFork { parent_id: String, id: String },
    #[error("cannot fork {id}: parent {parent_id} has no children")]
    NothingToFork { parent_id: String, id: String },
    #[error("node {id} is already in the tree")]
    Duplicate { id: String },
}
