use std::fmt;

/// Errors from octree lock acquisition and mutation.
///
/// All variants are caller-correctable consistency or programming errors;
/// none of them is recoverable by retrying the same call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpatialError {
    #[error("id {id} is already present in the tree")]
    AlreadyPresent { id: String },
    #[error("id {id} is not present in the tree")]
    NotFound { id: String },
    #[error("position {position} is not finite")]
    NonFinitePosition { position: String },
    #[error("octree lock was poisoned by a panicking holder")]
    LockPoisoned,
}

impl SpatialError {
    pub(crate) fn already_present(id: &impl fmt::Debug) -> Self {
        Self::AlreadyPresent {
            id: format!("{id:?}"),
        }
    }

    pub(crate) fn not_found(id: &impl fmt::Debug) -> Self {
        Self::NotFound {
            id: format!("{id:?}"),
        }
    }

    pub(crate) fn non_finite(position: glam::Vec3) -> Self {
        Self::NonFinitePosition {
            position: format!("{position:?}"),
        }
    }
}
