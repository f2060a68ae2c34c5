//! Error taxonomy shared by every homeport crate.
//!
//! Each layer converts its own failures into [`HubError`] at port
//! boundaries; adapters map it onto their transport.

use std::fmt;

/// Kind of object an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Adapter,
    Device,
    Service,
    Parameter,
    Listener,
    Module,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Adapter => "adapter",
            Self::Device => "device",
            Self::Service => "service",
            Self::Parameter => "parameter",
            Self::Listener => "listener",
            Self::Module => "module",
        };
        f.write_str(name)
    }
}

/// Top-level error for all store, reference, marshal and lifecycle calls.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// A required argument was absent or empty.
    #[error("missing required argument `{0}`")]
    NullArgument(&'static str),

    /// An argument had an invalid value.
    #[error("invalid argument")]
    Argument(#[from] ArgumentError),

    /// A sibling with the same identifier is already attached.
    #[error("{kind} '{id}' is not unique among its siblings")]
    NotUnique { kind: EntityKind, id: String },

    /// An identity did not resolve.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// The object is already attached or registered.
    #[error("{kind} '{id}' is already attached")]
    AlreadyAttached { kind: EntityKind, id: String },

    /// The object is not currently attached or registered.
    #[error("{kind} '{id}' is not attached")]
    NotAttached { kind: EntityKind, id: String },

    /// A resource needed to carry out the operation could not be obtained.
    #[error("unable to allocate {0}")]
    Allocation(&'static str),

    /// The call was made outside the running window (before start or after stop).
    #[error("the hub is not running")]
    NotRunning,

    /// The call is only valid before the hub or daemon has started.
    #[error("the hub is already running")]
    AlreadyRunning,
}

/// Details about why an argument was rejected.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ArgumentError {
    /// Attribute keys starting with the reserved prefix are write-protected.
    #[error("attribute key '{0}' uses the reserved prefix '_'")]
    ReservedKey(String),

    /// Identifiers are rendered as path segments and must not contain `/`.
    #[error("identifier '{0}' is not a valid path segment")]
    InvalidIdentifier(String),

    /// Method name that does not map to a known method.
    #[error("unknown method '{0}'")]
    UnknownMethod(String),

    /// A listener must set at least one callback to be subscribed.
    #[error("listener has no callbacks")]
    NoCallbacks,

    /// A module option nobody registered or the module did not recognise.
    #[error("unknown option '{0}'")]
    UnknownOption(String),

    /// A module option value that could not be parsed.
    #[error("invalid value '{value}' for option '{option}'")]
    InvalidOption { option: String, value: String },

    /// A reference or response minted for another configuration.
    #[error("object belongs to a different configuration")]
    ForeignConfiguration,
}

/// An identity that did not resolve against the live store.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{kind} '{path}' not found")]
pub struct NotFoundError {
    pub kind: EntityKind,
    pub path: String,
}

impl NotFoundError {
    pub fn new(kind: EntityKind, path: impl fmt::Display) -> Self {
        Self {
            kind,
            path: path.to_string(),
        }
    }
}

/// A failed attach that hands the entity back to its owner.
///
/// The tree is left unchanged and the caller may retry or free the entity.
pub struct Rejected<T> {
    error: HubError,
    entity: Box<T>,
}

impl<T> Rejected<T> {
    #[must_use]
    pub fn new(error: impl Into<HubError>, entity: T) -> Self {
        Self {
            error: error.into(),
            entity: Box::new(entity),
        }
    }

    #[must_use]
    pub fn error(&self) -> &HubError {
        &self.error
    }

    #[must_use]
    pub fn entity(&self) -> &T {
        &self.entity
    }

    /// Take the entity back, dropping the error.
    #[must_use]
    pub fn into_entity(self) -> T {
        *self.entity
    }

    /// Drop the entity and keep the error.
    #[must_use]
    pub fn into_error(self) -> HubError {
        self.error
    }

    #[must_use]
    pub fn into_parts(self) -> (HubError, T) {
        (self.error, *self.entity)
    }
}

impl<T> fmt::Debug for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attach rejected: {}", self.error)
    }
}

impl<T> std::error::Error for Rejected<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl<T> From<Rejected<T>> for HubError {
    fn from(rejected: Rejected<T>) -> Self {
        rejected.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_not_unique_with_kind_and_id() {
        let err = HubError::NotUnique {
            kind: EntityKind::Device,
            id: "lamp0".to_string(),
        };
        assert_eq!(err.to_string(), "device 'lamp0' is not unique among its siblings");
    }

    #[test]
    fn should_convert_argument_error_into_hub_error() {
        let err: HubError = ArgumentError::ReservedKey("_id".to_string()).into();
        assert!(matches!(
            err,
            HubError::Argument(ArgumentError::ReservedKey(_))
        ));
    }

    #[test]
    fn should_display_not_found_path() {
        let err = NotFoundError::new(EntityKind::Service, "a/d/s");
        assert_eq!(err.to_string(), "service 'a/d/s' not found");
    }

    #[test]
    fn should_return_entity_from_rejected_attach() {
        let rejected = Rejected::new(HubError::NullArgument("id"), 42_u32);
        assert_eq!(*rejected.entity(), 42);
        let (error, entity) = rejected.into_parts();
        assert!(matches!(error, HubError::NullArgument("id")));
        assert_eq!(entity, 42);
    }
}
