//! Application context lifecycle

use std::fmt;

use uuid::Uuid;

/// Identity of an application context
///
/// Nested contexts each get their own identity, a closing event only
/// concerns the context it was fired for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextId(Uuid);

impl ContextId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context {}", self.0)
    }
}

/// The application context is closing
#[derive(Clone, Copy, Debug)]
pub struct ContextClosed {
    /// The context that is closing
    pub source: ContextId,
}

impl ContextClosed {
    pub fn new(source: ContextId) -> Self {
        Self { source }
    }
}
