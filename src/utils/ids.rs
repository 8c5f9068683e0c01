//! Session id generation.

use uuid::Uuid;

/// Generates collision-free session ids for new workflow instances.
///
/// Terminal sessions are never re-entered, so every fresh conversation
/// round that may carry an approval needs a fresh id.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdGenerator;

impl IdGenerator {
    pub fn new() -> Self {
        Self
    }

    /// New session id, e.g. `"sess-3f2a…"`.
    #[must_use]
    pub fn generate_session_id(&self) -> String {
        format!("sess-{}", Uuid::new_v4())
    }
}
