use serde::{Deserialize, Serialize};

/// Maximum number of messages retained in a workflow's conversation
/// history. When a new user message is folded into a full history, the
/// oldest entries are dropped first (most-recent-last ordering is kept).
pub const MAX_HISTORY: usize = 32;

/// A message in a dispatch conversation, containing a role and text
/// content.
///
/// Messages carry the user requests and assistant responses threaded
/// through a workflow instance. Each message has a role (typically
/// "user", "assistant", or "system") and text content.
///
/// # Examples
///
/// ```
/// use dispatchflow::message::Message;
///
/// let user_msg = Message::user("notify all drivers about the shift change");
/// let assistant_msg = Message::assistant("20 drivers selected.");
/// assert!(user_msg.has_role(Message::USER));
/// ```
///
/// # Serialization
///
/// Messages implement `Serialize` and `Deserialize` and round-trip through
/// the checkpoint store:
/// ```
/// use dispatchflow::message::Message;
///
/// let msg = Message::user("test");
/// let json = serde_json::to_string(&msg).unwrap();
/// let parsed: Message = serde_json::from_str(&json).unwrap();
/// assert_eq!(msg, parsed);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender (e.g., "user", "assistant", "system").
    ///
    /// Use the constants on [`Message`] for standardized values.
    pub role: String,
    /// The text content of the message.
    pub content: String,
}

impl Message {
    /// User input message role.
    pub const USER: &'static str = "user";
    /// Assistant response message role.
    pub const ASSISTANT: &'static str = "assistant";
    /// System prompt or instruction message role.
    pub const SYSTEM: &'static str = "system";

    /// Creates a new message with the specified role and content.
    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    /// Creates a user message with the specified content.
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self::new(Self::USER, content)
    }

    /// Creates an assistant message with the specified content.
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    /// Creates a system message with the specified content.
    #[must_use]
    pub fn system(content: &str) -> Self {
        Self::new(Self::SYSTEM, content)
    }

    /// Returns true if this message has the specified role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}

/// Append `message` to `history`, dropping oldest entries beyond
/// [`MAX_HISTORY`]. Ordering stays most-recent-last.
pub fn push_bounded(history: &mut Vec<Message>, message: Message) {
    history.push(message);
    if history.len() > MAX_HISTORY {
        let overflow = history.len() - MAX_HISTORY;
        history.drain(..overflow);
    }
}
