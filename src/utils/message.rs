//! Helpers for building wire messages.

use crate::types::{Message, MessagePart};
use crate::utils::constants::USER_ROLE;

/// Create a wire message holding a single `user` text part.
///
/// # Example
///
/// ```
/// use acp_rs::utils::user_text_message;
///
/// let message = user_text_message("Hello, agent!");
/// assert_eq!(message.role(), Some("user"));
/// assert_eq!(message.text(), "Hello, agent!");
/// ```
pub fn user_text_message(text: impl Into<String>) -> Message {
    Message::new(vec![MessagePart::text_with_role(text, USER_ROLE)])
}
