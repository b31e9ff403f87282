//! Domain message model.
//!
//! A domain [`Message`] is what callers and conversation memory deal in: a
//! role plus content. Unlike the wire format, the role set is open, so
//! `system`, `tool` or any application-defined role can be represented.
//! See [`crate::adapter`] for how those roles survive the trip over the wire.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role of a domain message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// The human side of the conversation.
    User,
    /// The agent side of the conversation.
    Assistant,
    /// Any other role (`system`, `tool`, ...).
    Custom(String),
}

impl Role {
    /// The role's string form.
    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Custom(role) => role,
        }
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        match value {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            other => Role::Custom(other.to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            _ => Role::Custom(value),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Custom(role) => role,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed piece of multi-part content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPart {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// Non-text content, inline or by reference.
    File {
        /// MIME type.
        content_type: String,
        /// Inline content, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        /// Content location, if not inline.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
}

impl ContentPart {
    /// A text part.
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// The readable text of this part: the text itself, or inline file
    /// content.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(text),
            ContentPart::File { content, .. } => content.as_deref(),
        }
    }
}

/// Message content: a single string or an ordered list of parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    /// A single string.
    Text(String),
    /// Ordered typed parts.
    Parts(Vec<ContentPart>),
}

impl Content {
    /// Flatten to one string by concatenating each part's text.
    pub fn flatten(&self) -> String {
        match self {
            Content::Text(text) => text.clone(),
            Content::Parts(parts) => parts.iter().filter_map(ContentPart::as_text).collect(),
        }
    }
}

impl From<&str> for Content {
    fn from(value: &str) -> Self {
        Content::Text(value.to_string())
    }
}

impl From<String> for Content {
    fn from(value: String) -> Self {
        Content::Text(value)
    }
}

impl From<Vec<ContentPart>> for Content {
    fn from(parts: Vec<ContentPart>) -> Self {
        Content::Parts(parts)
    }
}

/// A domain message: role, content and free-form metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent it.
    pub role: Role,
    /// What was said.
    pub content: Content,
    /// Caller- or framework-attached metadata.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl Message {
    /// Create a message with the given role and content.
    pub fn new(role: impl Into<Role>, content: impl Into<Content>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            meta: Map::new(),
        }
    }

    /// A user message.
    pub fn user(content: impl Into<Content>) -> Self {
        Self::new(Role::User, content)
    }

    /// An assistant message.
    pub fn assistant(content: impl Into<Content>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Attach a metadata entry (builder-style).
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    /// The message content flattened to a single string.
    pub fn text(&self) -> String {
        self.content.flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_string_round_trip() {
        assert_eq!(Role::from("user"), Role::User);
        assert_eq!(Role::from("assistant"), Role::Assistant);
        assert_eq!(Role::from("system"), Role::Custom("system".into()));
        assert_eq!(String::from(Role::Custom("tool".into())), "tool");
    }

    #[test]
    fn flatten_skips_parts_without_text() {
        let content = Content::Parts(vec![
            ContentPart::text("a"),
            ContentPart::File {
                content_type: "image/png".into(),
                content: None,
                url: Some("http://x/img.png".into()),
            },
            ContentPart::text("b"),
        ]);
        assert_eq!(content.flatten(), "ab");
    }

    #[test]
    fn serializes_role_as_string() {
        let msg = Message::new("system", "be brief");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"role": "system", "content": "be brief"})
        );
    }
}
