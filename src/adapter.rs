//! Conversion between domain messages and wire messages.
//!
//! The wire format only knows the `user` and `assistant` roles. Any other
//! role is masked: the message goes out as a `user` message whose first part
//! is the marker `#custom_role#<role>#`, and the receiving side strips the
//! marker back off with [`unmask`]. Roles containing `#` cannot be masked
//! faithfully.

use crate::message::{Content, ContentPart, Message, Role};
use crate::types::{Message as WireMessage, MessagePart};
use crate::utils::constants::{ASSISTANT_ROLE, CUSTOM_ROLE_TOKEN, USER_ROLE};

/// Role and content recovered from a masked value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unmasked {
    /// The original role.
    pub role: String,
    /// The original content, marker removed.
    pub content: String,
}

/// The marker prefix for `role`: `#custom_role#<role>#`.
pub fn custom_role_marker(role: &str) -> String {
    format!("#{CUSTOM_ROLE_TOKEN}#{role}#")
}

/// Convert a domain message into its wire shape.
///
/// Wire roles pass through; custom roles are masked behind a marker part and
/// sent as `user`.
pub fn encode(message: &Message) -> WireMessage {
    let (wire_role, marker) = match &message.role {
        Role::User => (USER_ROLE, None),
        Role::Assistant => (ASSISTANT_ROLE, None),
        Role::Custom(role) => {
            if role.contains('#') {
                tracing::warn!(role = %role, "custom role contains '#' and will not unmask cleanly");
            }
            (USER_ROLE, Some(custom_role_marker(role)))
        }
    };

    let mut parts = Vec::new();
    if let Some(marker) = marker {
        parts.push(MessagePart::text_with_role(marker, wire_role));
    }
    match &message.content {
        Content::Text(text) => parts.push(MessagePart::text_with_role(text.clone(), wire_role)),
        Content::Parts(content_parts) => {
            parts.extend(content_parts.iter().map(|part| to_wire_part(part, wire_role)));
        }
    }

    WireMessage::new(parts)
}

/// Recover role and content from a masked string.
///
/// The value is split on `#`; unless the second segment is the sentinel
/// token the value is not masked and `None` is returned. Otherwise the third
/// segment is the role and everything after it, rejoined with `#`, is the
/// content.
pub fn decode(value: &str) -> Option<Unmasked> {
    let segments: Vec<&str> = value.split('#').collect();
    if segments.get(1) != Some(&CUSTOM_ROLE_TOKEN) {
        return None;
    }
    let role = segments.get(2)?;
    Some(Unmasked {
        role: (*role).to_string(),
        content: segments[3..].join("#"),
    })
}

/// Rewrite a masked user message in place to its original role and content.
///
/// No-op for anything that is not a user message carrying the marker.
pub fn unmask(message: &mut Message) {
    if message.role != Role::User {
        return;
    }
    if let Some(Unmasked { role, content }) = decode(&message.content.flatten()) {
        message.role = Role::from(role);
        message.content = Content::Text(content);
    }
}

/// Convert a wire message into a domain message, unmasking custom roles.
///
/// Messages without a declared role are treated as assistant output. When
/// the first part is exactly a role marker, it is dropped and the remaining
/// parts are kept as they are; otherwise a marker at the start of the
/// flattened text is stripped by [`unmask`].
pub fn from_wire(wire: &WireMessage) -> Message {
    let role = wire.role().map(Role::from).unwrap_or(Role::Assistant);

    if role == Role::User {
        if let Some((first, rest)) = wire.parts.split_first() {
            if let Some(masked_role) = marker_role(first) {
                return Message::new(Role::from(masked_role), content_from_parts(rest));
            }
        }
    }

    let mut message = Message::new(role, content_from_parts(&wire.parts));
    unmask(&mut message);
    message
}

/// The role named by a part that holds nothing but a marker.
fn marker_role(part: &MessagePart) -> Option<String> {
    if !part.is_text() {
        return None;
    }
    match decode(part.content.as_deref()?) {
        Some(Unmasked { role, content }) if content.is_empty() => Some(role),
        _ => None,
    }
}

fn content_from_parts(parts: &[MessagePart]) -> Content {
    let parts: Vec<ContentPart> = parts.iter().map(from_wire_part).collect();
    match <[ContentPart; 1]>::try_from(parts) {
        Ok([ContentPart::Text { text }]) => Content::Text(text),
        Ok([other]) => Content::Parts(vec![other]),
        Err(parts) => Content::Parts(parts),
    }
}

fn to_wire_part(part: &ContentPart, role: &str) -> MessagePart {
    match part {
        ContentPart::Text { text } => MessagePart::text_with_role(text.clone(), role),
        ContentPart::File {
            content_type,
            content,
            url,
        } => MessagePart {
            name: None,
            content_type: content_type.clone(),
            content: content.clone(),
            content_encoding: None,
            content_url: url.clone(),
            role: Some(role.to_string()),
        },
    }
}

fn from_wire_part(part: &MessagePart) -> ContentPart {
    if part.is_text() && part.content_url.is_none() {
        ContentPart::Text {
            text: part.content.clone().unwrap_or_default(),
        }
    } else {
        ContentPart::File {
            content_type: part.content_type.clone(),
            content: part.content.clone(),
            url: part.content_url.clone(),
        }
    }
}
