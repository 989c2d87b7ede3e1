//! The chat message relayed between clients.
//!
//! Wire shape (field names are fixed for client compatibility):
//!
//! ```json
//! { "email": "a@x", "username": "a", "message": "hi" }
//! ```
//!
//! Decoding is lenient in the ways existing chat clients rely on:
//!
//! - absent fields, unknown fields, and fields set to `null` leave the empty
//!   string, and a bare `null` payload is the all-empty message;
//! - field names match ASCII case-insensitively (`"Email"` fills `email`);
//! - a repeated field keeps its last non-null value;
//! - only the first JSON value in a frame is read, anything after it is ignored.
//!
//! A frame with no JSON value, a value that is not an object, or a field
//! holding something other than a string or `null` is rejected.

use std::fmt;

use serde::de::{self, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Serialize};

/// One chat message. Immutable once decoded; consumed once by the dispatcher.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Sender email address.
    pub email: String,
    /// Sender display name.
    pub username: String,
    /// Message body.
    pub message: String,
}

impl ChatMessage {
    /// Build a message from its three fields.
    pub fn new(
        email: impl Into<String>,
        username: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            username: username.into(),
            message: message.into(),
        }
    }

    /// Decode a message from a JSON text frame.
    pub fn decode(text: &str) -> serde_json::Result<Self> {
        first_value(serde_json::Deserializer::from_str(text).into_iter())
    }

    /// Decode a message from a binary frame carrying JSON.
    pub fn decode_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        first_value(serde_json::Deserializer::from_slice(bytes).into_iter())
    }

    /// Encode the message as the JSON text written to every recipient.
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    fn field_mut(&mut self, key: &str) -> Option<&mut String> {
        if key.eq_ignore_ascii_case("email") {
            Some(&mut self.email)
        } else if key.eq_ignore_ascii_case("username") {
            Some(&mut self.username)
        } else if key.eq_ignore_ascii_case("message") {
            Some(&mut self.message)
        } else {
            None
        }
    }
}

fn first_value<I>(mut values: I) -> serde_json::Result<ChatMessage>
where
    I: Iterator<Item = serde_json::Result<Option<ChatMessage>>>,
{
    match values.next() {
        Some(parsed) => Ok(parsed?.unwrap_or_default()),
        None => Err(de::Error::custom("frame carries no JSON value")),
    }
}

impl<'de> Deserialize<'de> for ChatMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MessageVisitor;

        impl<'de> Visitor<'de> for MessageVisitor {
            type Value = ChatMessage;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a chat message object")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut msg = ChatMessage::default();
                while let Some(key) = map.next_key::<String>()? {
                    match msg.field_mut(&key) {
                        Some(slot) => {
                            if let Some(value) = map.next_value::<Option<String>>()? {
                                *slot = value;
                            }
                        }
                        None => {
                            let _ = map.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(msg)
            }
        }

        deserializer.deserialize_map(MessageVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_full_message() {
        let msg = ChatMessage::decode(r#"{"email":"a@x","username":"a","message":"hi"}"#).unwrap();
        assert_eq!(msg, ChatMessage::new("a@x", "a", "hi"));
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let msg = ChatMessage::decode(r#"{"username":"bob"}"#).unwrap();
        assert_eq!(msg.username, "bob");
        assert!(msg.email.is_empty());
        assert!(msg.message.is_empty());
    }

    #[test]
    fn empty_object_decodes() {
        let msg = ChatMessage::decode("{}").unwrap();
        assert_eq!(msg, ChatMessage::default());
    }

    #[test]
    fn null_decodes_to_empty_message() {
        let msg = ChatMessage::decode("null").unwrap();
        assert_eq!(msg, ChatMessage::default());
    }

    #[test]
    fn unknown_fields_ignored() {
        let msg = ChatMessage::decode(r#"{"message":"yo","extra":42}"#).unwrap();
        assert_eq!(msg.message, "yo");
    }

    #[test]
    fn non_json_rejected() {
        assert!(ChatMessage::decode("not json at all").is_err());
    }

    #[test]
    fn non_object_rejected() {
        assert!(ChatMessage::decode("[1,2,3]").is_err());
        assert!(ChatMessage::decode(r#""hello""#).is_err());
    }

    #[test]
    fn wrong_field_type_rejected() {
        assert!(ChatMessage::decode(r#"{"email":7}"#).is_err());
    }

    #[test]
    fn null_field_is_left_empty() {
        let msg = ChatMessage::decode(r#"{"email":null,"username":"a","message":"hi"}"#).unwrap();
        assert_eq!(msg, ChatMessage::new("", "a", "hi"));
    }

    #[test]
    fn field_names_match_any_case() {
        let msg =
            ChatMessage::decode(r#"{"Email":"a@x","USERNAME":"a","mEsSaGe":"hi"}"#).unwrap();
        assert_eq!(msg, ChatMessage::new("a@x", "a", "hi"));
    }

    #[test]
    fn repeated_field_keeps_last_value() {
        let msg = ChatMessage::decode(r#"{"message":"first","message":"second"}"#).unwrap();
        assert_eq!(msg.message, "second");

        let msg = ChatMessage::decode(r#"{"message":"kept","Message":null}"#).unwrap();
        assert_eq!(msg.message, "kept");
    }

    #[test]
    fn trailing_data_after_first_value_ignored() {
        let msg = ChatMessage::decode(r#"{"message":"hi"} {}"#).unwrap();
        assert_eq!(msg.message, "hi");

        let msg = ChatMessage::decode_bytes(br#"{"message":"bin"} trailing"#).unwrap();
        assert_eq!(msg.message, "bin");
    }

    #[test]
    fn empty_frame_rejected() {
        assert!(ChatMessage::decode("").is_err());
        assert!(ChatMessage::decode("   ").is_err());
    }

    #[test]
    fn nested_unknown_fields_skipped() {
        let msg = ChatMessage::decode(r#"{"meta":{"a":[1,null]},"message":"ok"}"#).unwrap();
        assert_eq!(msg.message, "ok");
    }

    #[test]
    fn decode_bytes_matches_text() {
        let raw = br#"{"email":"c@x","username":"c","message":"bin"}"#;
        let msg = ChatMessage::decode_bytes(raw).unwrap();
        assert_eq!(msg, ChatMessage::new("c@x", "c", "bin"));
    }

    #[test]
    fn encode_uses_wire_field_names() {
        let json = ChatMessage::new("a@x", "a", "hi").encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["email"], "a@x");
        assert_eq!(value["username"], "a");
        assert_eq!(value["message"], "hi");
        assert_eq!(value.as_object().unwrap().len(), 3);
    }
}
