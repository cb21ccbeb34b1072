//! Parsing of Interakt webhook notifications.
//!
//! Only `message_received` events carry anything we store. The phone number
//! and message body live a few levels deep, and the body itself arrives in
//! several shapes: plain text, a JSON-encoded string, an interactive reply
//! object, or a list.

use serde_json::Value;

/// Event type for inbound customer messages.
pub const MESSAGE_RECEIVED: &str = "message_received";

/// Separator placed between the elements of a list payload.
pub const LIST_SEPARATOR: &str = "\n---\n";

/// Phone number and message text pulled out of a webhook body.
///
/// Either field may be missing; the caller decides how to respond.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboundMessage {
    /// Customer phone number, trimmed
    pub phone: Option<String>,
    /// Message text
    pub text: Option<String>,
}

impl InboundMessage {
    /// Extract phone and text from a decoded webhook body.
    ///
    /// Events other than `message_received` yield an empty result.
    pub fn from_payload(body: &Value) -> Self {
        if body.get("type").and_then(Value::as_str) != Some(MESSAGE_RECEIVED) {
            return Self::default();
        }
        let Some(data) = body.get("data") else {
            return Self::default();
        };

        let phone = data.get("customer").and_then(|customer| {
            first_truthy(customer, &["channel_phone_number", "phone_number"]).map(stringify)
        });

        let text = data
            .get("message")
            .and_then(|message| first_truthy(message, &["message", "text"]))
            .map(extract_message);

        Self {
            phone: phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
            text: text.filter(|t| !t.is_empty()),
        }
    }
}

/// Extract readable message text from a message payload.
///
/// Never fails; the worst case is an empty string.
pub fn extract_message(payload: &Value) -> String {
    let decoded;
    let payload = match payload {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(v) => {
                decoded = v;
                &decoded
            }
            Err(_) => return s.clone(),
        },
        other => other,
    };

    match payload {
        Value::Object(_) => {
            let reply_title = |key: &str| {
                payload
                    .get(key)
                    .and_then(|reply| reply.get("title"))
                    .filter(|v| is_truthy(v))
            };
            reply_title("button_reply")
                .or_else(|| reply_title("list_reply"))
                .or_else(|| first_truthy(payload, &["message", "text"]))
                .map(stringify)
                .unwrap_or_default()
        }
        Value::Array(items) => items
            .iter()
            .map(stringify)
            .collect::<Vec<_>>()
            .join(LIST_SEPARATOR),
        other => stringify(other),
    }
}

fn first_truthy<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| value.get(*k))
        .find(|v| is_truthy(v))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_encoded_string() {
        assert_eq!(extract_message(&json!(r#"{"text":"hi"}"#)), "hi");
    }

    #[test]
    fn test_plain_string() {
        assert_eq!(extract_message(&json!("hi")), "hi");
        assert_eq!(extract_message(&json!("{not json")), "{not json");
    }

    #[test]
    fn test_list_joined() {
        assert_eq!(extract_message(&json!(["a", "b"])), "a\n---\nb");
        assert_eq!(extract_message(&json!(r#"["a", 2]"#)), "a\n---\n2");
    }

    #[test]
    fn test_empty_object() {
        assert_eq!(extract_message(&json!({})), "");
        assert_eq!(extract_message(&json!("{}")), "");
    }

    #[test]
    fn test_button_reply_wins() {
        let payload = json!({
            "button_reply": {"title": "Yes please"},
            "list_reply": {"title": "Other"},
            "text": "fallback"
        });
        assert_eq!(extract_message(&payload), "Yes please");
    }

    #[test]
    fn test_list_reply_then_message_then_text() {
        assert_eq!(
            extract_message(&json!({"list_reply": {"title": "Plan B"}, "text": "t"})),
            "Plan B"
        );
        assert_eq!(
            extract_message(&json!({"button_reply": {"title": ""}, "message": "m", "text": "t"})),
            "m"
        );
        assert_eq!(extract_message(&json!({"message": "", "text": "t"})), "t");
    }

    #[test]
    fn test_scalars_stringified() {
        assert_eq!(extract_message(&json!(42)), "42");
        assert_eq!(extract_message(&json!("42")), "42");
        assert_eq!(extract_message(&Value::Null), "");
    }

    #[test]
    fn test_from_payload_phone_number() {
        let body = json!({
            "type": "message_received",
            "data": {
                "customer": {"phone_number": "91234"},
                "message": {"text": "Hello Need info about Digital Marketing"}
            }
        });
        let inbound = InboundMessage::from_payload(&body);
        assert_eq!(inbound.phone.as_deref(), Some("91234"));
        assert_eq!(
            inbound.text.as_deref(),
            Some("Hello Need info about Digital Marketing")
        );
    }

    #[test]
    fn test_from_payload_prefers_channel_phone_and_message_field() {
        let body = json!({
            "type": "message_received",
            "data": {
                "customer": {"channel_phone_number": " 91999 ", "phone_number": "111"},
                "message": {"message": r#"{"button_reply":{"title":"ecommerce"}}"#, "text": "x"}
            }
        });
        let inbound = InboundMessage::from_payload(&body);
        assert_eq!(inbound.phone.as_deref(), Some("91999"));
        assert_eq!(inbound.text.as_deref(), Some("ecommerce"));
    }

    #[test]
    fn test_from_payload_numeric_phone() {
        let body = json!({
            "type": "message_received",
            "data": {"customer": {"phone_number": 919876543210u64}, "message": {"text": "hi"}}
        });
        let inbound = InboundMessage::from_payload(&body);
        assert_eq!(inbound.phone.as_deref(), Some("919876543210"));
    }

    #[test]
    fn test_from_payload_other_event() {
        let body = json!({"type": "message_delivered", "data": {}});
        assert_eq!(InboundMessage::from_payload(&body), InboundMessage::default());
    }

    #[test]
    fn test_from_payload_missing_message() {
        let body = json!({
            "type": "message_received",
            "data": {"customer": {"phone_number": "1"}, "message": {}}
        });
        let inbound = InboundMessage::from_payload(&body);
        assert_eq!(inbound.phone.as_deref(), Some("1"));
        assert!(inbound.text.is_none());
    }
}
