use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A `{type, content}` item. The execute endpoint takes these as input and
/// returns them as output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: String,
}

impl ContentItem {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: "text".into(),
            content: content.into(),
        }
    }

    pub fn is_text(&self) -> bool {
        self.kind == "text"
    }
}

/// The `sessionInfo` mapping attached to stream events and replies.
/// Unrecognized keys are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    #[serde(rename = "runId", default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(
        rename = "sessionReference",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub session_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One decoded `data:` payload from the event stream. Every field is
/// optional at the wire boundary; shape violations fail the whole decode.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub output: Option<Vec<ContentItem>>,
    #[serde(rename = "sessionInfo", default)]
    pub session_info: Option<SessionInfo>,
    #[serde(rename = "isLastEvent", default)]
    pub is_last_event: bool,
}

/// Reply from one execute invocation, streaming or not.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReply {
    #[serde(default)]
    pub output: Vec<ContentItem>,
    #[serde(rename = "sessionInfo", default, skip_serializing_if = "Option::is_none")]
    pub session_info: Option<SessionInfo>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub streaming: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RunReply {
    /// Concatenated content of all text output items.
    pub fn text(&self) -> String {
        self.output
            .iter()
            .filter(|item| item.is_text())
            .map(|item| item.content.as_str())
            .collect()
    }
}

/// Reply from the run status endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusReply {
    #[serde(rename = "runId", default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<RunDetail>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StatusReply {
    /// Output items a completed run exposes under `run.kwargs.output`.
    pub fn run_output(&self) -> Option<&[ContentItem]> {
        self.run
            .as_ref()
            .and_then(|run| run.kwargs.output.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunDetail {
    #[serde(default)]
    pub kwargs: RunKwargs,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunKwargs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Vec<ContentItem>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn raw_event_all_fields_optional() {
        let event: RawEvent = serde_json::from_str("{}").unwrap();
        assert!(event.output.is_none());
        assert!(event.session_info.is_none());
        assert!(!event.is_last_event);
    }

    #[test]
    fn raw_event_full_shape() {
        let event: RawEvent = serde_json::from_value(json!({
            "eventIndex": 3,
            "messageId": "m-1",
            "output": [{"type": "text", "content": "hi"}],
            "sessionInfo": {"runId": "r1", "sessionReference": "s1", "status": "busy"},
            "isLastEvent": true,
        }))
        .unwrap();
        assert_eq!(event.output.unwrap(), vec![ContentItem::text("hi")]);
        let info = event.session_info.unwrap();
        assert_eq!(info.run_id.as_deref(), Some("r1"));
        assert_eq!(info.session_reference.as_deref(), Some("s1"));
        assert_eq!(info.status.as_deref(), Some("busy"));
        assert!(event.is_last_event);
    }

    #[test]
    fn raw_event_rejects_non_array_output() {
        assert!(serde_json::from_value::<RawEvent>(json!({"output": "oops"})).is_err());
    }

    #[test]
    fn session_info_preserves_extra_keys() {
        let info: SessionInfo = serde_json::from_value(json!({
            "runId": "r1",
            "conversationId": "c-9",
        }))
        .unwrap();
        let round = serde_json::to_value(&info).unwrap();
        assert_eq!(round["conversationId"], "c-9");
        assert_eq!(round["runId"], "r1");
    }

    #[test]
    fn run_reply_text_concatenates_in_order() {
        let reply = RunReply {
            output: vec![
                ContentItem::text("Hel"),
                ContentItem {
                    kind: "image".into(),
                    content: "ignored".into(),
                },
                ContentItem::text("lo"),
            ],
            ..Default::default()
        };
        assert_eq!(reply.text(), "Hello");
    }

    #[test]
    fn run_reply_streaming_flag_serialized_only_when_set() {
        let reply = RunReply {
            output: vec![ContentItem::text("x")],
            streaming: true,
            ..Default::default()
        };
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["streaming"], true);

        let quiet = RunReply::default();
        let value = serde_json::to_value(&quiet).unwrap();
        assert!(value.get("streaming").is_none());
    }

    #[test]
    fn run_reply_deserializes_plain_execute_response() {
        let reply: RunReply = serde_json::from_value(json!({
            "output": [{"type": "text", "content": "answer"}],
            "sessionInfo": {"runId": "r2", "status": "idle"},
            "debug": {"thoughts": []},
        }))
        .unwrap();
        assert_eq!(reply.text(), "answer");
        assert!(!reply.streaming);
        assert!(reply.extra.contains_key("debug"));
    }

    #[test]
    fn status_reply_exposes_nested_run_output() {
        let reply: StatusReply = serde_json::from_value(json!({
            "runId": "r1",
            "status": "success",
            "run": {"kwargs": {"output": [{"type": "text", "content": "late"}]}},
        }))
        .unwrap();
        assert_eq!(reply.run_output().unwrap(), &[ContentItem::text("late")]);
    }

    #[test]
    fn status_reply_without_run_section() {
        let reply: StatusReply = serde_json::from_value(json!({
            "runId": "r1",
            "status": "running",
        }))
        .unwrap();
        assert!(reply.run_output().is_none());
    }
}
