use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request body for the agent-scoped streaming endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: RequestKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Chat,
    Input,
    Approve,
}

/// One decoded `data:` frame from the response stream. Consumed by the
/// session as soon as it is decoded, never stored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEventRecord {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_stream: bool,
    pub sse_state: SseState,
    #[serde(rename = "type", default)]
    pub kind: Option<EventKind>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub resume_key: Option<String>,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SseState {
    Running,
    End,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Answer,
    Interrupt,
    #[serde(other)]
    Unknown,
}

/// Interrupt payloads the platform ships inside an END frame.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterruptPayload {
    ToolApprove {
        tool: String,
    },
    ToolInputForm {
        tool: String,
        schema: ToolFormSchema,
        #[serde(default, rename = "currentValues")]
        current_values: serde_json::Map<String, serde_json::Value>,
    },
}

/// Schema-shaped description of a dynamic input form.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ToolFormSchema {
    #[serde(default)]
    pub properties: BTreeMap<String, FieldSchema>,
    #[serde(default)]
    pub required: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FieldSchema {
    #[serde(rename = "type", default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "enum", default)]
    pub choices: Option<Vec<String>>,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

/// Field control kind. Anything the schema does not declare collapses to
/// free text, mirroring the platform form renderer.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Array,
    #[serde(other)]
    #[default]
    Freeform,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_request_serializes_camel_case_and_omits_absent_fields() {
        let request = ChatRequest {
            user_id: "user-1".to_string(),
            kind: RequestKind::Chat,
            content: "hello".to_string(),
            resume_key: None,
            task_id: None,
            payload: None,
        };
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            value,
            json!({ "userId": "user-1", "type": "chat", "content": "hello" })
        );
    }

    #[test]
    fn test_chat_request_carries_tokens_and_payload_when_present() {
        let request = ChatRequest {
            user_id: "user-1".to_string(),
            kind: RequestKind::Approve,
            content: "yes".to_string(),
            resume_key: Some("r-7".to_string()),
            task_id: Some("t-42".to_string()),
            payload: Some(json!({ "tool": "book_flight" })),
        };
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value["type"], "approve");
        assert_eq!(value["resumeKey"], "r-7");
        assert_eq!(value["taskId"], "t-42");
        assert_eq!(value["payload"]["tool"], "book_flight");
    }

    #[test]
    fn test_stream_record_parses_running_frame() {
        let record: StreamEventRecord =
            serde_json::from_str(r#"{"content":"He","isStream":true,"sseState":"RUNNING"}"#)
                .expect("parse");
        assert_eq!(record.content, "He");
        assert!(record.is_stream);
        assert_eq!(record.sse_state, SseState::Running);
        assert_eq!(record.kind, None);
    }

    #[test]
    fn test_stream_record_defaults_optional_fields() {
        let record: StreamEventRecord =
            serde_json::from_value(json!({ "sseState": "END" })).expect("parse");
        assert_eq!(record.content, "");
        assert!(!record.is_stream);
        assert_eq!(record.sse_state, SseState::End);
        assert!(record.task_id.is_none());
        assert!(record.resume_key.is_none());
        assert!(record.payload.is_none());
    }

    #[test]
    fn test_stream_record_unknown_type_maps_to_catch_all() {
        let record: StreamEventRecord = serde_json::from_value(json!({
            "sseState": "END",
            "type": "tool_call"
        }))
        .expect("parse");
        assert_eq!(record.kind, Some(EventKind::Unknown));
    }

    #[test]
    fn test_interrupt_payload_parses_tool_approve() {
        let payload: InterruptPayload = serde_json::from_value(json!({
            "type": "tool_approve",
            "tool": "book_flight"
        }))
        .expect("parse");
        assert_eq!(
            payload,
            InterruptPayload::ToolApprove {
                tool: "book_flight".to_string()
            }
        );
    }

    #[test]
    fn test_interrupt_payload_parses_input_form() {
        let payload: InterruptPayload = serde_json::from_value(json!({
            "type": "tool_input_form",
            "tool": "book_flight",
            "schema": {
                "type": "object",
                "properties": {
                    "destination": { "type": "string", "description": "Destination city" },
                    "cabin": { "type": "string", "enum": ["economy", "business"] },
                    "passengers": { "type": "number", "default": 1 }
                },
                "required": ["destination"]
            },
            "currentValues": { "destination": "Busan" }
        }))
        .expect("parse");

        let InterruptPayload::ToolInputForm {
            tool,
            schema,
            current_values,
        } = payload
        else {
            panic!("expected an input form payload");
        };
        assert_eq!(tool, "book_flight");
        assert_eq!(schema.required, ["destination"]);
        assert_eq!(schema.properties.len(), 3);
        assert_eq!(schema.properties["destination"].kind, FieldKind::String);
        assert_eq!(
            schema.properties["cabin"].choices.as_deref(),
            Some(["economy".to_string(), "business".to_string()].as_slice())
        );
        assert_eq!(schema.properties["passengers"].default, Some(json!(1)));
        assert_eq!(current_values["destination"], "Busan");
    }

    #[test]
    fn test_interrupt_payload_rejects_unknown_tag() {
        let result = serde_json::from_value::<InterruptPayload>(json!({
            "type": "mystery",
            "tool": "book_flight"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_field_kind_falls_back_to_freeform() {
        let declared: FieldSchema =
            serde_json::from_value(json!({ "type": "date" })).expect("parse");
        assert_eq!(declared.kind, FieldKind::Freeform);

        let absent: FieldSchema = serde_json::from_value(json!({})).expect("parse");
        assert_eq!(absent.kind, FieldKind::Freeform);
    }
}
