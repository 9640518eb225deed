use super::{ChatSession, ExchangeOutcome, SessionPhase, SessionUpdate};
use crate::types::{FieldKind, FieldSchema, InterruptPayload, RequestKind, ToolFormSchema};
use crate::util::{parse_bool_str, split_nonempty_lines};
use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;

impl ChatSession {
    /// Answer a pending approval interrupt and drive the follow-up exchange.
    /// The original payload is echoed back with `currentValues.response` set
    /// to the answer. Single-shot: the pending record is consumed up front.
    pub async fn resolve_approval(
        &mut self,
        approved: bool,
        updates: Option<&mpsc::UnboundedSender<SessionUpdate>>,
    ) -> Result<ExchangeOutcome> {
        let Some(pending) = self.pending_interrupt.take() else {
            tracing::debug!("approval response ignored: no interrupt is pending");
            return Ok(ExchangeOutcome::Ignored);
        };

        let answer = if approved { "yes" } else { "no" };
        let mut request = self.base_request(RequestKind::Approve, answer.to_string());
        request.payload = Some(payload_with_response(&pending.raw, answer));
        self.run_exchange(request, updates).await
    }

    /// Submit values for a pending form interrupt. Validation failures reject
    /// the submission locally: the interrupt stays pending and nothing is
    /// sent. On success the payload is echoed back with `currentValues`
    /// replaced by the submitted values.
    pub async fn resolve_form(
        &mut self,
        values: &Map<String, Value>,
        updates: Option<&mpsc::UnboundedSender<SessionUpdate>>,
    ) -> Result<ExchangeOutcome> {
        let missing = match self.pending_interrupt.as_ref() {
            None => {
                tracing::debug!("form response ignored: no interrupt is pending");
                return Ok(ExchangeOutcome::Ignored);
            }
            Some(pending) => match &pending.payload {
                InterruptPayload::ToolInputForm { schema, .. } => {
                    missing_required_fields(schema, values)
                }
                InterruptPayload::ToolApprove { .. } => {
                    tracing::debug!("form response ignored: the pending interrupt is an approval");
                    return Ok(ExchangeOutcome::Ignored);
                }
            },
        };
        if !missing.is_empty() {
            tracing::debug!(?missing, "form submission rejected: required fields missing");
            return Ok(ExchangeOutcome::Rejected { missing });
        }

        let Some(pending) = self.pending_interrupt.take() else {
            return Ok(ExchangeOutcome::Ignored);
        };
        let content = serde_json::to_string(values).context("serializing form values")?;
        let mut request = self.base_request(RequestKind::Input, content);
        request.payload = Some(payload_with_values(&pending.raw, values));
        self.run_exchange(request, updates).await
    }

    /// Dismiss the pending interrupt without answering. Nothing goes on the
    /// wire; the abandoned server-side task is the platform's to reap.
    pub fn cancel_interrupt(&mut self) {
        if self.pending_interrupt.take().is_some() {
            self.phase = SessionPhase::Idle;
            tracing::debug!("pending interrupt dismissed");
        }
    }
}

/// Names of required schema fields that `values` leaves unsatisfied. A field
/// is satisfied by a non-blank submitted value or, failing that, a non-blank
/// schema default. Blank means JSON null, a whitespace-only string, or an
/// empty array.
pub fn missing_required_fields(
    schema: &ToolFormSchema,
    values: &Map<String, Value>,
) -> Vec<String> {
    schema
        .required
        .iter()
        .filter(|name| {
            let provided = values
                .get(name.as_str())
                .is_some_and(|value| !is_blank_value(value));
            let defaulted = schema
                .properties
                .get(name.as_str())
                .and_then(|field| field.default.as_ref())
                .is_some_and(|value| !is_blank_value(value));
            !provided && !defaulted
        })
        .cloned()
        .collect()
}

/// Convert raw text from a host control into the JSON value the schema field
/// expects: numbers parse or collapse to 0, booleans accept the usual
/// spellings, arrays split on newlines with blank lines dropped, and
/// everything else passes through as a string.
pub fn coerce_field_input(field: &FieldSchema, input: &str) -> Value {
    match field.kind {
        FieldKind::Number => {
            let number = input.trim().parse::<f64>().unwrap_or(0.0);
            serde_json::Number::from_f64(number)
                .map(Value::Number)
                .unwrap_or_else(|| json!(0))
        }
        FieldKind::Boolean => Value::Bool(parse_bool_str(input).unwrap_or(false)),
        FieldKind::Array => Value::Array(
            split_nonempty_lines(input)
                .into_iter()
                .map(Value::String)
                .collect(),
        ),
        FieldKind::String | FieldKind::Freeform => Value::String(input.to_string()),
    }
}

fn is_blank_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

pub(super) fn payload_with_response(raw: &Value, response: &str) -> Value {
    let mut payload = raw.clone();
    if let Some(object) = payload.as_object_mut() {
        let values = object.entry("currentValues").or_insert_with(|| json!({}));
        if !values.is_object() {
            *values = json!({});
        }
        if let Some(values) = values.as_object_mut() {
            values.insert("response".to_string(), json!(response));
        }
    }
    payload
}

pub(super) fn payload_with_values(raw: &Value, values: &Map<String, Value>) -> Value {
    let mut payload = raw.clone();
    if let Some(object) = payload.as_object_mut() {
        object.insert("currentValues".to_string(), Value::Object(values.clone()));
    }
    payload
}
