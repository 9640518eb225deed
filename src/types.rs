mod api_types;
mod message;

pub use api_types::{
    ChatRequest, EventKind, FieldKind, FieldSchema, InterruptPayload, RequestKind, SseState,
    StreamEventRecord, ToolFormSchema,
};
pub use message::{ChatMessage, Sender};
