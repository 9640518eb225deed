mod core;
mod history;
mod interrupt;
mod state;


pub use interrupt::{coerce_field_input, missing_required_fields};
pub use state::{
    ChatSession, ExchangeOutcome, PendingInterrupt, SessionCancelHandle, SessionPhase,
    SessionUpdate,
};
