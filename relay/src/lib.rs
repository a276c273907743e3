pub mod api;
pub mod envelope;
pub mod errors;
pub mod forwarder;
pub mod metrics_defs;
pub mod testutils;

pub use api::{AppState, app};
pub use envelope::{EventEnvelope, EventType};
pub use errors::RelayError;
pub use forwarder::{Forwarder, ForwarderConfig};
