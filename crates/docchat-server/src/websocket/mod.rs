//! The real-time chat channel: admission, sessions, and the session registry.

pub mod handler;
pub mod hub;
pub mod outbound;
pub mod protocol;
pub mod reader;
pub mod session;
pub mod writer;

pub use hub::{Hub, HubStopped};
pub use session::{SessionHandle, SessionIdentity, SessionOutcome, SessionState};
