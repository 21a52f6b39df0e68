//! Request middleware.

pub mod session;

pub use session::{ensure_session, SessionContext};
