//! Getting an authenticated page: the one-off session bootstrap and the
//! per-test navigation bridge.

pub mod bootstrap;
pub mod bridge;

pub use bootstrap::{bootstrap, capture_session, ensure_session, BootstrapOutcome};
pub use bridge::{classify_input, Bridge, FieldKind, LoginOutcome};
