//! Clickndebrid Debrid - outbound HTTP clients.
//!
//! - [`RealDebridBackend`] implements [`cnd_core::DebridBackend`] against the
//!   Real-Debrid REST API.
//! - [`HttpDownstream`] implements [`cnd_core::Downstream`] by posting the
//!   `addcrypted2` form to a CNL-speaking download manager.

pub mod destination;
pub mod error;
pub mod realdebrid;

pub use destination::{DestinationConfig, HttpDownstream};
pub use error::{DebridError, Result};
pub use realdebrid::{RealDebridBackend, RealDebridConfig, RealDebridUser};

/// User agent sent with every outbound request.
pub(crate) fn user_agent() -> String {
    format!("clickndebrid/{}", env!("CARGO_PKG_VERSION"))
}
