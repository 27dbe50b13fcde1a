//! Clickndebrid Core - CNL codec, link resolution, and batch processing.
//!
//! This crate holds the protocol logic of the clickndebrid proxy. It has no
//! knowledge of HTTP routing or of a concrete cache; outbound collaborators
//! (debrid backends, the downstream download manager) are traits so the
//! pipeline can be driven by real clients or by test doubles.
//!
//! ## Pipeline
//!
//! ```text
//! CnlPackage ──decrypt──▶ links ──BatchProcessor──▶ ProcessingResult
//!                                     │ (LinkResolver → DebridBackend)
//!                                     ▼
//!             Downstream ◀──encrypt── CnlPackage { files }
//! ```

pub mod batch;
pub mod codec;
pub mod downstream;
pub mod key;
pub mod models;
pub mod resolver;

pub use batch::{BatchError, BatchProcessor, ErrorPolicy};
pub use codec::{decrypt, encrypt, CodecError};
pub use downstream::{Downstream, DownstreamError, Submission};
pub use key::{extract_key, KeyError};
pub use models::{CnlPackage, ProcessedLink, ProcessingResult, ProcessingStats};
pub use resolver::{DebridBackend, LinkResolver, ResolveError, ResolvedLink};
