//! Backend registry subsystem.
//!
//! # Data Flow
//! ```text
//! reconciler
//!     → client.rs (BackendRegistry: list / create_batch / delete_batch)
//!         → http.rs (SLB REST API, bearer token from session.rs)
//!         → memory.rs (in-process registry for tests and local runs)
//! ```
//!
//! # Design Decisions
//! - The reconciler depends only on the trait, never on a transport
//! - Sessions are constructed outside and handed to the client
//! - Every call has a deadline; none is retried here

pub mod client;
pub mod http;
pub mod memory;
pub mod session;
pub mod types;

pub use client::BackendRegistry;
pub use http::HttpRegistryClient;
pub use memory::InMemoryRegistry;
pub use session::{Session, TokenEndpoint};
pub use types::{
    ActualBackend, BackendId, DesiredBackend, ListenerRef, RegistryError, RegistryResult,
    BACKEND_KIND_COMPUTE, DEFAULT_BACKEND_WEIGHT,
};
