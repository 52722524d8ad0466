//! Typed gateway client and session management for the quire platform.

#![warn(
    // missing_docs,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    deprecated
)]

mod client;
mod error;
mod inflight;
mod session;

pub use client::{ApiClient, AuthResponse, UploadRequest};
pub use error::ApiError;
pub use inflight::{MutationGates, MutationKind};
pub use session::{Session, SessionState};
