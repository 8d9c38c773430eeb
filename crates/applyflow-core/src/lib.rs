//! ApplyFlow core library: request admission and application tracking.
//!
//! `applyflow-core` holds everything that does not depend on the HTTP
//! framework, so the web server stays a thin mapping layer.
//!
//! # Modules
//!
//! - [`rate_limit`]: fixed-window per-client [`RateLimiter`] keyed by [`RouteClass`].
//! - [`token`]: stateless signed tokens via [`TokenAuthenticator`].
//! - [`client`]: rate-limit key derivation from forwarded and peer addresses.
//! - [`tracker`]: in-memory [`ApplicationTracker`] with status history and stale scans.
//! - [`clock`]: the [`Clock`] seam that makes windows and expiries testable.
//! - [`error`]: unified error type ([`CoreError`]) and result alias ([`CoreResult`]).

pub mod client;
pub mod clock;
pub mod error;
pub mod rate_limit;
pub mod token;
pub mod tracker;

pub use client::client_key;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, CoreResult, ValidationErrors};
pub use rate_limit::{Admission, Quotas, RateLimiter, RouteClass};
pub use token::{Claims, IssuedToken, Principal, TokenAuthenticator, TokenError, TokenSecret};
pub use tracker::{
    ApplicationDraft, ApplicationFilter, ApplicationStatus, ApplicationTracker, JobApplication,
    StatusChange,
};
