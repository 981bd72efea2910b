//! Router Module Index
//!
//! Routing is split by access level so authentication is applied once, at the
//! module boundary, instead of per handler.

/// Routes reachable without credentials.
pub mod public;

/// Routes behind the `AuthUser` extractor middleware.
pub mod authenticated;
