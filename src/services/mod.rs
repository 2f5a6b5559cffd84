//! Core gateway services: token issuance/verification and request forwarding.

pub mod forwarder;
pub mod token;

pub use forwarder::{ForwardError, ForwardMode, Forwarder};
pub use token::{IdentityClaim, IssuedToken, TokenError, TokenService};
