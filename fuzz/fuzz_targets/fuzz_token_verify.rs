//! Fuzz testing for inbound credential and path handling.
//!
//! Both functions see attacker-controlled input on every request, before
//! any backend is contacted. They must:
//!
//! - Never panic on any input
//! - Never accept a token that was not signed with the gateway secret
//! - Only match paths that sit under a registered prefix
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! cargo +nightly install cargo-fuzz
//! cargo +nightly fuzz run fuzz_token_verify -- -max_total_time=60
//! ```

#![no_main]

use arbitrary::Arbitrary;
use edge_gateway::{Config, RouteTable, TokenService};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    authorization: Option<&'a str>,
    path: &'a str,
}

fuzz_target!(|input: Input<'_>| {
    let tokens = TokenService::new(b"fuzz-secret", "admin");
    if let Ok(claim) = tokens.verify(input.authorization) {
        // Only reachable by forging an HS256 signature
        panic!("forged token accepted for subject {:?}", claim.subject);
    }

    let Ok(routes) = RouteTable::from_config(&Config::default()) else {
        return;
    };
    if let Some(entry) = routes.match_path(input.path) {
        let rest = input.path.strip_prefix(entry.prefix());
        assert!(matches!(rest, Some(r) if r.is_empty() || r.starts_with('/')));
    }
});
