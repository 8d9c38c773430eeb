//! Derives the client identifier used as the rate-limit key.

use std::net::IpAddr;

/// Header consulted for the originating address when forwarded headers are trusted.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Key used when neither a forwarded address nor a peer address is known.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Picks the rate-limit key for a request.
///
/// With `trust_forwarded` set, the first comma-separated entry of the
/// forwarded-for header wins when it is non-empty. Any client can forge that
/// header, so it should only be trusted behind a proxy that overwrites it.
/// Otherwise the transport peer address is used.
pub fn client_key(forwarded_for: Option<&str>, peer: Option<IpAddr>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        let first = forwarded_for
            .and_then(|header| header.split(',').next())
            .map(str::trim)
            .filter(|entry| !entry.is_empty());
        if let Some(entry) = first {
            return entry.to_string();
        }
    }

    match peer {
        Some(ip) => ip.to_string(),
        None => UNKNOWN_CLIENT.to_string(),
    }
}
