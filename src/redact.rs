//! Secret stripping on the write path. Canonicalization stays pure; this
//! pass runs only when an exchange is about to hit disk. The on-disk form is
//! the contract; nothing is redacted at read time.

use crate::canonical::{Fingerprint, SECRET_REQUEST_HEADERS};
use crate::entry::RecordedRequest;

/// The literal value stored in place of a secret header's value. The header
/// itself stays present.
pub const REDACTED: &str = "<REDACTED>";

pub(crate) fn is_redacted(value: &str) -> bool {
    value == REDACTED
}

/// Produce the on-disk form of a request. Secret headers keep their name and
/// lose their value; auth query parameters are already absent from the
/// canonical URL, so nothing stands in for them. Multi-valued headers are
/// joined with `", "`.
pub fn redact_request(fp: &Fingerprint) -> RecordedRequest {
    let headers = fp
        .raw_headers
        .iter()
        .map(|(name, values)| {
            let value = if SECRET_REQUEST_HEADERS.contains(&name.as_str()) {
                REDACTED.to_string()
            } else {
                values.join(", ")
            };
            (name.clone(), value)
        })
        .collect();

    RecordedRequest {
        method: fp.method.clone(),
        url: fp.url.to_string(),
        headers,
        body_hash: fp.body_hash.clone(),
    }
}
