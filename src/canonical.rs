//! Request identity canonicalization.
//!
//! Matching has to be stable under the things that legitimately vary between
//! otherwise-equivalent requests: auth tokens, request IDs, header casing,
//! query parameter order, explicit default ports. Everything here is pure;
//! redaction happens separately on the write path.

use crate::error::TapeError;
use http_client::Request;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// The body hash recorded for an empty or absent body.
pub const EMPTY_BODY_HASH: &str = "-";

/// Query parameter names that never participate in request identity and are
/// stripped from the canonical URL entirely. Compared case-insensitively.
const AUTH_QUERY_PARAMS: &[&str] = &[
    "access_token",
    "token",
    "api_key",
    "apikey",
    "auth",
    "authorization",
    "signature",
    "sig",
    "key",
];

/// Request headers excluded from matching; on the write path their values
/// are replaced by the redaction placeholder.
pub(crate) const SECRET_REQUEST_HEADERS: &[&str] = &[
    "authorization",
    "cookie",
    "proxy-authorization",
    "x-api-key",
    "x-auth-token",
];

/// Response headers whose values vary between otherwise equivalent
/// exchanges; dropped from the recorded copy.
pub(crate) const VOLATILE_RESPONSE_HEADERS: &[&str] = &[
    "date",
    "set-cookie",
    "x-request-id",
    "x-amz-request-id",
    "x-amz-trace-id",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderSide {
    Request,
    Response,
}

/// The normalized identity of a URL. Equality of two canonical URLs is the
/// `uri` matcher's definition of "same resource".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalUrl {
    pub scheme: String,
    pub host: String,
    /// None when the port is the scheme default (80/http, 443/https).
    pub port: Option<u16>,
    pub path: String,
    /// Sorted by (name, value), multiplicity preserved, auth names removed.
    pub query: Vec<(String, String)>,
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        write!(f, "{}", self.path)?;
        if !self.query.is_empty() {
            let pairs: Vec<String> = self
                .query
                .iter()
                .map(|(name, value)| {
                    format!("{}={}", urlencoding::encode(name), urlencoding::encode(value))
                })
                .collect();
            write!(f, "?{}", pairs.join("&"))?;
        }
        Ok(())
    }
}

/// Normalize a parsed URL into its canonical form.
pub fn canonicalize_url(url: &Url) -> Result<CanonicalUrl, TapeError> {
    let host = url
        .host_str()
        .ok_or_else(|| TapeError::Config(format!("url '{url}' has no host")))?
        .to_ascii_lowercase();
    let host = host.strip_suffix('.').unwrap_or(&host).to_string();

    let mut query: Vec<(String, String)> = url
        .query_pairs()
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    query.retain(|(name, _)| !AUTH_QUERY_PARAMS.contains(&name.to_ascii_lowercase().as_str()));
    query.sort();

    Ok(CanonicalUrl {
        scheme: url.scheme().to_ascii_lowercase(),
        host,
        // The url crate never reports a scheme-default port.
        port: url.port(),
        path: normalize_path(url.path()),
        query,
    })
}

/// Parse and canonicalize a raw URL string (the form stored in cassettes).
pub fn canonicalize_url_str(raw: &str) -> Result<CanonicalUrl, TapeError> {
    let url = Url::parse(raw)
        .map_err(|e| TapeError::Config(format!("invalid url '{raw}': {e}")))?;
    canonicalize_url(&url)
}

/// Percent-encoding normalization, one path segment at a time. Slashes and
/// segment boundaries are preserved; only the encoding of each segment is
/// rewritten to a single stable form.
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/')
        .map(|segment| {
            let decoded = urlencoding::decode(segment)
                .map(|cow| cow.into_owned())
                .unwrap_or_else(|_| segment.to_string());
            urlencoding::encode(&decoded).into_owned()
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Lowercase header names and drop the side's denylist: secret request
/// headers on the request side, volatile headers on the response side.
/// Value order per name is preserved; names differing only in case merge.
pub fn canonicalize_headers<I>(headers: I, side: HeaderSide) -> BTreeMap<String, Vec<String>>
where
    I: IntoIterator<Item = (String, Vec<String>)>,
{
    let dropped: &[&str] = match side {
        HeaderSide::Request => SECRET_REQUEST_HEADERS,
        HeaderSide::Response => VOLATILE_RESPONSE_HEADERS,
    };
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, values) in headers {
        let name = name.to_ascii_lowercase();
        if dropped.contains(&name.as_str()) {
            continue;
        }
        out.entry(name).or_default().extend(values);
    }
    out
}

/// Lowercase hex SHA-256 of the raw body bytes; `"-"` for an empty body.
pub fn body_hash(body: &[u8]) -> String {
    if body.is_empty() {
        return EMPTY_BODY_HASH.to_string();
    }
    hex::encode(Sha256::digest(body))
}

/// The canonicalized subset of a request used for matching and, after
/// redaction, for the recorded form.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    /// Uppercase method.
    pub method: String,
    pub url: CanonicalUrl,
    /// Match view: lowercased names, secret request headers removed.
    pub headers: BTreeMap<String, Vec<String>>,
    /// Everything the request carried (lowercased names, nothing removed).
    /// Input to the redactor; never used for matching.
    pub raw_headers: BTreeMap<String, Vec<String>>,
    pub body_hash: String,
}

impl Fingerprint {
    /// Capture the identity of an outbound request, leaving the request
    /// usable. Reading the body consumes it, so the bytes are restored
    /// before returning.
    pub async fn capture(req: &mut Request) -> Result<Self, TapeError> {
        let body = req
            .take_body()
            .into_bytes()
            .await
            .map_err(|e| TapeError::Recorder(format!("failed to read request body: {e}")))?;
        req.set_body(body.clone());

        let mut raw_headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, values) in req.iter() {
            raw_headers
                .entry(name.as_str().to_ascii_lowercase())
                .or_default()
                .extend(values.iter().map(|v| v.as_str().to_string()));
        }
        let headers = canonicalize_headers(raw_headers.clone(), HeaderSide::Request);

        Ok(Self {
            method: req.method().to_string().to_ascii_uppercase(),
            url: canonicalize_url(req.url())?,
            headers,
            raw_headers,
            body_hash: body_hash(&body),
        })
    }
}
