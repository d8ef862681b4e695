//! Matcher tags and their composition into a single predicate over
//! `(Fingerprint, Entry)`.
//!
//! Built-in tags are compiled in; custom tags live in a process-wide
//! registry and are looked up by name on every evaluation, so
//! `clear_matchers` takes effect immediately. Matchers never run code from
//! cassette files.

use crate::canonical::{self, CanonicalUrl, Fingerprint, SECRET_REQUEST_HEADERS};
use crate::entry::Entry;
use crate::error::TapeError;
use crate::redact;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Predicate over (canonicalized request, recorded entry).
pub type MatcherFn = dyn Fn(&Fingerprint, &Entry) -> bool + Send + Sync;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MatcherTag {
    Method,
    Host,
    Path,
    Uri,
    Headers,
    Body,
    Custom(String),
}

impl fmt::Display for MatcherTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatcherTag::Method => write!(f, "method"),
            MatcherTag::Host => write!(f, "host"),
            MatcherTag::Path => write!(f, "path"),
            MatcherTag::Uri => write!(f, "uri"),
            MatcherTag::Headers => write!(f, "headers"),
            MatcherTag::Body => write!(f, "body"),
            MatcherTag::Custom(name) => write!(f, "{name}"),
        }
    }
}

static CUSTOM_MATCHERS: Lazy<RwLock<HashMap<String, Arc<MatcherFn>>>> =
    Lazy::new(Default::default);

/// Register a custom matcher under `tag`. Registration while requests are in
/// flight is undefined; do it in test setup or teardown.
pub fn register_matcher<F>(tag: impl Into<String>, matcher: F)
where
    F: Fn(&Fingerprint, &Entry) -> bool + Send + Sync + 'static,
{
    CUSTOM_MATCHERS.write().insert(tag.into(), Arc::new(matcher));
}

/// Empty the custom matcher table.
pub fn clear_matchers() {
    CUSTOM_MATCHERS.write().clear();
}

/// AND-composition of the named matchers, fixed at install time. An empty
/// tag list matches everything.
#[derive(Debug, Clone)]
pub struct ComposedMatcher {
    tags: Vec<MatcherTag>,
}

/// Build the composed predicate. Custom tags must be registered at this
/// point; a missing one is a configuration error rather than a silent
/// never-match.
pub fn compose(tags: &[MatcherTag]) -> Result<ComposedMatcher, TapeError> {
    for tag in tags {
        if let MatcherTag::Custom(name) = tag {
            if !CUSTOM_MATCHERS.read().contains_key(name) {
                return Err(TapeError::Config(format!(
                    "unknown matcher tag '{name}'; register it with register_matcher \
                     before installing"
                )));
            }
        }
    }
    Ok(ComposedMatcher {
        tags: tags.to_vec(),
    })
}

impl ComposedMatcher {
    pub fn matches(&self, fp: &Fingerprint, entry: &Entry) -> bool {
        self.tags.iter().all(|tag| match_tag(tag, fp, entry))
    }

    pub fn tags(&self) -> &[MatcherTag] {
        &self.tags
    }
}

fn match_tag(tag: &MatcherTag, fp: &Fingerprint, entry: &Entry) -> bool {
    match tag {
        MatcherTag::Method => fp.method.eq_ignore_ascii_case(&entry.req.method),
        MatcherTag::Host => recorded_url(entry).is_some_and(|url| url.host == fp.url.host),
        MatcherTag::Path => recorded_url(entry).is_some_and(|url| url.path == fp.url.path),
        MatcherTag::Uri => recorded_url(entry).is_some_and(|url| url == fp.url),
        MatcherTag::Headers => headers_subset(fp, entry),
        MatcherTag::Body => fp.body_hash == entry.req.body_hash,
        MatcherTag::Custom(name) => {
            let matcher = CUSTOM_MATCHERS.read().get(name).cloned();
            match matcher {
                Some(matcher) => matcher(fp, entry),
                None => {
                    log::warn!("matcher tag '{name}' is not registered; treating as non-match");
                    false
                }
            }
        }
    }
}

/// Canonicalization is idempotent, so re-canonicalizing the stored URL gives
/// the same comparison basis as the live fingerprint.
fn recorded_url(entry: &Entry) -> Option<CanonicalUrl> {
    match canonical::canonicalize_url_str(&entry.req.url) {
        Ok(url) => Some(url),
        Err(e) => {
            log::warn!("recorded url '{}' failed to canonicalize: {e}", entry.req.url);
            None
        }
    }
}

/// Subset containment: every recorded header must be carried by the request
/// with the same value, case-insensitive on the name. Redacted pairs are
/// skipped; their live values were dropped from the fingerprint too.
fn headers_subset(fp: &Fingerprint, entry: &Entry) -> bool {
    entry.req.headers.iter().all(|(name, value)| {
        let name = name.to_ascii_lowercase();
        if redact::is_redacted(value) || SECRET_REQUEST_HEADERS.contains(&name.as_str()) {
            return true;
        }
        fp.headers
            .get(&name)
            .is_some_and(|values| values.join(", ") == *value)
    })
}
