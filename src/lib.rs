//! Record and replay HTTP exchanges for deterministic, offline tests.
//!
//! A test installs a stub bound to a cassette (a JSONL file of recorded
//! request/response pairs) and hands the returned client to the code under
//! test. Each intercepted request is canonicalized and matched against the
//! cassette's entries in order; depending on the record mode the stub
//! replays the recorded response, forwards to the real network and appends
//! the observed exchange, or fails the test.
//!
//! ```rust,no_run
//! use http_tape::{MatcherTag, RecordMode, TapeClient};
//! use http_client::HttpClient;
//! use http_types::{Method, Request, Url};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let stub = TapeClient::builder("my_test", "github/list_repos")
//!     .mode(RecordMode::Once)
//!     .match_on(vec![MatcherTag::Method, MatcherTag::Uri])
//!     .install()?;
//!
//! let req = Request::new(Method::Get, Url::parse("https://api.github.com/user/repos")?);
//! let resp = stub.send(req).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use http_client::{Error, HttpClient, Request, Response};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

mod canonical;
pub mod cassette;
pub mod codec;
pub mod config;
mod entry;
mod error;
mod matcher;
mod noop_client;
mod recorder;
mod redact;

pub use canonical::{
    body_hash, canonicalize_headers, canonicalize_url, canonicalize_url_str, CanonicalUrl,
    Fingerprint, HeaderSide, EMPTY_BODY_HASH,
};
pub use entry::{Entry, HeaderValue, RecordedRequest, RecordedResponse};
pub use error::{CodecError, TapeError};
pub use matcher::{clear_matchers, compose, register_matcher, ComposedMatcher, MatcherFn, MatcherTag};
pub use noop_client::{OfflineClient, PanickingOfflineClient};
pub use recorder::Recorder;
pub use redact::{redact_request, REDACTED};

/// Policy deciding, per intercepted request, whether to replay, record, or
/// fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordMode {
    /// Replay existing entries; anything unmatched is a miss.
    Once,
    /// Replay existing entries; forward and append anything unmatched.
    NewEpisodes,
    /// Always forward and re-record, ignoring existing entries.
    All,
    /// Replay only; never touch the network or the file.
    None,
}

impl FromStr for RecordMode {
    type Err = TapeError;

    fn from_str(s: &str) -> Result<Self, TapeError> {
        match s {
            "once" => Ok(Self::Once),
            "new_episodes" => Ok(Self::NewEpisodes),
            "all" => Ok(Self::All),
            "none" => Ok(Self::None),
            other => Err(TapeError::Config(format!(
                "unknown record mode '{other}' (expected once, new_episodes, all or none)"
            ))),
        }
    }
}

#[derive(Debug)]
struct StubState {
    entries: Vec<Entry>,
    cursor: usize,
}

/// The interceptor installed for one test. Owns the stub state (loaded
/// entries plus consumption cursor) and dispatches each request per the
/// record mode. Implements `HttpClient`, so code under test uses it as its
/// ordinary client.
#[derive(Debug)]
pub struct TapeClient {
    stub_name: String,
    cassette_name: String,
    path: PathBuf,
    mode: RecordMode,
    matcher: ComposedMatcher,
    recorder: Recorder,
    state: Mutex<StubState>,
}

static INSTALLED: Lazy<RwLock<HashMap<String, Arc<TapeClient>>>> = Lazy::new(Default::default);

/// Fetch the interceptor installed under `name`, if any.
pub fn stub(name: &str) -> Option<Arc<TapeClient>> {
    INSTALLED.read().get(name).cloned()
}

/// RAII registration of a stub: dropping the handle removes the stub from
/// the interceptor table, ending its lifetime with the test. State is never
/// shared across tests; reinstalling a name replaces the old stub.
#[derive(Debug)]
pub struct StubHandle {
    client: Arc<TapeClient>,
}

impl StubHandle {
    pub fn client(&self) -> Arc<TapeClient> {
        self.client.clone()
    }
}

impl Deref for StubHandle {
    type Target = TapeClient;

    fn deref(&self) -> &TapeClient {
        &self.client
    }
}

impl Drop for StubHandle {
    fn drop(&mut self) {
        let mut installed = INSTALLED.write();
        // A newer install under the same name wins; only remove our own.
        if let Some(current) = installed.get(self.client.stub_name.as_str()) {
            if Arc::ptr_eq(current, &self.client) {
                installed.remove(self.client.stub_name.as_str());
            }
        }
    }
}

#[derive(Debug)]
pub struct TapeClientBuilder {
    stub_name: String,
    cassette_name: String,
    mode: RecordMode,
    match_on: Vec<MatcherTag>,
    inner: Option<Box<dyn HttpClient>>,
}

impl TapeClientBuilder {
    pub fn mode(mut self, mode: RecordMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn match_on(mut self, tags: Vec<MatcherTag>) -> Self {
        self.match_on = tags;
        self
    }

    /// The unstubbed client used for recording. Defaults to
    /// [`OfflineClient`], which fails loudly if a request would leave the
    /// machine in a replay-only setup.
    pub fn inner_client(mut self, client: Box<dyn HttpClient>) -> Self {
        self.inner = Some(client);
        self
    }

    /// Bind the stub to its cassette for the current test: load the cassette
    /// (a missing file is empty), validate the matcher tags, apply the
    /// environment mode override, and register the interceptor under the
    /// stub name. The returned handle deregisters on drop.
    pub fn install(self) -> Result<StubHandle, TapeError> {
        let mode = config::mode_override()?.unwrap_or(self.mode);
        let matcher = matcher::compose(&self.match_on)?;
        let path = cassette::resolve_path(&self.cassette_name);
        let entries = cassette::load(&path)?;

        log::debug!(
            "installing stub '{}' on {} ({} entries, mode {:?}, match_on {:?})",
            self.stub_name,
            path.display(),
            entries.len(),
            mode,
            matcher.tags(),
        );

        let client = Arc::new(TapeClient {
            stub_name: self.stub_name,
            cassette_name: self.cassette_name,
            path,
            mode,
            matcher,
            recorder: Recorder::new(
                self.inner.unwrap_or_else(|| Box::new(OfflineClient::new())),
            ),
            state: Mutex::new(StubState { entries, cursor: 0 }),
        });

        INSTALLED
            .write()
            .insert(client.stub_name.clone(), client.clone());

        Ok(StubHandle { client })
    }
}

impl TapeClient {
    pub fn builder(
        stub_name: impl Into<String>,
        cassette_name: impl Into<String>,
    ) -> TapeClientBuilder {
        TapeClientBuilder {
            stub_name: stub_name.into(),
            cassette_name: cassette_name.into(),
            mode: RecordMode::Once,
            match_on: vec![MatcherTag::Method, MatcherTag::Uri],
            inner: None,
        }
    }

    pub fn stub_name(&self) -> &str {
        &self.stub_name
    }

    pub fn cassette_name(&self) -> &str {
        &self.cassette_name
    }

    pub fn cassette_path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> RecordMode {
        self.mode
    }

    /// Dispatch one intercepted request. This is the typed counterpart of
    /// the `HttpClient` impl, so tests can assert on [`TapeError`] variants
    /// directly.
    pub async fn intercept(&self, mut req: Request) -> Result<Response, TapeError> {
        let fp = Fingerprint::capture(&mut req).await?;
        log::debug!(
            "stub '{}': {} {} (mode {:?})",
            self.stub_name,
            fp.method,
            fp.url,
            self.mode
        );

        match self.mode {
            RecordMode::All => self.record(req, &fp).await,
            RecordMode::Once | RecordMode::None => match self.replay(&fp).await? {
                Some(resp) => Ok(resp),
                None => Err(self.miss(&fp).await),
            },
            RecordMode::NewEpisodes => match self.replay(&fp).await? {
                Some(resp) => Ok(resp),
                None => self.record(req, &fp).await,
            },
        }
    }

    /// Match-and-advance under the stub lock. The forward scan from the
    /// cursor preserves request ordering; already-consumed entries are
    /// eligible again only when nothing at or after the cursor matches,
    /// which lets idempotent calls replay more than once.
    async fn replay(&self, fp: &Fingerprint) -> Result<Option<Response>, TapeError> {
        let mut state = self.state.lock().await;

        let hit = (state.cursor..state.entries.len())
            .chain(0..state.cursor)
            .find(|&idx| self.matcher.matches(fp, &state.entries[idx]));

        match hit {
            Some(idx) => {
                state.cursor = idx + 1;
                let resp = state.entries[idx].resp.to_response()?;
                log::debug!(
                    "stub '{}': replaying entry {idx} for {} {}",
                    self.stub_name,
                    fp.method,
                    fp.url
                );
                Ok(Some(resp))
            }
            None => Ok(None),
        }
    }

    /// Forward upstream, persist the redacted exchange, and hand the caller
    /// the pristine response. The fresh entry joins the in-memory list so a
    /// repeat of the same call replays it instead of re-appending.
    async fn record(&self, req: Request, fp: &Fingerprint) -> Result<Response, TapeError> {
        let (pristine, recorded) = self.recorder.record(req).await?;
        let entry = Entry {
            req: redact::redact_request(fp),
            resp: recorded,
        };
        cassette::append(&self.path, &entry)?;

        log::debug!(
            "stub '{}': recorded {} {} -> {}",
            self.stub_name,
            fp.method,
            fp.url,
            entry.resp.status
        );

        let mut state = self.state.lock().await;
        state.entries.push(entry);

        Ok(pristine)
    }

    /// Build the miss diagnostic: the canonical request identity plus the
    /// nearest few entries by edit distance over their `METHOD url` line.
    async fn miss(&self, fp: &Fingerprint) -> TapeError {
        let wanted = format!("{} {}", fp.method, fp.url);
        let state = self.state.lock().await;

        let mut ranked: Vec<(usize, String)> = state
            .entries
            .iter()
            .map(|entry| {
                let line = format!("{} {}", entry.req.method, entry.req.url);
                (levenshtein::levenshtein(&wanted, &line), line)
            })
            .collect();
        ranked.sort();

        TapeError::CassetteMiss {
            stub: self.stub_name.clone(),
            path: self.path.clone(),
            method: fp.method.clone(),
            url: fp.url.to_string(),
            body_hash: fp.body_hash.clone(),
            nearest: ranked.into_iter().take(3).map(|(_, line)| line).collect(),
        }
    }
}

#[async_trait]
impl HttpClient for TapeClient {
    async fn send(&self, req: Request) -> Result<Response, Error> {
        self.intercept(req).await.map_err(TapeError::into_client_error)
    }

    fn set_config(&mut self, config: http_client::Config) -> Result<(), Error> {
        self.recorder.set_config(config)
    }

    fn config(&self) -> &http_client::Config {
        self.recorder.config()
    }
}
