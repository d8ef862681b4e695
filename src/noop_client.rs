use async_trait::async_trait;
use http_client::{Config, Error, HttpClient, Request, Response};

/// An inner client that refuses every send.
///
/// This is the default inner client of an installed stub: in replay-only
/// modes no request should ever reach the network, and if one does, the
/// failure names the request that leaked through. Cassettes recorded against
/// unresolvable hosts replay fine on top of this client, which is the whole
/// point: replay is offline.
#[derive(Debug, Clone)]
pub struct OfflineClient {
    message: String,
    config: Config,
}

impl OfflineClient {
    pub fn new() -> Self {
        Self {
            message: "offline client: real HTTP requests are not allowed here; \
                      expected a cassette replay"
                .to_string(),
            config: Config::new(),
        }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            config: Config::new(),
        }
    }
}

impl Default for OfflineClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for OfflineClient {
    async fn send(&self, req: Request) -> Result<Response, Error> {
        Err(Error::from_str(
            500,
            format!("{} (attempted: {} {})", self.message, req.method(), req.url()),
        ))
    }

    fn set_config(&mut self, config: Config) -> Result<(), Error> {
        self.config = config;
        Ok(())
    }

    fn config(&self) -> &Config {
        &self.config
    }
}

/// Like [`OfflineClient`], but panics with a stack trace instead of
/// returning an error. Useful while developing to see exactly where an
/// unexpected request originates.
#[derive(Debug, Clone, Default)]
pub struct PanickingOfflineClient {
    config: Config,
}

impl PanickingOfflineClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HttpClient for PanickingOfflineClient {
    async fn send(&self, req: Request) -> Result<Response, Error> {
        panic!(
            "unexpected HTTP request during replay: {} {}; check the stub's \
             record mode and cassette contents",
            req.method(),
            req.url()
        );
    }

    fn set_config(&mut self, config: Config) -> Result<(), Error> {
        self.config = config;
        Ok(())
    }

    fn config(&self) -> &Config {
        &self.config
    }
}
