use async_trait::async_trait;
use http_client::{Error, HttpClient, Request, Response};
use http_tape::{cassette, config, RecordMode, TapeClient};
use http_types::{Method, Url};

/// Set this to run the live round trip against the real server; the suite
/// stays offline otherwise.
const RECORD_ENV: &str = "TAPE_RECORD";

/// Adapter driving the real network through reqwest. Only the recording leg
/// of the round trip uses it; replay runs on the default offline client.
#[derive(Debug, Clone)]
struct ReqwestAdapter {
    client: reqwest::Client,
}

impl ReqwestAdapter {
    fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestAdapter {
    async fn send(&self, mut req: Request) -> Result<Response, Error> {
        let method = reqwest::Method::from_bytes(req.method().to_string().as_bytes())
            .map_err(|e| Error::from_str(500, format!("invalid method: {e}")))?;

        let mut outgoing = self.client.request(method, req.url().as_str());
        for (name, values) in req.iter() {
            for value in values.iter() {
                outgoing = outgoing.header(name.as_str(), value.as_str());
            }
        }

        let body = req
            .body_bytes()
            .await
            .map_err(|e| Error::from_str(500, e))?;
        if !body.is_empty() {
            outgoing = outgoing.body(body);
        }

        let upstream = outgoing.send().await.map_err(|e| Error::from_str(500, e))?;

        let mut response = Response::new(upstream.status().as_u16());
        for (name, value) in upstream.headers() {
            let _ = response.insert_header(name.as_str(), value.to_str().unwrap_or(""));
        }
        let bytes = upstream.bytes().await.map_err(|e| Error::from_str(500, e))?;
        response.set_body(bytes.to_vec());

        Ok(response)
    }
}

#[tokio::test]
async fn live_recording_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var(RECORD_ENV).is_err() {
        println!("{RECORD_ENV} not set; skipping live recording round trip");
        return Ok(());
    }

    let root = tempfile::tempdir()?;
    config::set_cassette_root(root.path());
    let cassette_name = "live/httpbin_json";

    // Record one real exchange.
    {
        let recording = TapeClient::builder("live_record", cassette_name)
            .mode(RecordMode::NewEpisodes)
            .inner_client(Box::new(ReqwestAdapter::new()))
            .install()?;

        let req = Request::new(Method::Get, Url::parse("https://httpbin.org/json")?);
        let resp = recording.intercept(req).await?;
        assert_eq!(u16::from(resp.status()), 200);
    }

    let entries = cassette::load(&cassette::resolve_path(cassette_name))?;
    assert_eq!(entries.len(), 1);

    // A fresh stub replays the recorded exchange with no network access.
    let replaying = TapeClient::builder("live_replay", cassette_name)
        .mode(RecordMode::None)
        .install()?;
    let req = Request::new(Method::Get, Url::parse("https://httpbin.org/json")?);
    let mut resp = replaying.intercept(req).await?;
    assert_eq!(u16::from(resp.status()), 200);
    assert!(!resp.body_string().await?.is_empty());

    Ok(())
}
