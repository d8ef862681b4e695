use http_tape::{
    body_hash, cassette, config, Entry, HeaderValue, MatcherTag, RecordedRequest,
    RecordedResponse, RecordMode, TapeClient, EMPTY_BODY_HASH,
};
use http_types::{Method, Request, Url};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use tempfile::TempDir;

static CASSETTE_ROOT: Lazy<TempDir> = Lazy::new(|| tempfile::tempdir().expect("tempdir"));

fn use_scratch_root() {
    config::set_cassette_root(CASSETTE_ROOT.path());
}

fn entry(method: &str, url: &str, body_hash: &str, status: u16, body: &str) -> Entry {
    Entry {
        req: RecordedRequest {
            method: method.to_string(),
            url: url.to_string(),
            headers: BTreeMap::new(),
            body_hash: body_hash.to_string(),
        },
        resp: RecordedResponse::from_bytes(
            status,
            BTreeMap::from([(
                "content-type".to_string(),
                HeaderValue::One("application/json".to_string()),
            )]),
            body.as_bytes(),
        ),
    }
}

fn get(url: &str) -> Request {
    Request::new(Method::Get, Url::parse(url).expect("valid url"))
}

fn post(url: &str, body: &str) -> Request {
    let mut req = Request::new(Method::Post, Url::parse(url).expect("valid url"));
    req.set_body(body);
    req
}

// Two entries for the same URL are consumed in file order; once the cursor
// passes the end, the fallback pass makes the sequence start over.
#[tokio::test]
async fn entries_for_the_same_url_are_consumed_in_order() {
    use_scratch_root();
    let cassette_name = "ordering/sequential";
    let path = cassette::resolve_path(cassette_name);
    let url = "https://api.example.com/uuid";
    cassette::append(&path, &entry("GET", url, EMPTY_BODY_HASH, 200, r#"{"seq":1}"#)).unwrap();
    cassette::append(&path, &entry("GET", url, EMPTY_BODY_HASH, 200, r#"{"seq":2}"#)).unwrap();

    let handle = TapeClient::builder("ordering_sequential", cassette_name)
        .mode(RecordMode::Once)
        .install()
        .unwrap();

    let mut bodies = Vec::new();
    for _ in 0..3 {
        let mut resp = handle.intercept(get(url)).await.unwrap();
        bodies.push(resp.body_string().await.unwrap());
    }

    assert_eq!(bodies[0], r#"{"seq":1}"#);
    assert_eq!(bodies[1], r#"{"seq":2}"#);
    // Idempotent replays are allowed to wrap around.
    assert_eq!(bodies[2], r#"{"seq":1}"#);
}

#[tokio::test]
async fn later_entries_stay_reachable_after_a_fallback_hit() {
    use_scratch_root();
    let cassette_name = "ordering/fallback";
    let path = cassette::resolve_path(cassette_name);
    let first = "https://api.example.com/first";
    let second = "https://api.example.com/second";
    cassette::append(&path, &entry("GET", first, EMPTY_BODY_HASH, 200, r#"{"n":1}"#)).unwrap();
    cassette::append(&path, &entry("GET", second, EMPTY_BODY_HASH, 200, r#"{"n":2}"#)).unwrap();

    let handle = TapeClient::builder("ordering_fallback", cassette_name)
        .install()
        .unwrap();

    // Consume both, then replay the first again via the fallback pass; the
    // second entry is still reachable afterwards.
    for (url, expected) in [
        (first, r#"{"n":1}"#),
        (second, r#"{"n":2}"#),
        (first, r#"{"n":1}"#),
        (second, r#"{"n":2}"#),
    ] {
        let mut resp = handle.intercept(get(url)).await.unwrap();
        assert_eq!(resp.body_string().await.unwrap(), expected);
    }
}

// Scenario: two POSTs to the same URL distinguished only by body.
#[tokio::test]
async fn body_matching_discriminates_same_url_posts() {
    use_scratch_root();
    let cassette_name = "ordering/body";
    let path = cassette::resolve_path(cassette_name);
    let url = "https://api.example.com/users";
    let alice = r#"{"name":"Alice"}"#;
    let bob = r#"{"name":"Bob"}"#;

    cassette::append(
        &path,
        &entry("POST", url, &body_hash(alice.as_bytes()), 201, r#"{"id":1}"#),
    )
    .unwrap();
    cassette::append(
        &path,
        &entry("POST", url, &body_hash(bob.as_bytes()), 201, r#"{"id":2}"#),
    )
    .unwrap();

    let handle = TapeClient::builder("ordering_body", cassette_name)
        .match_on(vec![MatcherTag::Method, MatcherTag::Uri, MatcherTag::Body])
        .install()
        .unwrap();

    // Out of file order on purpose: matching is by body, not position.
    let mut resp = handle.intercept(post(url, bob)).await.unwrap();
    assert_eq!(u16::from(resp.status()), 201);
    assert_eq!(resp.body_string().await.unwrap(), r#"{"id":2}"#);

    let mut resp = handle.intercept(post(url, alice)).await.unwrap();
    assert_eq!(resp.body_string().await.unwrap(), r#"{"id":1}"#);
}
