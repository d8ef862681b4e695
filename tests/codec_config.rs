// The codec backend key is process-wide, so everything touching it lives in
// this one binary.

use http_tape::{cassette, codec, config, Entry, RecordedRequest, RecordedResponse, TapeError};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

fn entry() -> Entry {
    Entry {
        req: RecordedRequest {
            method: "GET".to_string(),
            url: "https://example.com/".to_string(),
            headers: BTreeMap::new(),
            body_hash: "-".to_string(),
        },
        resp: RecordedResponse::from_bytes(200, BTreeMap::new(), b"{}"),
    }
}

#[test]
fn backend_selection_and_custom_backends() {
    let root = tempfile::tempdir().unwrap();
    config::set_cassette_root(root.path());

    // An unconfigurable backend name is a configuration error, raised
    // cleanly from whatever operation first needs the codec.
    config::set_codec_backend("msgpack");
    let path = cassette::resolve_path("codec/no_backend");
    match cassette::append(&path, &entry()) {
        Err(TapeError::Config(message)) => assert!(message.contains("msgpack")),
        other => panic!("expected a config error, got {other:?}"),
    }
    config::set_codec_backend("serde_json");

    // A process-installed backend takes precedence over the configured name
    // and produces interchangeable JSON.
    #[derive(Debug)]
    struct UpperBackend;

    impl codec::JsonBackend for UpperBackend {
        fn name(&self) -> &str {
            "upper"
        }

        fn encode(&self, value: &Value) -> Result<String, http_tape::CodecError> {
            serde_json::to_string(value).map_err(http_tape::CodecError::from)
        }

        fn decode(&self, bytes: &[u8]) -> Result<Value, http_tape::CodecError> {
            serde_json::from_slice(bytes).map_err(http_tape::CodecError::from)
        }
    }

    codec::set_backend(Arc::new(UpperBackend));
    cassette::append(&path, &entry()).unwrap();
    let loaded = cassette::load(&path).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].req.url, "https://example.com/");

    codec::reset_backend();

    // The default backend reads what the custom one wrote.
    let reloaded = cassette::load(&path).unwrap();
    assert_eq!(reloaded.len(), 1);
}
