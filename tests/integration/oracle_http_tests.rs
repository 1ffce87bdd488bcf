use std::sync::Arc;
use std::time::{Duration, Instant};

use stagededupe::duplicates::{
    DuplicateFinder, FinderConfig, MatchType, ScanDiagnostic, ScanOptions,
};
use stagededupe::oracle::{
    HttpSimilarityOracle, OracleError, OracleFile, OracleRequest, SimilarityOracle,
};

use super::support::{closed_port_url, document, record, serve_once, serve_silence};

fn request() -> OracleRequest {
    OracleRequest {
        files: vec![
            OracleFile {
                id: "a".into(),
                path: "/uploads/a.pdf".into(),
                mime_type: "application/pdf".into(),
                size: 10,
            },
            OracleFile {
                id: "b".into(),
                path: "/uploads/b.pdf".into(),
                mime_type: "application/pdf".into(),
                size: 12,
            },
        ],
        similarity_threshold: 0.85,
    }
}

#[test]
fn test_successful_call_round_trip() {
    let (url, server) = serve_once(
        "200 OK",
        r#"{"groups":[{"keep_file_id":"a","similar_files":[{"id":"b","similarity":0.93,"reason":"Semantic similarity: 0.930"}],"all_files":[]}]}"#,
    );
    let oracle = HttpSimilarityOracle::new(&url, Duration::from_secs(5)).unwrap();

    let response = oracle.find_similar(&request()).unwrap();
    assert_eq!(response.groups.len(), 1);
    assert_eq!(response.groups[0].similar_files[0].similarity, 0.93);

    let body: serde_json::Value = serde_json::from_str(&server.join().unwrap()).unwrap();
    assert_eq!(body["similarity_threshold"], 0.85);
    assert_eq!(body["files"][1]["path"], "/uploads/b.pdf");
    assert_eq!(body["files"][1]["size"], 12);
}

#[test]
fn test_timeout_is_reported_as_timeout() {
    let url = serve_silence(Duration::from_secs(3));
    let oracle = HttpSimilarityOracle::new(&url, Duration::from_millis(300)).unwrap();

    let start = Instant::now();
    let err = oracle.find_similar(&request()).unwrap_err();
    assert!(matches!(err, OracleError::Timeout(_)), "got {err:?}");
    assert!(start.elapsed() < Duration::from_secs(3));
}

#[test]
fn test_refused_connection_is_unavailable() {
    let oracle = HttpSimilarityOracle::new(&closed_port_url(), Duration::from_secs(2)).unwrap();
    let err = oracle.find_similar(&request()).unwrap_err();
    assert!(matches!(err, OracleError::Unavailable(_)), "got {err:?}");
}

#[test]
fn test_error_status_is_unavailable() {
    let (url, _server) = serve_once("503 Service Unavailable", r#"{"detail":"model loading"}"#);
    let oracle = HttpSimilarityOracle::new(&url, Duration::from_secs(5)).unwrap();

    match oracle.find_similar(&request()).unwrap_err() {
        OracleError::Unavailable(message) => {
            assert!(message.contains("503"));
            assert!(message.contains("model loading"));
        }
        other => panic!("expected Unavailable, got {other:?}"),
    }
}

#[test]
fn test_garbage_body_is_malformed() {
    let (url, _server) = serve_once("200 OK", "hello");
    let oracle = HttpSimilarityOracle::new(&url, Duration::from_secs(5)).unwrap();
    let err = oracle.find_similar(&request()).unwrap_err();
    assert!(matches!(err, OracleError::Malformed(_)), "got {err:?}");
}

#[test]
fn test_wrong_shape_is_malformed() {
    let (url, _server) = serve_once("200 OK", r#"{"groups":[{"keep_file_id":1}]}"#);
    let oracle = HttpSimilarityOracle::new(&url, Duration::from_secs(5)).unwrap();
    let err = oracle.find_similar(&request()).unwrap_err();
    assert!(matches!(err, OracleError::Malformed(_)), "got {err:?}");
}

#[test]
fn test_scan_against_live_stub() {
    let (url, server) = serve_once(
        "200 OK",
        r#"{"groups":[{"keep_file_id":"d1","similar_files":[{"id":"d2","similarity":0.9,"reason":"Semantic similarity: 0.900"}]}]}"#,
    );
    let oracle = HttpSimilarityOracle::new(&url, Duration::from_secs(5)).unwrap();
    let finder = DuplicateFinder::new(
        FinderConfig::default()
            .with_oracle(Arc::new(oracle))
            .with_storage_root("/srv/uploads"),
    );
    let records = vec![
        record("e1", "x", "text/plain", 0, 10),
        record("e2", "x", "text/plain", 1, 10),
        document("d1", 0),
        document("d2", 1),
    ];

    let result = finder.scan(records, ScanOptions::default()).unwrap();

    assert_eq!(result.groups.len(), 2);
    assert_eq!(result.groups[1].match_type(), Some(MatchType::Content));
    assert_eq!(result.groups[1].group_index, 1);

    let body: serde_json::Value = serde_json::from_str(&server.join().unwrap()).unwrap();
    let ids: Vec<&str> = body["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["d1", "d2"]);
    let expected_path = std::path::Path::new("/srv/uploads").join("d1.dat");
    assert_eq!(body["files"][0]["path"], expected_path.to_string_lossy().as_ref());
}

#[test]
fn test_scan_with_unreachable_oracle_still_succeeds() {
    let oracle = HttpSimilarityOracle::new(&closed_port_url(), Duration::from_secs(2)).unwrap();
    let finder = DuplicateFinder::new(FinderConfig::default().with_oracle(Arc::new(oracle)));
    let records = vec![
        record("e1", "x", "text/plain", 0, 10),
        record("e2", "x", "text/plain", 1, 10),
        document("d1", 0),
        document("d2", 1),
    ];

    let result = finder.scan(records, ScanOptions::default()).unwrap();

    assert_eq!(result.groups.len(), 1);
    assert!(matches!(
        result.diagnostics.as_slice(),
        [ScanDiagnostic::OracleUnavailable { .. }]
    ));
}
