use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use stagededupe::duplicates::{
    DropReason, DuplicateFinder, FinderConfig, FinderError, MatchType, ScanDiagnostic,
    ScanOptions, ScanResult, CONTENT_GROUP_REASON, EXACT_GROUP_REASON, VISUAL_GROUP_REASON,
};
use stagededupe::oracle::OracleError;
use stagededupe::scanner::FileRecord;

use super::support::{document, image, oracle_group, record, ScriptedOracle};

fn scan_with(oracle: Arc<ScriptedOracle>, records: Vec<FileRecord>) -> ScanResult {
    DuplicateFinder::new(FinderConfig::default().with_oracle(oracle))
        .scan(records, ScanOptions::default())
        .unwrap()
}

fn assert_partition(result: &ScanResult) {
    let mut seen = HashSet::new();
    for group in &result.groups {
        for id in group.member_ids() {
            assert!(seen.insert(id.to_string()), "{id} appears in two groups");
        }
    }
}

#[test]
fn test_exact_three_identical_files() {
    let records = vec![
        record("r2", "same", "text/plain", 20, 300),
        record("r0", "same", "text/plain", 0, 300),
        record("r1", "same", "text/plain", 10, 300),
    ];

    let result = DuplicateFinder::with_defaults()
        .scan(records, ScanOptions::default())
        .unwrap();

    assert_eq!(result.groups.len(), 1);
    let group = &result.groups[0];
    assert_eq!(group.group_index, 0);
    assert_eq!(group.keep_file.id, "r0");
    assert_eq!(group.reason, EXACT_GROUP_REASON);
    assert_eq!(group.duplicates.len(), 2);
    for dup in &group.duplicates {
        assert_eq!(dup.similarity, 1.0);
        assert_eq!(dup.match_type, MatchType::Exact);
        assert_eq!(dup.reason, "Identical file hash");
    }
    assert_eq!(group.total_size_saved, 600);
    assert_eq!(result.duplicates_found, 2);
    assert_eq!(result.size_saved, 600);
}

#[test]
fn test_perceptual_two_bits_apart() {
    let records = vec![
        image("p1", "ffffffffffffffff", 0),
        image("p2", "fffffffffffffffc", 5),
    ];

    let result = DuplicateFinder::with_defaults()
        .scan(records, ScanOptions::default())
        .unwrap();

    assert_eq!(result.groups.len(), 1);
    let group = &result.groups[0];
    assert_eq!(group.reason, VISUAL_GROUP_REASON);
    assert_eq!(group.keep_file.id, "p1");
    assert_eq!(group.duplicates[0].similarity, 0.96875);
    assert_eq!(group.duplicates[0].match_type, MatchType::Visual);
    assert_eq!(group.duplicates[0].reason, "Visually similar image");
}

#[test]
fn test_threshold_is_inclusive() {
    // 8 of 64 bits differ: similarity exactly 0.875
    let records = || {
        vec![
            image("a", "0000000000000000", 0),
            image("b", "00000000000000ff", 1),
        ]
    };
    let finder = DuplicateFinder::with_defaults();

    let at = finder
        .scan(records(), ScanOptions::default().with_similarity_threshold(0.875))
        .unwrap();
    assert_eq!(at.groups.len(), 1);
    assert_eq!(at.groups[0].duplicates[0].similarity, 0.875);

    let above = finder
        .scan(records(), ScanOptions::default().with_similarity_threshold(0.9))
        .unwrap();
    assert!(above.groups.is_empty());
}

#[test]
fn test_images_of_different_hash_length_never_match() {
    let records = vec![image("a", "00000000", 0), image("b", "0000000000000000", 1)];
    let result = DuplicateFinder::with_defaults()
        .scan(records, ScanOptions::default().with_similarity_threshold(0.5))
        .unwrap();
    assert!(result.groups.is_empty());
}

#[test]
fn test_records_without_perceptual_hash_are_left_out() {
    let mut broken = image("b", "0000000000000000", 1);
    broken.perceptual_hash = None;
    let records = vec![image("a", "0000000000000000", 0), broken];

    let result = DuplicateFinder::with_defaults()
        .scan(records, ScanOptions::default())
        .unwrap();
    assert!(result.groups.is_empty());
}

#[test]
fn test_stages_share_one_index_sequence() {
    let oracle = ScriptedOracle::answering(vec![oracle_group("d1", &[("d2", 0.91)])]);
    let records = vec![
        record("e1", "x", "text/plain", 0, 10),
        record("e2", "x", "text/plain", 1, 10),
        image("i1", "0000000000000000", 0),
        image("i2", "0000000000000001", 1),
        document("d1", 0),
        document("d2", 1),
    ];

    let result = scan_with(oracle, records);

    let summary: Vec<(usize, &str, &str)> = result
        .groups
        .iter()
        .map(|g| (g.group_index, g.keep_file.id.as_str(), g.reason.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (0, "e1", EXACT_GROUP_REASON),
            (1, "i1", VISUAL_GROUP_REASON),
            (2, "d1", CONTENT_GROUP_REASON),
        ]
    );
    assert_eq!(result.groups[2].duplicates[0].reason, "Semantic similarity: 0.910");
    assert_eq!(result.duplicates_found, 3);
    assert_eq!(result.size_saved, 10 + 1_000 + 500);
    assert_partition(&result);
}

#[test]
fn test_exact_duplicates_of_images_are_not_reclustered() {
    let mut a = image("a", "0000000000000000", 0);
    let mut b = image("b", "0000000000000000", 1);
    a.hash_sha256 = "same".into();
    b.hash_sha256 = "same".into();
    let c = image("c", "0000000000000001", 2);

    let result = DuplicateFinder::with_defaults()
        .scan(vec![a, b, c], ScanOptions::default())
        .unwrap();

    // c has no unclaimed peer left for the perceptual stage
    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].match_type(), Some(MatchType::Exact));
    assert_partition(&result);
}

#[test]
fn test_oracle_cannot_regroup_claimed_files() {
    let oracle = ScriptedOracle::answering(vec![
        oracle_group("e1", &[("d1", 0.95)]),
        oracle_group("d1", &[("d2", 0.92)]),
    ]);
    let records = vec![
        record("e1", "x", "text/plain", 0, 10),
        record("e2", "x", "text/plain", 1, 10),
        document("d1", 0),
        document("d2", 1),
    ];

    let result = scan_with(oracle, records);

    assert_eq!(result.groups.len(), 2);
    assert_eq!(result.groups[1].keep_file.id, "d1");
    assert_eq!(
        result.diagnostics,
        vec![ScanDiagnostic::OracleGroupDropped {
            keep_file_id: "e1".into(),
            reason: DropReason::UnknownId,
            ids: vec!["e1".into(), "d1".into()],
        }]
    );
    assert_partition(&result);
}

#[test]
fn test_oracle_timeout_keeps_earlier_stages() {
    let oracle = ScriptedOracle::failing(OracleError::Timeout("no response within 300s".into()));
    let records = vec![
        record("e1", "x", "text/plain", 0, 10),
        record("e2", "x", "text/plain", 1, 10),
        image("i1", "0000000000000000", 0),
        image("i2", "0000000000000001", 1),
        document("d1", 0),
        document("d2", 1),
    ];

    let result = scan_with(oracle.clone(), records);

    assert_eq!(oracle.call_count(), 1);
    assert_eq!(result.groups.len(), 2);
    assert!(result
        .groups
        .iter()
        .all(|g| g.match_type() != Some(MatchType::Content)));
    assert_eq!(
        result.diagnostics,
        vec![ScanDiagnostic::OracleTimeout {
            message: "no response within 300s".into()
        }]
    );
    assert_eq!(result.total_files, 6);
}

#[test]
fn test_disabled_content_stage_never_calls_oracle() {
    let oracle = ScriptedOracle::answering(vec![oracle_group("d1", &[("d2", 0.99)])]);
    let records = vec![document("d1", 0), document("d2", 1), image("i1", "ff", 0)];

    let result = DuplicateFinder::new(FinderConfig::default().with_oracle(oracle.clone()))
        .scan(records, ScanOptions::default().with_content_scanning(false))
        .unwrap();

    assert_eq!(oracle.call_count(), 0);
    assert!(result.groups.is_empty());
    assert!(result.diagnostics.is_empty());
}

#[test]
fn test_content_stage_needs_two_unclaimed_files() {
    let oracle = ScriptedOracle::answering(Vec::new());
    let records = vec![
        record("a", "x", "text/plain", 0, 1),
        record("b", "x", "text/plain", 1, 1),
        document("c", 0),
    ];

    scan_with(oracle.clone(), records);
    assert_eq!(oracle.call_count(), 0);
}

#[test]
fn test_no_duplicates() {
    let oracle = ScriptedOracle::answering(Vec::new());
    let records = vec![
        record("a", "1", "text/plain", 0, 5),
        record("b", "2", "text/plain", 0, 5),
        image("c", "0000000000000000", 0),
        image("d", "ffffffffffffffff", 0),
    ];

    let result = scan_with(oracle, records);

    assert!(result.groups.is_empty());
    assert_eq!(result.total_files, 4);
    assert_eq!(result.duplicates_found, 0);
    assert_eq!(result.size_saved, 0);
    assert!(result.scan_time >= 0.0);
}

#[test]
fn test_input_errors() {
    let finder = DuplicateFinder::with_defaults();
    assert_eq!(
        finder.scan(Vec::new(), ScanOptions::default()),
        Err(FinderError::NoInput)
    );
    assert_eq!(
        finder.scan(
            vec![document("a", 0)],
            ScanOptions::default().with_similarity_threshold(1.5)
        ),
        Err(FinderError::InvalidThreshold(1.5))
    );
    assert_eq!(
        finder.scan(vec![document("a", 0), document("a", 1)], ScanOptions::default()),
        Err(FinderError::DuplicateRecordId("a".into()))
    );
}

#[test]
fn test_input_order_does_not_matter() {
    let records = vec![
        record("e1", "x", "text/plain", 3, 10),
        image("i3", "0000000000000003", 0),
        record("e2", "x", "text/plain", 3, 10),
        image("i1", "0000000000000000", 9),
        image("i2", "000000000000000f", 4),
        record("e3", "y", "text/plain", 0, 10),
    ];
    let mut reversed = records.clone();
    reversed.reverse();

    let finder = DuplicateFinder::with_defaults();
    let shape = |result: ScanResult| -> Vec<(usize, String, Vec<(String, u64)>)> {
        result
            .groups
            .into_iter()
            .map(|g| {
                (
                    g.group_index,
                    g.keep_file.id,
                    g.duplicates
                        .into_iter()
                        .map(|d| (d.file.id, d.similarity.to_bits()))
                        .collect(),
                )
            })
            .collect()
    };

    let forward = shape(finder.scan(records, ScanOptions::default()).unwrap());
    let backward = shape(finder.scan(reversed, ScanOptions::default()).unwrap());
    assert_eq!(forward, backward);
    assert_eq!(forward.len(), 2);
}

#[test]
fn test_shutdown_during_oracle_call_returns_partial_result() {
    let flag = Arc::new(AtomicBool::new(false));
    let oracle = ScriptedOracle::slow(Duration::from_secs(5));
    let finder = DuplicateFinder::new(
        FinderConfig::default()
            .with_oracle(oracle)
            .with_shutdown_flag(Arc::clone(&flag)),
    );
    let records = vec![
        record("e1", "x", "text/plain", 0, 10),
        record("e2", "x", "text/plain", 1, 10),
        document("d1", 0),
        document("d2", 1),
    ];

    let setter = Arc::clone(&flag);
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(150));
        setter.store(true, Ordering::SeqCst);
    });

    let start = Instant::now();
    let result = finder.scan(records, ScanOptions::default()).unwrap();
    assert!(start.elapsed() < Duration::from_secs(4));
    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.diagnostics, vec![ScanDiagnostic::OracleCancelled]);
}

#[test]
fn test_scans_are_independent() {
    let finder = DuplicateFinder::with_defaults();
    let records = vec![
        record("a", "x", "text/plain", 0, 1),
        record("b", "x", "text/plain", 1, 1),
    ];

    let first = finder.scan(records.clone(), ScanOptions::default()).unwrap();
    let second = finder.scan(records, ScanOptions::default()).unwrap();

    assert_eq!(first.groups[0].group_index, 0);
    assert_eq!(second.groups[0].group_index, 0);
    assert_ne!(first.groups[0].id, second.groups[0].id);
}
