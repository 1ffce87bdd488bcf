use std::fs;
use std::path::Path;

use stagededupe::duplicates::{DuplicateFinder, MatchType, ScanOptions};
use stagededupe::scanner::{build_records, Walker, WalkerConfig};
use tempfile::tempdir;

fn gradient(path: &Path, shift: u8) {
    let img = image::RgbImage::from_fn(64, 64, |x, y| {
        let v = (x as u8).wrapping_mul(4).wrapping_add(shift);
        image::Rgb([v, (y as u8).wrapping_mul(4), 128])
    });
    img.save(path).unwrap();
}

fn records_under(root: &Path) -> Vec<stagededupe::scanner::FileRecord> {
    let paths: Vec<_> = Walker::new(root, WalkerConfig::default())
        .walk()
        .map(Result::unwrap)
        .collect();
    let (records, errors) = build_records(&paths, None);
    assert!(errors.is_empty());
    records
}

#[test]
fn test_identical_files_group_exactly() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), b"duplicate").unwrap();
    fs::create_dir(dir.path().join("nested")).unwrap();
    fs::write(dir.path().join("nested").join("b.txt"), b"duplicate").unwrap();
    fs::write(dir.path().join("c.txt"), b"unique").unwrap();

    let records = records_under(dir.path());
    assert_eq!(records.len(), 3);

    let result = DuplicateFinder::with_defaults()
        .scan(records, ScanOptions::default())
        .unwrap();

    assert_eq!(result.groups.len(), 1);
    let group = &result.groups[0];
    assert_eq!(group.match_type(), Some(MatchType::Exact));
    let mut names = vec![
        group.keep_file.original_name.clone(),
        group.duplicates[0].file.original_name.clone(),
    ];
    names.sort();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
    assert_eq!(result.size_saved, 9);
}

#[test]
fn test_exact_match_claims_images_before_clustering() {
    let dir = tempdir().unwrap();
    gradient(&dir.path().join("photo.png"), 0);
    gradient(&dir.path().join("photo.bmp"), 0);
    gradient(&dir.path().join("other.png"), 0);
    fs::write(dir.path().join("notes.txt"), b"not an image").unwrap();

    let records = records_under(dir.path());
    let images = records.iter().filter(|r| r.is_image()).count();
    assert_eq!(images, 3);
    assert!(records
        .iter()
        .filter(|r| r.is_image())
        .all(|r| r.perceptual_hash.is_some() && r.width == Some(64)));

    let result = DuplicateFinder::with_defaults()
        .scan(records, ScanOptions::default())
        .unwrap();

    // photo.png and other.png are byte-identical; photo.bmp only looks the same
    let kinds: Vec<Option<MatchType>> = result.groups.iter().map(|g| g.match_type()).collect();
    assert_eq!(kinds, vec![Some(MatchType::Exact)]);
    assert_eq!(result.duplicates_found, 1);
}

#[test]
fn test_re_encoded_picture_groups_visually() {
    let dir = tempdir().unwrap();
    gradient(&dir.path().join("photo.png"), 0);
    gradient(&dir.path().join("photo.bmp"), 0);

    let result = DuplicateFinder::with_defaults()
        .scan(records_under(dir.path()), ScanOptions::default())
        .unwrap();

    assert_eq!(result.groups.len(), 1);
    let group = &result.groups[0];
    assert_eq!(group.match_type(), Some(MatchType::Visual));
    assert_eq!(group.duplicates[0].similarity, 1.0);
}

#[test]
fn test_empty_directory_is_no_input() {
    let dir = tempdir().unwrap();
    let records = records_under(dir.path());
    assert!(DuplicateFinder::with_defaults()
        .scan(records, ScanOptions::default())
        .is_err());
}
