use filecheck_core::cancel::CancelToken;
use filecheck_core::digest::DigestEngine;
use filecheck_core::ops::{self, CreateOptions, ValidateOptions};
use filecheck_core::progress::{NoProgress, ProgressReporter};
use filecheck_core::{Algorithm, Error, ErrorKind};
use std::cell::Cell;
use std::fs;
use std::path::Path;

fn create(root: &Path, algorithm: Algorithm, recursive: bool) -> ops::CreateSummary {
    let mut opts = CreateOptions::new(root, algorithm);
    opts.recursive = recursive;
    ops::create(&opts, &DigestEngine::default(), &NoProgress, &CancelToken::new()).unwrap()
}

fn validate(root: &Path) -> filecheck_core::reconcile::ReconciliationResult {
    ops::validate(&ValidateOptions::new(root), &DigestEngine::default(), &NoProgress, &CancelToken::new())
        .unwrap()
        .result
}

fn sample_tree(root: &Path) {
    fs::create_dir_all(root.join("nested/deep")).unwrap();
    fs::write(root.join("one.txt"), "first").unwrap();
    fs::write(root.join("two.bin"), vec![7u8; 70_000]).unwrap();
    fs::write(root.join("nested/three.txt"), "third").unwrap();
    fs::write(root.join("nested/deep/four.txt"), "fourth").unwrap();
}

#[test]
fn concrete_scenario() {
    let td = tempfile::tempdir().unwrap();
    let root = td.path();
    fs::create_dir(root.join("b")).unwrap();
    fs::write(root.join("a.txt"), "hello").unwrap();
    fs::write(root.join("b/c.txt"), "world").unwrap();

    let summary = create(root, Algorithm::Sha256, true);
    assert_eq!(summary.entries, 2);
    assert_eq!(summary.manifest, root.join("manifest.sha256"));

    let world = DigestEngine::default().hash_reader(&b"world"[..], Algorithm::Sha256).unwrap();
    let text = fs::read_to_string(root.join("manifest.sha256")).unwrap();
    let mut lines: Vec<&str> = text.lines().collect();
    lines.sort();
    assert_eq!(
        lines,
        vec![
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824 *./a.txt".to_string(),
            format!("{world} *./b/c.txt"),
        ]
    );

    fs::remove_file(root.join("a.txt")).unwrap();
    fs::write(root.join("b/c.txt"), "world!").unwrap();
    fs::write(root.join("d.txt"), "x").unwrap();

    let r = validate(root);
    assert_eq!(r.missing, vec!["./a.txt"]);
    assert_eq!(r.incorrect, vec!["./b/c.txt"]);
    assert_eq!(r.additional, vec!["./d.txt"]);
    assert!(r.correct.is_empty());
}

#[test]
fn unchanged_tree_is_all_correct() {
    let td = tempfile::tempdir().unwrap();
    sample_tree(td.path());
    let summary = create(td.path(), Algorithm::Md5, true);
    assert_eq!(summary.entries, 4);

    let r = validate(td.path());
    let mut correct = r.correct.clone();
    correct.sort();
    assert_eq!(
        correct,
        vec!["./nested/deep/four.txt", "./nested/three.txt", "./one.txt", "./two.bin"]
    );
    assert!(r.is_clean());
}

#[test]
fn mutation_deletion_addition_are_isolated() {
    let td = tempfile::tempdir().unwrap();
    let root = td.path();
    sample_tree(root);
    create(root, Algorithm::Sha1, true);

    fs::write(root.join("two.bin"), vec![8u8; 70_000]).unwrap();
    fs::remove_file(root.join("nested/three.txt")).unwrap();
    fs::write(root.join("nested/five.txt"), "new").unwrap();

    let r = validate(root);
    assert_eq!(r.incorrect, vec!["./two.bin"]);
    assert_eq!(r.missing, vec!["./nested/three.txt"]);
    assert_eq!(r.additional, vec!["./nested/five.txt"]);
    let mut correct = r.correct.clone();
    correct.sort();
    assert_eq!(correct, vec!["./nested/deep/four.txt", "./one.txt"]);
}

#[test]
fn flat_manifest_reports_nested_files_as_additional() {
    let td = tempfile::tempdir().unwrap();
    sample_tree(td.path());
    let summary = create(td.path(), Algorithm::Sha256, false);
    assert_eq!(summary.entries, 2);

    let r = validate(td.path());
    let mut correct = r.correct.clone();
    correct.sort();
    assert_eq!(correct, vec!["./one.txt", "./two.bin"]);
    let mut additional = r.additional.clone();
    additional.sort();
    assert_eq!(additional, vec!["./nested/deep/four.txt", "./nested/three.txt"]);
}

#[test]
fn repeated_validation_is_identical() {
    let td = tempfile::tempdir().unwrap();
    sample_tree(td.path());
    create(td.path(), Algorithm::Blake3, true);
    fs::write(td.path().join("extra.txt"), "e").unwrap();
    fs::write(td.path().join("one.txt"), "changed").unwrap();

    let first = validate(td.path());
    let second = validate(td.path());
    assert_eq!(first, second);
}

#[test]
fn formats_limit_what_is_recorded() {
    let td = tempfile::tempdir().unwrap();
    sample_tree(td.path());
    let mut opts = CreateOptions::new(td.path(), Algorithm::Md5);
    opts.recursive = true;
    opts.formats = Some(vec!["txt".into()]);
    let s = ops::create(&opts, &DigestEngine::default(), &NoProgress, &CancelToken::new()).unwrap();
    assert_eq!(s.entries, 3);

    let r = validate(td.path());
    assert_eq!(r.additional, vec!["./two.bin"]);
    assert_eq!(r.correct.len(), 3);
}

#[test]
fn explicit_manifest_inside_root_is_not_self_included() {
    let td = tempfile::tempdir().unwrap();
    sample_tree(td.path());
    let sums = td.path().join("SUMS.txt");
    let mut opts = CreateOptions::new(td.path(), Algorithm::Sha256);
    opts.manifest = Some(sums.clone());
    let s = ops::create(&opts, &DigestEngine::default(), &NoProgress, &CancelToken::new()).unwrap();
    assert_eq!(s.entries, 2);

    // extension "txt" names no algorithm
    let mut vopts = ValidateOptions::new(td.path());
    vopts.manifest = Some(sums.clone());
    let err = ops::validate(&vopts, &DigestEngine::default(), &NoProgress, &CancelToken::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    vopts.algorithm = Some(Algorithm::Sha256);
    let out = ops::validate(&vopts, &DigestEngine::default(), &NoProgress, &CancelToken::new())
        .unwrap();
    assert!(!out.result.additional.contains(&"./SUMS.txt".to_string()));
    assert_eq!(out.result.correct.len(), 2);
}

#[test]
fn disabled_algorithm_touches_nothing() {
    let td = tempfile::tempdir().unwrap();
    sample_tree(td.path());
    let engine = DigestEngine::new(&[Algorithm::Sha256]);
    let opts = CreateOptions::new(td.path(), Algorithm::Md5);
    let err = ops::create(&opts, &engine, &NoProgress, &CancelToken::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(!td.path().join("manifest.md5").exists());
}

#[test]
fn malformed_manifest_aborts_validation() {
    let td = tempfile::tempdir().unwrap();
    sample_tree(td.path());
    fs::write(td.path().join("manifest.md5"), "abc *./one.txt\nno-separator\n").unwrap();
    let err = ops::validate(
        &ValidateOptions::new(td.path()),
        &DigestEngine::default(),
        &NoProgress,
        &CancelToken::new(),
    )
    .unwrap_err();
    match err {
        Error::Parse { line, .. } => assert_eq!(line, 2),
        other => panic!("unexpected: {other}"),
    }
}

#[cfg(unix)]
#[test]
fn unreadable_tracked_file_aborts_validation() {
    use std::os::unix::fs::PermissionsExt;
    let td = tempfile::tempdir().unwrap();
    sample_tree(td.path());
    create(td.path(), Algorithm::Md5, false);
    let p = td.path().join("one.txt");
    fs::set_permissions(&p, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::File::open(&p).is_ok() {
        fs::set_permissions(&p, fs::Permissions::from_mode(0o644)).unwrap();
        eprintln!("skipped: permission bits are not enforced for this user (running as root?)");
        return;
    }
    let res = ops::validate(
        &ValidateOptions::new(td.path()),
        &DigestEngine::default(),
        &NoProgress,
        &CancelToken::new(),
    );
    fs::set_permissions(&p, fs::Permissions::from_mode(0o644)).unwrap();
    assert_eq!(res.unwrap_err().kind(), ErrorKind::FileAccess);
}

#[test]
fn vanished_tracked_file_is_missing_not_an_error() {
    let td = tempfile::tempdir().unwrap();
    sample_tree(td.path());
    create(td.path(), Algorithm::Md5, true);
    fs::remove_dir_all(td.path().join("nested")).unwrap();
    let r = validate(td.path());
    let mut missing = r.missing.clone();
    missing.sort();
    assert_eq!(missing, vec!["./nested/deep/four.txt", "./nested/three.txt"]);
    assert_eq!(r.correct.len(), 2);
}

#[cfg(unix)]
#[test]
fn backslash_in_name_round_trips() {
    let td = tempfile::tempdir().unwrap();
    fs::create_dir(td.path().join("sub")).unwrap();
    fs::write(td.path().join("a\\b.txt"), "ab").unwrap();
    fs::write(td.path().join("sub/c\\d.txt"), "cd").unwrap();
    let s = create(td.path(), Algorithm::Sha256, true);
    assert_eq!(s.entries, 2);

    let text = fs::read_to_string(td.path().join("manifest.sha256")).unwrap();
    assert!(text.contains(" *./a\\b.txt\n"), "{text}");
    assert!(text.contains(" *./sub/c\\d.txt\n"), "{text}");

    let r = validate(td.path());
    assert!(r.is_clean(), "{r:?}");
    let mut correct = r.correct.clone();
    correct.sort();
    assert_eq!(correct, vec!["./a\\b.txt", "./sub/c\\d.txt"]);
}

#[cfg(target_os = "linux")]
#[test]
fn non_utf8_name_is_left_out_of_both_sides() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    let td = tempfile::tempdir().unwrap();
    sample_tree(td.path());
    fs::write(td.path().join(OsStr::from_bytes(b"caf\xe9.txt")), "latin-1").unwrap();
    let s = create(td.path(), Algorithm::Md5, true);
    assert_eq!(s.entries, 4);

    let mf = filecheck_core::manifest::read_manifest(&td.path().join("manifest.md5"), None)
        .unwrap();
    assert!(mf.entries().iter().all(|e| !e.rel_path.contains('\u{fffd}')));

    let r = validate(td.path());
    assert!(r.is_clean(), "{r:?}");
    assert_eq!(r.correct.len(), 4);
}

#[test]
fn extra_exclusions_stay_out_of_the_snapshot() {
    let td = tempfile::tempdir().unwrap();
    sample_tree(td.path());
    create(td.path(), Algorithm::Md5, true);
    let reports = td.path().join("reports");
    fs::create_dir(&reports).unwrap();
    fs::write(reports.join("correct.txt"), "./one.txt\n").unwrap();
    fs::write(reports.join("other.txt"), "x").unwrap();

    let mut opts = ValidateOptions::new(td.path());
    opts.exclude = vec![reports.join("correct.txt")];
    let out = ops::validate(&opts, &DigestEngine::default(), &NoProgress, &CancelToken::new())
        .unwrap();
    assert_eq!(out.result.additional, vec!["./reports/other.txt"]);
    assert_eq!(out.result.correct.len(), 4);
}

struct CancelAfter {
    token: CancelToken,
    after: usize,
    seen: Cell<usize>,
}

impl ProgressReporter for CancelAfter {
    fn advance(&self, _rel_path: &str) {
        self.seen.set(self.seen.get() + 1);
        if self.seen.get() >= self.after {
            self.token.cancel();
        }
    }
}

#[test]
fn cancelled_create_leaves_valid_prefix() {
    let td = tempfile::tempdir().unwrap();
    sample_tree(td.path());
    let token = CancelToken::new();
    let progress = CancelAfter { token: token.clone(), after: 1, seen: Cell::new(0) };
    let mut opts = CreateOptions::new(td.path(), Algorithm::Sha256);
    opts.recursive = true;
    let err = ops::create(&opts, &DigestEngine::default(), &progress, &token).unwrap_err();
    assert!(matches!(err, Error::Cancelled));

    let mf = filecheck_core::manifest::read_manifest(&td.path().join("manifest.sha256"), None)
        .unwrap();
    assert_eq!(mf.len(), 1);

    // the partial manifest validates: its single entry is correct, the rest additional
    let r = validate(td.path());
    assert_eq!(r.correct.len(), 1);
    assert_eq!(r.additional.len(), 3);
}

#[test]
fn create_overwrites_previous_manifest() {
    let td = tempfile::tempdir().unwrap();
    sample_tree(td.path());
    create(td.path(), Algorithm::Md5, true);
    fs::remove_file(td.path().join("nested/deep/four.txt")).unwrap();
    let s = create(td.path(), Algorithm::Md5, true);
    assert_eq!(s.entries, 3);
    assert!(validate(td.path()).is_clean());
}

#[test]
fn reconcile_directly_from_read_manifest() {
    let td = tempfile::tempdir().unwrap();
    sample_tree(td.path());
    create(td.path(), Algorithm::Sha512, true);
    fs::write(td.path().join("nested/deep/four.txt"), "FOURTH").unwrap();

    let mf = filecheck_core::manifest::read_manifest(&td.path().join("manifest.sha512"), None)
        .unwrap();
    let r = filecheck_core::reconcile::reconcile(&mf, td.path()).unwrap();
    assert_eq!(r.incorrect, vec!["./nested/deep/four.txt"]);
    assert_eq!(r.correct.len(), 3);
    assert!(r.missing.is_empty() && r.additional.is_empty());
}
