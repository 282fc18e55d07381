use syncwatch::SyncWatchError;
use syncwatch::ignore::{IgnoreMatcher, Pattern};

fn matcher(patterns: &[&str]) -> IgnoreMatcher {
    IgnoreMatcher::new(IgnoreMatcher::default_prefixes(), patterns).expect("patterns compile")
}

#[test]
fn empty_path_is_never_ignored() {
    let m = matcher(&[".*"]);
    assert!(!m.should_ignore(""));
}

#[test]
fn reserved_prefixes_are_ignored_anywhere_in_path() {
    let m = matcher(&[]);
    assert!(m.should_ignore(".stfolder"));
    assert!(m.should_ignore("photos/.stversions/img.jpg"));
    assert!(m.should_ignore("a/b/.syncthing.file.tmp"));
    assert!(!m.should_ignore("a/b/file.txt"));
}

#[test]
fn include_pattern_ignores_and_exception_keeps() {
    let m = matcher(&["\\.log$", "(?exclude)important\\.log$"]);

    assert!(m.should_ignore("var/debug.log"));
    assert!(!m.should_ignore("var/important.log"));
    assert!(!m.should_ignore("var/debug.txt"));
}

#[test]
fn exception_wins_regardless_of_order() {
    let m = matcher(&["(?exclude)^keep/", "^keep/", "^drop/"]);

    assert!(!m.should_ignore("keep/a"));
    assert!(m.should_ignore("drop/a"));
}

#[test]
fn exception_alone_ignores_nothing() {
    let m = matcher(&["(?exclude)anything"]);
    assert!(!m.should_ignore("anything"));
    assert!(!m.should_ignore("else"));
}

#[test]
fn later_include_is_checked_when_earlier_one_is_excepted() {
    // Exceptions apply to the path, not to a single include rule.
    let m = matcher(&["^a/", "(?exclude)^a/b", "b$"]);
    assert!(!m.should_ignore("a/b"));
    assert!(m.should_ignore("c/b"));
}

#[test]
fn malformed_pattern_is_rejected() {
    let err = IgnoreMatcher::new(IgnoreMatcher::default_prefixes(), &["ok", "(unclosed"])
        .expect_err("should fail");

    match err {
        SyncWatchError::Pattern { pattern, .. } => assert_eq!(pattern, "(unclosed"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn pattern_parse_reads_exclude_marker() {
    assert!(Pattern::parse("abc").unwrap().is_include());
    let exception = Pattern::parse("(?exclude)abc").unwrap();
    assert!(!exception.is_include());
    assert!(exception.is_match("xabcx"));
}
