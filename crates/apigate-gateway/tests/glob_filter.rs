#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use apigate_gateway::policy::glob::{expand_alternatives, has_glob_metasyntax};
use apigate_gateway::policy::{GlobFilter, GlobVerdict};

fn globs(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

#[test]
fn blacklist_wins_over_whitelist() {
    let f = GlobFilter::compile(&globs(&["/etc/*"]), &globs(&["/etc/*"]), true).unwrap();
    assert_eq!(f.evaluate("/etc/passwd"), GlobVerdict::Blacklisted);
    assert!(!f.includes("/etc/passwd"));
}

#[test]
fn non_empty_whitelist_requires_match() {
    let f = GlobFilter::compile(&globs(&["/etc/shadow"]), &globs(&["/home/**"]), true).unwrap();
    assert_eq!(f.evaluate("/var/log/syslog"), GlobVerdict::NotWhitelisted);
    assert_eq!(f.evaluate("/home/alice/notes.txt"), GlobVerdict::Included);
}

#[test]
fn empty_whitelist_is_noop() {
    let f = GlobFilter::compile(&globs(&["/etc/shadow"]), &[], true).unwrap();
    assert!(f.includes("/var/log/syslog"));
    assert!(!f.includes("/etc/shadow"));

    let open = GlobFilter::compile(&[], &[], true).unwrap();
    assert!(open.is_noop());
    assert!(open.includes("/anything/at/all"));
}

#[test]
fn single_star_stays_within_segment() {
    let f = GlobFilter::compile(&[], &globs(&["/home/*/notes.txt"]), true).unwrap();
    assert!(f.includes("/home/alice/notes.txt"));
    assert!(!f.includes("/home/alice/sub/notes.txt"));

    let top = GlobFilter::compile(&[], &globs(&["/tmp/*"]), true).unwrap();
    assert!(top.includes("/tmp/a.bin"));
    assert!(!top.includes("/tmp/dir/a.bin"));
}

#[test]
fn double_star_crosses_segments() {
    let f = GlobFilter::compile(&[], &globs(&["/home/**/*.txt"]), true).unwrap();
    assert!(f.includes("/home/notes.txt"));
    assert!(f.includes("/home/alice/notes.txt"));
    assert!(f.includes("/home/alice/deep/er/notes.txt"));
    assert!(!f.includes("/home/alice/notes.doc"));
}

#[test]
fn question_mark_and_classes() {
    let f = GlobFilter::compile(&globs(&["/var/log/auth.log.[0-9]"]), &[], true).unwrap();
    assert!(!f.includes("/var/log/auth.log.3"));
    assert!(f.includes("/var/log/auth.log.x"));

    let q = GlobFilter::compile(&[], &globs(&["/dev/sd?"]), true).unwrap();
    assert!(q.includes("/dev/sda"));
    assert!(!q.includes("/dev/sda1"));
}

#[test]
fn case_sensitivity_is_configurable() {
    let strict = GlobFilter::compile(&globs(&["/Windows/**"]), &[], true).unwrap();
    assert!(strict.includes("/windows/system32/config/SAM"));

    let relaxed = GlobFilter::compile(&globs(&["/Windows/**"]), &[], false).unwrap();
    assert!(!relaxed.includes("/windows/system32/config/SAM"));
}

#[test]
fn alternatives_expand_before_matching() {
    let f = GlobFilter::compile(&globs(&["/home/{alice,bob}/.ssh/**"]), &[], true).unwrap();
    assert!(!f.includes("/home/alice/.ssh/id_rsa"));
    assert!(!f.includes("/home/bob/.ssh/id_rsa"));
    assert!(f.includes("/home/carol/.ssh/id_rsa"));

    let mut out = expand_alternatives("/a/{b,c{d,e}}/*.{x,y}").unwrap();
    out.sort();
    assert_eq!(
        out,
        vec!["/a/b/*.x", "/a/b/*.y", "/a/cd/*.x", "/a/cd/*.y", "/a/ce/*.x", "/a/ce/*.y"]
    );
}

#[test]
fn braces_inside_class_are_literal() {
    assert_eq!(expand_alternatives("/x/[{]y").unwrap(), vec!["/x/[{]y"]);
}

#[test]
fn invalid_globs_are_rejected() {
    assert!(GlobFilter::compile(&globs(&["/a/{b,c"]), &[], true).is_err());
    assert!(GlobFilter::compile(&globs(&["/a/b}"]), &[], true).is_err());
    assert!(GlobFilter::compile(&[], &globs(&["/a/**b"]), true).is_err());
}

#[test]
fn metasyntax_detection() {
    assert!(has_glob_metasyntax("/home/*/x"));
    assert!(has_glob_metasyntax("/home/**"));
    assert!(has_glob_metasyntax("/dev/sd?"));
    assert!(has_glob_metasyntax("/a/[ab]"));
    assert!(has_glob_metasyntax("/a/{b,c}"));
    assert!(!has_glob_metasyntax("/etc/passwd"));
    assert!(!has_glob_metasyntax("%%users.homedir%%/x"));
}
