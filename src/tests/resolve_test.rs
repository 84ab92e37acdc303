use crate::resolve::PathResolver;
use std::fs;

fn fixture_root() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
    fs::create_dir(dir.path().join("docs")).unwrap();
    fs::write(dir.path().join("docs/page.html"), "<p>docs</p>").unwrap();
    dir
}

#[test]
fn construction_rejects_a_missing_root() {
    let err = PathResolver::new("/definitely/not/a/real/root", "index.html").unwrap_err();
    assert!(err.to_string().contains("/definitely/not/a/real/root"));
}

#[test]
fn construction_rejects_a_file_root() {
    let dir = fixture_root();
    let file = dir.path().join("index.html");
    assert!(PathResolver::new(&file, "index.html").is_err());
}

#[test]
fn resolves_plain_files_under_the_root() {
    let dir = fixture_root();
    let resolver = PathResolver::new(dir.path(), "index.html").unwrap();

    let resolved = resolver.resolve("docs/page.html").unwrap();
    assert!(resolved.ends_with("docs/page.html"));
    assert!(resolved.starts_with(resolver.root()));
}

#[test]
fn empty_and_trailing_slash_requests_get_the_default_file() {
    let dir = fixture_root();
    let resolver = PathResolver::new(dir.path(), "index.html").unwrap();

    assert!(resolver.resolve("").unwrap().ends_with("index.html"));
    assert!(resolver.resolve("/").unwrap().ends_with("index.html"));
    // No docs/index.html exists; the path is still safely under root.
    assert!(resolver.resolve("docs/").unwrap().ends_with("docs/index.html"));
}

#[test]
fn dot_dot_escapes_are_refused() {
    let dir = fixture_root();
    let resolver = PathResolver::new(dir.path(), "index.html").unwrap();

    assert_eq!(resolver.resolve("../etc/passwd"), None);
    assert_eq!(resolver.resolve("/../etc/passwd"), None);
    assert_eq!(resolver.resolve("docs/../../outside"), None);
}

#[test]
fn interior_dot_dot_that_stays_inside_is_fine() {
    let dir = fixture_root();
    let resolver = PathResolver::new(dir.path(), "index.html").unwrap();

    let resolved = resolver.resolve("docs/../index.html").unwrap();
    assert!(resolved.ends_with("index.html"));
    assert!(resolved.starts_with(resolver.root()));
}

#[test]
fn single_dots_and_double_slashes_collapse() {
    let dir = fixture_root();
    let resolver = PathResolver::new(dir.path(), "index.html").unwrap();

    let resolved = resolver.resolve("./docs//./page.html").unwrap();
    assert!(resolved.ends_with("docs/page.html"));
}

#[test]
fn missing_files_resolve_under_root_for_the_404_path() {
    let dir = fixture_root();
    let resolver = PathResolver::new(dir.path(), "index.html").unwrap();

    let resolved = resolver.resolve("nope.txt").unwrap();
    assert!(resolved.starts_with(dir.path().canonicalize().unwrap()));
    assert!(!resolved.exists());
}

#[test]
fn every_resolution_is_contained_in_the_root() {
    let dir = fixture_root();
    let resolver = PathResolver::new(dir.path(), "index.html").unwrap();

    for requested in [
        "", "/", "index.html", "docs/page.html", "docs/", "./index.html", "a/b/c",
        "..%2fescape", "...", "..hidden",
    ] {
        if let Some(resolved) = resolver.resolve(requested) {
            assert!(
                resolved.starts_with(resolver.root()),
                "`{requested}` resolved outside the root: {resolved:?}"
            );
        }
    }
}

#[cfg(unix)]
#[test]
fn symlinks_inside_the_root_are_allowed() {
    let dir = fixture_root();
    std::os::unix::fs::symlink(
        dir.path().join("docs/page.html"),
        dir.path().join("alias.html"),
    )
    .unwrap();

    let resolver = PathResolver::new(dir.path(), "index.html").unwrap();
    let resolved = resolver.resolve("alias.html").unwrap();
    assert!(resolved.starts_with(resolver.root()));
    assert!(resolved.ends_with("docs/page.html"));
}

#[cfg(unix)]
#[test]
fn symlinks_escaping_the_root_are_refused() {
    let outside = tempfile::tempdir().unwrap();
    fs::write(outside.path().join("secret.txt"), "secret").unwrap();

    let dir = fixture_root();
    std::os::unix::fs::symlink(
        outside.path().join("secret.txt"),
        dir.path().join("leak.txt"),
    )
    .unwrap();

    let resolver = PathResolver::new(dir.path(), "index.html").unwrap();
    assert_eq!(resolver.resolve("leak.txt"), None);
}
