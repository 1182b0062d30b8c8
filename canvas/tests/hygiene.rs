//! Hygiene: enforces coding standards at test time
//!
//! These tests scan the canvas crate source tree for antipatterns. Each has a
//! budget (ideally zero). If you must add one, fix an existing one first; the
//! budget never grows.
#![allow(clippy::absurd_extreme_comparisons)]

use std::fs;
use std::path::Path;

// Panics: these take down the page's wasm instance.
const MAX_UNWRAP: usize = 0;
const MAX_EXPECT: usize = 0;
const MAX_PANIC: usize = 0;
const MAX_UNREACHABLE: usize = 0;
const MAX_TODO: usize = 0;
const MAX_UNIMPLEMENTED: usize = 0;

// Silent loss: discards errors without inspecting.
const MAX_SILENT_DISCARD: usize = 0;
const MAX_DOT_OK: usize = 0;

// Output goes through the `log` facade, never stdout.
const MAX_PRINTLN: usize = 0;

// Style / structure.
const MAX_ALLOW_DEAD_CODE: usize = 0;

/// Files allowed to touch the browser directly. Everything else must stay
/// testable without a DOM.
const BROWSER_FILES: &[&str] = &["render.rs", "dom.rs", "transport.rs"];

struct SourceFile {
    path: String,
    content: String,
}

impl SourceFile {
    fn file_name(&self) -> &str {
        Path::new(&self.path).file_name().and_then(|n| n.to_str()).unwrap_or_default()
    }
}

/// Collect production `.rs` files from `canvas/src/`, excluding test files.
fn source_files() -> Vec<SourceFile> {
    let mut files = Vec::new();
    collect_rs_files(Path::new("src"), &mut files);
    files
}

fn collect_rs_files(dir: &Path, out: &mut Vec<SourceFile>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_rs_files(&path, out);
        } else if path.extension().is_some_and(|e| e == "rs") {
            let path_str = path.to_string_lossy().to_string();
            if path_str.ends_with("_test.rs") {
                continue;
            }
            if let Ok(content) = fs::read_to_string(&path) {
                out.push(SourceFile { path: path_str, content });
            }
        }
    }
}

/// Per-file count of lines containing `pattern`, skipping `#[cfg(test)]`
/// inline modules.
fn count_in_source<'a>(files: impl IntoIterator<Item = &'a SourceFile>, pattern: &str) -> Vec<(String, usize)> {
    files
        .into_iter()
        .filter_map(|file| {
            let production = file.content.split("#[cfg(test)]\nmod tests").next().unwrap_or_default();
            let count = production.lines().filter(|line| line.contains(pattern)).count();
            (count > 0).then(|| (file.path.clone(), count))
        })
        .collect()
}

fn assert_budget(pattern: &str, max: usize) {
    let files = source_files();
    assert!(!files.is_empty(), "no sources found; run from the canvas crate root");
    let hits = count_in_source(&files, pattern);
    let count: usize = hits.iter().map(|(_, c)| c).sum();
    let listing = hits.iter().map(|(path, c)| format!("  {path}: {c}")).collect::<Vec<_>>().join("\n");
    assert!(count <= max, "`{pattern}` budget exceeded: found {count}, max {max}.\n{listing}");
}

#[test]
fn unwrap_budget() {
    assert_budget(".unwrap()", MAX_UNWRAP);
}

#[test]
fn expect_budget() {
    assert_budget(".expect(", MAX_EXPECT);
}

#[test]
fn panic_budget() {
    assert_budget("panic!(", MAX_PANIC);
}

#[test]
fn unreachable_budget() {
    assert_budget("unreachable!(", MAX_UNREACHABLE);
}

#[test]
fn todo_budget() {
    assert_budget("todo!(", MAX_TODO);
}

#[test]
fn unimplemented_budget() {
    assert_budget("unimplemented!(", MAX_UNIMPLEMENTED);
}

#[test]
fn silent_discard_budget() {
    assert_budget("let _ =", MAX_SILENT_DISCARD);
}

#[test]
fn dot_ok_budget() {
    assert_budget(".ok()", MAX_DOT_OK);
}

#[test]
fn println_budget() {
    assert_budget("println!(", MAX_PRINTLN);
}

#[test]
fn allow_dead_code_budget() {
    assert_budget("#[allow(dead_code)]", MAX_ALLOW_DEAD_CODE);
}

#[test]
fn browser_apis_stay_at_the_edges() {
    let files = source_files();
    let core = files.iter().filter(|f| !BROWSER_FILES.contains(&f.file_name()));
    let hits = count_in_source(core, "web_sys::");
    assert!(hits.is_empty(), "web_sys used outside {BROWSER_FILES:?}:\n{hits:?}");
}
