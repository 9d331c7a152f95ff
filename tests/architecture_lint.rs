//! Architecture enforcement tests.
//!
//! Layering rules that the compiler cannot check:
//!
//! 1. **Single Git interface** - only `src/git` may touch `git2`
//! 2. **No shelling out** - nothing spawns the `git` CLI
//! 3. **Thin CLI** - command handlers go through the driver and never call
//!    the syncer or the Git interface directly
//! 4. **Quiet stdout** - logging never writes to stdout, which carries the
//!    report
//! 5. **Formatting** - lines fit rustfmt's 100-column width, and a module
//!    imported by name is not imported from again in a second `use`

use std::fs;
use std::path::{Path, PathBuf};

/// Every `.rs` file under `dir`, recursively.
fn rust_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let entries =
        fs::read_dir(dir).unwrap_or_else(|e| panic!("Failed to read {}: {e}", dir.display()));
    for entry in entries {
        let path = entry.expect("Failed to read entry").path();
        if path.is_dir() {
            files.extend(rust_files(&path));
        } else if path.extension().is_some_and(|e| e == "rs") {
            files.push(path);
        }
    }
    files
}

/// Files outside `allowed` whose source contains `needle`.
fn violations(root: &str, needle: &str, allowed: &[&str]) -> Vec<String> {
    rust_files(Path::new(root))
        .into_iter()
        .filter(|path| !allowed.iter().any(|a| path.starts_with(a)))
        .filter(|path| {
            fs::read_to_string(path)
                .unwrap_or_else(|_| panic!("Failed to read {}", path.display()))
                .contains(needle)
        })
        .map(|path| path.display().to_string())
        .collect()
}

#[test]
fn git2_only_used_in_git_module() {
    let found = violations("src", "git2::", &["src/git"]);
    assert!(
        found.is_empty(),
        "git2 used outside src/git (route it through reposync::git::Git):\n  {}",
        found.join("\n  ")
    );
}

#[test]
fn git_cli_never_spawned() {
    let found = violations("src", "Command::new(\"git\")", &[]);
    assert!(
        found.is_empty(),
        "source spawns the git CLI:\n  {}",
        found.join("\n  ")
    );
}

#[test]
fn commands_do_not_sync_directly() {
    let mut found = violations("src/cli", "RepositorySyncer", &[]);
    found.extend(violations("src/cli", "crate::git::", &[]));
    assert!(
        found.is_empty(),
        "CLI handlers must go through the driver:\n  {}",
        found.join("\n  ")
    );
}

#[test]
fn logging_writes_to_stderr() {
    let logging = fs::read_to_string("src/ui/logging.rs").expect("Failed to read logging.rs");
    assert!(logging.contains("std::io::stderr"));
    assert!(!logging.contains("std::io::stdout"));
}

/// Split `body` on commas that are not nested inside braces.
fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0;
    let mut start = 0;
    for (i, ch) in body.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(body[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(body[start..].trim());
    parts.into_iter().filter(|p| !p.is_empty()).collect()
}

/// Every path a `use` tree brings into scope, with `self` as its parent.
fn imported_paths(tree: &str) -> Vec<String> {
    let tree = tree.trim();
    match tree.find('{') {
        Some(open) if tree.ends_with('}') => {
            let prefix = tree[..open].trim_end_matches(':');
            split_top_level(&tree[open + 1..tree.len() - 1])
                .into_iter()
                .flat_map(|part| match part {
                    "self" => vec![prefix.to_string()],
                    _ => imported_paths(&format!("{prefix}::{part}")),
                })
                .collect()
        }
        _ => {
            let path = tree.split(" as ").next().unwrap_or(tree);
            vec![path.trim().to_string()]
        }
    }
}

/// The module a `use` tree imports from.
fn import_parent(tree: &str) -> &str {
    match tree.find('{') {
        Some(open) => tree[..open].trim_end_matches(':'),
        None => tree.rsplit_once("::").map_or(tree, |(parent, _)| parent),
    }
}

/// Top-level `use` trees in `source`, joined across lines.
fn use_trees(source: &str) -> Vec<String> {
    let mut trees = Vec::new();
    let mut current: Option<String> = None;
    for line in source.lines() {
        let trimmed = line.trim();
        if let Some(tree) = current.as_mut() {
            tree.push(' ');
            tree.push_str(trimmed);
        } else if line.starts_with("use ") || line.starts_with("pub use ") {
            current = Some(trimmed.to_string());
        } else {
            continue;
        }
        if trimmed.ends_with(';') {
            if let Some(stmt) = current.take() {
                let tree = stmt.split_once("use ").map_or("", |(_, t)| t);
                trees.push(tree.trim_end_matches(';').to_string());
            }
        }
    }
    trees
}

/// `use` statements that reach into a module another `use` already names.
fn redundant_imports(source: &str) -> Vec<String> {
    let trees = use_trees(source);
    let mut found = Vec::new();
    for (i, named) in trees.iter().enumerate() {
        let paths = imported_paths(named);
        for (j, other) in trees.iter().enumerate() {
            if i != j && paths.iter().any(|p| p.as_str() == import_parent(other)) {
                found.push(format!("`{other}` (already imported by `{named}`)"));
            }
        }
    }
    found
}

#[test]
fn split_imports_are_detected() {
    let source = "use crate::ui::{logging, output};\nuse crate::ui::output::Verbosity;\n";
    assert_eq!(redundant_imports(source).len(), 1);

    let merged = "use crate::ui::{logging, output::{self, Verbosity}};\n";
    assert!(redundant_imports(merged).is_empty());

    let siblings = "use crate::core::ops::Marker;\nuse crate::core::paths::Paths;\n";
    assert!(redundant_imports(siblings).is_empty());
}

#[test]
fn imports_are_merged() {
    let mut found = Vec::new();
    for path in rust_files(Path::new("src")).into_iter().chain(rust_files(Path::new("tests"))) {
        let source = fs::read_to_string(&path).expect("Failed to read source");
        for import in redundant_imports(&source) {
            found.push(format!("{}: {import}", path.display()));
        }
    }
    assert!(
        found.is_empty(),
        "merge these imports into one `use`:\n  {}",
        found.join("\n  ")
    );
}

#[test]
fn lines_fit_rustfmt_width() {
    let mut found = Vec::new();
    for path in rust_files(Path::new("src")).into_iter().chain(rust_files(Path::new("tests"))) {
        let source = fs::read_to_string(&path).expect("Failed to read source");
        for (number, line) in source.lines().enumerate() {
            if line.chars().count() > 100 {
                found.push(format!("{}:{}", path.display(), number + 1));
            }
        }
    }
    assert!(
        found.is_empty(),
        "lines wider than 100 columns:\n  {}",
        found.join("\n  ")
    );
}
