//! Input discovery for `ingest`.
//!
//! Paths given on the command line may be files or directories.
//! Directories are walked recursively; `.git`, `target` and `node_modules`
//! are always excluded, plus any configured exclude globs (matched against
//! the path relative to the walked directory). The result is sorted and
//! deduplicated so ingestion order is deterministic.
//!
//! Files are not filtered by type here; unsupported extensions are skipped
//! later by [`crate::extract`].

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};

const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/target/**", "**/node_modules/**"];

/// Expand `paths` into a sorted list of files.
///
/// # Errors
///
/// Returns [`Error::Config`] for an invalid glob and [`Error::Io`] when a
/// path does not exist or a directory cannot be read.
pub fn collect_files(
    paths: &[PathBuf],
    exclude_globs: &[String],
    follow_symlinks: bool,
) -> Result<Vec<PathBuf>> {
    let mut patterns: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    patterns.extend(exclude_globs.iter().cloned());
    let exclude_set = build_globset(&patterns)?;

    let mut files = Vec::new();
    for path in paths {
        if !path.exists() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("path does not exist: {}", path.display()),
            )));
        }
        if path.is_file() {
            files.push(path.clone());
            continue;
        }
        walk_dir(path, &exclude_set, follow_symlinks, &mut files)?;
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn walk_dir(root: &Path, exclude_set: &GlobSet, follow_symlinks: bool, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in WalkDir::new(root).follow_links(follow_symlinks) {
        let entry = entry.map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if exclude_set.is_match(relative) {
            continue;
        }
        out.push(path.to_path_buf());
    }
    Ok(())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| Error::config(format!("invalid exclude glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::config(format!("invalid exclude globs: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn names(files: &[PathBuf], root: &Path) -> Vec<String> {
        files
            .iter()
            .map(|f| f.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_walks_sorted_with_default_excludes() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("b.txt"), "b").unwrap();
        fs::write(root.join("a.md"), "a").unwrap();
        fs::write(root.join("sub/c.pdf"), "c").unwrap();
        fs::write(root.join("node_modules/pkg/readme.md"), "x").unwrap();

        let files = collect_files(&[root.to_path_buf()], &[], false).unwrap();
        assert_eq!(names(&files, root), vec!["a.md", "b.txt", "sub/c.pdf"]);
    }

    #[test]
    fn test_custom_exclude_and_explicit_file() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("drafts")).unwrap();
        fs::write(root.join("keep.txt"), "k").unwrap();
        fs::write(root.join("drafts/skip.txt"), "s").unwrap();

        let files = collect_files(
            &[root.to_path_buf(), root.join("keep.txt")],
            &["drafts/**".to_string()],
            false,
        )
        .unwrap();
        assert_eq!(names(&files, root), vec!["keep.txt"]);
    }

    #[test]
    fn test_missing_path_is_error() {
        let err = collect_files(&[PathBuf::from("/definitely/not/here")], &[], false).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_invalid_glob_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let err = collect_files(&[tmp.path().to_path_buf()], &["a[".to_string()], false).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
