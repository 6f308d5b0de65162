//! Filename sanitization and the temp -> final file lifecycle.

use std::path::{Path, PathBuf};

use tracing::warn;

/// Maximum sanitized filename length, leaving room for the extension.
const MAX_NAME_LENGTH: usize = 200;

/// Sanitize a string for use as a filename.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '/' | '\\' | '|' => out.push('-'),
            ':' => out.push_str(" -"),
            '*' | '?' | '<' | '>' | '\r' => {}
            '"' => out.push('\''),
            '\n' | '\t' => out.push(' '),
            other => out.push(other),
        }
    }

    let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim().trim_matches('.').trim();

    let mut name: String = trimmed.chars().take(MAX_NAME_LENGTH).collect();
    name = name.trim().to_string();

    if name.is_empty() {
        "untitled".to_string()
    } else {
        name
    }
}

/// Final output filename: `"{title} [{source_id}].{ext}"`, with a
/// `" (n)"` suffix when the name is already taken.
pub fn unique_final_path(dir: &Path, title: &str, source_id: &str, ext: &str) -> PathBuf {
    let title = sanitize_filename(title);
    let mut candidate = dir.join(format!("{title} [{source_id}].{ext}"));
    let mut counter = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{title} [{source_id}] ({counter}).{ext}"));
        counter += 1;
    }
    candidate
}

/// Move a file into place, creating the target directory. Falls back to
/// copy + remove when rename crosses filesystems.
pub async fn move_into_place(src: &Path, dst: &Path) -> std::io::Result<()> {
    if let Some(parent) = dst.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    match tokio::fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(_) => {
            tokio::fs::copy(src, dst).await?;
            tokio::fs::remove_file(src).await
        }
    }
}

/// Remove a job's temp directory. Failure is logged, never fatal.
pub async fn cleanup_temp_dir(temp_dir: &Path) {
    if temp_dir.is_dir() {
        if let Err(e) = tokio::fs::remove_dir_all(temp_dir).await {
            warn!(path = %temp_dir.display(), error = %e, "Failed to clean temp directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_separators_and_collapses_whitespace() {
        assert_eq!(sanitize_filename("a/b\\c|d"), "a-b-c-d");
        assert_eq!(sanitize_filename("Movie: The Sequel"), "Movie - The Sequel");
        assert_eq!(sanitize_filename("what?  \n is\tthis"), "what is this");
        assert_eq!(sanitize_filename("\"quoted\""), "'quoted'");
        assert_eq!(sanitize_filename("..."), "untitled");
        assert_eq!(sanitize_filename(""), "untitled");
    }

    #[test]
    fn sanitize_truncates_long_names() {
        let long = "x".repeat(500);
        assert_eq!(sanitize_filename(&long).len(), 200);
    }

    #[test]
    fn unique_path_appends_counter() {
        let dir = tempfile::tempdir().unwrap();
        let first = unique_final_path(dir.path(), "Title", "abc123", "mkv");
        assert_eq!(first.file_name().unwrap(), "Title [abc123].mkv");

        std::fs::write(&first, b"taken").unwrap();
        let second = unique_final_path(dir.path(), "Title", "abc123", "mkv");
        assert_eq!(second.file_name().unwrap(), "Title [abc123] (1).mkv");

        std::fs::write(&second, b"taken").unwrap();
        let third = unique_final_path(dir.path(), "Title", "abc123", "mkv");
        assert_eq!(third.file_name().unwrap(), "Title [abc123] (2).mkv");
    }

    #[tokio::test]
    async fn move_creates_target_directory() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.bin");
        tokio::fs::write(&src, b"data").await.unwrap();

        let dst = dir.path().join("nested/deep/dst.bin");
        move_into_place(&src, &dst).await.unwrap();
        assert!(dst.exists());
        assert!(!src.exists());
    }
}
