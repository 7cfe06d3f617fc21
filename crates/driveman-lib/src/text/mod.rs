use std::path::{Path, PathBuf};

/// Make a remote item name safe to use as a local file name.
///
/// Path separators, control characters and characters reserved on common
/// filesystems become `_`. Leading and trailing dots and spaces are dropped so
/// the result can never be `.` or `..`. An empty result becomes `download`.
pub fn sanitize_filename(input: &str) -> String {
    let replaced: String = input
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = replaced.trim_matches(|c| c == '.' || c == ' ');
    if trimmed.is_empty() {
        "download".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `dir/name`, or `dir/stem (n).ext` with the first free `n` when taken.
pub fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let as_path = Path::new(name);
    let stem = as_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let ext = as_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1..)
        .map(|n| dir.join(format!("{stem} ({n}){ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Shorten `input` to `max` characters, ending with `…` when cut.
pub fn truncate(input: &str, max: usize) -> String {
    if input.chars().count() <= max {
        return input.to_string();
    }
    let keep = max.saturating_sub(1);
    let mut out: String = input.chars().take(keep).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename_keeps_ordinary_names() {
        assert_eq!(sanitize_filename("Quarterly report.pdf"), "Quarterly report.pdf");
        assert_eq!(sanitize_filename("résumé (final).docx"), "résumé (final).docx");
    }

    #[test]
    fn test_sanitize_filename_replaces_separators() {
        assert_eq!(sanitize_filename("a/b\\c.txt"), "a_b_c.txt");
        assert_eq!(sanitize_filename("what?: <yes>|no*"), "what__ _yes__no_");
        assert_eq!(sanitize_filename("tab\there"), "tab_here");
    }

    #[test]
    fn test_sanitize_filename_blocks_traversal() {
        assert_eq!(sanitize_filename(".."), "download");
        assert_eq!(sanitize_filename("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_filename("  .hidden  "), "hidden");
        assert_eq!(sanitize_filename(""), "download");
    }

    #[test]
    fn test_unique_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let first = unique_path(tmp.path(), "a.txt");
        assert_eq!(first, tmp.path().join("a.txt"));

        std::fs::write(&first, "x").unwrap();
        let second = unique_path(tmp.path(), "a.txt");
        assert_eq!(second, tmp.path().join("a (1).txt"));

        std::fs::write(&second, "x").unwrap();
        assert_eq!(unique_path(tmp.path(), "a.txt"), tmp.path().join("a (2).txt"));

        std::fs::write(tmp.path().join("README"), "x").unwrap();
        assert_eq!(
            unique_path(tmp.path(), "README"),
            tmp.path().join("README (1)")
        );
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly10!", 10), "exactly10!");
        assert_eq!(truncate("a much longer name", 8), "a much …");
    }
}
