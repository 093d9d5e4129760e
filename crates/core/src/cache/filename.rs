//! Filenames derived from media titles.

const MAX_STEM_LEN: usize = 180;
const FALLBACK_STEM: &str = "media";
const FORBIDDEN: &[char] = &['<', '>', ':', '"', '|', '?', '*', '\\', '/', '(', ')'];

/// Reduce a title to a filesystem-safe ASCII stem.
pub fn sanitize(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| {
            if !c.is_ascii() || c.is_ascii_control() || FORBIDDEN.contains(&c) {
                ' '
            } else {
                c
            }
        })
        .collect();

    let mut stem = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    stem = stem.trim_matches(['.', ' ']).to_string();
    if stem.len() > MAX_STEM_LEN {
        stem.truncate(MAX_STEM_LEN);
        stem = stem.trim_end_matches(['.', ' ']).to_string();
    }

    if stem.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        stem
    }
}

/// Lowercase extension without the dot, `mp4` when absent or unusable.
pub fn normalize_extension(ext: Option<&str>) -> String {
    match ext.map(|e| e.trim_start_matches('.').to_ascii_lowercase()) {
        Some(e)
            if !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            e
        }
        _ => "mp4".to_string(),
    }
}

/// First free `<stem>.<ext>`, `<stem>-2.<ext>`, `<stem>-3.<ext>`, ...
pub fn unique_filename(stem: &str, ext: &str, is_taken: impl Fn(&str) -> bool) -> String {
    let first = format!("{}.{}", stem, ext);
    if !is_taken(&first) {
        return first;
    }
    let mut n = 2u32;
    loop {
        let candidate = format!("{}-{}.{}", stem, n, ext);
        if !is_taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_forbidden_and_collapses() {
        assert_eq!(sanitize("My: Video / Part (1)?"), "My Video Part 1");
        assert_eq!(sanitize("a\tb\nc"), "a b c");
    }

    #[test]
    fn test_sanitize_non_ascii_becomes_space() {
        assert_eq!(sanitize("Café — live"), "Caf live");
    }

    #[test]
    fn test_sanitize_trailing_dots_and_empty() {
        assert_eq!(sanitize("Title..."), "Title");
        assert_eq!(sanitize(".hidden"), "hidden");
        assert_eq!(sanitize("???"), "media");
        assert_eq!(sanitize(""), "media");
        assert_eq!(sanitize("日本語"), "media");
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "x".repeat(500);
        assert_eq!(sanitize(&long).len(), 180);
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension(Some("MP4")), "mp4");
        assert_eq!(normalize_extension(Some(".webm")), "webm");
        assert_eq!(normalize_extension(None), "mp4");
        assert_eq!(normalize_extension(Some("")), "mp4");
        assert_eq!(normalize_extension(Some("php?x=1")), "mp4");
    }

    #[test]
    fn test_unique_filename_suffixes() {
        let taken = ["clip.mp4", "clip-2.mp4"];
        let name = unique_filename("clip", "mp4", |n| taken.contains(&n));
        assert_eq!(name, "clip-3.mp4");
        assert_eq!(unique_filename("other", "mp4", |n| taken.contains(&n)), "other.mp4");
    }
}
