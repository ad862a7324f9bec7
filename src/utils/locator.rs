use percent_encoding::percent_decode_str;
use std::path::Path;

/// URL-decode a storage locator. Invalid UTF-8 sequences are replaced rather than rejected.
pub fn decode_locator(raw: &str) -> String {
    percent_decode_str(raw.trim()).decode_utf8_lossy().into_owned()
}

/// Last path segment of a locator, stripped of query/fragment and unsafe characters.
///
/// Returns `None` when nothing usable remains (e.g. a locator ending in `/`).
pub fn file_name_of(locator: &str) -> Option<String> {
    let without_query = locator
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let last = without_query.rsplit(['/', '\\']).next().unwrap_or_default();

    let name = Path::new(last).file_name().and_then(|n| n.to_str())?;
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || c == ':'
                || c == '*'
                || c == '?'
                || c == '"'
                || c == '<'
                || c == '>'
                || c == '|'
                || c == ';'
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    // Limit length safely for UTF-8
    if sanitized.len() > 255 {
        let mut end = 255;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        return Some(sanitized[..end].to_string());
    }

    Some(sanitized)
}

/// True when the path carries a `.zip` extension, in any letter case.
pub fn has_zip_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_locator() {
        assert_eq!(
            decode_locator("https://store.blob.core.windows.net/osw/2024%2F01%2Fmy%20file.zip"),
            "https://store.blob.core.windows.net/osw/2024/01/my file.zip"
        );
        assert_eq!(decode_locator("  plain.zip "), "plain.zip");
        assert_eq!(decode_locator(""), "");
    }

    #[test]
    fn test_file_name_of() {
        assert_eq!(
            file_name_of("https://host/osw/a/b/upload.zip?sv=2021&sig=x").as_deref(),
            Some("upload.zip")
        );
        assert_eq!(file_name_of("a.zip").as_deref(), Some("a.zip"));
        assert_eq!(file_name_of("dir\\nested\\b.ZIP").as_deref(), Some("b.ZIP"));
        assert_eq!(file_name_of("weird:name.zip").as_deref(), Some("weird_name.zip"));
        assert_eq!(file_name_of("https://host/osw/"), None);
        assert_eq!(file_name_of("../.."), None);
    }

    #[test]
    fn test_zip_extension() {
        assert!(has_zip_extension(Path::new("/tmp/x/data.zip")));
        assert!(has_zip_extension(Path::new("/tmp/x/DATA.Zip")));
        assert!(!has_zip_extension(Path::new("/tmp/x/data.geojson")));
        assert!(!has_zip_extension(Path::new("/tmp/x/zip")));
        assert!(!has_zip_extension(Path::new("/tmp/x/archive.zip.txt")));
    }
}
