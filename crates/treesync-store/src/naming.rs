//! File names for documents

/// Extension of every document file
pub const DOCUMENT_EXTENSION: &str = "json";

const FALLBACK_NAME: &str = "item";

/// Turn an alias or item name into a portable file stem
///
/// Characters that are not letters, digits, `-`, `_` or `.` become `-`,
/// runs of them collapse into one, and leading or trailing separators and
/// dots are dropped. Case is kept.
pub fn safe_file_name(name: &str) -> String {
    let mut stem = String::with_capacity(name.len());
    let mut pending_dash = false;

    for ch in name.trim().chars() {
        if ch.is_alphanumeric() || matches!(ch, '_' | '.') {
            if pending_dash && !stem.is_empty() {
                stem.push('-');
            }
            pending_dash = false;
            stem.push(ch);
        } else {
            pending_dash = true;
        }
    }

    let stem = stem.trim_matches(|c| c == '.' || c == '-');
    if stem.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        stem.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_alias_is_unchanged() {
        assert_eq!(safe_file_name("homePage"), "homePage");
        assert_eq!(safe_file_name("my_type.v2"), "my_type.v2");
    }

    #[test]
    fn test_separators_collapse() {
        assert_eq!(safe_file_name("About  Us / Team"), "About-Us-Team");
        assert_eq!(safe_file_name("a:b*c?"), "a-b-c");
    }

    #[test]
    fn test_path_tricks_are_neutralized() {
        assert_eq!(safe_file_name("../../etc/passwd"), "etc-passwd");
        assert_eq!(safe_file_name("..."), "item");
        assert_eq!(safe_file_name(""), "item");
    }

    #[test]
    fn test_non_ascii_letters_survive() {
        assert_eq!(safe_file_name("Über uns"), "Über-uns");
    }
}
