//! Filename case detection and kebab-case conversion.

/// Whether a filename stem needs case normalization.
/// Any uppercase letter qualifies, so `KANBAN` and `README` count as well as
/// `FolderStructure` and `folderStructure`.
pub fn needs_kebab(stem: &str) -> bool {
    return stem.chars().any(char::is_uppercase);
}

/// Convert a filename stem to kebab-case.
///
/// A hyphen is inserted before an uppercase letter that follows a lowercase
/// letter or digit (`folderStructure`), and before the last capital of an
/// acronym run that starts a new word (`HTMLParser` -> `html-parser`).
/// Existing separators are kept and never doubled.
pub fn to_kebab(stem: &str) -> String {
    let chars: Vec<char> = stem.chars().collect();
    let mut out = String::with_capacity(stem.len().saturating_add(4));

    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_uppercase() && starts_word(&chars, i) && !ends_with_separator(&out) {
            out.push('-');
        }
        out.extend(ch.to_lowercase());
    }

    return out;
}

/// Whether the uppercase letter at `i` begins a new word.
fn starts_word(chars: &[char], i: usize) -> bool {
    let Some(prev_idx) = i.checked_sub(1) else {
        return false;
    };
    let Some(&prev) = chars.get(prev_idx) else {
        return false;
    };
    if prev.is_lowercase() || prev.is_ascii_digit() {
        return true;
    }
    let next_is_lower = chars
        .get(i.saturating_add(1))
        .is_some_and(|c| return c.is_lowercase());
    return prev.is_uppercase() && next_is_lower;
}

/// Whether the output so far is empty or ends in a word separator.
fn ends_with_separator(out: &str) -> bool {
    return out.is_empty() || out.ends_with(['-', '_', '.', ' ']);
}

#[cfg(test)]
#[allow(
    clippy::indexing_slicing,
    clippy::missing_docs_in_private_items,
    clippy::unwrap_used,
    reason = "tests"
)]
mod tests {
    use super::*;

    #[test]
    fn all_caps_names_are_lowercased_without_hyphens() {
        assert_eq!(to_kebab("FOLDERS"), "folders");
        assert_eq!(to_kebab("README"), "readme");
        assert_eq!(to_kebab("KANBAN"), "kanban");
    }

    #[test]
    fn pascal_and_camel_case_split_on_word_boundaries() {
        assert_eq!(to_kebab("FolderStructure"), "folder-structure");
        assert_eq!(to_kebab("folderStructure"), "folder-structure");
        assert_eq!(to_kebab("ConceptIdentity2Addressing"), "concept-identity2-addressing");
    }

    #[test]
    fn acronym_followed_by_word_splits_before_last_capital() {
        assert_eq!(to_kebab("HTMLParser"), "html-parser");
        assert_eq!(to_kebab("APIReference"), "api-reference");
    }

    #[test]
    fn existing_separators_are_not_doubled() {
        assert_eq!(to_kebab("Getting-Started"), "getting-started");
        assert_eq!(to_kebab("Api_Guide"), "api_guide");
    }

    #[test]
    fn lowercase_and_kebab_names_need_nothing() {
        assert!(!needs_kebab("already-kebab-case"));
        assert!(!needs_kebab("readme"));
        assert!(needs_kebab("README"));
        assert!(needs_kebab("camelCase"));
    }

    #[test]
    fn conversion_output_never_needs_conversion() {
        for stem in ["FOLDERS", "MyDoc", "xmlHTTPRequest", "A", "a-B-c"] {
            assert!(!needs_kebab(&to_kebab(stem)), "{stem}");
        }
    }
}
