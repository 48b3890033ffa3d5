//! Morph-type markers on typed lexeme forms.
//!
//! Users type affix and clitic forms with the conventional markers (`-ing`,
//! `un-`, `-a-`, `=ma`, `ma=`, `~x~`, `*bound`) and circumfixes as two parts
//! (`ge- -t`). This crate turns such input into a bare form plus its
//! [`MorphType`], puts the markers back for display, splits circumfixes into
//! their halves, and builds the headword sort key.
//!
//! # Example
//! ```rust
//! use lexicon_morph::{decorate, parse_morph_type};
//! use lexicon_types::MorphType;
//!
//! let parsed = parse_morph_type("-ing").unwrap();
//! assert_eq!(parsed.form, "ing");
//! assert_eq!(parsed.morph_type, MorphType::Suffix);
//! assert_eq!(decorate(&parsed.form, Some(parsed.morph_type)), "-ing");
//! ```

use thiserror::Error;

use lexicon_types::MorphType;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("form is empty")]
    Empty,
    #[error("form {0:?} has markers but no text")]
    MarkersOnly(String),
    #[error("form {0:?} has unbalanced markers")]
    UnbalancedMarkers(String),
    #[error("cannot split circumfix {0:?} into left and right parts")]
    CircumfixSplit(String),
}

/// A typed form with its markers removed and its morph type inferred.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedForm {
    pub form: String,
    pub morph_type: MorphType,
}

/// The two halves of a circumfix, without markers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CircumfixParts {
    pub left: String,
    pub right: String,
}

/// Infer the morph type of `typed` from its marker characters.
pub fn parse_morph_type(typed: &str) -> Result<ParsedForm, FormError> {
    let text = typed.trim();
    if text.is_empty() {
        return Err(FormError::Empty);
    }
    if let Some(parts) = circumfix_markers(text) {
        return Ok(ParsedForm {
            form: format!("{} {}", parts.left, parts.right),
            morph_type: MorphType::Circumfix,
        });
    }
    let morph_type =
        classify(text).ok_or_else(|| FormError::UnbalancedMarkers(text.to_string()))?;
    let form = strip_markers(text, morph_type);
    if form.trim().is_empty() {
        return Err(FormError::MarkersOnly(text.to_string()));
    }
    Ok(ParsedForm {
        form: form.to_string(),
        morph_type,
    })
}

fn classify(text: &str) -> Option<MorphType> {
    let first = text.chars().next()?;
    let last = text.chars().next_back()?;
    let multi = text.chars().count() > 1;
    Some(match (first, last) {
        ('-', '-') if multi => MorphType::Infix,
        ('=', '=') if multi => MorphType::Simulfix,
        ('~', '~') if multi => MorphType::Suprafix,
        ('~', _) | (_, '~') => return None,
        ('-', _) => MorphType::Suffix,
        (_, '-') => MorphType::Prefix,
        ('=', _) => MorphType::Enclitic,
        (_, '=') => MorphType::Proclitic,
        ('*', _) => MorphType::BoundRoot,
        _ if text.contains(char::is_whitespace) => MorphType::Phrase,
        _ => MorphType::Stem,
    })
}

/// `a- -b` typed as one form.
fn circumfix_markers(text: &str) -> Option<CircumfixParts> {
    let mut tokens = text.split_whitespace();
    let (left, right) = (tokens.next()?, tokens.next()?);
    if tokens.next().is_some() {
        return None;
    }
    let left = left.strip_suffix('-')?;
    let right = right.strip_prefix('-')?;
    if left.is_empty() || right.is_empty() {
        return None;
    }
    Some(CircumfixParts {
        left: left.to_string(),
        right: right.to_string(),
    })
}

/// Remove the decoration `morph_type` puts around a form, where present.
pub fn strip_markers(text: &str, morph_type: MorphType) -> &str {
    let text = text.trim();
    let text = text.strip_prefix(morph_type.prefix_marker()).unwrap_or(text);
    text.strip_suffix(morph_type.postfix_marker()).unwrap_or(text)
}

/// Surround a bare form with the markers of its morph type.
pub fn decorate(text: &str, morph_type: Option<MorphType>) -> String {
    match morph_type {
        Some(mt) => format!("{}{}{}", mt.prefix_marker(), text, mt.postfix_marker()),
        None => text.to_string(),
    }
}

/// Split a circumfix lexeme form at its first whitespace or `.`.
///
/// Leftover markers on either half (`ge-`, `-t`) are dropped. Fails when there
/// is no separator or either half is empty.
pub fn circumfix_left_and_right_parts(text: &str) -> Result<CircumfixParts, FormError> {
    let text = text.trim();
    let split = || FormError::CircumfixSplit(text.to_string());
    let at = text
        .find(|c: char| c.is_whitespace() || c == '.')
        .ok_or_else(split)?;
    let (left, rest) = text.split_at(at);
    let right = &rest[rest.chars().next().map_or(0, char::len_utf8)..];

    let left = left.trim().trim_end_matches('-');
    let right = right.trim().trim_start_matches('-');
    if left.is_empty() || right.is_empty() {
        return Err(split());
    }
    Ok(CircumfixParts {
        left: left.to_string(),
        right: right.to_string(),
    })
}

/// Headword ordering: case-folded form, then morph-type secondary order, then
/// homograph number.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SortKey {
    pub form: String,
    pub secondary_order: u8,
    pub homograph_number: u32,
}

pub fn sort_key(form: &str, morph_type: Option<MorphType>, homograph_number: u32) -> SortKey {
    let bare = match morph_type {
        Some(mt) => strip_markers(form, mt),
        None => form.trim(),
    };
    SortKey {
        form: bare.to_lowercase(),
        secondary_order: morph_type.map_or(0, MorphType::secondary_order),
        homograph_number,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(typed: &str) -> (String, MorphType) {
        let p = parse_morph_type(typed).unwrap();
        (p.form, p.morph_type)
    }

    #[test]
    fn markers_select_the_morph_type() {
        assert_eq!(parsed("run"), ("run".into(), MorphType::Stem));
        assert_eq!(parsed("-ing"), ("ing".into(), MorphType::Suffix));
        assert_eq!(parsed("un-"), ("un".into(), MorphType::Prefix));
        assert_eq!(parsed("-um-"), ("um".into(), MorphType::Infix));
        assert_eq!(parsed("=ma"), ("ma".into(), MorphType::Enclitic));
        assert_eq!(parsed("ma="), ("ma".into(), MorphType::Proclitic));
        assert_eq!(parsed("=ka="), ("ka".into(), MorphType::Simulfix));
        assert_eq!(parsed("~H~"), ("H".into(), MorphType::Suprafix));
        assert_eq!(parsed("*sed"), ("sed".into(), MorphType::BoundRoot));
        assert_eq!(parsed("kick the bucket"), ("kick the bucket".into(), MorphType::Phrase));
        assert_eq!(parsed("ge- -t"), ("ge t".into(), MorphType::Circumfix));
    }

    #[test]
    fn bad_input_is_reported_not_guessed() {
        assert_eq!(parse_morph_type("   "), Err(FormError::Empty));
        assert_eq!(
            parse_morph_type("-"),
            Err(FormError::MarkersOnly("-".into()))
        );
        assert_eq!(
            parse_morph_type("~x"),
            Err(FormError::UnbalancedMarkers("~x".into()))
        );
    }

    #[test]
    fn decorate_reverses_strip() {
        for mt in MorphType::ALL {
            let shown = decorate("ab", Some(mt));
            assert_eq!(strip_markers(&shown, mt), "ab", "{mt}");
        }
        assert_eq!(decorate("ab", None), "ab");
    }

    #[test]
    fn circumfix_splits_on_space_or_period() {
        let parts = circumfix_left_and_right_parts("ge- -t").unwrap();
        assert_eq!((parts.left.as_str(), parts.right.as_str()), ("ge", "t"));
        let parts = circumfix_left_and_right_parts("ka.an").unwrap();
        assert_eq!((parts.left.as_str(), parts.right.as_str()), ("ka", "an"));
    }

    #[test]
    fn circumfix_without_separator_fails() {
        assert_eq!(
            circumfix_left_and_right_parts("foobar"),
            Err(FormError::CircumfixSplit("foobar".into()))
        );
        assert!(circumfix_left_and_right_parts("foo.").is_err());
    }

    #[test]
    fn sort_key_orders_prefix_before_suffix_before_stem_number() {
        let stem = sort_key("a", Some(MorphType::Stem), 0);
        let prefix = sort_key("a-", Some(MorphType::Prefix), 0);
        let suffix = sort_key("-a", Some(MorphType::Suffix), 0);
        assert!(stem < prefix);
        assert!(prefix < suffix);
        assert!(sort_key("Bank", None, 1) < sort_key("bank", None, 2));
        assert!(sort_key("bank", None, 9) < sort_key("bat", None, 1));
    }
}
