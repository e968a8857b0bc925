use crate::models::FieldId;

/// Normalize a document field label for matching
///
/// Splits camelCase ("ZIPCode" becomes "zip code") and trailing digits, turns every
/// non-alphanumeric character into a space, lowercases and collapses runs of
/// whitespace.
pub fn normalize_label(label: &str) -> String {
    let chars: Vec<char> = label.chars().collect();
    let mut spaced = String::with_capacity(label.len() + 8);

    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && c.is_uppercase() {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower) {
                spaced.push(' ');
            }
        }
        if i > 0 && c.is_ascii_digit() && chars[i - 1].is_alphabetic() {
            spaced.push(' ');
        }
        spaced.push(if c.is_alphanumeric() { c } else { ' ' });
    }

    spaced
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized Levenshtein similarity of two labels, in [0, 1]
pub fn fuzzy_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&normalize_label(a), &normalize_label(b))
}

/// Whether a normalized label is exactly one of the field's aliases
pub fn is_exact_alias(field: FieldId, normalized: &str) -> bool {
    field.aliases().contains(&normalized)
}

/// Best fuzzy score of a normalized label against any of the field's aliases
pub fn best_alias_score(field: FieldId, normalized: &str) -> f64 {
    field
        .aliases()
        .iter()
        .map(|alias| strsim::normalized_levenshtein(alias, normalized))
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("Full Legal Name"), "full legal name");
        assert_eq!(normalize_label("firstName"), "first name");
        assert_eq!(normalize_label("ZIPCode"), "zip code");
        assert_eq!(normalize_label("client_email-address"), "client email address");
        assert_eq!(normalize_label("  Address Line1 "), "address line 1");
        assert_eq!(normalize_label("E-Mail:"), "e mail");
    }

    #[test]
    fn test_exact_alias() {
        assert!(is_exact_alias(FieldId::Name, &normalize_label("Full Legal Name")));
        assert!(is_exact_alias(FieldId::Email, &normalize_label("Email Address")));
        assert!(!is_exact_alias(FieldId::Email, &normalize_label("Primary Contact")));
    }

    #[test]
    fn test_fuzzy_scores() {
        assert!(best_alias_score(FieldId::DateOfBirth, "date of brith") >= 0.8);
        assert!(best_alias_score(FieldId::Phone, "primary contact") < 0.8);
        assert_eq!(fuzzy_similarity("Net Worth", "net_worth"), 1.0);
    }
}
