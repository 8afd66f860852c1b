//! Text normalization shared by the classifier and the router cache.

/// Case-fold, trim, and collapse internal whitespace runs to one space.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_case_and_whitespace() {
        assert_eq!(normalize("  Create   a RED\tsphere \n"), "create a red sphere");
    }

    #[test]
    fn normalize_blank_is_empty() {
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize(""), "");
    }
}
