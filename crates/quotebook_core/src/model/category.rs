//! Category filter selection.

use crate::model::quote::Quote;
use std::fmt::{Display, Formatter};

/// Sentinel filter value meaning "every category".
pub const ALL_CATEGORIES: &str = "all";

/// Category selection applied by read paths.
///
/// A quote whose category is literally `all` is only reachable through
/// `CategoryFilter::All`, because the sentinel shadows it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Category(String),
}

impl CategoryFilter {
    /// Parses a filter value as stored or received from UI.
    ///
    /// Blank input and the `all` sentinel both map to `CategoryFilter::All`.
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == ALL_CATEGORIES {
            return Self::All;
        }
        Self::Category(trimmed.to_string())
    }

    pub fn matches(&self, quote: &Quote) -> bool {
        match self {
            Self::All => true,
            Self::Category(category) => quote.category == *category,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::All => ALL_CATEGORIES,
            Self::Category(category) => category.as_str(),
        }
    }
}

impl Display for CategoryFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for CategoryFilter {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

#[cfg(test)]
mod tests {
    use super::CategoryFilter;
    use crate::model::quote::Quote;

    #[test]
    fn parse_maps_sentinel_and_blank_to_all() {
        assert_eq!(CategoryFilter::parse("all"), CategoryFilter::All);
        assert_eq!(CategoryFilter::parse("   "), CategoryFilter::All);
        assert_eq!(
            CategoryFilter::parse(" humor "),
            CategoryFilter::Category("humor".to_string())
        );
    }

    #[test]
    fn category_match_is_case_sensitive() {
        let quote = Quote::new("text", "Humor").unwrap();
        assert!(CategoryFilter::parse("Humor").matches(&quote));
        assert!(!CategoryFilter::parse("humor").matches(&quote));
        assert!(CategoryFilter::All.matches(&quote));
    }

    #[test]
    fn display_round_trips_through_parse() {
        for raw in ["all", "life"] {
            let filter = CategoryFilter::parse(raw);
            assert_eq!(CategoryFilter::parse(&filter.to_string()), filter);
        }
    }
}
