//! # HTML Field Extraction
//!
//! Pure helpers that turn fragments of the catalog site's markup into
//! normalized strings, string lists and label maps. None of them fail: an
//! absent fragment yields an empty string, list or map.
//!
//! - `text`: whitespace collapsing, `<br>`-aware text, furigana stripping
//! - `fields`: definition-list stat and basic-info maps
//! - `table`: catalog table discovery and header-driven column lookup

mod fields;
mod table;
mod text;

pub use fields::{basic_map, stat_map};
pub use table::{
    CatalogTableLocator, ColumnIndex, MarkerTextLocator, SelectorLocator, column_index,
    find_column_index,
};
pub use text::{collapse_whitespace, plain_text, surface_reading, text_lines, text_with_line_breaks};

use scraper::Selector;
use url::Url;

/// Parse a selector known at compile time.
pub(crate) fn css(selector: &str) -> Selector {
    Selector::parse(selector).expect("static selector must parse")
}

/// Resolve `href` against `base` and return its `q` query parameter.
///
/// Returns `None` for unparseable links and links without a non-empty `q`.
pub fn join_key(href: &str, base: &Url) -> Option<String> {
    let url = base.join(href).ok()?;
    url.query_pairs()
        .find(|(name, _)| name == "q")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_key_from_relative_href() {
        let base = Url::parse("https://zukan.example.jp").unwrap();
        assert_eq!(
            join_key("/chara_model_view/?q=abc123&lang=ja", &base).as_deref(),
            Some("abc123")
        );
        assert_eq!(
            join_key("https://other.example/x?q=z", &base).as_deref(),
            Some("z")
        );
    }

    #[test]
    fn test_join_key_missing() {
        let base = Url::parse("https://zukan.example.jp").unwrap();
        assert_eq!(join_key("/chara_model_view/", &base), None);
        assert_eq!(join_key("/chara_model_view/?q=", &base), None);
    }
}
