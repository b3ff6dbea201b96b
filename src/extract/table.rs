//! Table discovery and header-driven column lookup

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::css;
use super::text::{collapse_whitespace, plain_text};
use crate::harvest::HarvestError;

static TABLE: LazyLock<Selector> = LazyLock::new(|| css("table"));
static HEADER_ROW: LazyLock<Selector> = LazyLock::new(|| css("thead tr"));
static HEADER_CELL: LazyLock<Selector> = LazyLock::new(|| css("th"));

/// Header label to zero-based column position, in header order.
///
/// Headers with an empty label are skipped but still occupy a position, so
/// positions are not contiguous. A repeated label keeps its first slot and
/// takes the later position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnIndex {
    columns: Vec<(String, usize)>,
}

impl ColumnIndex {
    pub fn insert(&mut self, label: impl Into<String>, position: usize) {
        let label = label.into();
        match self.columns.iter_mut().find(|(l, _)| *l == label) {
            Some(slot) => slot.1 = position,
            None => self.columns.push((label, position)),
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.columns.iter().map(|(l, p)| (l.as_str(), *p))
    }
}

impl<S: Into<String>> FromIterator<(S, usize)> for ColumnIndex {
    fn from_iter<I: IntoIterator<Item = (S, usize)>>(iter: I) -> Self {
        let mut index = ColumnIndex::default();
        for (label, position) in iter {
            index.insert(label, position);
        }
        index
    }
}

/// Read the first header row of `table` into a [`ColumnIndex`].
pub fn column_index(table: ElementRef<'_>) -> ColumnIndex {
    let Some(row) = table.select(&HEADER_ROW).next() else {
        return ColumnIndex::default();
    };
    row.select(&HEADER_CELL)
        .enumerate()
        .map(|(position, th)| (plain_text(Some(th)), position))
        .filter(|(label, _)| !label.is_empty())
        .collect()
}

/// Find a column by label.
///
/// An exact label match anywhere in the index wins over any substring match;
/// within each phase the first column in header order wins.
pub fn find_column_index(index: &ColumnIndex, candidates: &[&str]) -> Option<usize> {
    index
        .iter()
        .find(|(label, _)| candidates.contains(label))
        .or_else(|| {
            index
                .iter()
                .find(|(label, _)| candidates.iter().any(|c| label.contains(c)))
        })
        .map(|(_, position)| position)
}

/// Strategy for finding the catalog table in a listing page.
pub trait CatalogTableLocator {
    fn locate<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>>;
}

/// First table whose normalized text contains a marker string.
#[derive(Debug, Clone)]
pub struct MarkerTextLocator {
    marker: String,
}

impl MarkerTextLocator {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl Default for MarkerTextLocator {
    fn default() -> Self {
        Self::new("No")
    }
}

impl CatalogTableLocator for MarkerTextLocator {
    fn locate<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        document.select(&TABLE).find(|table| {
            collapse_whitespace(&table.text().collect::<String>()).contains(&self.marker)
        })
    }
}

/// First element matching a CSS selector.
#[derive(Debug, Clone)]
pub struct SelectorLocator {
    selector: Selector,
}

impl SelectorLocator {
    pub fn new(selector: Selector) -> Self {
        Self { selector }
    }

    /// Parse a user-supplied selector.
    pub fn parse(selector: &str) -> Result<Self, HarvestError> {
        Selector::parse(selector)
            .map(Self::new)
            .map_err(|e| HarvestError::Selector {
                selector: selector.to_string(),
                message: e.to_string(),
            })
    }
}

impl CatalogTableLocator for SelectorLocator {
    fn locate<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        document.select(&self.selector).next()
    }
}
