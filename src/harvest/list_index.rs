//! List-index construction from the compact catalog pages

use std::collections::HashMap;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument};
use url::Url;

use super::pagination::{EmptyPageStreak, PageOutcome};
use super::{HarvestConfig, HarvestError, ListIndexEntry, SkipCounts};
use crate::extract::{
    CatalogTableLocator, MarkerTextLocator, column_index, css, find_column_index, join_key,
    plain_text, text_lines,
};
use crate::http::PageFetcher;

static BODY_ROW: LazyLock<Selector> = LazyLock::new(|| css("tbody tr"));
static CELL: LazyLock<Selector> = LazyLock::new(|| css("td"));
static MODEL_VIEW_LINK: LazyLock<Selector> =
    LazyLock::new(|| css(r#"a[href*="chara_model_view"]"#));
static MODEL_LINK: LazyLock<Selector> = LazyLock::new(|| css(r#"a[href*="chara_model"]"#));
static NAME_LINK: LazyLock<Selector> = LazyLock::new(|| css("div.nameBox p a"));
static NAME_KANA: LazyLock<Selector> = LazyLock::new(|| css("div.nameBox p a span.rubi"));

const NUMBER_LABELS: &[&str] = &["No"];
const NAME_LABELS: &[&str] = &["名前"];
const CATEGORY_LABELS: &[&str] = &["カテゴリ"];
const AFFILIATION_LABELS: &[&str] = &["チーム"];

/// Why a list row was not indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListRowSkip {
    /// No anchor pointing at a detail view
    MissingDetailLink,
    /// The detail anchor carries no `q` parameter
    MissingJoinKey,
}

impl ListRowSkip {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingDetailLink => "missing_detail_link",
            Self::MissingJoinKey => "missing_join_key",
        }
    }
}

/// Join key to list attributes for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListIndex {
    entries: HashMap<String, ListIndexEntry>,
}

impl ListIndex {
    pub fn get(&self, join_key: &str) -> Option<&ListIndexEntry> {
        self.entries.get(join_key)
    }

    pub fn contains(&self, join_key: &str) -> bool {
        self.entries.contains_key(join_key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, ListIndexEntry)> for ListIndex {
    fn from_iter<I: IntoIterator<Item = (String, ListIndexEntry)>>(iter: I) -> Self {
        let mut index = ListIndex::default();
        index.extend(iter);
        index
    }
}

impl Extend<(String, ListIndexEntry)> for ListIndex {
    /// Later entries replace earlier ones with the same key.
    fn extend<I: IntoIterator<Item = (String, ListIndexEntry)>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

/// Parse one list page into per-row outcomes.
///
/// An empty vector means the catalog table is missing or has no body rows.
pub fn parse_list_page(
    html: &str,
    base: &Url,
    locator: &impl CatalogTableLocator,
) -> Vec<Result<(String, ListIndexEntry), ListRowSkip>> {
    let document = Html::parse_document(html);
    let Some(table) = locator.locate(&document) else {
        return Vec::new();
    };

    let columns = column_index(table);
    let number_col = find_column_index(&columns, NUMBER_LABELS);
    let name_col = find_column_index(&columns, NAME_LABELS);
    let category_col = find_column_index(&columns, CATEGORY_LABELS);
    let affiliation_col = find_column_index(&columns, AFFILIATION_LABELS);

    table
        .select(&BODY_ROW)
        .map(|row| -> Result<(String, ListIndexEntry), ListRowSkip> {
            let href = row
                .select(&MODEL_VIEW_LINK)
                .next()
                .or_else(|| row.select(&MODEL_LINK).next())
                .and_then(|a| a.value().attr("href"))
                .filter(|href| !href.is_empty())
                .ok_or(ListRowSkip::MissingDetailLink)?;
            let key = join_key(href, base).ok_or(ListRowSkip::MissingJoinKey)?;

            let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
            let cell = |col: Option<usize>| col.and_then(|i| cells.get(i).copied());

            let name_cell = cell(name_col);
            let display_id = name_cell
                .and_then(|td| td.select(&NAME_LINK).next())
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| join_key(href, base))
                .unwrap_or_default();
            let kana_reading = plain_text(name_cell.and_then(|td| td.select(&NAME_KANA).next()));

            let sequence_number = plain_text(cell(number_col)).parse::<i64>().ok();

            Ok((
                key,
                ListIndexEntry {
                    display_id,
                    kana_reading,
                    sequence_number,
                    category_tags: text_lines(cell(category_col)),
                    affiliation_tags: text_lines(cell(affiliation_col)),
                },
            ))
        })
        .collect()
}

/// Walk the list pages and build the join-key index.
///
/// Stops after `empty_stop` consecutive pages without an indexable row, or
/// at `max_pages`. Fetch failures abort the run.
#[instrument(skip(fetcher, config), fields(base = %config.base_url))]
pub async fn build_index<F: PageFetcher>(
    fetcher: &F,
    config: &HarvestConfig,
) -> Result<ListIndex, HarvestError> {
    build_index_with(fetcher, config, &MarkerTextLocator::default()).await
}

/// [`build_index`] with a custom table locator.
pub async fn build_index_with<F: PageFetcher>(
    fetcher: &F,
    config: &HarvestConfig,
    locator: &impl CatalogTableLocator,
) -> Result<ListIndex, HarvestError> {
    info!("Building list index from chara_list");
    let mut index = ListIndex::default();
    let mut streak = EmptyPageStreak::new(config.empty_stop);
    let mut skipped = SkipCounts::default();

    for page in 1..=config.max_pages {
        let url = config.list_page_url(page)?;
        let html = fetcher.fetch(&url, None).await?;

        let mut inserted = 0;
        for row in parse_list_page(&html, &config.base_url, locator) {
            match row {
                Ok((key, entry)) => {
                    index.extend([(key, entry)]);
                    inserted += 1;
                }
                Err(reason) => {
                    debug!("page {}: skipped list row ({})", page, reason.as_str());
                    skipped.record(reason.as_str());
                }
            }
        }

        info!(
            "list page {}: {} rows indexed (total: {})",
            page,
            inserted,
            index.len()
        );
        if streak.record(inserted) == PageOutcome::Exhausted {
            info!(
                "list page {} was empty ({}/{}), stopping",
                page,
                streak.streak(),
                streak.threshold()
            );
            break;
        }
    }

    info!(
        "Built list index with {} entries; skipped rows: [{}]",
        index.len(),
        skipped
    );
    Ok(index)
}
