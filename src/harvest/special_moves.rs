//! Special-move harvest across the four category listings

use std::sync::LazyLock;

use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::config::MoveNumbering;
use super::{
    HarvestConfig, HarvestError, SkipCounts, SpecialMoveCategory, SpecialMoveRecord,
    is_placeholder_name,
};
use crate::extract::{css, surface_reading, text_with_line_breaks};
use crate::http::PageFetcher;

static ITEM: LazyLock<Selector> = LazyLock::new(|| css(".skillListBox > li"));
static NAME: LazyLock<Selector> = LazyLock::new(|| css("div.nameBox span.name"));
static DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| css("p.description"));
static MOVIE_TRIGGER: LazyLock<Selector> = LazyLock::new(|| css("[data-movie]"));

/// Why a special-move item was not emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveRowSkip {
    /// Empty or placeholder name
    Unnamed,
}

impl MoveRowSkip {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unnamed => "unnamed",
        }
    }
}

/// Content-derived identifier: hex SHA-256 of `name|movie`.
///
/// `movie` is the `data-movie` attribute as the page writes it, before it is
/// resolved against the base URL, so the id does not move with `--base`.
pub fn special_move_id(name: &str, movie: &str) -> String {
    let hash = Sha256::digest(format!("{name}|{movie}").as_bytes());
    format!("{hash:x}")
}

/// Sequence numbers shared by every category of one harvest.
#[derive(Debug, Clone)]
pub struct SequenceCounter {
    policy: MoveNumbering,
    next: u32,
}

impl SequenceCounter {
    pub fn new(policy: MoveNumbering) -> Self {
        Self { policy, next: 1 }
    }

    /// Number for an emitted item.
    pub fn next_number(&mut self) -> u32 {
        let number = self.next;
        self.next += 1;
        number
    }

    /// Account for a filtered item. Under [`MoveNumbering::CountAll`] it
    /// still consumes a number.
    pub fn skip(&mut self) {
        if self.policy == MoveNumbering::CountAll {
            self.next += 1;
        }
    }
}

/// Raw fields of one listing item.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MoveItem {
    name: String,
    description: String,
    /// `data-movie` as written on the page
    movie: String,
    media_url: String,
}

/// Parse one listing page into its items in page order.
///
/// Placeholder items are kept; numbering and filtering are the caller's
/// concern.
pub fn parse_move_page(html: &str, base: &Url) -> Vec<Result<MoveDraft, MoveRowSkip>> {
    let document = Html::parse_document(html);
    document
        .select(&ITEM)
        .map(|item| {
            let name = surface_reading(item.select(&NAME).next());
            let description = text_with_line_breaks(item.select(&DESCRIPTION).next());
            let raw_movie = item
                .select(&MOVIE_TRIGGER)
                .next()
                .and_then(|el| el.value().attr("data-movie"))
                .map(str::trim)
                .unwrap_or_default();
            let media_url = if raw_movie.is_empty() {
                String::new()
            } else {
                base.join(raw_movie)
                    .map(String::from)
                    .unwrap_or_else(|_| raw_movie.to_string())
            };

            if is_placeholder_name(&name) {
                return Err(MoveRowSkip::Unnamed);
            }
            Ok(MoveDraft(MoveItem {
                name,
                description,
                movie: raw_movie.to_string(),
                media_url,
            }))
        })
        .collect()
}

/// A listing item that passed the name filter and awaits its number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveDraft(MoveItem);

impl MoveDraft {
    fn into_record(self, sequence_number: u32, category: SpecialMoveCategory) -> SpecialMoveRecord {
        let MoveItem {
            name,
            description,
            movie,
            media_url,
        } = self.0;
        SpecialMoveRecord {
            id: special_move_id(&name, &movie),
            sequence_number,
            name,
            description,
            media_url,
            category,
        }
    }
}

/// Walk every category listing and collect the special moves.
///
/// Categories run in configured order. A category stops at the first page
/// without list items, or at `max_pages`.
#[instrument(skip(fetcher, config), fields(base = %config.base_url, numbering = ?config.move_numbering))]
pub async fn harvest_special_moves<F: PageFetcher>(
    fetcher: &F,
    config: &HarvestConfig,
) -> Result<Vec<SpecialMoveRecord>, HarvestError> {
    let mut moves = Vec::new();
    let mut counter = SequenceCounter::new(config.move_numbering);
    let mut skipped = SkipCounts::default();

    for (category, query) in &config.move_categories {
        info!("Harvesting {} special moves (q={})", category, query);
        let before = moves.len();

        for page in 1..=config.max_pages {
            let url = config.move_page_url(page, query)?;
            let html = fetcher.fetch(&url, Some(&config.user_agent)).await?;
            let items = parse_move_page(&html, &config.base_url);
            if items.is_empty() {
                debug!("{} page {} has no items, stopping", category, page);
                break;
            }

            for item in items {
                match item {
                    Ok(draft) => {
                        moves.push(draft.into_record(counter.next_number(), *category));
                    }
                    Err(reason) => {
                        counter.skip();
                        debug!("{} page {}: skipped item ({})", category, page, reason.as_str());
                        skipped.record(reason.as_str());
                    }
                }
            }
        }

        let got = moves.len() - before;
        if got == 0 {
            warn!(
                "{} (q={}) yielded no special moves; the category query may be wrong",
                category, query
            );
        } else {
            info!("  got {} {} moves", got, category);
        }
    }

    info!(
        "Harvested {} special moves; skipped items: [{}]",
        moves.len(),
        skipped
    );
    Ok(moves)
}
