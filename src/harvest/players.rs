//! Detail-page harvest and reconciliation against the list index

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::list_index::ListIndex;
use super::pagination::{EmptyPageStreak, PageOutcome};
use super::{
    HarvestConfig, HarvestError, PlayerRecord, SkipCounts, is_placeholder_name,
};
use crate::extract::{
    basic_map, css, join_key, plain_text, stat_map, surface_reading, text_with_line_breaks,
};
use crate::http::PageFetcher;

static ITEM: LazyLock<Selector> = LazyLock::new(|| css(".charaListBox > li"));
static IMAGE: LazyLock<Selector> = LazyLock::new(|| css("picture img"));
static NAME: LazyLock<Selector> = LazyLock::new(|| css("div.nameBox span.name"));
static NICKNAME: LazyLock<Selector> = LazyLock::new(|| css("div.name span.nickname"));
static APPEARED_WORKS: LazyLock<Selector> = LazyLock::new(|| css("dl.appearedWorks dd"));
static DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| css("p.description"));
static VIEW_LINK: LazyLock<Selector> = LazyLock::new(|| css("a.verLink"));
static STATS: LazyLock<Selector> = LazyLock::new(|| css("ul.param"));
static BASICS: LazyLock<Selector> = LazyLock::new(|| css("ul.basic"));

/// Image URLs of unrevealed characters contain this marker.
const UNREVEALED_MARKER: &str = "secret";

/// Stat value the site shows for unrevealed stats.
const UNKNOWN_STAT: &str = "?";

/// Why a detail row produced no record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailRowSkip {
    /// Placeholder image of a character not revealed yet
    Unrevealed,
    /// No list-index entry for the row's join key
    Unresolved(UnresolvedRow),
    /// Empty or placeholder name
    Unnamed,
}

impl DetailRowSkip {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unrevealed => "unrevealed",
            Self::Unresolved(_) => "unresolved",
            Self::Unnamed => "unnamed",
        }
    }
}

/// A detail row whose join key has no list-index entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedRow {
    pub page: u32,
    pub name: String,
    pub join_key: Option<String>,
    pub detail_page_url: String,
}

/// Result of a player harvest.
#[derive(Debug, Clone, Default)]
pub struct PlayerHarvest {
    /// Reconciled records in page-then-row order
    pub players: Vec<PlayerRecord>,

    /// Rows that could not be joined against the list index
    pub unresolved: Vec<UnresolvedRow>,

    /// Skip tally by reason
    pub skipped: SkipCounts,
}

/// Raw strings of one detail row before reconciliation.
#[derive(Debug, Clone, Default)]
struct DetailRow {
    name: String,
    nickname: String,
    appeared_works: String,
    description: String,
    image_url: String,
    detail_page_url: String,
    join_key: Option<String>,
    stats: HashMap<String, String>,
    basics: HashMap<String, String>,
}

impl DetailRow {
    fn extract(item: ElementRef<'_>, base: &Url) -> Option<Self> {
        let image = item.select(&IMAGE).next();
        let image_url = image
            .and_then(|img| {
                img.value()
                    .attr("src")
                    .filter(|src| !src.is_empty())
                    .or_else(|| img.value().attr("data-src"))
            })
            .unwrap_or_default()
            .to_string();
        if image_url.contains(UNREVEALED_MARKER) {
            return None;
        }

        let view_href = item
            .select(&VIEW_LINK)
            .next()
            .and_then(|a| a.value().attr("href"))
            .unwrap_or_default();
        let detail_page_url = if view_href.is_empty() {
            String::new()
        } else {
            base.join(view_href).map(String::from).unwrap_or_default()
        };
        let join_key = (!detail_page_url.is_empty())
            .then(|| join_key(&detail_page_url, base))
            .flatten();

        Some(Self {
            name: surface_reading(item.select(&NAME).next()),
            nickname: surface_reading(item.select(&NICKNAME).next()),
            appeared_works: plain_text(item.select(&APPEARED_WORKS).next()),
            description: text_with_line_breaks(item.select(&DESCRIPTION).next()),
            image_url,
            detail_page_url,
            join_key,
            stats: stat_map(Some(item), &STATS),
            basics: basic_map(Some(item), &BASICS),
        })
    }

    fn stat(&self, label: &str) -> Option<i32> {
        self.stats
            .get(label)
            .map(String::as_str)
            .filter(|v| *v != UNKNOWN_STAT)
            .and_then(|v| v.parse().ok())
    }

    fn vocabulary<T: FromStr>(&self, label: &str) -> Option<T> {
        let raw = self.stats.get(label)?;
        if raw == UNKNOWN_STAT || raw.is_empty() {
            return None;
        }
        let parsed = raw.parse().ok();
        if parsed.is_none() {
            debug!("{}: unrecognized {} '{}'", self.name, label, raw);
        }
        parsed
    }

    fn basic(&self, label: &str) -> String {
        self.basics.get(label).cloned().unwrap_or_default()
    }

    fn reconcile(self, page: u32, index: &ListIndex) -> Result<PlayerRecord, DetailRowSkip> {
        let Some((join_key, entry)) = self
            .join_key
            .as_deref()
            .and_then(|key| index.get(key).map(|entry| (key.to_string(), entry)))
        else {
            return Err(DetailRowSkip::Unresolved(UnresolvedRow {
                page,
                name: self.name,
                join_key: self.join_key,
                detail_page_url: self.detail_page_url,
            }));
        };

        let id = if entry.display_id.is_empty() {
            join_key.clone()
        } else {
            entry.display_id.clone()
        };

        Ok(PlayerRecord {
            id,
            sequence_number: entry.sequence_number,
            kana_reading: entry.kana_reading.clone(),
            category_tags: entry.category_tags.clone(),
            affiliation_tags: entry.affiliation_tags.clone(),
            position: self.vocabulary("ポジション"),
            element: self.vocabulary("属性"),
            kick: self.stat("キック"),
            control: self.stat("コントロール"),
            technique: self.stat("テクニック"),
            pressure: self.stat("プレッシャー"),
            physical: self.stat("フィジカル"),
            agility: self.stat("アジリティ"),
            intelligence: self.stat("インテリジェンス"),
            age_group: self.basic("年代区分"),
            grade: self.basic("学年"),
            gender: self.basic("性別"),
            join_key,
            name: self.name,
            nickname: self.nickname,
            appeared_works: self.appeared_works,
            description: self.description,
            image_url: self.image_url,
            detail_page_url: self.detail_page_url,
        })
    }
}

/// Parse one detail page and reconcile its rows against `index`.
///
/// Unresolved rows are reported before the name filter is applied, so per
/// page `emitted + unresolved == rows extracted`.
pub fn parse_detail_page(
    html: &str,
    page: u32,
    base: &Url,
    index: &ListIndex,
) -> Vec<Result<PlayerRecord, DetailRowSkip>> {
    let document = Html::parse_document(html);
    document
        .select(&ITEM)
        .map(|item| {
            let row = DetailRow::extract(item, base).ok_or(DetailRowSkip::Unrevealed)?;
            let record = row.reconcile(page, index)?;
            if is_placeholder_name(&record.name) {
                return Err(DetailRowSkip::Unnamed);
            }
            Ok(record)
        })
        .collect()
}

/// Walk the detail pages and join every row against `index`.
///
/// Stops after `empty_stop` consecutive pages without an emitted record, or
/// at `max_pages`. Fetch failures abort the run.
#[instrument(skip(fetcher, config, index), fields(base = %config.base_url, indexed = index.len()))]
pub async fn harvest_players<F: PageFetcher>(
    fetcher: &F,
    config: &HarvestConfig,
    index: &ListIndex,
) -> Result<PlayerHarvest, HarvestError> {
    let mut harvest = PlayerHarvest::default();
    let mut streak = EmptyPageStreak::new(config.empty_stop);

    for page in 1..=config.max_pages {
        let url = config.detail_page_url(page)?;
        info!("Fetching detail page {}", page);
        let html = fetcher.fetch(&url, Some(&config.user_agent)).await?;

        let mut emitted = 0;
        for row in parse_detail_page(&html, page, &config.base_url, index) {
            match row {
                Ok(record) => {
                    harvest.players.push(record);
                    emitted += 1;
                }
                Err(DetailRowSkip::Unresolved(unresolved)) => {
                    warn!(
                        "page {}: unknown player {} (key: {})",
                        page,
                        unresolved.name,
                        unresolved.join_key.as_deref().unwrap_or("-")
                    );
                    harvest.skipped.record("unresolved");
                    harvest.unresolved.push(unresolved);
                }
                Err(reason) => {
                    debug!("page {}: skipped detail row ({})", page, reason.as_str());
                    harvest.skipped.record(reason.as_str());
                }
            }
        }

        if emitted > 0 {
            info!(
                "  got {} players (total: {})",
                emitted,
                harvest.players.len()
            );
        }
        if streak.record(emitted) == PageOutcome::Exhausted {
            info!(
                "  page {} was empty ({}/{}), stopping",
                page,
                streak.streak(),
                streak.threshold()
            );
            break;
        } else if emitted == 0 {
            info!(
                "  page {} was empty ({}/{})",
                page,
                streak.streak(),
                streak.threshold()
            );
        }
    }

    info!(
        "Harvested {} players, {} unresolved; skipped rows: [{}]",
        harvest.players.len(),
        harvest.unresolved.len(),
        harvest.skipped
    );
    Ok(harvest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::list_index::tests::PageMap;
    use crate::harvest::{DETAIL_USER_AGENT, Element, ListIndexEntry, Position};

    fn base() -> Url {
        Url::parse("https://zukan.example.jp").unwrap()
    }

    fn index() -> ListIndex {
        [
            (
                "k1".to_string(),
                ListIndexEntry {
                    display_id: "p001".into(),
                    kana_reading: "えんどう まもる".into(),
                    sequence_number: Some(1),
                    category_tags: vec!["キャプテン".into()],
                    affiliation_tags: vec!["雷門中".into()],
                },
            ),
            (
                "k2".to_string(),
                ListIndexEntry {
                    display_id: String::new(),
                    sequence_number: Some(2),
                    ..Default::default()
                },
            ),
        ]
        .into_iter()
        .collect()
    }

    fn item(key: &str, name: &str, img: &str, position: &str, kick: &str) -> String {
        format!(
            r#"<li>
                 <picture><img src="{img}"></picture>
                 <div class="nameBox"><span class="name"><ruby>{name}<rt>ふりがな</rt></ruby></span></div>
                 <div class="name"><span class="nickname">守護神</span></div>
                 <dl class="appearedWorks"><dt>登場作品</dt><dd> イナズマイレブン </dd></dl>
                 <p class="description">一行目<br>二行目</p>
                 <a class="verLink" href="/chara_model_view/?q={key}">view</a>
                 <ul class="param">
                   <li><dl><dt>ポジション</dt><dd><p>{position}</p></dd></dl></li>
                   <li><dl><dt>属性</dt><dd><p>山</p></dd></dl></li>
                   <li><dl><dt>キック</dt><dd><table><tr><td>{kick}</td></tr></table></dd></dl></li>
                   <li><dl><dt>コントロール</dt><dd><p>?</p></dd></dl></li>
                 </ul>
                 <ul class="basic">
                   <li><dl><dt>年代区分</dt><dd>中学生</dd></dl></li>
                   <li><dl><dt>学年</dt><dd>2年</dd></dl></li>
                   <li><dl><dt>性別</dt><dd>男</dd></dl></li>
                 </ul>
               </li>"#
        )
    }

    fn page(items: &[String]) -> String {
        format!(
            r#"<html><body><ul class="charaListBox">{}</ul></body></html>"#,
            items.concat()
        )
    }

    #[test]
    fn test_reconciled_record() {
        let html = page(&[item("k1", "円堂守", "/img/p001.png", "GK", "85")]);
        let rows = parse_detail_page(&html, 1, &base(), &index());
        let record = rows[0].clone().unwrap();

        assert_eq!(record.id, "p001");
        assert_eq!(record.join_key, "k1");
        assert_eq!(record.sequence_number, Some(1));
        assert_eq!(record.name, "円堂守");
        assert_eq!(record.kana_reading, "えんどう まもる");
        assert_eq!(record.nickname, "守護神");
        assert_eq!(record.appeared_works, "イナズマイレブン");
        assert_eq!(record.description, "一行目\n二行目");
        assert_eq!(record.image_url, "/img/p001.png");
        assert_eq!(
            record.detail_page_url,
            "https://zukan.example.jp/chara_model_view/?q=k1"
        );
        assert_eq!(record.position, Some(Position::GK));
        assert_eq!(record.element, Some(Element::Mountain));
        assert_eq!(record.kick, Some(85));
        assert_eq!(record.control, None);
        assert_eq!(record.technique, None);
        assert_eq!(record.age_group, "中学生");
        assert_eq!(record.grade, "2年");
        assert_eq!(record.gender, "男");
        assert_eq!(record.category_tags, vec!["キャプテン"]);
        assert_eq!(record.affiliation_tags, vec!["雷門中"]);
    }

    #[test]
    fn test_unknown_stat_maps_to_null() {
        let html = page(&[item("k1", "円堂守", "/img/a.png", "?", "?")]);
        let record = parse_detail_page(&html, 1, &base(), &index())[0]
            .clone()
            .unwrap();
        assert_eq!(record.position, None);
        assert_eq!(record.kick, None);
    }

    #[test]
    fn test_empty_display_id_falls_back_to_join_key() {
        let html = page(&[item("k2", "風丸一郎太", "/img/b.png", "DF", "70")]);
        let record = parse_detail_page(&html, 1, &base(), &index())[0]
            .clone()
            .unwrap();
        assert_eq!(record.id, "k2");
    }

    #[test]
    fn test_unrevealed_rows_never_emitted() {
        let html = page(&[
            item("k1", "円堂守", "/img/secret_01.png", "GK", "85"),
            r#"<li><picture><img data-src="/img/secret.png"></picture><div class="nameBox"><span class="name">豪炎寺</span></div><a class="verLink" href="/chara_model_view/?q=k1">v</a></li>"#
                .to_string(),
        ]);
        let rows = parse_detail_page(&html, 1, &base(), &index());
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| *r == Err(DetailRowSkip::Unrevealed)));
    }

    #[test]
    fn test_unresolved_rows_are_reported_not_emitted() {
        let html = page(&[
            item("k1", "円堂守", "/img/a.png", "GK", "85"),
            item("missing", "謎の選手", "/img/b.png", "FW", "60"),
            item("k2", "", "/img/c.png", "FW", "60"),
        ]);
        let rows = parse_detail_page(&html, 4, &base(), &index());

        let emitted = rows.iter().filter(|r| r.is_ok()).count();
        let unresolved: Vec<_> = rows
            .iter()
            .filter_map(|r| match r {
                Err(DetailRowSkip::Unresolved(u)) => Some(u.clone()),
                _ => None,
            })
            .collect();
        let unnamed = rows
            .iter()
            .filter(|r| **r == Err(DetailRowSkip::Unnamed))
            .count();

        assert_eq!(emitted + unresolved.len() + unnamed, rows.len());
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].page, 4);
        assert_eq!(unresolved[0].name, "謎の選手");
        assert_eq!(unresolved[0].join_key.as_deref(), Some("missing"));
    }

    #[test]
    fn test_placeholder_name_filtered() {
        let html = page(&[item("k1", "？？？", "/img/a.png", "GK", "85")]);
        let rows = parse_detail_page(&html, 1, &base(), &index());
        assert_eq!(rows[0], Err(DetailRowSkip::Unnamed));
    }

    #[tokio::test]
    async fn test_harvest_pages_in_order_with_user_agent() {
        let config = HarvestConfig::builder()
            .base_url(base())
            .empty_stop(2)
            .build()
            .unwrap();
        let fetcher = PageMap::default()
            .with(
                config.detail_page_url(1).unwrap(),
                page(&[item("k1", "円堂守", "/img/a.png", "GK", "85")]),
            )
            .with(
                config.detail_page_url(2).unwrap(),
                page(&[
                    item("k2", "風丸一郎太", "/img/b.png", "DF", "70"),
                    item("zzz", "謎", "/img/c.png", "DF", "70"),
                ]),
            );

        let harvest = harvest_players(&fetcher, &config, &index()).await.unwrap();

        let names: Vec<_> = harvest.players.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["円堂守", "風丸一郎太"]);
        assert_eq!(harvest.unresolved.len(), 1);
        assert_eq!(harvest.skipped.get("unresolved"), 1);
        assert_eq!(fetcher.request_count(), 4);
        assert!(
            fetcher
                .requests
                .borrow()
                .iter()
                .all(|(_, ua)| ua.as_deref() == Some(DETAIL_USER_AGENT))
        );
    }

    #[tokio::test]
    async fn test_page_of_only_unresolved_rows_counts_as_empty() {
        let config = HarvestConfig::builder()
            .base_url(base())
            .empty_stop(1)
            .build()
            .unwrap();
        let fetcher = PageMap::default()
            .with(
                config.detail_page_url(1).unwrap(),
                page(&[item("nope", "謎", "/img/c.png", "DF", "70")]),
            )
            .with(
                config.detail_page_url(2).unwrap(),
                page(&[item("k1", "円堂守", "/img/a.png", "GK", "85")]),
            );

        let harvest = harvest_players(&fetcher, &config, &index()).await.unwrap();
        assert!(harvest.players.is_empty());
        assert_eq!(fetcher.request_count(), 1);
    }
}
