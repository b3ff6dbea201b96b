//! Definition-list key/value extraction

use std::collections::HashMap;
use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use super::css;
use super::text::{collapse_whitespace, plain_text};

static DL: LazyLock<Selector> = LazyLock::new(|| css("dl"));
static DT: LazyLock<Selector> = LazyLock::new(|| css("dt"));
static DD: LazyLock<Selector> = LazyLock::new(|| css("dd"));
static DD_PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| css("dd p"));
static DD_TABLE_CELL: LazyLock<Selector> = LazyLock::new(|| css("dd table td"));

/// Stat pairs under `container`.
///
/// The value of each pair comes from the first `dd p`, or failing that the
/// first `dd table td`. Pairs with an empty label or neither location are
/// skipped.
pub fn stat_map(fragment: Option<ElementRef<'_>>, container: &Selector) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for dl in definition_lists(fragment, container) {
        let key = plain_text(dl.select(&DT).next());
        if key.is_empty() {
            continue;
        }
        let value = dl
            .select(&DD_PARAGRAPH)
            .next()
            .or_else(|| dl.select(&DD_TABLE_CELL).next());
        if let Some(value) = value {
            map.insert(key, collapse_whitespace(&value.text().collect::<String>()));
        }
    }
    map
}

/// Plain label/value pairs under `container`.
pub fn basic_map(fragment: Option<ElementRef<'_>>, container: &Selector) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for dl in definition_lists(fragment, container) {
        let key = plain_text(dl.select(&DT).next());
        if key.is_empty() {
            continue;
        }
        map.insert(key, plain_text(dl.select(&DD).next()));
    }
    map
}

fn definition_lists<'a>(
    fragment: Option<ElementRef<'a>>,
    container: &Selector,
) -> Vec<ElementRef<'a>> {
    let Some(root) = fragment else {
        return Vec::new();
    };
    root.select(container)
        .flat_map(|c| c.select(&DL).collect::<Vec<_>>())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    const ITEM: &str = r#"
        <li>
          <ul class="param">
            <li><dl><dt>ポジション</dt><dd><p>FW</p></dd></dl></li>
            <li><dl><dt> キック </dt><dd><table><tr><td>120</td><td>ignored</td></tr></table></dd></dl></li>
            <li><dl><dt>属性</dt><dd><p>?</p><table><tr><td>火</td></tr></table></dd></dl></li>
            <li><dl><dt></dt><dd><p>nameless</p></dd></dl></li>
            <li><dl><dt>空</dt><dd><span>no location</span></dd></dl></li>
          </ul>
          <ul class="basic">
            <li><dl><dt>学年</dt><dd> 2年 </dd></dl></li>
            <li><dl><dt>性別</dt></dl></li>
          </ul>
        </li>"#;

    fn with_item<T>(f: impl FnOnce(Option<ElementRef<'_>>) -> T) -> T {
        let doc = Html::parse_fragment(ITEM);
        let li = Selector::parse("li").unwrap();
        f(doc.select(&li).next())
    }

    #[test]
    fn test_stat_map_resolves_value_variants() {
        let stats = with_item(|li| stat_map(li, &Selector::parse("ul.param").unwrap()));
        assert_eq!(stats.get("ポジション").map(String::as_str), Some("FW"));
        assert_eq!(stats.get("キック").map(String::as_str), Some("120"));
        // paragraph wins over the nested table
        assert_eq!(stats.get("属性").map(String::as_str), Some("?"));
        assert!(!stats.contains_key(""));
        assert!(!stats.contains_key("空"));
    }

    #[test]
    fn test_basic_map_reads_plain_text() {
        let basic = with_item(|li| basic_map(li, &Selector::parse("ul.basic").unwrap()));
        assert_eq!(basic.get("学年").map(String::as_str), Some("2年"));
        assert_eq!(basic.get("性別").map(String::as_str), Some(""));
        assert!(!basic.contains_key("ポジション"));
    }

    #[test]
    fn test_absent_fragment_yields_empty_maps() {
        let container = Selector::parse("ul.param").unwrap();
        assert!(stat_map(None, &container).is_empty());
        assert!(basic_map(None, &container).is_empty());
    }
}
