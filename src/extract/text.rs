//! Text normalization over parsed HTML fragments

use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;
use scraper::node::Node;

static HORIZONTAL_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\r\x0C\x0B]+").expect("valid whitespace pattern"));

/// How a fragment's text nodes are flattened.
#[derive(Debug, Clone, Copy, Default)]
struct Flatten {
    /// Emit `\n` for every `<br>`
    line_breaks: bool,
    /// Drop `<rt>`/`<rp>` furigana subtrees
    strip_ruby: bool,
}

/// Collapse runs of horizontal whitespace into a single space and trim.
///
/// Newlines are left in place so that line breaks produced by
/// [`text_with_line_breaks`] survive normalization.
pub fn collapse_whitespace(text: &str) -> String {
    HORIZONTAL_WS.replace_all(text, " ").trim().to_string()
}

/// Plain text of a fragment, whitespace-collapsed.
pub fn plain_text(fragment: Option<ElementRef<'_>>) -> String {
    fragment
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .unwrap_or_default()
}

/// Text of a fragment with every `<br>` turned into a newline.
///
/// Newlines that only exist in the markup source are treated as ordinary
/// whitespace. Each line is collapsed on its own, which also removes the
/// `" \n "` residue left by breaks inside padded containers.
pub fn text_with_line_breaks(fragment: Option<ElementRef<'_>>) -> String {
    let Some(el) = fragment else {
        return String::new();
    };
    let raw = flatten(
        el,
        Flatten {
            line_breaks: true,
            strip_ruby: false,
        },
    );
    raw.split('\n')
        .map(collapse_whitespace)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Display text of a fragment with phonetic annotations removed.
pub fn surface_reading(fragment: Option<ElementRef<'_>>) -> String {
    let Some(el) = fragment else {
        return String::new();
    };
    let raw = flatten(
        el,
        Flatten {
            line_breaks: false,
            strip_ruby: true,
        },
    );
    collapse_whitespace(&raw)
}

/// Line-break separated values of a table cell, trimmed, empties dropped.
pub fn text_lines(cell: Option<ElementRef<'_>>) -> Vec<String> {
    let Some(el) = cell else {
        return Vec::new();
    };
    let raw = flatten(
        el,
        Flatten {
            line_breaks: true,
            strip_ruby: false,
        },
    );
    raw.split('\n')
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect()
}

fn flatten(root: ElementRef<'_>, mode: Flatten) -> String {
    let mut out = String::new();
    push_children(root, mode, &mut out);
    out
}

fn push_children(element: ElementRef<'_>, mode: Flatten, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                if mode.line_breaks {
                    out.extend(text.chars().map(|c| if c == '\n' { ' ' } else { c }));
                } else {
                    out.push_str(text);
                }
            }
            Node::Element(tag) => match tag.name() {
                "br" if mode.line_breaks => out.push('\n'),
                "rt" | "rp" if mode.strip_ruby => {}
                _ => {
                    if let Some(nested) = ElementRef::wrap(child) {
                        push_children(nested, mode, out);
                    }
                }
            },
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn first<'a>(doc: &'a Html, css: &str) -> Option<ElementRef<'a>> {
        let selector = Selector::parse(css).unwrap();
        doc.select(&selector).next()
    }

    #[test]
    fn test_collapse_whitespace_keeps_newlines() {
        assert_eq!(collapse_whitespace("  a \t b\r\n c  "), "a b \n c");
        assert_eq!(collapse_whitespace(""), "");
    }

    #[test]
    fn test_line_breaks_become_newlines() {
        let doc = Html::parse_fragment(
            "<p class=\"d\">  first line<br>second <b>bold</b> line<br/>third  </p>",
        );
        let text = text_with_line_breaks(first(&doc, "p.d"));
        assert_eq!(text, "first line\nsecond bold line\nthird");
        assert_eq!(text.matches('\n').count(), 2);
        assert!(!text.contains('<'));
    }

    #[test]
    fn test_padded_breaks_collapse_to_bare_newline() {
        let doc = Html::parse_fragment("<p>\n    alpha\n    <br>\n    beta\n</p>");
        assert_eq!(text_with_line_breaks(first(&doc, "p")), "alpha\nbeta");
    }

    #[test]
    fn test_source_newlines_are_not_line_breaks() {
        let doc = Html::parse_fragment("<p>one\ntwo<br>three</p>");
        let text = text_with_line_breaks(first(&doc, "p"));
        assert_eq!(text, "one two\nthree");
    }

    #[test]
    fn test_surface_reading_drops_furigana() {
        let doc = Html::parse_fragment(
            "<span class=\"name\"><ruby>円堂<rp>(</rp><rt>えんどう</rt><rp>)</rp></ruby> <ruby>守<rt>まもる</rt></ruby></span>",
        );
        let surface = surface_reading(first(&doc, "span.name"));
        assert_eq!(surface, "円堂 守");
        assert!(!surface.contains("えんどう"));
        assert!(!surface.contains("まもる"));
    }

    #[test]
    fn test_text_lines_splits_cell() {
        let doc = Html::parse_fragment(
            "<table><tr><td> 雷門 <br> <br>帝国学園<br></td></tr></table>",
        );
        assert_eq!(text_lines(first(&doc, "td")), vec!["雷門", "帝国学園"]);
    }

    #[test]
    fn test_absent_fragment_yields_zero_values() {
        assert_eq!(text_with_line_breaks(None), "");
        assert_eq!(surface_reading(None), "");
        assert_eq!(plain_text(None), "");
        assert!(text_lines(None).is_empty());
    }
}
