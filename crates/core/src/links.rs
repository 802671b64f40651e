//! Hypertext link extraction and placeholder injection.
//!
//! Raw page text carries links as `[[uid::title|alias]]`. Before a revision is
//! diffed, every link token is replaced by a numeric placeholder `[[N]]` and
//! recorded in the revision's link table; on the way out the placeholders are
//! turned back into link syntax (for editing) or into anchors (for display).
//!
//! Link token grammar:
//!
//! ```text
//! \[\[                                          open brackets
//! (?:[ ]*(?P<uid>[a-zA-Z][a-zA-Z0-9]*)[ ]*::)?  optional owner uid
//! (?!.*::)                                      no further `::` on the line
//! (?P<title>[^|\t\n\r\f\v\[\]]+)                page title
//! (?:\|(?P<alias>[^|\t\n\r\f\v\[\]]+))?         optional display alias
//! \]\]                                          close brackets
//! ```
//!
//! The `regex` crate has no look-around, so the `(?!.*::)` condition is checked
//! on each candidate match by [`rest_of_line_has_separator`].

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::LinkNum;

/// Link token pattern without the look-ahead condition.
const LINK_PATTERN: &str = r"\[\[(?:[ ]*(?P<uid>[a-zA-Z][a-zA-Z0-9]*)[ ]*::)?(?P<title>[^|\t\n\r\x0B\x0C\[\]]+)(?:\|(?P<alias>[^|\t\n\r\x0B\x0C\[\]]+))?\]\]";

/// Placeholder pattern: a link number with no leading zeros.
const PLACEHOLDER_PATTERN: &str = r"\[\[(?P<num>0|[1-9][0-9]*)\]\]";

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(LINK_PATTERN).expect("valid regex"));

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PLACEHOLDER_PATTERN).expect("valid regex"));

/// Separator between an owner uid and a page title.
const UID_SEPARATOR: &str = "::";

// ---------------------------------------------------------------------------
// Link records
// ---------------------------------------------------------------------------

/// One entry in a revision's link table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub link_num: LinkNum,
    /// Owner of the target page; `None` means the linking page's owner.
    pub tgt_uid: Option<String>,
    pub tgt_title: String,
    /// Display text; `None` means the title is displayed.
    pub tgt_alias: Option<String>,
}

impl Link {
    /// Canonical link syntax, `[[uid::title|alias]]` with defaults omitted.
    pub fn link_text(&self) -> String {
        let mut text = String::from("[[");
        if let Some(uid) = &self.tgt_uid {
            text.push_str(uid);
            text.push_str(UID_SEPARATOR);
        }
        text.push_str(&self.tgt_title);
        if let Some(alias) = &self.tgt_alias {
            text.push('|');
            text.push_str(alias);
        }
        text.push_str("]]");
        text
    }

    /// The `[[N]]` placeholder standing in for this link.
    pub fn placeholder_text(&self) -> String {
        placeholder(self.link_num)
    }

    /// Text shown for this link when rendered.
    pub fn display_text(&self) -> &str {
        self.tgt_alias.as_deref().unwrap_or(&self.tgt_title)
    }

    /// Uid of the target page's owner, resolving the implicit default.
    pub fn target_owner<'a>(&'a self, page_owner_uid: &'a str) -> &'a str {
        self.tgt_uid.as_deref().unwrap_or(page_owner_uid)
    }
}

/// Format a placeholder for `link_num`.
pub fn placeholder(link_num: LinkNum) -> String {
    format!("[[{link_num}]]")
}

/// Result of [`extract_links`]: placeholder text plus its link table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    pub links: Vec<Link>,
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// A link token found in raw text, already trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkToken<'t> {
    pub start: usize,
    pub end: usize,
    pub uid: Option<&'t str>,
    pub title: &'t str,
    pub alias: Option<&'t str>,
}

/// `true` if a `::` occurs between `pos` and the end of its line.
fn rest_of_line_has_separator(text: &str, pos: usize) -> bool {
    let rest = &text[pos..];
    let line = match rest.find('\n') {
        Some(nl) => &rest[..nl],
        None => rest,
    };
    line.contains(UID_SEPARATOR)
}

fn token_from_captures<'t>(text: &'t str, caps: &Captures<'t>) -> Option<LinkToken<'t>> {
    let whole = caps.get(0)?;
    let title = caps.name("title")?;
    if rest_of_line_has_separator(text, title.start()) {
        return None;
    }
    let title_text = title.as_str().trim();
    if title_text.is_empty() {
        return None;
    }
    Some(LinkToken {
        start: whole.start(),
        end: whole.end(),
        uid: caps.name("uid").map(|m| m.as_str()),
        title: title_text,
        alias: caps
            .name("alias")
            .map(|m| m.as_str().trim())
            .filter(|a| !a.is_empty()),
    })
}

/// Find the first link token starting at or after byte offset `from`.
pub fn find_link(text: &str, from: usize) -> Option<LinkToken<'_>> {
    let mut pos = from;
    while pos <= text.len() {
        let caps = LINK_RE.captures_at(text, pos)?;
        if let Some(token) = token_from_captures(text, &caps) {
            return Some(token);
        }
        // Candidates always begin with `[`, so the next byte is a boundary.
        pos = caps.get(0)?.start() + 1;
    }
    None
}

/// Parse `s` as exactly one link token.
pub fn parse_link(s: &str) -> Option<LinkToken<'_>> {
    find_link(s, 0).filter(|t| t.start == 0 && t.end == s.len())
}

/// A placeholder occurrence in placeholder-form text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderMatch {
    pub start: usize,
    pub end: usize,
    pub link_num: LinkNum,
}

/// All placeholders in `text`, in order.
///
/// A placeholder-shaped span whose number does not fit a [`LinkNum`] is a
/// consistency violation: extraction never produces one.
pub fn find_placeholders(text: &str) -> Result<Vec<PlaceholderMatch>, CoreError> {
    let mut found = Vec::new();
    for caps in PLACEHOLDER_RE.captures_iter(text) {
        let (Some(whole), Some(num)) = (caps.get(0), caps.name("num")) else {
            continue;
        };
        let link_num = num.as_str().parse::<LinkNum>().map_err(|_| {
            CoreError::Consistency(format!(
                "Placeholder number {} is out of range",
                num.as_str()
            ))
        })?;
        found.push(PlaceholderMatch {
            start: whole.start(),
            end: whole.end(),
            link_num,
        });
    }
    Ok(found)
}

/// `true` if `s` is exactly one placeholder.
pub fn is_placeholder(s: &str) -> bool {
    PLACEHOLDER_RE
        .find(s)
        .is_some_and(|m| m.start() == 0 && m.end() == s.len())
}

// ---------------------------------------------------------------------------
// Extract / inject
// ---------------------------------------------------------------------------

/// Replace every link token in `raw` with a numbered placeholder.
///
/// Links are numbered from zero in order of occurrence. A uid equal to
/// `page_owner_uid` and an alias equal to the title are dropped, so the
/// link table holds the canonical form. Placeholder-shaped literals such as
/// `[[7]]` are always taken as links (to the page titled `7`), even where the
/// `::` rule rejects them, so placeholder text is never ambiguous.
pub fn extract_links(raw: &str, page_owner_uid: &str) -> Extraction {
    let mut text = String::with_capacity(raw.len());
    let mut links: Vec<Link> = Vec::new();
    let mut cursor = 0usize;

    loop {
        let link = find_link(raw, cursor);
        let literal = PLACEHOLDER_RE.captures_at(raw, cursor);

        let next = match (link, literal) {
            (Some(tok), Some(lit)) if lit.get(0).is_some_and(|m| m.start() < tok.start) => {
                literal_token(&lit)
            }
            (Some(tok), _) => Some(tok),
            (None, Some(lit)) => literal_token(&lit),
            (None, None) => None,
        };
        let Some(token) = next else {
            break;
        };

        let link_num = links.len() as LinkNum;
        text.push_str(&raw[cursor..token.start]);
        text.push_str(&placeholder(link_num));
        links.push(Link {
            link_num,
            tgt_uid: token
                .uid
                .filter(|uid| *uid != page_owner_uid)
                .map(str::to_string),
            tgt_title: token.title.to_string(),
            tgt_alias: token
                .alias
                .filter(|alias| *alias != token.title)
                .map(str::to_string),
        });
        cursor = token.end;
    }

    text.push_str(&raw[cursor..]);
    Extraction { text, links }
}

fn literal_token<'t>(caps: &Captures<'t>) -> Option<LinkToken<'t>> {
    let whole = caps.get(0)?;
    Some(LinkToken {
        start: whole.start(),
        end: whole.end(),
        uid: None,
        title: caps.name("num")?.as_str(),
        alias: None,
    })
}

/// Replace each placeholder in `text` with the output of `f`.
pub fn substitute_placeholders<F>(text: &str, mut f: F) -> Result<String, CoreError>
where
    F: FnMut(LinkNum) -> Result<String, CoreError>,
{
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;
    for m in find_placeholders(text)? {
        out.push_str(&text[cursor..m.start]);
        out.push_str(&f(m.link_num)?);
        cursor = m.end;
    }
    out.push_str(&text[cursor..]);
    Ok(out)
}

/// Look up link `link_num` in a revision's link table.
pub fn link_for(links: &[Link], link_num: LinkNum) -> Result<&Link, CoreError> {
    // Tables are stored in link-number order; fall back to a scan otherwise.
    usize::try_from(link_num)
        .ok()
        .and_then(|idx| links.get(idx))
        .filter(|l| l.link_num == link_num)
        .or_else(|| links.iter().find(|l| l.link_num == link_num))
        .ok_or_else(|| {
            CoreError::Consistency(format!(
                "Placeholder [[{link_num}]] refers to a link that does not exist"
            ))
        })
}

/// Turn placeholder text back into raw link syntax.
pub fn inject_links(text: &str, links: &[Link]) -> Result<String, CoreError> {
    substitute_placeholders(text, |n| Ok(link_for(links, n)?.link_text()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    // -- grammar -------------------------------------------------------------

    #[test]
    fn grammar_accepts_documented_forms() {
        assert!(parse_link("[[Hello World]]").is_some());
        assert!(parse_link("[[Home|Home page]]").is_some());
        assert!(parse_link("[[ nw::Home]]").is_some());
        assert!(parse_link("[[nw9 ::Home|Home page]]").is_some());
        assert!(parse_link("[[nw::Home:Home page]]").is_some());
    }

    #[test]
    fn grammar_rejects_documented_forms() {
        assert!(parse_link("[[nw|Home|Home page]]").is_none());
        assert!(parse_link("[[nw|Home::Home page]]").is_none());
        assert!(parse_link("[[nw::Home::Home page]]").is_none());
        assert!(parse_link("[[9nw ::Home|Home page]]").is_none());
    }

    #[test]
    fn grammar_captures_parts() {
        let tok = parse_link("[[nw9 ::Home|Home page]]").unwrap();
        assert_eq!(tok.uid, Some("nw9"));
        assert_eq!(tok.title, "Home");
        assert_eq!(tok.alias, Some("Home page"));

        let tok = parse_link("[[nw::Home:Home page]]").unwrap();
        assert_eq!(tok.uid, Some("nw"));
        assert_eq!(tok.title, "Home:Home page");
        assert_eq!(tok.alias, None);
    }

    #[test]
    fn grammar_rejects_blank_title() {
        assert!(parse_link("[[   ]]").is_none());
        assert!(parse_link("[[nw::  ]]").is_none());
    }

    #[test]
    fn separator_later_on_line_blocks_match() {
        assert!(find_link("[[Home]] see a::b", 0).is_none());
        assert!(find_link("[[Home]]\nsee a::b", 0).is_some());
    }

    #[test]
    fn two_links_on_one_line_are_separate() {
        let first = find_link("[[A]] and [[B]]", 0).unwrap();
        assert_eq!(first.title, "A");
        let second = find_link("[[A]] and [[B]]", first.end).unwrap();
        assert_eq!(second.title, "B");
    }

    // -- placeholders --------------------------------------------------------

    #[test]
    fn placeholder_grammar() {
        assert!(is_placeholder("[[0]]"));
        assert!(is_placeholder("[[12]]"));
        assert!(!is_placeholder("[[012]]"));
        assert!(!is_placeholder("[[]]"));
        assert!(!is_placeholder("[[1a]]"));
    }

    // -- extract -------------------------------------------------------------

    #[test]
    fn extract_replaces_links_in_order() {
        let ex = extract_links("see [[Home]] and [[sally::Recipes|food]]", "scott");
        assert_eq!(ex.text, "see [[0]] and [[1]]");
        assert_eq!(ex.links.len(), 2);
        assert_eq!(ex.links[0].tgt_title, "Home");
        assert_eq!(ex.links[0].tgt_uid, None);
        assert_eq!(ex.links[1].link_num, 1);
        assert_eq!(ex.links[1].tgt_uid.as_deref(), Some("sally"));
        assert_eq!(ex.links[1].tgt_alias.as_deref(), Some("food"));
    }

    #[test]
    fn extract_sample_text() {
        let ex = extract_links("book list sample text [[Home]]", "scott");
        assert_eq!(ex.text, "book list sample text [[0]]");
    }

    #[test]
    fn extract_numbers_repeated_links_separately() {
        let ex = extract_links("[[A]]\n[[A]]", "u");
        assert_eq!(ex.text, "[[0]]\n[[1]]");
        assert_eq!(ex.links[1].tgt_title, "A");
    }

    #[test]
    fn extract_canonicalizes_redundant_parts() {
        let ex = extract_links("[[ scott :: Home | Home ]]", "scott");
        assert_eq!(ex.links[0].tgt_uid, None);
        assert_eq!(ex.links[0].tgt_title, "Home");
        assert_eq!(ex.links[0].tgt_alias, None);
    }

    #[test]
    fn extract_leaves_malformed_tokens_alone() {
        let ex = extract_links("[[nw|Home|Home page]] and [[", "u");
        assert_eq!(ex.text, "[[nw|Home|Home page]] and [[");
        assert!(ex.links.is_empty());
    }

    #[test]
    fn extract_takes_numeric_literals_as_links() {
        let ex = extract_links("[[7]] x::y", "u");
        assert_eq!(ex.text, "[[0]] x::y");
        assert_eq!(ex.links[0].tgt_title, "7");
    }

    // -- inject --------------------------------------------------------------

    #[test]
    fn inject_restores_canonical_text() {
        for raw in [
            "plain text",
            "[[Home]]",
            "a [[sally::Home|her home]] b [[Other]]\nnext [[x::Y]]",
            "[[7]] and [[0]] literal",
            "[[[[nested]]]]",
            "",
        ] {
            let ex = extract_links(raw, "scott");
            assert_eq!(inject_links(&ex.text, &ex.links).unwrap(), raw);
        }
    }

    #[test]
    fn inject_missing_link_is_consistency_error() {
        assert_matches!(
            inject_links("see [[3]]", &[]),
            Err(CoreError::Consistency(_))
        );
    }

    #[test]
    fn link_text_omits_defaults() {
        let link = Link {
            link_num: 0,
            tgt_uid: Some("sally".into()),
            tgt_title: "Home".into(),
            tgt_alias: None,
        };
        assert_eq!(link.link_text(), "[[sally::Home]]");
        assert_eq!(link.display_text(), "Home");
        assert_eq!(link.target_owner("scott"), "sally");
    }
}
