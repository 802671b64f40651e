//! HTML rendering of placeholder text with live link resolution.
//!
//! Placeholders are resolved against a [`PageDirectory`] at render time, so
//! a link reflects the target page as it is now, not as it was when the
//! revision was saved. Rendering never touches storage.

use std::borrow::Cow;
use std::ops::Range;

use pulldown_cmark::{html, Event, Options, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::history::PageHistory;
use crate::links::{find_placeholders, inject_links, link_for, Link};
use crate::site::{PageDirectory, SiteConfig};
use crate::types::RevNum;

/// CSS class of a link offering to create its missing target.
pub const CLASS_LINK_CREATE: &str = "link-create";
/// CSS class of a link whose target is missing or hidden from the viewer.
pub const CLASS_LINK_DOES_NOT_EXIST: &str = "link-does-not-exist";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Escaped text in a `<pre>` block.
    Plain,
    Markdown,
}

impl RenderMode {
    pub fn from_use_markdown(use_markdown: bool) -> Self {
        if use_markdown {
            Self::Markdown
        } else {
            Self::Plain
        }
    }
}

// ---------------------------------------------------------------------------
// Link resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// Target exists and the viewer may see it.
    View,
    /// Target is missing and the viewer may create it.
    Create,
    /// Anything else.
    Broken,
}

/// How one link renders for one viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkResolution {
    pub kind: LinkKind,
    pub href: String,
    pub text: String,
}

impl LinkResolution {
    pub fn class(&self) -> Option<&'static str> {
        match self.kind {
            LinkKind::View => None,
            LinkKind::Create => Some(CLASS_LINK_CREATE),
            LinkKind::Broken => Some(CLASS_LINK_DOES_NOT_EXIST),
        }
    }

    pub fn to_html(&self) -> String {
        let href = escape_html(&self.href);
        let text = escape_html(&self.text);
        match self.class() {
            Some(class) => format!(r#"<a href="{href}" class="{class}">{text}</a>"#),
            None => format!(r#"<a href="{href}">{text}</a>"#),
        }
    }
}

/// Everything a render needs besides the text itself.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    pub site: &'a SiteConfig,
    /// Owner of the page being rendered; the default link target owner.
    pub page_owner_uid: &'a str,
    /// `None` for anonymous viewers.
    pub viewer_uid: Option<&'a str>,
    pub directory: &'a dyn PageDirectory,
}

impl RenderContext<'_> {
    pub fn resolve(&self, link: &Link) -> LinkResolution {
        let target_owner = link.target_owner(self.page_owner_uid);
        let target = self.directory.find_page(target_owner, &link.tgt_title);
        let text = link.display_text().to_string();

        match target {
            Some(page) if page.can_view(self.viewer_uid) => LinkResolution {
                kind: LinkKind::View,
                href: page.url(self.site),
                text,
            },
            None if self.viewer_uid == Some(self.page_owner_uid)
                && self.viewer_uid == Some(target_owner) =>
            {
                LinkResolution {
                    kind: LinkKind::Create,
                    href: self.site.create_url(target_owner, &link.tgt_title),
                    text,
                }
            }
            _ => LinkResolution {
                kind: LinkKind::Broken,
                href: "#".to_string(),
                text,
            },
        }
    }

    fn anchor(&self, links: &[Link], link_num: i32) -> Result<String, CoreError> {
        Ok(self.resolve(link_for(links, link_num)?).to_html())
    }
}

/// `(owner uid, title)` of every link target, for bulk directory loading.
pub fn link_targets(links: &[Link], page_owner_uid: &str) -> Vec<(String, String)> {
    let mut targets: Vec<(String, String)> = links
        .iter()
        .map(|l| {
            (
                l.target_owner(page_owner_uid).to_string(),
                l.tgt_title.clone(),
            )
        })
        .collect();
    targets.sort();
    targets.dedup();
    targets
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render published revision `rev_num` of a page.
///
/// `mode` overrides the revision's own markdown flag when given.
pub fn render_revision(
    history: &PageHistory,
    rev_num: RevNum,
    mode: Option<RenderMode>,
    ctx: &RenderContext<'_>,
) -> Result<String, CoreError> {
    let rev = history.check_published(rev_num)?;
    let text = history.placeholder_text(rev_num)?;
    render_text(&text, &rev.links, mode.unwrap_or(rev.render_mode()), ctx)
}

/// Render placeholder text with its link table.
pub fn render_text(
    text: &str,
    links: &[Link],
    mode: RenderMode,
    ctx: &RenderContext<'_>,
) -> Result<String, CoreError> {
    match mode {
        RenderMode::Plain => render_plain(text, links, ctx),
        RenderMode::Markdown => render_markdown(text, links, ctx),
    }
}

fn render_plain(text: &str, links: &[Link], ctx: &RenderContext<'_>) -> Result<String, CoreError> {
    let mut out = String::from("<pre>");
    let mut cursor = 0usize;
    for m in find_placeholders(text)? {
        out.push_str(&escape_html(&text[cursor..m.start]));
        out.push_str(&ctx.anchor(links, m.link_num)?);
        cursor = m.end;
    }
    out.push_str(&escape_html(&text[cursor..]));
    out.push_str("</pre>");
    Ok(out)
}

fn render_markdown(
    text: &str,
    links: &[Link],
    ctx: &RenderContext<'_>,
) -> Result<String, CoreError> {
    let source = escape_placeholders(text)?;
    let mut events: Vec<Event<'_>> = Vec::new();
    let mut pending = String::new();
    let mut in_code_block = false;

    // Text is coalesced first: the parser may split a placeholder's brackets
    // across several text events.
    for event in Parser::new_ext(&source, Options::empty()) {
        match event {
            Event::Text(t) | Event::Html(t) | Event::InlineHtml(t) => {
                pending.push_str(&t);
                continue;
            }
            _ => flush_text(&mut pending, in_code_block, links, ctx, &mut events)?,
        }
        match event {
            Event::Code(code) => events.push(Event::Code(inject_links(&code, links)?.into())),
            Event::Start(Tag::CodeBlock(kind)) => {
                in_code_block = true;
                events.push(Event::Start(Tag::CodeBlock(kind)));
            }
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                events.push(Event::End(TagEnd::CodeBlock));
            }
            other => events.push(other),
        }
    }
    flush_text(&mut pending, in_code_block, links, ctx, &mut events)?;

    let mut out = String::with_capacity(text.len() * 2);
    html::push_html(&mut out, events.into_iter());
    Ok(out)
}

/// Backslash-escape the brackets of every placeholder outside code and raw
/// HTML, so markdown link syntax such as a `[1]: url` reference definition
/// or a trailing `(url)` cannot claim them.
///
/// The parser yields escaped brackets as literal text, which `flush_text`
/// reassembles into `[[N]]`.
fn escape_placeholders(text: &str) -> Result<Cow<'_, str>, CoreError> {
    let placeholders = find_placeholders(text)?;
    if placeholders.is_empty() {
        return Ok(Cow::Borrowed(text));
    }

    // Brackets are literal inside these spans, and escapes would show.
    let mut literal: Vec<Range<usize>> = Vec::new();
    for (event, range) in Parser::new_ext(text, Options::empty()).into_offset_iter() {
        if matches!(
            event,
            Event::Start(Tag::CodeBlock(_) | Tag::HtmlBlock) | Event::Code(_) | Event::InlineHtml(_)
        ) {
            literal.push(range);
        }
    }

    let mut out = String::with_capacity(text.len() + placeholders.len() * 4);
    let mut cursor = 0usize;
    for m in placeholders {
        if literal.iter().any(|r| r.start <= m.start && m.end <= r.end) {
            continue;
        }
        out.push_str(&text[cursor..m.start]);
        out.push_str(&format!(r"\[\[{}\]\]", m.link_num));
        cursor = m.end;
    }
    out.push_str(&text[cursor..]);
    Ok(Cow::Owned(out))
}

fn flush_text(
    pending: &mut String,
    in_code_block: bool,
    links: &[Link],
    ctx: &RenderContext<'_>,
    events: &mut Vec<Event<'_>>,
) -> Result<(), CoreError> {
    if pending.is_empty() {
        return Ok(());
    }
    let text = std::mem::take(pending);
    if in_code_block {
        events.push(Event::Text(inject_links(&text, links)?.into()));
        return Ok(());
    }

    let mut cursor = 0usize;
    for m in find_placeholders(&text)? {
        if m.start > cursor {
            events.push(Event::Text(text[cursor..m.start].to_string().into()));
        }
        events.push(Event::InlineHtml(ctx.anchor(links, m.link_num)?.into()));
        cursor = m.end;
    }
    if cursor < text.len() {
        events.push(Event::Text(text[cursor..].to_string().into()));
    }
    Ok(())
}

/// Escape text for use in HTML content or a double-quoted attribute.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
