//! Page addressing, visibility, and the live page lookup used at render time.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::naming::{HOME_SLUG, PRIVATE_HOME_SLUG};
use crate::types::{DbId, RevNum};

/// Site-wide settings the engine needs to build URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Prefix for every generated URL, without a trailing slash. Empty for
    /// site-relative URLs.
    pub site_url: String,
}

impl SiteConfig {
    pub fn new(site_url: impl Into<String>) -> Self {
        let mut site_url = site_url.into();
        while site_url.ends_with('/') {
            site_url.pop();
        }
        Self { site_url }
    }

    /// URL of a page identified by owner and slug.
    pub fn page_url(&self, owner_uid: &str, slug: &str) -> String {
        match slug {
            HOME_SLUG => format!("{}/{owner_uid}", self.site_url),
            PRIVATE_HOME_SLUG => format!("{}/_{owner_uid}", self.site_url),
            _ => format!("{}/{owner_uid}/{slug}", self.site_url),
        }
    }

    /// URL of the "create page" action for `title` in `owner_uid`'s space.
    pub fn create_url(&self, owner_uid: &str, title: &str) -> String {
        format!(
            "{}/{owner_uid}/action/create?title={}",
            self.site_url,
            encode_query_component(title)
        )
    }
}

/// Percent-encode a query string value. Spaces become `+`.
pub fn encode_query_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Page references
// ---------------------------------------------------------------------------

/// The live state of a page needed to resolve a link to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRef {
    pub id: DbId,
    pub owner_uid: String,
    pub slug: String,
    pub title: String,
    pub is_private: bool,
    pub curr_rev_num: Option<RevNum>,
}

impl PageRef {
    pub fn is_owner(&self, viewer_uid: Option<&str>) -> bool {
        viewer_uid == Some(self.owner_uid.as_str())
    }

    pub fn is_published(&self) -> bool {
        self.curr_rev_num.is_some()
    }

    /// Private or unpublished pages are visible to their owner only.
    pub fn can_view(&self, viewer_uid: Option<&str>) -> bool {
        if self.is_private || !self.is_published() {
            self.is_owner(viewer_uid)
        } else {
            true
        }
    }

    pub fn url(&self, site: &SiteConfig) -> String {
        site.page_url(&self.owner_uid, &self.slug)
    }

    /// URL addressing `rev_num`; the plain URL if it is the current revision.
    pub fn url_for_rev(&self, site: &SiteConfig, rev_num: RevNum) -> String {
        let url = self.url(site);
        if self.curr_rev_num == Some(rev_num) {
            url
        } else {
            format!("{url}?rev={rev_num}")
        }
    }
}

// ---------------------------------------------------------------------------
// Lookup capability
// ---------------------------------------------------------------------------

/// Lookup of pages by owner and title.
pub trait PageDirectory {
    fn find_page(&self, owner_uid: &str, title: &str) -> Option<PageRef>;
}

/// A fixed set of pages loaded ahead of a render.
#[derive(Debug, Clone, Default)]
pub struct DirectorySnapshot {
    pages: HashMap<(String, String), PageRef>,
}

impl DirectorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, page: PageRef) {
        self.pages
            .insert((page.owner_uid.clone(), page.title.clone()), page);
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl FromIterator<PageRef> for DirectorySnapshot {
    fn from_iter<I: IntoIterator<Item = PageRef>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for page in iter {
            snapshot.insert(page);
        }
        snapshot
    }
}

impl PageDirectory for DirectorySnapshot {
    fn find_page(&self, owner_uid: &str, title: &str) -> Option<PageRef> {
        self.pages
            .get(&(owner_uid.to_string(), title.to_string()))
            .cloned()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
