//! In-memory implementation of the wiki operations.
//!
//! Pages live in an arena indexed by id; a deleted page leaves an empty slot
//! so ids are never reused. This backs tests and tooling that need the full
//! page lifecycle without a database.

use crate::error::CoreError;
use crate::history::{EditText, PageHistory};
use crate::naming::{
    generate_slug, is_home_slug, unique_slug, validate_title, validate_uid, HOME_SLUG,
    HOME_TITLE, HOME_WELCOME, PRIVATE_HOME_SLUG, PRIVATE_HOME_TITLE, PRIVATE_HOME_WELCOME,
};
use crate::render::{self, RenderContext, RenderMode};
use crate::revision::Revision;
use crate::site::{PageDirectory, PageRef, SiteConfig};
use crate::types::{DbId, RevNum};

#[derive(Debug, Clone)]
struct PageRecord {
    id: DbId,
    slug: String,
    title: String,
    is_private: bool,
    history: PageHistory,
}

impl PageRecord {
    fn to_ref(&self) -> PageRef {
        PageRef {
            id: self.id,
            owner_uid: self.history.owner_uid().to_string(),
            slug: self.slug.clone(),
            title: self.title.clone(),
            is_private: self.is_private,
            curr_rev_num: self.history.current_rev_num(),
        }
    }

    fn owner_uid(&self) -> &str {
        self.history.owner_uid()
    }
}

/// A complete wiki held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryWiki {
    site: SiteConfig,
    accounts: Vec<String>,
    pages: Vec<Option<PageRecord>>,
}

impl MemoryWiki {
    pub fn new(site: SiteConfig) -> Self {
        Self {
            site,
            accounts: Vec::new(),
            pages: Vec::new(),
        }
    }

    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    // -- accounts ------------------------------------------------------------

    /// Register `uid` and create its public and private home pages, each
    /// with a published welcome revision.
    pub fn create_account(&mut self, uid: &str) -> Result<(), CoreError> {
        validate_uid(uid)?;
        if self.has_account(uid) {
            return Err(CoreError::Conflict(format!("Account '{uid}' already exists")));
        }
        self.accounts.push(uid.to_string());

        for (slug, title, text, is_private) in [
            (HOME_SLUG, HOME_TITLE, HOME_WELCOME, false),
            (PRIVATE_HOME_SLUG, PRIVATE_HOME_TITLE, PRIVATE_HOME_WELCOME, true),
        ] {
            let mut history = PageHistory::new(uid);
            history.save_draft(text, true)?;
            history.publish_draft();
            self.insert(slug.to_string(), title.to_string(), is_private, history);
        }
        Ok(())
    }

    pub fn has_account(&self, uid: &str) -> bool {
        self.accounts.iter().any(|a| a == uid)
    }

    // -- pages ---------------------------------------------------------------

    /// Create an empty page. The slug is derived from the title and made
    /// unique within the owner's pages.
    pub fn create_page(&mut self, owner_uid: &str, title: &str) -> Result<PageRef, CoreError> {
        if !self.has_account(owner_uid) {
            return Err(CoreError::Validation(format!(
                "Account '{owner_uid}' does not exist"
            )));
        }
        validate_title(title)?;
        if self.find_by_title(owner_uid, title).is_some() {
            return Err(CoreError::Conflict(format!(
                "'{owner_uid}' already has a page titled '{title}'"
            )));
        }
        let slug = self.slug_for(owner_uid, title, None);
        let id = self.insert(
            slug,
            title.to_string(),
            false,
            PageHistory::new(owner_uid),
        );
        self.page(id)
    }

    pub fn page(&self, id: DbId) -> Result<PageRef, CoreError> {
        Ok(self.record(id)?.to_ref())
    }

    pub fn history(&self, id: DbId) -> Result<&PageHistory, CoreError> {
        Ok(&self.record(id)?.history)
    }

    pub fn find_by_slug(&self, owner_uid: &str, slug: &str) -> Option<PageRef> {
        self.records()
            .find(|r| r.owner_uid() == owner_uid && r.slug == slug)
            .map(PageRecord::to_ref)
    }

    pub fn find_by_title(&self, owner_uid: &str, title: &str) -> Option<PageRef> {
        self.records()
            .find(|r| r.owner_uid() == owner_uid && r.title == title)
            .map(PageRecord::to_ref)
    }

    /// Look up the page a link to `(owner_uid, title)` points at.
    pub fn resolve_link_target(&self, owner_uid: &str, title: &str) -> Option<PageRef> {
        self.find_by_title(owner_uid, title)
    }

    /// All pages of an owner, in creation order.
    pub fn list_pages(&self, owner_uid: &str) -> Vec<PageRef> {
        self.records()
            .filter(|r| r.owner_uid() == owner_uid)
            .map(PageRecord::to_ref)
            .collect()
    }

    pub fn set_private(&mut self, id: DbId, is_private: bool) -> Result<(), CoreError> {
        self.record_mut(id)?.is_private = is_private;
        Ok(())
    }

    // -- revisions -----------------------------------------------------------

    pub fn save_draft(
        &mut self,
        id: DbId,
        text: &str,
        use_markdown: bool,
    ) -> Result<&Revision, CoreError> {
        let history = &mut self.record_mut(id)?.history;
        let saved = history.save_draft(text, use_markdown)?;
        history.revision(saved.rev_num()).ok_or_else(|| {
            CoreError::Internal(format!("Saved draft {} is missing", saved.rev_num()))
        })
    }

    /// `false` if there was no draft to publish.
    pub fn publish_draft(&mut self, id: DbId) -> Result<bool, CoreError> {
        Ok(self.record_mut(id)?.history.publish_draft().is_some())
    }

    /// `false` if there was no draft to revert.
    pub fn revert_draft(&mut self, id: DbId) -> Result<bool, CoreError> {
        Ok(self.record_mut(id)?.history.revert_draft().is_some())
    }

    /// Raw text of a published revision.
    pub fn get_revision_text(&self, id: DbId, rev_num: RevNum) -> Result<String, CoreError> {
        self.history(id)?.revision_text(rev_num)
    }

    pub fn get_edit_text(&self, id: DbId) -> Result<EditText, CoreError> {
        self.history(id)?.edit_text()
    }

    /// Render a published revision for `viewer_uid`.
    ///
    /// Fails with [`CoreError::Forbidden`] if the viewer may not see the page.
    pub fn render_revision(
        &self,
        id: DbId,
        rev_num: RevNum,
        viewer_uid: Option<&str>,
        mode: Option<RenderMode>,
    ) -> Result<String, CoreError> {
        let record = self.record(id)?;
        if !record.to_ref().can_view(viewer_uid) {
            return Err(CoreError::Forbidden(format!(
                "Page '{}' is not visible to this user",
                record.title
            )));
        }
        let ctx = RenderContext {
            site: &self.site,
            page_owner_uid: record.owner_uid(),
            viewer_uid,
            directory: self,
        };
        render::render_revision(&record.history, rev_num, mode, &ctx)
    }

    // -- move / delete -------------------------------------------------------

    /// Retitle a page and regenerate its slug.
    ///
    /// Stored links are not rewritten; links to the old title stop resolving
    /// unless `create_redirect` publishes a page under the old title linking
    /// to the new one.
    pub fn move_page(
        &mut self,
        id: DbId,
        new_title: &str,
        create_redirect: bool,
    ) -> Result<PageRef, CoreError> {
        validate_title(new_title)?;
        let (owner_uid, old_title) = {
            let record = self.record(id)?;
            if is_home_slug(&record.slug) {
                return Err(CoreError::Forbidden("Home pages cannot be moved".into()));
            }
            (record.owner_uid().to_string(), record.title.clone())
        };
        if self.find_by_title(&owner_uid, new_title).is_some() {
            return Err(CoreError::Conflict(format!(
                "'{owner_uid}' already has a page titled '{new_title}'"
            )));
        }

        let slug = self.slug_for(&owner_uid, new_title, Some(id));
        let record = self.record_mut(id)?;
        record.title = new_title.to_string();
        record.slug = slug;

        if create_redirect {
            let redirect = self.create_page(&owner_uid, &old_title)?;
            self.save_draft(redirect.id, &format!("[[{new_title}]]"), true)?;
            self.publish_draft(redirect.id)?;
        }
        self.page(id)
    }

    /// Remove a page and its whole history.
    pub fn delete_page(&mut self, id: DbId) -> Result<(), CoreError> {
        if is_home_slug(&self.record(id)?.slug) {
            return Err(CoreError::Forbidden("Home pages cannot be deleted".into()));
        }
        let slot = self.slot_mut(id)?;
        *slot = None;
        Ok(())
    }

    // -- internals -----------------------------------------------------------

    fn insert(
        &mut self,
        slug: String,
        title: String,
        is_private: bool,
        history: PageHistory,
    ) -> DbId {
        let id = self.pages.len() as DbId + 1;
        self.pages.push(Some(PageRecord {
            id,
            slug,
            title,
            is_private,
            history,
        }));
        id
    }

    fn slug_for(&self, owner_uid: &str, title: &str, except: Option<DbId>) -> String {
        unique_slug(&generate_slug(title), |candidate| {
            self.records().any(|r| {
                r.owner_uid() == owner_uid && r.slug == candidate && Some(r.id) != except
            })
        })
    }

    fn records(&self) -> impl Iterator<Item = &PageRecord> + '_ {
        self.pages.iter().flatten()
    }

    fn slot_mut(&mut self, id: DbId) -> Result<&mut Option<PageRecord>, CoreError> {
        slot_index(id)
            .and_then(|idx| self.pages.get_mut(idx))
            .filter(|slot| slot.is_some())
            .ok_or(CoreError::NotFound { entity: "page", id })
    }

    fn record(&self, id: DbId) -> Result<&PageRecord, CoreError> {
        slot_index(id)
            .and_then(|idx| self.pages.get(idx))
            .and_then(Option::as_ref)
            .ok_or(CoreError::NotFound { entity: "page", id })
    }

    fn record_mut(&mut self, id: DbId) -> Result<&mut PageRecord, CoreError> {
        self.slot_mut(id)?
            .as_mut()
            .ok_or(CoreError::NotFound { entity: "page", id })
    }
}

fn slot_index(id: DbId) -> Option<usize> {
    usize::try_from(id).ok()?.checked_sub(1)
}

impl PageDirectory for MemoryWiki {
    fn find_page(&self, owner_uid: &str, title: &str) -> Option<PageRef> {
        self.find_by_title(owner_uid, title)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn wiki() -> MemoryWiki {
        let mut w = MemoryWiki::default();
        w.create_account("scott").unwrap();
        w
    }

    #[test]
    fn account_gets_published_home_pages() {
        let w = wiki();
        let home = w.find_by_slug("scott", HOME_SLUG).unwrap();
        assert_eq!(home.title, "Home");
        assert!(!home.is_private);
        assert_eq!(home.curr_rev_num, Some(0));
        assert_eq!(w.get_revision_text(home.id, 0).unwrap(), HOME_WELCOME);

        let private = w.find_by_slug("scott", PRIVATE_HOME_SLUG).unwrap();
        assert!(private.is_private);
    }

    #[test]
    fn duplicate_account_is_conflict() {
        let mut w = wiki();
        assert_matches!(w.create_account("scott"), Err(CoreError::Conflict(_)));
    }

    #[test]
    fn duplicate_title_is_conflict() {
        let mut w = wiki();
        w.create_page("scott", "Books").unwrap();
        assert_matches!(
            w.create_page("scott", "Books"),
            Err(CoreError::Conflict(_))
        );
    }

    #[test]
    fn unknown_page_is_not_found() {
        let mut w = wiki();
        assert_matches!(
            w.publish_draft(99),
            Err(CoreError::NotFound { entity: "page", id: 99 })
        );
        assert_matches!(w.page(0), Err(CoreError::NotFound { .. }));
    }

    #[test]
    fn home_pages_cannot_move_or_delete() {
        let mut w = wiki();
        let home = w.find_by_slug("scott", HOME_SLUG).unwrap();
        assert_matches!(
            w.move_page(home.id, "Elsewhere", false),
            Err(CoreError::Forbidden(_))
        );
        assert_matches!(w.delete_page(home.id), Err(CoreError::Forbidden(_)));
    }

    #[test]
    fn move_regenerates_slug_and_frees_old_title() {
        let mut w = wiki();
        let page = w.create_page("scott", "Books").unwrap();
        let moved = w.move_page(page.id, "Reading List", false).unwrap();
        assert_eq!(moved.slug, "reading-list");
        assert!(w.find_by_title("scott", "Books").is_none());
    }

    #[test]
    fn move_keeps_own_slug_when_only_case_changes() {
        let mut w = wiki();
        let page = w.create_page("scott", "Books").unwrap();
        let moved = w.move_page(page.id, "BOOKS", false).unwrap();
        assert_eq!(moved.slug, "books");
    }

    #[test]
    fn deleted_ids_are_not_reused() {
        let mut w = wiki();
        let a = w.create_page("scott", "A").unwrap();
        w.delete_page(a.id).unwrap();
        let b = w.create_page("scott", "B").unwrap();
        assert_ne!(a.id, b.id);
        assert_matches!(w.page(a.id), Err(CoreError::NotFound { .. }));
    }

    #[test]
    fn private_page_render_is_forbidden_to_others() {
        let mut w = wiki();
        let private = w.find_by_slug("scott", PRIVATE_HOME_SLUG).unwrap();
        assert!(w.render_revision(private.id, 0, Some("scott"), None).is_ok());
        assert_matches!(
            w.render_revision(private.id, 0, Some("sally"), None),
            Err(CoreError::Forbidden(_))
        );
        w.set_private(private.id, false).unwrap();
        assert!(w.render_revision(private.id, 0, None, None).is_ok());
    }
}
