//! End-to-end page lifecycle through [`MemoryWiki`].
//!
//! Covers slug generation, link extraction and rendering, revision replay,
//! draft revert, and visibility-gated link rendering.

use assert_matches::assert_matches;

use hypertext_core::error::CoreError;
use hypertext_core::history::PageState;
use hypertext_core::links::{extract_links, inject_links};
use hypertext_core::memory::MemoryWiki;
use hypertext_core::naming::{generate_slug, unique_slug};
use hypertext_core::render::RenderMode;
use hypertext_core::site::SiteConfig;

fn wiki() -> MemoryWiki {
    let mut w = MemoryWiki::new(SiteConfig::default());
    w.create_account("scott").expect("create scott");
    w.create_account("sally").expect("create sally");
    w
}

// ---------------------------------------------------------------------------
// Slugs
// ---------------------------------------------------------------------------

#[test]
fn punctuated_title_slug_and_collision() {
    let mut w = wiki();
    let first = w.create_page("scott", "!@#% Home").unwrap();
    assert_eq!(first.slug, "home");

    // "Home" is the home page title, so use a distinct title with the same slug.
    let second = w.create_page("scott", "Home!").unwrap();
    assert_eq!(second.slug, "home-2");
}

#[test]
fn second_home_title_slug_is_deduplicated() {
    assert_eq!(generate_slug("!@#% Home"), "home");
    assert_eq!(unique_slug(&generate_slug("Home"), |s| s == "home"), "home-2");
}

#[test]
fn same_slug_allowed_across_owners() {
    let mut w = wiki();
    let a = w.create_page("scott", "Books").unwrap();
    let b = w.create_page("sally", "Books").unwrap();
    assert_eq!(a.slug, "books");
    assert_eq!(b.slug, "books");
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

#[test]
fn link_to_own_home_page() {
    let mut w = wiki();
    let page = w.create_page("scott", "Book List").unwrap();
    let rev = w
        .save_draft(page.id, "book list sample text [[Home]]", true)
        .unwrap();
    assert_eq!(rev.rev_num, 0);
    assert_eq!(rev.links.len(), 1);
    assert!(w.publish_draft(page.id).unwrap());

    let placeholder = w.history(page.id).unwrap().placeholder_text(0).unwrap();
    assert_eq!(placeholder, "book list sample text [[0]]");

    let html = w
        .render_revision(page.id, 0, Some("scott"), Some(RenderMode::Markdown))
        .unwrap();
    assert_eq!(
        html.trim_end(),
        r#"<p>book list sample text <a href="/scott">Home</a></p>"#
    );
}

#[test]
fn numbered_reference_definitions_leave_wiki_links_alone() {
    let mut w = wiki();
    let books = w.create_page("scott", "Books").unwrap();
    w.save_draft(books.id, "shelf", true).unwrap();
    w.publish_draft(books.id).unwrap();

    let page = w.create_page("scott", "Reading").unwrap();
    w.save_draft(
        page.id,
        "See [[Home]] and [[Books]], per [the docs][1].\n\n[1]: http://docs.example\n",
        true,
    )
    .unwrap();
    w.publish_draft(page.id).unwrap();

    let html = w.render_revision(page.id, 0, Some("scott"), None).unwrap();
    assert_eq!(
        html.trim_end(),
        r#"<p>See <a href="/scott">Home</a> and <a href="/scott/books">Books</a>, per <a href="http://docs.example">the docs</a>.</p>"#
    );
}

#[test]
fn link_to_missing_page_of_other_owner() {
    let mut w = wiki();
    let page = w.create_page("scott", "Book List").unwrap();
    w.save_draft(page.id, "book list sample text [[sally::Missing]]", true)
        .unwrap();
    w.publish_draft(page.id).unwrap();

    let html = w.render_revision(page.id, 0, Some("scott"), None).unwrap();
    assert!(html.contains(r#"class="link-does-not-exist""#), "{html}");
    assert!(html.contains(r##"href="#""##), "{html}");
}

#[test]
fn link_to_other_owner_without_matching_title() {
    let mut w = MemoryWiki::new(SiteConfig::default());
    w.create_account("scott").unwrap();
    let page = w.create_page("scott", "Book List").unwrap();
    w.save_draft(page.id, "book list sample text [[sally::Home]]", true)
        .unwrap();
    w.publish_draft(page.id).unwrap();

    let html = w.render_revision(page.id, 0, Some("scott"), None).unwrap();
    assert_eq!(
        html.trim_end(),
        r##"<p>book list sample text <a href="#" class="link-does-not-exist">Home</a></p>"##
    );
}

#[test]
fn links_resolve_against_live_pages() {
    let mut w = wiki();
    let page = w.create_page("scott", "Index").unwrap();
    w.save_draft(page.id, "[[Later]]", true).unwrap();
    w.publish_draft(page.id).unwrap();

    let before = w.render_revision(page.id, 0, Some("scott"), None).unwrap();
    assert!(before.contains("link-create"), "{before}");

    let later = w.create_page("scott", "Later").unwrap();
    w.save_draft(later.id, "hi", true).unwrap();
    w.publish_draft(later.id).unwrap();

    let after = w.render_revision(page.id, 0, Some("scott"), None).unwrap();
    assert!(after.contains(r#"<a href="/scott/later">Later</a>"#), "{after}");
}

#[test]
fn private_target_is_broken_for_non_owner_in_both_modes() {
    let mut w = wiki();
    let secret = w.create_page("scott", "Secret").unwrap();
    w.save_draft(secret.id, "hidden", true).unwrap();
    w.publish_draft(secret.id).unwrap();
    w.set_private(secret.id, true).unwrap();

    let page = w.create_page("scott", "Public").unwrap();
    w.save_draft(page.id, "see [[Secret]]", true).unwrap();
    w.publish_draft(page.id).unwrap();

    for mode in [RenderMode::Plain, RenderMode::Markdown] {
        let owner = w
            .render_revision(page.id, 0, Some("scott"), Some(mode))
            .unwrap();
        assert!(owner.contains(r#"<a href="/scott/secret">Secret</a>"#), "{owner}");

        for viewer in [Some("sally"), None] {
            let other = w.render_revision(page.id, 0, viewer, Some(mode)).unwrap();
            assert!(
                other.contains(r##"<a href="#" class="link-does-not-exist">Secret</a>"##),
                "{other}"
            );
        }
    }
}

#[test]
fn round_trip_of_canonical_text() {
    for raw in [
        "plain text",
        "[[Home]] and [[sally::Home|hers]]",
        "multi\nline [[A]]\n\n[[B|b]] end\n",
        "literal [[7]] stays",
    ] {
        let ex = extract_links(raw, "scott");
        assert_eq!(inject_links(&ex.text, &ex.links).unwrap(), raw);
    }
}

// ---------------------------------------------------------------------------
// Revision chain
// ---------------------------------------------------------------------------

#[test]
fn revisions_reconstruct_exactly() {
    let mut w = wiki();
    let page = w.create_page("scott", "Notes").unwrap();
    for text in ["x", "y", "x"] {
        w.save_draft(page.id, text, true).unwrap();
        assert!(w.publish_draft(page.id).unwrap());
    }
    assert_eq!(w.page(page.id).unwrap().curr_rev_num, Some(2));
    assert_eq!(w.get_revision_text(page.id, 0).unwrap(), "x");
    assert_eq!(w.get_revision_text(page.id, 1).unwrap(), "y");
    assert_eq!(w.get_revision_text(page.id, 2).unwrap(), "x");
}

#[test]
fn revert_removes_draft_revision() {
    let mut w = wiki();
    let page = w.create_page("scott", "Notes").unwrap();
    w.save_draft(page.id, "x", true).unwrap();
    w.publish_draft(page.id).unwrap();

    w.save_draft(page.id, "y", true).unwrap();
    assert!(w.revert_draft(page.id).unwrap());

    let history = w.history(page.id).unwrap();
    assert_eq!(history.state(), PageState::Published { current: 0 });
    assert_eq!(history.revisions().len(), 1);
    assert_matches!(
        w.get_revision_text(page.id, 1),
        Err(CoreError::RevisionOutOfRange {
            requested: 1,
            current: Some(0)
        })
    );
}

#[test]
fn idempotent_draft_save() {
    let mut w = wiki();
    let page = w.create_page("scott", "Notes").unwrap();
    w.save_draft(page.id, "first", true).unwrap();
    w.publish_draft(page.id).unwrap();

    let a = w.save_draft(page.id, "second [[A]]", true).unwrap().clone();
    let b = w.save_draft(page.id, "second [[A]]", true).unwrap().clone();
    assert_eq!(a, b);
    assert_eq!(w.history(page.id).unwrap().revisions().len(), 2);

    w.publish_draft(page.id).unwrap();
    assert_eq!(w.get_revision_text(page.id, 1).unwrap(), "second [[A]]");
}

#[test]
fn publish_and_revert_without_draft_report_false() {
    let mut w = wiki();
    let page = w.create_page("scott", "Notes").unwrap();
    assert!(!w.publish_draft(page.id).unwrap());
    assert!(!w.revert_draft(page.id).unwrap());
    assert_matches!(
        w.get_revision_text(page.id, 0),
        Err(CoreError::RevisionOutOfRange {
            requested: 0,
            current: None
        })
    );
}

#[test]
fn edit_text_follows_draft() {
    let mut w = wiki();
    let page = w.create_page("scott", "Notes").unwrap();
    assert_eq!(w.get_edit_text(page.id).unwrap().text, "");

    w.save_draft(page.id, "published", false).unwrap();
    w.publish_draft(page.id).unwrap();
    w.save_draft(page.id, "draft [[Home]]", true).unwrap();

    let edit = w.get_edit_text(page.id).unwrap();
    assert_eq!(edit.text, "draft [[Home]]");
    assert!(edit.use_markdown);
    assert!(edit.is_draft);
    // The draft does not leak into published reads.
    assert_eq!(w.get_revision_text(page.id, 0).unwrap(), "published");
}

// ---------------------------------------------------------------------------
// Move
// ---------------------------------------------------------------------------

#[test]
fn move_with_redirect_keeps_old_links_working() {
    let mut w = wiki();
    let target = w.create_page("scott", "Old Name").unwrap();
    w.save_draft(target.id, "content", true).unwrap();
    w.publish_draft(target.id).unwrap();

    let linker = w.create_page("scott", "Linker").unwrap();
    w.save_draft(linker.id, "[[Old Name]]", true).unwrap();
    w.publish_draft(linker.id).unwrap();

    let moved = w.move_page(target.id, "New Name", true).unwrap();
    assert_eq!(moved.slug, "new-name");

    let redirect = w.resolve_link_target("scott", "Old Name").unwrap();
    assert_ne!(redirect.id, target.id);
    assert_eq!(redirect.slug, "old-name");
    assert_eq!(
        w.get_revision_text(redirect.id, 0).unwrap(),
        "[[New Name]]"
    );

    // The stored link is unchanged and now reaches the redirect page.
    assert_eq!(w.get_revision_text(linker.id, 0).unwrap(), "[[Old Name]]");
    let html = w.render_revision(linker.id, 0, None, None).unwrap();
    assert!(html.contains(r#"<a href="/scott/old-name">Old Name</a>"#), "{html}");
}

#[test]
fn move_onto_existing_title_is_conflict() {
    let mut w = wiki();
    let a = w.create_page("scott", "A").unwrap();
    w.create_page("scott", "B").unwrap();
    assert_matches!(w.move_page(a.id, "B", false), Err(CoreError::Conflict(_)));
}
