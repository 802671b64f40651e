//! Account uids, page titles, slugs, and reserved names.
//!
//! Slugs are derived from titles and are never authoritative: links resolve
//! by owner and title, so a slug may change when a page is moved.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Reserved names
// ---------------------------------------------------------------------------

/// Slugs that collide with per-account routes.
pub const RESERVED_PAGE_NAMES: &[&str] = &["account", "action", "file"];

/// Uids that collide with site routes or would be confusing as account names.
pub const RESERVED_ACCOUNT_NAMES: &[&str] = &[
    "admin",
    "api",
    "docs",
    "site",
    "static",
    "account",
    "administrator",
    "create",
    "css",
    "delete",
    "doc",
    "edit",
    "help",
    "html",
    "hypertextual",
    "js",
    "json",
    "markdown",
    "md",
    "rss",
    "text",
    "txt",
    "xml",
];

// ---------------------------------------------------------------------------
// Home pages
// ---------------------------------------------------------------------------

/// Slug of an account's public home page, served at `/{uid}`.
pub const HOME_SLUG: &str = "__home";
pub const HOME_TITLE: &str = "Home";
pub const HOME_WELCOME: &str = "Welcome to hypertextual. This is your home page.";

/// Slug of an account's private home page, served at `/_{uid}`.
pub const PRIVATE_HOME_SLUG: &str = "__private";
pub const PRIVATE_HOME_TITLE: &str = "Private Home";
pub const PRIVATE_HOME_WELCOME: &str =
    "Welcome to hypertextual. This is your private home page.";

/// Home pages cannot be moved or deleted.
pub fn is_home_slug(slug: &str) -> bool {
    slug == HOME_SLUG || slug == PRIVATE_HOME_SLUG
}

// ---------------------------------------------------------------------------
// Slug generation
// ---------------------------------------------------------------------------

const MAX_SLUG_LEN: usize = 100;

/// Slug used when a title has no usable characters.
const FALLBACK_SLUG: &str = "page";

/// Generate the base slug for a page title.
///
/// Keeps ASCII lowercase letters and digits, drops apostrophes, and turns
/// every other run of characters into a single hyphen. Purely numeric slugs
/// get a leading underscore.
pub fn generate_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
        } else if c == '\'' {
            continue;
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let slug = slug.trim_matches('-');
    let slug: String = slug.chars().take(MAX_SLUG_LEN).collect();
    let slug = slug.trim_matches('-');

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else if slug.bytes().all(|b| b.is_ascii_digit()) {
        format!("_{slug}")
    } else {
        slug.to_string()
    }
}

/// Make `base` unique among an owner's slugs by appending `-2`, `-3`, ...
///
/// `is_taken` reports whether the owner already uses a slug. Reserved page
/// names are always treated as taken.
pub fn unique_slug(base: &str, mut is_taken: impl FnMut(&str) -> bool) -> String {
    let mut taken = |s: &str| RESERVED_PAGE_NAMES.contains(&s) || is_taken(s);
    if !taken(base) {
        return base.to_string();
    }
    let mut n = 2u32;
    loop {
        let candidate = format!("{base}-{n}");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

static UID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9]*$").expect("valid regex"));

/// Validate an account uid: a letter followed by letters or digits, not a
/// reserved name.
pub fn validate_uid(uid: &str) -> Result<(), CoreError> {
    if !UID_RE.is_match(uid) {
        return Err(CoreError::Validation(format!(
            "Uid '{uid}' must be a letter followed by letters or digits"
        )));
    }
    if RESERVED_ACCOUNT_NAMES.contains(&uid.to_lowercase().as_str()) {
        return Err(CoreError::Validation(format!("Uid '{uid}' is reserved")));
    }
    Ok(())
}

/// Validate a page title (non-empty, <= 200 chars, linkable).
///
/// A title must be writable inside `[[...]]`, so it cannot carry surrounding
/// whitespace, brackets, pipes, control whitespace or `::`.
pub fn validate_title(title: &str) -> Result<(), CoreError> {
    if title.trim().is_empty() {
        return Err(CoreError::Validation("Title must not be empty".into()));
    }
    if title.chars().count() > 200 {
        return Err(CoreError::Validation(
            "Title must be at most 200 characters".into(),
        ));
    }
    if title.trim() != title {
        return Err(CoreError::Validation(
            "Title must not start or end with whitespace".into(),
        ));
    }
    if title
        .chars()
        .any(|c| matches!(c, '[' | ']' | '|' | '\t' | '\n' | '\r' | '\x0B' | '\x0C'))
    {
        return Err(CoreError::Validation(
            "Title must not contain brackets, pipes, tabs or line breaks".into(),
        ));
    }
    if title.contains("::") {
        return Err(CoreError::Validation("Title must not contain '::'".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
