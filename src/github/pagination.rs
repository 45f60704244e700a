// src/github/pagination.rs
// =============================================================================
// This module reads GitHub's `Link` response header to find out how many
// pages of repositories a user has.
//
// GitHub paginates list endpoints and describes the other pages like this:
//
//   <https://api.github.com/user/1/repos?page=2>; rel="next",
//   <https://api.github.com/user/1/repos?page=5>; rel="last"
//
// We only care about the rel="last" entry: its `page` query parameter is the
// number of the final page, and the rest of its URL is the template we use to
// request every page in between.
//
// Rust concepts:
// - Enums with data: `Pagination::Paged(PageSet)` vs `Pagination::Single`
// - Option combinators: `?` works on Option inside functions returning Option
// - Iterators: `find_map`, `flat_map`, and returning `impl Iterator`
// =============================================================================

use url::Url;

/// Placeholder that stands for the page number inside a page template.
pub const PAGE_PLACEHOLDER: &str = "{page}";

/// A listing that spans more than one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSet {
    /// The rel="last" URL with its page number replaced by `{page}`
    template_url: String,
    /// Number of the final page (1-indexed)
    last_page: u32,
}

impl PageSet {
    pub fn template_url(&self) -> &str {
        &self.template_url
    }

    pub fn last_page(&self) -> u32 {
        self.last_page
    }

    /// Builds the URL of a given page from the template
    pub fn page_url(&self, page: u32) -> String {
        self.template_url.replace(PAGE_PLACEHOLDER, &page.to_string())
    }
}

// How many pages a listing has.
//
// `Single` is the normal case for users with few repositories: GitHub sends
// no rel="last" link at all, and that is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pagination {
    Single,
    Paged(PageSet),
}

impl Pagination {
    /// Derives the pagination from an (optional) `Link` header value.
    ///
    /// Anything we can't make sense of (no header, no rel="last", a page
    /// number that isn't a positive integer) falls back to a single page.
    pub fn from_link_header(header: Option<&str>) -> Self {
        match header.and_then(parse_last_link) {
            Some(pages) if pages.last_page > 1 => Pagination::Paged(pages),
            _ => Pagination::Single,
        }
    }

    pub fn last_page(&self) -> u32 {
        match self {
            Pagination::Single => 1,
            Pagination::Paged(pages) => pages.last_page(),
        }
    }

    /// URLs of pages 2..=last_page.
    ///
    /// Page 1 is the request that produced the header, so it is never
    /// included here. The URLs are built lazily: `last_page` comes straight
    /// from a response header and can be arbitrarily large.
    pub fn remaining_page_urls(&self) -> impl Iterator<Item = String> + '_ {
        let pages = match self {
            Pagination::Single => None,
            Pagination::Paged(pages) => Some(pages),
        };

        pages
            .into_iter()
            .flat_map(|pages| (2..=pages.last_page()).map(move |page| pages.page_url(page)))
    }
}

// Finds the rel="last" entry and turns it into a PageSet
fn parse_last_link(header: &str) -> Option<PageSet> {
    let last_url = header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_last = parts.any(|param| is_rel_last(param.trim()));

        if !is_last {
            return None;
        }

        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })?;

    let last_page = page_number(&last_url)?;
    let template_url = page_template(&last_url)?;

    Some(PageSet {
        template_url,
        last_page,
    })
}

// `rel` may hold several space separated relation types, e.g. rel="next last"
fn is_rel_last(param: &str) -> bool {
    let Some(value) = param.strip_prefix("rel=") else {
        return false;
    };

    value
        .trim_matches('"')
        .split_whitespace()
        .any(|rel| rel == "last")
}

// Reads the `page` query parameter (and only that one, not `per_page`)
fn page_number(url: &str) -> Option<u32> {
    let parsed = Url::parse(url).ok()?;

    parsed
        .query_pairs()
        .find(|(key, _)| key == "page")
        .and_then(|(_, value)| value.parse::<u32>().ok())
        .filter(|page| *page >= 1)
}

// Rewrites the raw URL text so that the `page` parameter's value becomes the
// placeholder. We edit the string instead of re-serializing through `Url`
// because `Url` would percent-encode the braces.
fn page_template(url: &str) -> Option<String> {
    let (base, query) = url.split_once('?')?;

    let mut replaced = false;
    let params: Vec<String> = query
        .split('&')
        .map(|param| {
            let key = param.split('=').next().unwrap_or_default();
            if key == "page" && !replaced {
                replaced = true;
                format!("page={}", PAGE_PLACEHOLDER)
            } else {
                param.to_string()
            }
        })
        .collect();

    replaced.then(|| format!("{}?{}", base, params.join("&")))
}
