//! Pure translation from query state to the request the catalog expects.

use std::{fmt, str::FromStr};

use shared::protocol::{ListQuery, SortKey, SortOrder};

pub const PAGE_SIZE: u32 = 21;

/// Sort selection made by the operator. `Unset` lets the search text decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    #[default]
    Unset,
    ByIdentifier,
    ByName,
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortMode::Unset => "unset",
            SortMode::ByIdentifier => "id",
            SortMode::ByName => "name",
        })
    }
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "unset" | "none" | "auto" => Ok(SortMode::Unset),
            "id" | "identifier" | "number" => Ok(SortMode::ByIdentifier),
            "name" => Ok(SortMode::ByName),
            other => Err(format!(
                "unknown sort mode '{other}' (expected unset, id or name)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Identifier,
    Name,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPlan {
    Lookup { ids: String },
    List(ListQuery),
}

/// `None` when nothing but whitespace was entered.
pub fn normalize_terms(text: &str) -> Option<String> {
    let terms: Vec<&str> = text.split_whitespace().collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(","))
    }
}

fn is_identifier_term(term: &str) -> bool {
    !term.is_empty() && term.bytes().all(|b| b.is_ascii_digit())
}

pub fn resolve_mode(text: &str, sort_mode: SortMode) -> SearchMode {
    match sort_mode {
        SortMode::ByIdentifier => SearchMode::Identifier,
        SortMode::ByName => SearchMode::Name,
        SortMode::Unset => {
            let mut terms = text.split_whitespace().peekable();
            if terms.peek().is_some() && terms.all(is_identifier_term) {
                SearchMode::Identifier
            } else {
                SearchMode::Name
            }
        }
    }
}

pub fn plan_request(committed_text: &str, sort_mode: SortMode, page: u32) -> RequestPlan {
    let search = normalize_terms(committed_text);
    let mode = resolve_mode(committed_text, sort_mode);

    if let (SearchMode::Identifier, Some(ids)) = (mode, search.as_ref()) {
        return RequestPlan::Lookup { ids: ids.clone() };
    }

    RequestPlan::List(ListQuery {
        limit: PAGE_SIZE,
        offset: u64::from(page.max(1) - 1) * u64::from(PAGE_SIZE),
        search,
        sort_by: match mode {
            SearchMode::Identifier => SortKey::Id,
            SearchMode::Name => SortKey::Name,
        },
        sort_order: SortOrder::Asc,
    })
}

pub fn total_pages(total: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = total.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

#[cfg(test)]
#[path = "tests/plan_tests.rs"]
mod tests;
