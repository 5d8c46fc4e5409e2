use std::fmt::Write;

use client_core::{QueryStatus, QueryView, SessionState};
use shared::domain::{CreatureDetail, CreatureSummary};

pub fn session_line(state: &SessionState) -> String {
    match state {
        SessionState::Booting => "Checking saved session...".to_string(),
        SessionState::Authenticated {
            profile,
            saved_at: Some(saved_at),
        } => format!(
            "Signed in as {} (session saved {}).",
            profile.display_name,
            saved_at.format("%Y-%m-%d %H:%M UTC")
        ),
        SessionState::Authenticated {
            profile,
            saved_at: None,
        } => format!(
            "Signed in as {} (session not saved, it ends with this run).",
            profile.display_name
        ),
        SessionState::Unauthenticated => {
            "Not signed in. Use `login <username> [password]`.".to_string()
        }
    }
}

/// Whether `next` differs from `prev` in anything the results screen shows.
/// Typing alone only changes the raw search text and does not redraw.
pub fn should_redraw(prev: &QueryView, next: &QueryView) -> bool {
    prev.status != next.status
        || prev.results != next.results
        || prev.page != next.page
        || prev.total_pages != next.total_pages
        || prev.sort_mode != next.sort_mode
        || prev.committed_search_text != next.committed_search_text
}

pub fn results_screen(view: &QueryView) -> String {
    let mut out = String::new();
    let search = if view.committed_search_text.trim().is_empty() {
        "(all)"
    } else {
        view.committed_search_text.as_str()
    };
    let _ = writeln!(
        out,
        "search: {search} | sort: {} | page {}/{} | {} result(s)",
        view.sort_mode,
        view.page,
        view.total_pages.max(1),
        view.total_results
    );

    match &view.status {
        QueryStatus::Idle => out.push_str("Nothing loaded yet."),
        QueryStatus::Loading => out.push_str("Loading..."),
        QueryStatus::Failed(message) => {
            let _ = write!(out, "Error: {message} (type `retry` to try again)");
        }
        QueryStatus::Ready if view.results.is_empty() => out.push_str("No creatures found."),
        QueryStatus::Ready => {
            let rows: Vec<String> = view.results.iter().map(summary_row).collect();
            out.push_str(&rows.join("\n"));
            let mut hints = Vec::new();
            if view.has_prev_page() {
                hints.push("`prev`");
            }
            if view.has_next_page() {
                hints.push("`next`");
            }
            if !hints.is_empty() {
                let _ = write!(out, "\nmore pages: {}", hints.join(" / "));
            }
        }
    }
    out
}

pub fn summary_row(creature: &CreatureSummary) -> String {
    let mut row = format!("#{:03} {}", creature.number, creature.name);
    if !creature.types.is_empty() {
        let _ = write!(row, " [{}]", creature.types.join("/"));
    }
    row
}

pub fn detail_screen(detail: &CreatureDetail) -> String {
    let mut out = summary_row(&detail.summary);
    if let Some(description) = &detail.description {
        let _ = write!(out, "\n{description}");
    }
    if let (Some(height), Some(weight)) = (detail.height, detail.weight) {
        let _ = write!(out, "\nheight: {height} | weight: {weight}");
    }
    if !detail.abilities.is_empty() {
        let _ = write!(out, "\nabilities: {}", detail.abilities.join(", "));
    }
    for stat in &detail.stats {
        let _ = write!(out, "\n  {:<16}{:>4}", stat.name, stat.value);
    }
    out
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
