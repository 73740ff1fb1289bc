//! Dashboard view logic over the user's records: search, filter, sort,
//! paginate and summarize. Pure functions; fetching is the caller's job.
use std::cmp::Ordering;
use std::str::FromStr;

use serde::Serialize;

use crate::models::{Application, Status};

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(Status),
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            Ok(StatusFilter::All)
        } else {
            s.parse().map(StatusFilter::Only)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    DateApplied,
    Company,
    Title,
    Status,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "date" | "date_applied" => Ok(SortKey::DateApplied),
            "company" => Ok(SortKey::Company),
            "title" => Ok(SortKey::Title),
            "status" => Ok(SortKey::Status),
            other => Err(format!("unknown sort key '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewQuery {
    pub search: String,
    pub status: StatusFilter,
    pub sort: SortKey,
    pub direction: SortDirection,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
}

impl Default for ViewQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            status: StatusFilter::All,
            sort: SortKey::DateApplied,
            direction: SortDirection::Descending,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a> {
    pub items: Vec<&'a Application>,
    /// Clamped into `1..=total_pages`.
    pub page: usize,
    /// At least 1, even when nothing matches.
    pub total_pages: usize,
    pub matching: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// Everything except Ignored.
    pub total: usize,
    pub applied: usize,
    pub interviewing: usize,
    pub offered: usize,
    pub rejected: usize,
}

pub fn matches_search(app: &Application, search: &str) -> bool {
    let needle = search.trim().to_lowercase();
    needle.is_empty()
        || app.company_name.to_lowercase().contains(&needle)
        || app.job_title.to_lowercase().contains(&needle)
}

fn compare(a: &Application, b: &Application, key: SortKey) -> Ordering {
    match key {
        SortKey::DateApplied => a.date_applied.cmp(&b.date_applied),
        SortKey::Company => a.company_name.to_lowercase().cmp(&b.company_name.to_lowercase()),
        SortKey::Title => a.job_title.to_lowercase().cmp(&b.job_title.to_lowercase()),
        SortKey::Status => a.status.cmp(&b.status),
    }
}

pub fn view<'a>(applications: &'a [Application], query: &ViewQuery) -> Page<'a> {
    let mut items: Vec<&Application> = applications
        .iter()
        .filter(|app| matches_search(app, &query.search))
        .filter(|app| match query.status {
            StatusFilter::All => true,
            StatusFilter::Only(status) => app.status == status,
        })
        .collect();

    // Stable sort; ties keep the server's newest-first order.
    items.sort_by(|a, b| {
        let ord = compare(a, b, query.sort);
        match query.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });

    let page_size = query.page_size.max(1);
    let matching = items.len();
    let total_pages = matching.div_ceil(page_size).max(1);
    let page = query.page.clamp(1, total_pages);

    let items = items
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();

    Page {
        items,
        page,
        total_pages,
        matching,
    }
}

pub fn stats(applications: &[Application]) -> Stats {
    applications
        .iter()
        .filter(|app| app.status != Status::Ignored)
        .fold(Stats::default(), |mut stats, app| {
            stats.total += 1;
            match app.status {
                Status::Applied => stats.applied += 1,
                Status::Interviewing => stats.interviewing += 1,
                Status::Offered => stats.offered += 1,
                Status::Rejected => stats.rejected += 1,
                Status::Accepted | Status::Ignored => {}
            }
            stats
        })
}
