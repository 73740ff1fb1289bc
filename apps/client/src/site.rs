//! Per-site extraction rules for job posting pages.
//!
//! Each supported board is a `Site` variant holding ordered rules for the
//! company, title and location fields. Rules are tried in order and the first
//! non-empty trimmed result wins, so the cheap, precise selectors come first
//! and the loose heuristics last.
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use crate::models::Source;

const ONLINEJOBS_FALLBACK_EMPLOYER: &str = "OnlineJobs.ph Employer";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    LinkedIn,
    Indeed,
    Glassdoor,
    OnlineJobs,
}

/// One way of locating a field on the page.
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    /// Text of the first element matching the selector.
    Text(&'static str),
    /// Text of the first match, cut at `separator`, first segment kept.
    FirstSegment {
        selector: &'static str,
        separator: &'static str,
    },
    /// First element whose class attribute mentions one of `keywords` and
    /// whose text length falls strictly inside `(min_len, max_len)`.
    ClassMention {
        selector: &'static str,
        keywords: &'static [&'static str],
        min_len: usize,
        max_len: usize,
    },
    /// First `h1`/`h2` with text length strictly inside `(min_len, max_len)`.
    Heading { min_len: usize, max_len: usize },
    /// First childless `div` whose short text reads like a place.
    LeafLocation,
    /// The name following "by " in a short block of text.
    ByCompany { max_len: usize },
    Constant(&'static str),
}

const LINKEDIN_COMPANY: &[Rule] = &[
    Rule::Text(".job-details-jobs-unified-top-card__company-name"),
    Rule::Text(".topcard__org-name-link"),
    Rule::Text("[data-anonymize=\"company-name\"]"),
];
const LINKEDIN_TITLE: &[Rule] = &[
    Rule::Text(".job-details-jobs-unified-top-card__job-title"),
    Rule::Text(".topcard__title"),
    Rule::Text("h1.t-24"),
];
const LINKEDIN_LOCATION: &[Rule] = &[
    Rule::Text(".job-details-jobs-unified-top-card__bullet"),
    Rule::Text(".topcard__flavor--bullet"),
];

const INDEED_COMPANY: &[Rule] = &[
    Rule::Text("[data-company-name=\"true\"]"),
    Rule::Text("[data-testid=\"inlineHeader-companyName\"]"),
    Rule::Text(".jobsearch-CompanyInfoWithoutHeaderImage"),
    Rule::Text(".icl-u-lg-mr--sm.icl-u-xs-mr--xs"),
    Rule::Text("div[data-company-name]"),
    Rule::ClassMention {
        selector: "a, span, div",
        keywords: &["company", "employer"],
        min_len: 2,
        max_len: 100,
    },
];
const INDEED_TITLE: &[Rule] = &[
    Rule::Text("[data-testid=\"jobsearch-JobInfoHeader-title\"]"),
    Rule::Text("[class*=\"jobsearch-JobInfoHeader-title\"]"),
    Rule::Text("h1.jobTitle"),
    Rule::Text("h1[class*=\"jobTitle\"]"),
    Rule::Text(".jobsearch-JobInfoHeader-title"),
    Rule::Heading {
        min_len: 5,
        max_len: 150,
    },
];
const INDEED_LOCATION: &[Rule] = &[
    Rule::Text("[data-testid=\"job-location\"]"),
    Rule::Text("[data-testid=\"inlineHeader-companyLocation\"]"),
    Rule::FirstSegment {
        selector: ".jobsearch-JobInfoHeader-subtitle",
        separator: "•",
    },
    Rule::LeafLocation,
];

const GLASSDOOR_COMPANY: &[Rule] = &[
    Rule::Text("[data-test=\"employerName\"]"),
    Rule::Text(".EmployerProfile_employerName__Xemli"),
];
const GLASSDOOR_TITLE: &[Rule] = &[
    Rule::Text("[data-test=\"job-title\"]"),
    Rule::Text(".JobDetails_jobTitle__Rw_gn"),
];
const GLASSDOOR_LOCATION: &[Rule] = &[
    Rule::Text("[data-test=\"location\"]"),
    Rule::Text(".JobDetails_location__mSg5h"),
];

const ONLINEJOBS_COMPANY: &[Rule] = &[
    Rule::Text(".employer-name"),
    Rule::Text(".job-employer"),
    Rule::Text("[class*=\"employer\"]"),
    Rule::ByCompany { max_len: 100 },
    Rule::Constant(ONLINEJOBS_FALLBACK_EMPLOYER),
];
const ONLINEJOBS_TITLE: &[Rule] = &[
    Rule::Text(".post-title"),
    Rule::Text("h1.title"),
    Rule::Text("[class*=\"job-title\"]"),
    Rule::Text("h1"),
];
const ONLINEJOBS_LOCATION: &[Rule] = &[
    Rule::Text(".location"),
    Rule::Text("[class*=\"location\"]"),
    Rule::Constant("Remote/Philippines"),
];

/// Fields pulled from a posting. Empty strings mean nothing matched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedJob {
    pub company: String,
    pub title: String,
    pub location: String,
}

impl Site {
    /// Picks the site from the page URL. LinkedIn only counts on job pages.
    pub fn detect(url: &str) -> Option<Site> {
        if url.contains("linkedin.com/jobs") {
            Some(Site::LinkedIn)
        } else if url.contains("indeed.com") {
            Some(Site::Indeed)
        } else if url.contains("glassdoor.com") {
            Some(Site::Glassdoor)
        } else if url.contains("onlinejobs.ph") {
            Some(Site::OnlineJobs)
        } else {
            None
        }
    }

    pub fn company_rules(&self) -> &'static [Rule] {
        match self {
            Site::LinkedIn => LINKEDIN_COMPANY,
            Site::Indeed => INDEED_COMPANY,
            Site::Glassdoor => GLASSDOOR_COMPANY,
            Site::OnlineJobs => ONLINEJOBS_COMPANY,
        }
    }

    pub fn title_rules(&self) -> &'static [Rule] {
        match self {
            Site::LinkedIn => LINKEDIN_TITLE,
            Site::Indeed => INDEED_TITLE,
            Site::Glassdoor => GLASSDOOR_TITLE,
            Site::OnlineJobs => ONLINEJOBS_TITLE,
        }
    }

    pub fn location_rules(&self) -> &'static [Rule] {
        match self {
            Site::LinkedIn => LINKEDIN_LOCATION,
            Site::Indeed => INDEED_LOCATION,
            Site::Glassdoor => GLASSDOOR_LOCATION,
            Site::OnlineJobs => ONLINEJOBS_LOCATION,
        }
    }

    pub fn extract(&self, document: &Html) -> ExtractedJob {
        let mut job = ExtractedJob {
            company: first_match(document, self.company_rules()),
            title: first_match(document, self.title_rules()),
            location: first_match(document, self.location_rules()),
        };

        if *self == Site::OnlineJobs {
            let lowered = job.company.to_lowercase();
            if lowered.contains("login")
                || lowered.contains("register")
                || job.company.chars().count() > 100
            {
                job.company = ONLINEJOBS_FALLBACK_EMPLOYER.to_string();
            }
        }

        job
    }
}

/// Source channel recorded with a capture. Broader than `Site::detect`:
/// any LinkedIn page counts as LinkedIn.
pub fn source_for_url(url: &str) -> Source {
    if url.contains("linkedin.com") {
        Source::LinkedIn
    } else if url.contains("indeed.com") {
        Source::Indeed
    } else if url.contains("glassdoor.com") {
        Source::Glassdoor
    } else if url.contains("onlinejobs.ph") {
        Source::OnlineJobs
    } else {
        Source::Manual
    }
}

/// Extracts a page fetched from `url`. Unsupported sites yield empty fields.
pub fn extract_page(url: &str, html: &str) -> Option<(Site, ExtractedJob)> {
    let site = Site::detect(url)?;
    let document = Html::parse_document(html);
    Some((site, site.extract(&document)))
}

fn first_match(document: &Html, rules: &[Rule]) -> String {
    rules
        .iter()
        .find_map(|rule| rule.apply(document))
        .unwrap_or_default()
}

impl Rule {
    pub fn apply(&self, document: &Html) -> Option<String> {
        let found = match *self {
            Rule::Text(selector) => select(document, selector)?.next().map(visible_text),
            Rule::FirstSegment {
                selector,
                separator,
            } => select(document, selector)?.next().map(|el| {
                let text = visible_text(el);
                text.split(separator).next().unwrap_or_default().to_string()
            }),
            Rule::ClassMention {
                selector,
                keywords,
                min_len,
                max_len,
            } => select(document, selector)?.find_map(|el| {
                let class = el.value().attr("class").unwrap_or_default();
                if !keywords.iter().any(|k| class.contains(k)) {
                    return None;
                }
                let text = visible_text(el);
                let len = text.chars().count();
                (len > min_len && len < max_len).then_some(text)
            }),
            Rule::Heading { min_len, max_len } => select(document, "h1, h2")?.find_map(|el| {
                let text = visible_text(el);
                let len = text.chars().count();
                (len > min_len && len < max_len).then_some(text)
            }),
            Rule::LeafLocation => select(document, "div")?.find_map(|el| {
                if el.children().any(|child| child.value().is_element()) {
                    return None;
                }
                let text = visible_text(el);
                looks_like_location(&text).then_some(text)
            }),
            Rule::ByCompany { max_len } => select(document, "div, span, p")?.find_map(|el| {
                let text = visible_text(el);
                if !text.contains("by ") || text.chars().count() >= max_len {
                    return None;
                }
                name_after_by(&text)
            }),
            Rule::Constant(value) => Some(value.to_string()),
        };

        found
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
    }
}

fn select<'a>(
    document: &'a Html,
    selector: &str,
) -> Option<impl Iterator<Item = ElementRef<'a>> + 'a> {
    // Selectors are static; a bad one simply never matches.
    let parsed = Selector::parse(selector).ok()?;
    let matches: Vec<ElementRef<'a>> = document.select(&parsed).collect();
    Some(matches.into_iter())
}

/// Rendered-ish text: all descendant text with whitespace runs collapsed.
pub(crate) fn visible_text(element: ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn looks_like_location(text: &str) -> bool {
    let len = text.chars().count();
    len > 4
        && len < 50
        && (text.contains(',') || text.contains("Remote"))
        && !text.contains('$')
        && !text.contains("year")
}

/// Everything after the last "by" followed by whitespace, case-insensitive.
fn name_after_by(text: &str) -> Option<String> {
    let lowered = text.to_ascii_lowercase();
    let start = lowered.rfind("by ")? + "by ".len();
    let name = text[start..].trim();
    (!name.is_empty()).then(|| name.to_string())
}
