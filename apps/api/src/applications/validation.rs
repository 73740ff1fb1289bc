use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::errors::{AppError, FieldError};
use crate::models::application::{ApplicationPatch, NewApplication, Source, Status};

pub const MAX_NAME_LEN: usize = 200;
pub const MAX_LOCATION_LEN: usize = 200;
pub const MAX_URL_LEN: usize = 2000;

/// Request body for create and update. Every field is optional at the wire
/// level; which ones are required depends on the operation.
#[derive(Debug, Default, Deserialize)]
pub struct ApplicationPayload {
    pub company_name: Option<String>,
    pub job_title: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub date_applied: Option<String>,
    pub source: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

/// Collects field failures so a client sees all of them at once.
#[derive(Default)]
struct Checker {
    errors: Vec<FieldError>,
}

impl Checker {
    fn fail(&mut self, field: &str, message: String) {
        self.errors.push(FieldError::new(field, message));
    }

    /// Trimmed 1..=max chars. `required` distinguishes create from update.
    fn name(&mut self, field: &str, label: &str, value: Option<&str>, required: bool) -> Option<String> {
        let Some(raw) = value else {
            if required {
                self.fail(field, format!("{label} is required"));
            }
            return None;
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            let message = if required {
                format!("{label} is required")
            } else {
                format!("{label} cannot be empty if provided")
            };
            self.fail(field, message);
            return None;
        }
        if trimmed.chars().count() > MAX_NAME_LEN {
            self.fail(
                field,
                format!("{label} must be between 1 and {MAX_NAME_LEN} characters"),
            );
            return None;
        }
        Some(trimmed.to_string())
    }

    fn bounded(&mut self, field: &str, label: &str, value: Option<&str>, max: usize) -> Option<String> {
        let trimmed = value?.trim();
        if trimmed.chars().count() > max {
            self.fail(field, format!("{label} must be less than {max} characters"));
            return None;
        }
        Some(trimmed.to_string())
    }

    fn source(&mut self, value: Option<&str>) -> Option<Source> {
        let raw = value?;
        match raw.parse() {
            Ok(source) => Some(source),
            Err(()) => {
                self.fail("source", "Invalid source".to_string());
                None
            }
        }
    }

    fn status(&mut self, value: Option<&str>) -> Option<Status> {
        let raw = value?;
        match raw.parse() {
            Ok(status) => Some(status),
            Err(()) => {
                self.fail("status", "Invalid status".to_string());
                None
            }
        }
    }

    fn date(&mut self, value: Option<&str>) -> Option<DateTime<Utc>> {
        let raw = value?;
        match parse_date(raw.trim()) {
            Some(date) => Some(date),
            None => {
                self.fail("date_applied", "Invalid date format".to_string());
                None
            }
        }
    }

    fn finish<T>(self, value: T) -> Result<T, AppError> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(AppError::Validation(self.errors))
        }
    }
}

/// Accepts an RFC 3339 timestamp or a bare `YYYY-MM-DD` calendar date
/// (interpreted as midnight UTC).
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Validates a create request. Company name and job title are required.
pub fn validate_new(payload: &ApplicationPayload) -> Result<NewApplication, AppError> {
    let mut check = Checker::default();

    let company_name = check.name(
        "company_name",
        "Company name",
        payload.company_name.as_deref(),
        true,
    );
    let job_title = check.name("job_title", "Job title", payload.job_title.as_deref(), true);
    let location = check.bounded(
        "location",
        "Location",
        payload.location.as_deref(),
        MAX_LOCATION_LEN,
    );
    let url = check.bounded("url", "URL", payload.url.as_deref(), MAX_URL_LEN);
    let source = check.source(payload.source.as_deref());
    let status = check.status(payload.status.as_deref());
    let date_applied = check.date(payload.date_applied.as_deref());
    let notes = payload.notes.as_deref().map(|n| n.trim().to_string());

    let new = NewApplication {
        company_name: company_name.unwrap_or_default(),
        job_title: job_title.unwrap_or_default(),
        location: location.unwrap_or_default(),
        url: url.unwrap_or_default(),
        date_applied,
        source: source.unwrap_or_default(),
        status: status.unwrap_or_default(),
        notes: notes.unwrap_or_default(),
    };
    check.finish(new)
}

/// Validates a partial update. Absent fields are left alone; present ones
/// follow the same rules as on create.
pub fn validate_patch(payload: &ApplicationPayload) -> Result<ApplicationPatch, AppError> {
    let mut check = Checker::default();

    let patch = ApplicationPatch {
        company_name: check.name(
            "company_name",
            "Company name",
            payload.company_name.as_deref(),
            false,
        ),
        job_title: check.name("job_title", "Job title", payload.job_title.as_deref(), false),
        location: check.bounded(
            "location",
            "Location",
            payload.location.as_deref(),
            MAX_LOCATION_LEN,
        ),
        url: check.bounded("url", "URL", payload.url.as_deref(), MAX_URL_LEN),
        date_applied: check.date(payload.date_applied.as_deref()),
        source: check.source(payload.source.as_deref()),
        status: check.status(payload.status.as_deref()),
        notes: payload.notes.as_deref().map(|n| n.trim().to_string()),
    };
    check.finish(patch)
}
