use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Channel through which a job application was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    Indeed,
    LinkedIn,
    Email,
    #[default]
    Manual,
    Glassdoor,
    #[serde(rename = "OnlineJobs.ph")]
    OnlineJobs,
}

impl Source {
    pub const ALL: [Source; 6] = [
        Source::Indeed,
        Source::LinkedIn,
        Source::Email,
        Source::Manual,
        Source::Glassdoor,
        Source::OnlineJobs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Indeed => "Indeed",
            Source::LinkedIn => "LinkedIn",
            Source::Email => "Email",
            Source::Manual => "Manual",
            Source::Glassdoor => "Glassdoor",
            Source::OnlineJobs => "OnlineJobs.ph",
        }
    }
}

impl FromStr for Source {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Source::ALL
            .into_iter()
            .find(|source| source.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an application currently stands in the hiring pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Applied,
    Interviewing,
    Offered,
    Rejected,
    Accepted,
    Ignored,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::Applied,
        Status::Interviewing,
        Status::Offered,
        Status::Rejected,
        Status::Accepted,
        Status::Ignored,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Applied => "Applied",
            Status::Interviewing => "Interviewing",
            Status::Offered => "Offered",
            Status::Rejected => "Rejected",
            Status::Accepted => "Accepted",
            Status::Ignored => "Ignored",
        }
    }
}

impl FromStr for Status {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked job application, owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_name: String,
    pub job_title: String,
    pub location: String,
    pub url: String,
    pub date_applied: DateTime<Utc>,
    pub source: Source,
    pub status: Status,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw `applications` row; enumerations are stored as text.
#[derive(Debug, Clone, FromRow)]
pub struct ApplicationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_name: String,
    pub job_title: String,
    pub location: String,
    pub url: String,
    pub date_applied: DateTime<Utc>,
    pub source: String,
    pub status: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ApplicationRow> for Application {
    type Error = anyhow::Error;

    fn try_from(row: ApplicationRow) -> Result<Self, Self::Error> {
        let source = row
            .source
            .parse()
            .map_err(|_| anyhow!("unknown source '{}' on application {}", row.source, row.id))?;
        let status = row
            .status
            .parse()
            .map_err(|_| anyhow!("unknown status '{}' on application {}", row.status, row.id))?;

        Ok(Application {
            id: row.id,
            user_id: row.user_id,
            company_name: row.company_name,
            job_title: row.job_title,
            location: row.location,
            url: row.url,
            date_applied: row.date_applied,
            source,
            status,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Validated fields for a new application. `date_applied` falls back to the
/// creation time when absent.
#[derive(Debug, Clone, PartialEq)]
pub struct NewApplication {
    pub company_name: String,
    pub job_title: String,
    pub location: String,
    pub url: String,
    pub date_applied: Option<DateTime<Utc>>,
    pub source: Source,
    pub status: Status,
    pub notes: String,
}

/// Validated partial update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationPatch {
    pub company_name: Option<String>,
    pub job_title: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub date_applied: Option<DateTime<Utc>>,
    pub source: Option<Source>,
    pub status: Option<Status>,
    pub notes: Option<String>,
}

impl ApplicationPatch {
    pub fn touches_identity(&self) -> bool {
        self.company_name.is_some() || self.job_title.is_some()
    }
}
