use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pipeline stage of an application. Declaration order is the sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Status {
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

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown status '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    Indeed,
    LinkedIn,
    Email,
    Manual,
    Glassdoor,
    #[serde(rename = "OnlineJobs.ph")]
    OnlineJobs,
}

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

/// Body of `POST /api/applications`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewApplication {
    pub company_name: String,
    pub job_title: String,
    pub location: String,
    pub url: String,
    pub source: Source,
    pub status: Status,
    pub date_applied: DateTime<Utc>,
}

/// Body of `PUT /api/applications/:id`; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApplicationUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}
