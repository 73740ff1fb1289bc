use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::client::{ClientError, SubmitOutcome, TrackerClient};
use crate::models::{Application, NewApplication, Status};
use crate::session::ExtensionSession;
use crate::site::{extract_page, source_for_url, ExtractedJob};
use crate::trigger::{ClickTarget, SETTLE_DELAY};

/// Applies the submission gate to an extraction. Returns `None` when the
/// capture should be dropped silently.
pub fn prepare_submission(job: &ExtractedJob, url: &str, now: DateTime<Utc>) -> Option<NewApplication> {
    let company = job.company.trim();
    let title = job.title.trim();

    if company.chars().count() <= 3
        || title.chars().count() <= 3
        || company.to_lowercase().contains("login")
    {
        debug!("Capture dropped: company={company:?} title={title:?}");
        return None;
    }

    Some(NewApplication {
        company_name: company.to_string(),
        job_title: title.to_string(),
        location: job.location.trim().to_string(),
        url: url.to_string(),
        source: source_for_url(url),
        status: Status::Applied,
        date_applied: now,
    })
}

/// Handles a click: anything but an apply action is ignored. After an apply
/// click the page gets `SETTLE_DELAY` to settle before `snapshot` is taken,
/// extracted and gated.
pub async fn capture_on_click<F, E>(
    target: &ClickTarget,
    url: &str,
    snapshot: F,
) -> Result<Option<NewApplication>, E>
where
    F: FnOnce() -> Result<String, E>,
{
    if !target.is_apply_action() {
        return Ok(None);
    }
    capture_after_apply(url, snapshot).await
}

/// Waits `SETTLE_DELAY`, then extracts `snapshot` and applies the gate.
/// Unsupported sites yield `None`.
pub async fn capture_after_apply<F, E>(url: &str, snapshot: F) -> Result<Option<NewApplication>, E>
where
    F: FnOnce() -> Result<String, E>,
{
    tokio::time::sleep(SETTLE_DELAY).await;
    let html = snapshot()?;
    let Some((site, job)) = extract_page(url, &html) else {
        debug!("No extraction rules for {url}");
        return Ok(None);
    };
    debug!("Extracted from {site:?}: {job:?}");
    Ok(prepare_submission(&job, url, Utc::now()))
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Saved(Application),
    AlreadyTracked,
    /// No credential stored; nothing was sent.
    NeedsLogin,
    /// The server refused the credential; the session was cleared.
    SessionExpired,
}

/// Sends a gated capture with the session's credential.
pub async fn submit(
    client: &TrackerClient,
    session: &mut ExtensionSession,
    new: &NewApplication,
) -> Result<CaptureOutcome, ClientError> {
    let Some(token) = session.token().map(str::to_string) else {
        return Ok(CaptureOutcome::NeedsLogin);
    };

    match client.clone().with_token(token).create(new).await {
        Ok(SubmitOutcome::Created(app)) => {
            info!("Saved {} - {}", app.company_name, app.job_title);
            Ok(CaptureOutcome::Saved(app))
        }
        Ok(SubmitOutcome::AlreadyTracked(_)) => Ok(CaptureOutcome::AlreadyTracked),
        Err(ClientError::Unauthenticated) => {
            warn!("Credential rejected; clearing session");
            session.clear();
            Ok(CaptureOutcome::SessionExpired)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::json;

    use super::*;
    use crate::client::tests::serve;
    use crate::models::Source;

    fn job(company: &str, title: &str) -> ExtractedJob {
        ExtractedJob {
            company: company.to_string(),
            title: title.to_string(),
            location: " Remote ".to_string(),
        }
    }

    const URL: &str = "https://www.linkedin.com/jobs/view/42";

    #[test]
    fn test_gate_accepts_reasonable_capture() {
        let now = Utc::now();
        let new = prepare_submission(&job("Acme Corp", "Engineer"), URL, now).unwrap();
        assert_eq!(new.company_name, "Acme Corp");
        assert_eq!(new.location, "Remote");
        assert_eq!(new.source, Source::LinkedIn);
        assert_eq!(new.status, Status::Applied);
        assert_eq!(new.date_applied, now);
        assert_eq!(new.url, URL);
    }

    #[test]
    fn test_gate_drops_short_empty_or_login_values() {
        let now = Utc::now();
        assert!(prepare_submission(&job("", "Engineer"), URL, now).is_none());
        assert!(prepare_submission(&job("Acme", ""), URL, now).is_none());
        assert!(prepare_submission(&job("IBM", "Engineer"), URL, now).is_none());
        assert!(prepare_submission(&job("Acme", "Dev"), URL, now).is_none());
        assert!(prepare_submission(&job("Please LOGIN first", "Engineer"), URL, now).is_none());
        assert!(prepare_submission(&job("Acme", "Engineer"), URL, now).is_some());
    }

    fn apply_button() -> ClickTarget {
        ClickTarget {
            tag: "button".to_string(),
            text: "Easy Apply".to_string(),
            ..Default::default()
        }
    }

    const LINKEDIN_PAGE: &str = r#"<html><body>
        <div class="job-details-jobs-unified-top-card__company-name"><a>Acme Corp</a></div>
        <h1 class="job-details-jobs-unified-top-card__job-title">Platform Engineer</h1>
    </body></html>"#;

    #[tokio::test(start_paused = true)]
    async fn test_apply_click_waits_for_page_to_settle() {
        let taken = Arc::new(AtomicBool::new(false));
        let flag = taken.clone();
        let capture = tokio::spawn(async move {
            capture_on_click(&apply_button(), URL, move || {
                flag.store(true, Ordering::SeqCst);
                Ok::<_, Infallible>(LINKEDIN_PAGE.to_string())
            })
            .await
        });

        tokio::task::yield_now().await;
        tokio::time::advance(SETTLE_DELAY - Duration::from_millis(1)).await;
        tokio::task::yield_now().await;
        assert!(!taken.load(Ordering::SeqCst));

        tokio::time::advance(Duration::from_millis(1)).await;
        let new = capture.await.unwrap().unwrap().unwrap();
        assert!(taken.load(Ordering::SeqCst));
        assert_eq!(new.company_name, "Acme Corp");
        assert_eq!(new.job_title, "Platform Engineer");
        assert_eq!(new.source, Source::LinkedIn);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_apply_click_takes_no_snapshot() {
        let nav = ClickTarget {
            tag: "a".to_string(),
            text: "Apply".to_string(),
            class: "global-nav__link".to_string(),
            ..Default::default()
        };
        let captured = capture_on_click(&nav, URL, || -> Result<String, Infallible> {
            panic!("snapshot taken for a non-apply click")
        })
        .await
        .unwrap();
        assert!(captured.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_site_yields_nothing() {
        let captured = capture_after_apply("https://example.com/careers/1", || {
            Ok::<_, Infallible>(LINKEDIN_PAGE.to_string())
        })
        .await
        .unwrap();
        assert!(captured.is_none());
    }

    #[tokio::test]
    async fn test_submit_without_token_needs_login() {
        let client = TrackerClient::new("http://127.0.0.1:9").unwrap();
        let mut session = ExtensionSession::default();
        let new = prepare_submission(&job("Acme Corp", "Engineer"), URL, Utc::now()).unwrap();
        assert_eq!(
            submit(&client, &mut session, &new).await.unwrap(),
            CaptureOutcome::NeedsLogin
        );
    }

    #[tokio::test]
    async fn test_unauthorized_submit_clears_session() {
        let router = Router::new().route(
            "/api/applications",
            post(|| async { (StatusCode::UNAUTHORIZED, Json(json!({"success": false}))) }),
        );
        let client = TrackerClient::new(&serve(router).await).unwrap();
        let mut session = ExtensionSession {
            token: Some("stale".to_string()),
            ..Default::default()
        };
        let new = prepare_submission(&job("Acme Corp", "Engineer"), URL, Utc::now()).unwrap();

        assert_eq!(
            submit(&client, &mut session, &new).await.unwrap(),
            CaptureOutcome::SessionExpired
        );
        assert_eq!(session.token(), None);
    }

    #[tokio::test]
    async fn test_duplicate_submit_is_already_tracked() {
        let router = Router::new().route(
            "/api/applications",
            post(|| async {
                (
                    StatusCode::CONFLICT,
                    Json(json!({"success": false, "code": "DUPLICATE", "error": "exists"})),
                )
            }),
        );
        let client = TrackerClient::new(&serve(router).await).unwrap();
        let mut session = ExtensionSession {
            token: Some("tok".to_string()),
            ..Default::default()
        };
        let new = prepare_submission(&job("Acme Corp", "Engineer"), URL, Utc::now()).unwrap();

        assert_eq!(
            submit(&client, &mut session, &new).await.unwrap(),
            CaptureOutcome::AlreadyTracked
        );
        assert_eq!(session.token(), Some("tok"));
    }
}
