use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use scraper::Html;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use uuid::Uuid;

use tracker_client::capture::{capture_after_apply, capture_on_click, prepare_submission, submit, CaptureOutcome};
use tracker_client::client::TrackerClient;
use tracker_client::dashboard::{self, SortDirection, SortKey, StatusFilter, ViewQuery};
use tracker_client::models::{ApplicationUpdate, Status};
use tracker_client::session::{ExtensionSession, SessionCheck};
use tracker_client::site::{extract_page, Site};
use tracker_client::trigger::find_apply_actions;

#[derive(Parser)]
#[command(name = "tracker-capture")]
#[command(about = "Capture job postings into the job tracker and browse tracked applications")]
struct Cli {
    /// Tracker API base URL
    #[arg(long, env = "TRACKER_API_URL", default_value = "http://localhost:5000")]
    api: String,

    /// Where the credential is kept between runs
    #[arg(long, env = "TRACKER_SESSION", default_value = ".tracker-session.json")]
    session: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what would be captured from a saved job page
    Extract {
        /// Page URL (selects the site rules)
        #[arg(short, long)]
        url: String,

        /// Saved HTML of the page
        file: PathBuf,
    },

    /// Click the page's apply button, then extract the saved job page once it
    /// has settled and add it to the tracker
    Submit {
        #[arg(short, long)]
        url: String,

        /// Saved HTML of the page, read again after the settle delay
        file: PathBuf,

        /// Submit even when the page shows no apply button
        #[arg(long)]
        force: bool,
    },

    /// Exchange a credential copied from the dashboard for a stored token
    Login {
        #[arg(long)]
        token: String,
    },

    /// Forget the stored credential
    Logout,

    /// Check the stored credential against the tracker
    Status,

    /// List tracked applications
    List {
        /// Case-insensitive match on company or title
        #[arg(short, long, default_value = "")]
        search: String,

        /// "All" or a status (Applied, Interviewing, ...)
        #[arg(long, default_value = "All")]
        status: StatusFilter,

        /// date, company, title or status
        #[arg(long, default_value = "date")]
        sort: SortKey,

        /// Sort ascending instead of descending
        #[arg(long)]
        asc: bool,

        #[arg(short, long, default_value = "1")]
        page: usize,

        #[arg(long, default_value_t = dashboard::DEFAULT_PAGE_SIZE)]
        page_size: usize,
    },

    /// Change the status or notes of a tracked application
    Update {
        id: Uuid,

        /// Applied, Interviewing, Offered, Rejected, Accepted or Ignored
        #[arg(long)]
        status: Option<Status>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Stop tracking an application
    Delete { id: Uuid },

    /// Download all applications as CSV
    Export {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tracker_client=info,tracker_capture=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let client = TrackerClient::new(&cli.api)?;

    match cli.command {
        Commands::Extract { url, file } => {
            let html = read_page(&file)?;
            let (site, job) = extract_page(&url, &html)
                .ok_or_else(|| anyhow!("unsupported job site: {url}"))?;
            println!("Site:     {site:?}");
            println!("Company:  {}", job.company);
            println!("Title:    {}", job.title);
            println!("Location: {}", job.location);

            let apply_buttons = find_apply_actions(&Html::parse_document(&html)).len();
            println!("Apply buttons: {apply_buttons}");
            match prepare_submission(&job, &url, Utc::now()) {
                Some(_) => println!("Would be submitted."),
                None => println!("Would be dropped (missing or implausible company/title)."),
            }
        }

        Commands::Submit { url, file, force } => {
            if Site::detect(&url).is_none() {
                bail!("unsupported job site: {url}");
            }
            let html = read_page(&file)?;
            let apply_button = find_apply_actions(&Html::parse_document(&html)).into_iter().next();
            let snapshot = || read_page(&file);
            let captured = match apply_button {
                Some(target) => capture_on_click(&target, &url, snapshot).await?,
                None if force => capture_after_apply(&url, snapshot).await?,
                None => bail!("no apply button found on the page; use --force to submit anyway"),
            };
            let Some(new) = captured else {
                warn!("Nothing to submit: missing or implausible company/title on {url}");
                return Ok(());
            };

            let mut session = ExtensionSession::load(&cli.session)?;
            let outcome = submit(&client, &mut session, &new).await?;
            session.save(&cli.session)?;
            match outcome {
                CaptureOutcome::Saved(app) => println!("Saved: {} - {}", app.company_name, app.job_title),
                CaptureOutcome::AlreadyTracked => {
                    println!("Already tracked: {} - {}", new.company_name, new.job_title)
                }
                CaptureOutcome::NeedsLogin => bail!("not logged in; run `tracker-capture login --token ...`"),
                CaptureOutcome::SessionExpired => bail!("session expired; please log in again"),
            }
        }

        Commands::Login { token } => {
            let mut session = ExtensionSession::default();
            match session.sign_in(&client, &token).await? {
                SessionCheck::SignedIn { name } => {
                    session.save(&cli.session)?;
                    println!("Logged in as {name}");
                }
                _ => bail!("invalid token"),
            }
        }

        Commands::Logout => {
            let mut session = ExtensionSession::load(&cli.session)?;
            session.clear();
            session.save(&cli.session)?;
            println!("Logged out");
        }

        Commands::Status => {
            let mut session = ExtensionSession::load(&cli.session)?;
            let check = session.verify(&client).await?;
            session.save(&cli.session)?;
            match check {
                SessionCheck::SignedIn { name } => println!("Logged in as {name}"),
                SessionCheck::SignedOut => println!("Not logged in"),
                SessionCheck::UserChanged => println!("User changed - please log in again"),
                SessionCheck::Expired => println!("Session expired - please log in again"),
            }
        }

        Commands::List {
            search,
            status,
            sort,
            asc,
            page,
            page_size,
        } => {
            let applications = authed(&client, &cli.session)?.list().await?;
            let query = ViewQuery {
                search,
                status,
                sort,
                direction: if asc {
                    SortDirection::Ascending
                } else {
                    SortDirection::Descending
                },
                page,
                page_size,
            };
            let view = dashboard::view(&applications, &query);
            for app in &view.items {
                println!(
                    "{}  {:<12}  {} - {}",
                    app.date_applied.format("%Y-%m-%d"),
                    app.status.as_str(),
                    app.company_name,
                    app.job_title
                );
            }
            println!(
                "Page {}/{} ({} matching)",
                view.page, view.total_pages, view.matching
            );

            let stats = dashboard::stats(&applications);
            println!(
                "Total {} | Applied {} | Interviewing {} | Offered {} | Rejected {}",
                stats.total, stats.applied, stats.interviewing, stats.offered, stats.rejected
            );
        }

        Commands::Update { id, status, notes } => {
            if status.is_none() && notes.is_none() {
                bail!("nothing to update; pass --status and/or --notes");
            }
            let update = ApplicationUpdate { status, notes };
            let app = authed(&client, &cli.session)?.update(id, &update).await?;
            println!(
                "Updated: {} - {} ({})",
                app.company_name,
                app.job_title,
                app.status.as_str()
            );
        }

        Commands::Delete { id } => {
            authed(&client, &cli.session)?.delete(id).await?;
            println!("Deleted {id}");
        }

        Commands::Export { output } => {
            let csv = authed(&client, &cli.session)?.export_csv().await?;
            match output {
                Some(path) => std::fs::write(&path, csv)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => print!("{csv}"),
            }
        }
    }

    Ok(())
}

fn read_page(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn authed(client: &TrackerClient, session_path: &Path) -> Result<TrackerClient> {
    let session = ExtensionSession::load(session_path)?;
    let token = session
        .token()
        .ok_or_else(|| anyhow!("not logged in; run `tracker-capture login --token ...`"))?;
    Ok(client.clone().with_token(token))
}
