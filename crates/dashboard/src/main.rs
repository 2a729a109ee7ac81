//! Terminal front end for the IronQueue job dashboard.

use anyhow::Context;
use clap::{Parser, Subcommand};
use ironqueue_core::{JobId, NewJob};
use ironqueue_dashboard::render::{render_detail, render_screen};
use ironqueue_dashboard::{DashboardConfig, DashboardSession, StatusFilter};

/// Watch and submit IronQueue jobs.
#[derive(Parser, Debug)]
#[command(name = "ironqueue-dashboard")]
#[command(about = "Terminal dashboard for an IronQueue backend", long_about = None)]
struct Cli {
    /// Backend base URL (overrides IRONQUEUE_API_URL)
    #[arg(short = 'u', long = "url")]
    url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Live job list, redrawn on every change (default)
    Watch {
        /// Case-insensitive match on id or type
        #[arg(short, long, default_value = "")]
        query: String,
        /// ALL or a status such as RUNNING
        #[arg(short, long, default_value = "ALL")]
        status: StatusFilter,
    },
    /// Submit a job
    Submit {
        /// Job type, e.g. email-send
        job_type: String,
        /// JSON object passed to the handler
        #[arg(short, long)]
        payload: Option<String>,
    },
    /// Show one job
    Show { id: JobId },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ironqueue_observability::init("info");

    let cli = Cli::parse();

    let mut config = DashboardConfig::from_env().context("invalid dashboard configuration")?;
    if let Some(url) = cli.url {
        config = config.with_api_url(url);
    }

    let session = DashboardSession::new(config).context("failed to build dashboard session")?;

    let result = match cli.command.unwrap_or(Command::Watch {
        query: String::new(),
        status: StatusFilter::All,
    }) {
        Command::Watch { query, status } => watch(&session, &query, &status).await,
        Command::Submit { job_type, payload } => submit(&session, job_type, payload).await,
        Command::Show { id } => show(&session, id).await,
    };

    session.dispose().await;
    result
}

/// Redraws when the store changes, and on every poll tick that finished a
/// cycle, so failed refreshes show up even though they leave the store alone.
async fn watch(session: &DashboardSession, query: &str, filter: &StatusFilter) -> anyhow::Result<()> {
    let mut revisions = session.store().subscribe();
    session.start();

    let draw = |clear: bool| {
        let stats = session.poller_stats();
        let screen = render_screen(&session.view(query, filter), &stats);
        if clear {
            print!("\x1b[2J\x1b[H{screen}");
        } else {
            print!("{screen}");
        }
        stats.cycles
    };
    let mut drawn_cycles = draw(false);

    let mut ticks = tokio::time::interval(session.config().poll_interval);
    ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                res.context("failed to listen for ctrl-c")?;
                break;
            }
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
                drawn_cycles = draw(true);
            }
            _ = ticks.tick() => {
                if session.poller_stats().cycles != drawn_cycles {
                    drawn_cycles = draw(true);
                }
            }
        }
    }

    Ok(())
}

async fn submit(
    session: &DashboardSession,
    job_type: String,
    payload: Option<String>,
) -> anyhow::Result<()> {
    let mut request = NewJob::new(job_type);
    if let Some(raw) = payload {
        let value = serde_json::from_str(&raw).context("payload is not valid JSON")?;
        request = request.with_payload(value);
    }

    let job = session.submit(request).await?;
    println!("submitted job #{} ({})", job.id, job.status);
    Ok(())
}

async fn show(session: &DashboardSession, id: JobId) -> anyhow::Result<()> {
    let view = session.select(Some(id)).await;
    print!("{}", render_detail(&view));
    Ok(())
}
