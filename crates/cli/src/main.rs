use anyhow::Context;
use clap::{Parser, Subcommand};
use finsight_core::config::Settings;
use finsight_core::domain::notification::NotificationFilter;
use finsight_core::notify::http::HttpNotificationService;
use finsight_core::notify::{NotificationSync, SyncPhase};
use finsight_core::projection::{project, ProjectionInput};
use finsight_core::session::SessionContext;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod render;

#[derive(Debug, Parser)]
#[command(name = "finsight")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Project the growth of a fixed monthly saving with compound interest.
    Project {
        /// Amount saved every month.
        #[arg(long)]
        monthly: String,

        /// Duration in years; fractional months are dropped.
        #[arg(long)]
        years: String,

        /// Annual interest rate in percent.
        #[arg(long, default_value = "3")]
        rate: String,

        /// Print the projection as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Work with the notification panel.
    Notifications {
        /// Session token. Defaults to FINSIGHT_TOKEN.
        #[arg(long)]
        token: Option<String>,

        #[command(subcommand)]
        action: NotificationAction,
    },
}

#[derive(Debug, Subcommand)]
enum NotificationAction {
    /// Fetch and print notifications, most recent first.
    List {
        #[arg(long)]
        unread: bool,
    },
    /// Mark one notification as read.
    Read { id: String },
    /// Delete one notification.
    Delete { id: String },
    /// Mark every unread notification as read.
    ReadAll,
    /// Keep the live feed open and log every change until Ctrl-C.
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let result = match args.command {
        Command::Project {
            monthly,
            years,
            rate,
            json,
        } => run_projection(&monthly, &years, &rate, json),
        Command::Notifications { token, action } => {
            run_notifications(&settings, token, action).await
        }
    };

    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %err, "command failed");
    }
    result
}

fn run_projection(monthly: &str, years: &str, rate: &str, json: bool) -> anyhow::Result<()> {
    let input = ProjectionInput::parse(monthly, years, rate);
    let Some(projection) = project(input) else {
        tracing::info!(monthly, years, rate, "projection skipped: invalid input");
        println!("No projection: monthly amount and years must be positive numbers.");
        return Ok(());
    };

    if json {
        let out = serde_json::to_string_pretty(&projection)
            .context("failed to serialize projection")?;
        println!("{out}");
    } else {
        print!("{}", render::projection_table(&projection));
    }
    Ok(())
}

async fn run_notifications(
    settings: &Settings,
    token: Option<String>,
    action: NotificationAction,
) -> anyhow::Result<()> {
    let token = match token {
        Some(t) => t,
        None => settings.require_token()?.to_string(),
    };

    let service = HttpNotificationService::from_settings(settings)?;
    let session = SessionContext::new(Some(token));
    let sync = Arc::new(NotificationSync::new(Arc::new(service), session.clone()));

    match action {
        NotificationAction::List { unread } => {
            sync.refresh().await;
            let filter = if unread {
                NotificationFilter::Unread
            } else {
                NotificationFilter::All
            };
            print!(
                "{}",
                render::notification_list(&sync.view(), filter, chrono::Utc::now())
            );
        }
        NotificationAction::Read { id } => {
            sync.refresh().await;
            anyhow::ensure!(sync.mark_as_read(&id).await, "could not mark {id} as read");
            println!("Marked {id} as read ({} unread).", sync.unread_count());
        }
        NotificationAction::Delete { id } => {
            sync.refresh().await;
            anyhow::ensure!(sync.delete_notification(&id).await, "could not delete {id}");
            println!("Deleted {id}.");
        }
        NotificationAction::ReadAll => {
            sync.refresh().await;
            let report = sync.mark_all_as_read().await;
            println!(
                "Marked {} notification(s) as read; {} request(s) failed.",
                report.requested, report.failed
            );
        }
        NotificationAction::Watch => watch(&sync, &session).await,
    }

    Ok(())
}

async fn watch(sync: &Arc<NotificationSync>, session: &SessionContext) {
    let watcher = sync.watch_session();
    let mut changes = sync.changes();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = changes.borrow_and_update().clone();
                if view.phase == SyncPhase::Loaded {
                    tracing::info!(
                        count = view.notifications.len(),
                        unread = view.unread_count(),
                        subscribed = sync.is_subscribed(),
                        "notification cache updated"
                    );
                }
            }
        }
    }

    session.logout();
    sync.end_session();
    watcher.abort();
    tracing::info!("logged out; notification cache cleared");
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
