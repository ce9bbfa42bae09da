use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod app;
mod client;
mod db;
mod effects;
mod matcher;
mod models;
mod report;
mod server;
mod session;
mod view;

use app::{Navigation, StaffDashboard, StaffForm};
use client::{Backend, ClientConfig, HttpBackend};
use session::{FileSessionStore, Role, Session};
use view::Page;

const LOGIN_HINT: &str =
    "Not signed in. Run `skill-match login --role <student|staff> --id <id>` to continue.";

#[derive(Parser)]
#[command(name = "skill-match")]
#[command(about = "Skill matching dashboards for students and staff", long_about = None)]
struct Cli {
    /// Base URL of the matching service
    #[arg(
        long,
        global = true,
        env = "SKILL_MATCH_API_URL",
        default_value = "http://localhost:8000"
    )]
    api_url: String,

    /// Seconds to wait for the matching service before giving up
    #[arg(long, global = true, env = "SKILL_MATCH_TIMEOUT_SECS", default_value_t = 10)]
    timeout_secs: u64,

    #[arg(long, global = true, env = "SKILL_MATCH_SESSION_FILE")]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a session
    Login {
        #[arg(long)]
        role: Role,
        #[arg(long)]
        id: String,
    },
    /// End the current session
    Logout,
    /// Show the dashboard for the signed-in role
    Dashboard {
        #[command(flatten)]
        form: FormArgs,
    },
    /// Show one student's profile (staff only)
    Profile { roll: String },
    /// Run a match and write a markdown report (staff only)
    Report {
        #[command(flatten)]
        form: FormArgs,
        #[arg(long, default_value = "match-report.md")]
        out: PathBuf,
    },
    /// Run the matching service
    Serve {
        #[arg(long, env = "SKILL_MATCH_BIND", default_value = "0.0.0.0:8000")]
        bind: String,
        /// Serve students from a CSV file instead of Postgres
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed students
    Seed,
    /// Import students from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
}

#[derive(clap::Args)]
struct FormArgs {
    #[arg(long)]
    workspace: Option<String>,
    #[arg(long)]
    min_python: Option<String>,
    #[arg(long)]
    min_ml: Option<String>,
}

impl FormArgs {
    fn into_form(self) -> Option<StaffForm> {
        let form = StaffForm {
            workspace_name: self.workspace.unwrap_or_default(),
            min_python: self.min_python.unwrap_or_default(),
            min_ml: self.min_ml.unwrap_or_default(),
        };
        (!form.is_blank()).then_some(form)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let sessions = || -> anyhow::Result<FileSessionStore> {
        let path = session::resolve_session_path(cli.session_file.clone())?;
        debug!(path = %path.display(), "using session file");
        Ok(FileSessionStore::new(path))
    };
    let backend = || -> anyhow::Result<HttpBackend> {
        let config = ClientConfig::new(&cli.api_url, Duration::from_secs(cli.timeout_secs));
        info!(base_url = %config.base_url, timeout_secs = cli.timeout_secs, "client configured");
        HttpBackend::new(config).context("failed to build HTTP client")
    };

    match cli.command {
        Commands::Login { role, id } => {
            let store = sessions()?;
            Session::new(role, id.trim()).save(&store)?;
            println!("Signed in as {role} {}.", id.trim());
        }
        Commands::Logout => {
            let store = sessions()?;
            if app::logout(&store)? == Navigation::RedirectToLogin {
                println!("Signed out.");
                println!("{LOGIN_HINT}");
            }
        }
        Commands::Dashboard { form } => {
            let store = sessions()?;
            let (notifier, layer) = effects::channel();
            let effects_task = tokio::spawn(layer.run());

            let (navigation, page) = app::open_dashboard(
                &store,
                backend()?,
                form.into_form().as_ref(),
                Page::new(Some(notifier)),
            )
            .await?;

            match navigation {
                Navigation::RedirectToLogin => println!("{LOGIN_HINT}"),
                Navigation::Stay => print!("{}", page.to_text()),
            }

            drop(page);
            match effects_task.await {
                Ok(bindings) => debug!(cards = bindings.len(), "effect layer finished"),
                Err(err) => warn!(error = %err, "effect layer task failed"),
            }
        }
        Commands::Profile { roll } => {
            let store = sessions()?;
            let Some(session) = app::bootstrap(&store)? else {
                println!("{LOGIN_HINT}");
                return Ok(());
            };
            if session.role != Role::Staff {
                anyhow::bail!("student profiles can only be browsed from a staff session");
            }

            let dashboard = StaffDashboard::new(backend()?, Page::default());
            dashboard.view_student_profile(&roll).await;
            for prompt in dashboard.into_page().prompts() {
                println!("{prompt}");
            }
        }
        Commands::Report { form, out } => {
            let store = sessions()?;
            let Some(session) = app::bootstrap(&store)? else {
                println!("{LOGIN_HINT}");
                return Ok(());
            };
            if session.role != Role::Staff {
                anyhow::bail!("match reports are only available to staff");
            }

            let form = form.into_form().unwrap_or_default();
            let request = match form.validate() {
                Ok(request) => request,
                Err(failure) => {
                    println!(">> {failure}");
                    return Ok(());
                }
            };
            let candidates = backend()?
                .run_match(&request)
                .await
                .context("match run failed")?;
            let report = report::build_report(&request, &candidates, chrono::Utc::now());
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Serve { bind, csv } => {
            let store = match csv {
                Some(path) => {
                    let students = db::read_csv(&path)?;
                    info!(count = students.len(), path = %path.display(), "loaded students from CSV");
                    db::StudentStore::memory(students)
                }
                None => db::StudentStore::Postgres(connect().await?),
            };
            server::serve(&bind, store).await?;
        }
        Commands::InitDb => {
            db::init_db(&connect().await?).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let written = db::seed(&connect().await?).await?;
            println!("Seeded {written} students.");
        }
        Commands::Import { csv } => {
            let written = db::import_csv(&connect().await?, &csv).await?;
            println!("Imported {written} students from {}.", csv.display());
        }
    }

    Ok(())
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}
