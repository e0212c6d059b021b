use std::sync::Arc;

use anyhow::{bail, Context, Result};
use assettrack_api::{
    auth::{AuthConfig, AuthService},
    config::{self, AppConfig},
    db::{self, DbPool},
    events::{self, EventSender},
    media::MediaStore,
    services::{maintenance::MaintenanceService, product_types::ProductTypeService},
};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(
    name = "assettrack-admin",
    about = "Out-of-band maintenance for the AssetTrack database and media store",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Delete every row and stored sticker image (development and tests only)
    Reset(ResetArgs),
    /// Remove orphaned or duplicate stickers and unreferenced image files
    CleanStickers,
    /// Create the default product types that do not exist yet
    SeedTypes,
    /// Mint a bearer token for the API
    IssueToken(IssueTokenArgs),
}

#[derive(Args)]
struct ResetArgs {
    /// Confirm the destruction of all data
    #[arg(long)]
    yes: bool,
}

#[derive(Args)]
struct IssueTokenArgs {
    /// Operator recorded as the actor of ledger and catalog changes
    #[arg(long)]
    subject: String,
    /// Display name stored in the token
    #[arg(long)]
    name: Option<String>,
    /// Role to embed; repeat for several
    #[arg(long = "role")]
    roles: Vec<String>,
}

struct AdminContext {
    config: AppConfig,
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl AdminContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load configuration")?;
        config::init_tracing(config.log_level(), config.log_json);

        let pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to the database")?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);
        tokio::spawn(events::process_events(rx));

        Ok(Self {
            config,
            db: Arc::new(pool),
            event_sender: Arc::new(EventSender::new(tx)),
        })
    }

    fn media(&self) -> Arc<MediaStore> {
        Arc::new(MediaStore::new(self.config.media_root()))
    }

    fn maintenance(&self) -> MaintenanceService {
        MaintenanceService::new(self.db.clone(), self.media())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Tokens need only the configuration, not a database
    if let Commands::IssueToken(args) = &cli.command {
        let config = config::load_config().context("failed to load configuration")?;
        return issue_token(&config, args, cli.json);
    }

    let context = AdminContext::initialize().await?;
    run(&context, cli.command, cli.json).await
}

async fn run(context: &AdminContext, command: Commands, json: bool) -> Result<()> {
    match command {
        Commands::Migrate => {
            db::run_migrations(&context.db)
                .await
                .context("migrations failed")?;
            println!("Migrations applied");
        }
        Commands::Reset(args) => {
            if !args.yes {
                bail!("reset deletes every row and sticker image; pass --yes to confirm");
            }
            let report = context.maintenance().reset().await?;
            if json {
                print_json(&report)?;
            } else {
                for (table, rows) in &report.tables {
                    println!("{table:<20} {rows} row(s) deleted");
                }
                println!("{} sticker file(s) removed", report.files_removed);
            }
        }
        Commands::CleanStickers => {
            context.media().ensure_dirs().await?;
            let report = context.maintenance().clean_stickers().await?;
            if json {
                print_json(&report)?;
            } else {
                println!("Orphaned stickers removed:   {}", report.orphaned);
                println!("Duplicate stickers removed:  {}", report.duplicates);
                println!("Stickers deactivated:        {}", report.deactivated);
                println!("Unreferenced files removed:  {}", report.unreferenced_files);
            }
        }
        Commands::SeedTypes => {
            let service = ProductTypeService::new(context.db.clone(), context.event_sender.clone());
            let created = service.seed_defaults().await?;
            if json {
                print_json(&created)?;
            } else if created.is_empty() {
                println!("All default product types already exist");
            } else {
                println!("Created product types: {}", created.join(", "));
            }
        }
        Commands::IssueToken(args) => issue_token(&context.config, &args, json)?,
    }

    Ok(())
}

fn issue_token(config: &AppConfig, args: &IssueTokenArgs, json: bool) -> Result<()> {
    let subject = args.subject.trim();
    if subject.is_empty() {
        bail!("--subject must not be empty");
    }

    let auth = AuthService::new(AuthConfig::from(config));
    let token = auth
        .issue_token(subject, args.name.clone(), args.roles.clone())
        .context("failed to issue token")?;

    if json {
        print_json(&serde_json::json!({
            "subject": subject,
            "expires_in": config.jwt_expiration,
            "token": token,
        }))?;
    } else {
        println!("{token}");
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
