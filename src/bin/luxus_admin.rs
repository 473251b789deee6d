use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use luxus_brecho_api::{
    config::{self, AppConfig},
    db::{self, DbPool},
    migrator::Migrator,
    services::{
        email::LogEmailSender, images::LocalImageStorage, sequence::SequenceAllocator,
    },
    AppServices,
};
use sea_orm_migration::MigratorTrait;
use serde::Serialize;
use serde_json::json;

#[derive(Parser)]
#[command(name = "luxus-admin", about = "Operational tasks for the Luxus Brechó API", version)]
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
    /// Schema migrations
    #[command(subcommand)]
    Migrate(MigrateCommands),
    /// Insert the default categories that are still missing
    SeedCategories,
    /// Create an active, confirmed administrator account
    CreateAdmin(CreateAdminArgs),
    /// Allocate the next id of a counter
    NextId(NextIdArgs),
}

#[derive(Subcommand)]
enum MigrateCommands {
    Up,
    Down {
        #[arg(long, help = "Number of migrations to roll back; all when omitted")]
        steps: Option<u32>,
    },
    Status,
}

#[derive(Args)]
struct CreateAdminArgs {
    #[arg(long, help = "Display name")]
    nome: String,
    #[arg(long, help = "Login email")]
    email: String,
    #[arg(long, help = "Initial password (letters and digits, 6 to 100 chars)")]
    senha: String,
}

#[derive(Args)]
struct NextIdArgs {
    #[arg(help = "Counter name, e.g. products, categories, users, orders")]
    counter: String,
}

struct CliContext {
    config: AppConfig,
    db: Arc<DbPool>,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load configuration")?;
        config::init_tracing(config.log_level(), false);
        let db = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to the database")?;
        Ok(Self {
            config,
            db: Arc::new(db),
        })
    }

    fn services(&self) -> AppServices {
        let images = Arc::new(LocalImageStorage::new(
            self.config.image_storage_dir.clone(),
            &self.config.image_public_base_url,
            self.config.max_image_bytes,
        ));
        let email = Arc::new(LogEmailSender::new(self.config.frontend_url.clone()));
        AppServices::new(self.db.clone(), &self.config, images, email)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    match cli.command {
        Commands::Migrate(command) => handle_migrate(&context, command, cli.json).await?,
        Commands::SeedCategories => {
            let created = context
                .services()
                .categories
                .seed()
                .await
                .context("failed to seed categories")?;
            if cli.json {
                print_json(&created)?;
            } else if created.is_empty() {
                println!("All default categories already exist");
            } else {
                for category in &created {
                    println!("Created category {} (id {})", category.name, category.id);
                }
            }
        }
        Commands::CreateAdmin(args) => {
            let payload = json!({
                "nome": args.nome,
                "email": args.email,
                "senha": args.senha,
                "tipo": "administrador",
            });
            let user = context
                .services()
                .users
                .create(luxus_brecho_api::models::document_from(payload))
                .await
                .context("failed to create administrator")?;
            if cli.json {
                print_json(&user)?;
            } else {
                println!("Administrator {} created (id {})", user.email, user.id);
            }
        }
        Commands::NextId(args) => {
            let id = SequenceAllocator::new(context.db.clone())
                .next(&args.counter)
                .await
                .with_context(|| format!("failed to allocate from counter {}", args.counter))?;
            if cli.json {
                print_json(&json!({ "counter": args.counter, "id": id }))?;
            } else {
                println!("{}", id);
            }
        }
    }

    Ok(())
}

async fn handle_migrate(context: &CliContext, command: MigrateCommands, json: bool) -> Result<()> {
    let db = context.db.as_ref();
    match command {
        MigrateCommands::Up => {
            db::run_migrations(db).await.context("migration failed")?;
            println!("Migrations applied");
        }
        MigrateCommands::Down { steps } => {
            Migrator::down(db, steps).await.context("rollback failed")?;
            println!("Rolled back {}", steps.map_or("all migrations".to_string(), |n| format!("{} migration(s)", n)));
        }
        MigrateCommands::Status => {
            let applied: Vec<String> = Migrator::get_applied_migrations(db)
                .await?
                .iter()
                .map(|m| m.name().to_string())
                .collect();
            let pending: Vec<String> = Migrator::get_pending_migrations(db)
                .await?
                .iter()
                .map(|m| m.name().to_string())
                .collect();
            if json {
                print_json(&json!({ "applied": applied, "pending": pending }))?;
            } else {
                for name in &applied {
                    println!("applied  {}", name);
                }
                for name in &pending {
                    println!("pending  {}", name);
                }
            }
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
