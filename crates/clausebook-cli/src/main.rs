mod display;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use clausebook_ai::{
    BatchDriver, Document, DriverConfig, ExtractorConfig, LlmExtractor, SourceInput, TextLayer,
};
use clausebook_core::{Role, clause_key};
use clausebook_store::{
    AuthError, AuthHandle, DirArchive, DuckStore, FileFlagStore, LocalIdentityProvider,
};
use clausebook_sync::{ActiveUser, ContractSession, MigrationProgress, SessionController};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "clausebook")]
#[command(about = "Contract clause extraction, storage, and review")]
struct Cli {
    /// DuckDB database file
    #[arg(long, env = "CLAUSEBOOK_DB", default_value = "clausebook.duckdb")]
    db: PathBuf,

    /// Account email (the first account ever created becomes admin)
    #[arg(long, env = "CLAUSEBOOK_USER")]
    user: String,

    #[arg(long, env = "CLAUSEBOOK_PASSWORD", hide_env_values = true)]
    password: String,

    /// Directory of legacy saved-contract JSON files
    #[arg(long, env = "CLAUSEBOOK_ARCHIVE", default_value = "archive")]
    archive: PathBuf,

    /// Device-local state (accounts, migration progress)
    #[arg(long, env = "CLAUSEBOOK_STATE_DIR", default_value = ".clausebook")]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List contracts, newest first
    Contracts,

    /// Show a contract's clauses, or one clause in full
    Show {
        contract: String,
        /// Clause number to show as a card
        #[arg(long)]
        clause: Option<String>,
    },

    /// Search a contract's clauses
    Search { contract: String, query: String },

    /// Extract clauses from a document (or a general/particular pair) and store them
    Analyze {
        /// General conditions, or the only document
        document: PathBuf,
        /// Particular conditions to compare against
        #[arg(long)]
        particular: Option<PathBuf>,
        /// Treat both files as pasted text and analyze them in one call
        #[arg(long, requires = "particular")]
        text: bool,
        #[arg(long, default_value = "https://api.anthropic.com")]
        api_url: String,
        #[arg(long, env = "CLAUSEBOOK_API_KEY", hide_env_values = true)]
        api_key: String,
        #[arg(long, default_value = "claude-sonnet-4-5-20250929")]
        model: String,
        #[arg(long, default_value_t = 2)]
        pages_per_chunk: usize,
    },

    /// Import a backup file into the store
    Import { file: PathBuf },

    /// Write a contract backup file
    Export {
        contract: String,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Migrate the legacy archive into the store
    Migrate {
        /// Run even if a previous migration completed
        #[arg(long)]
        force: bool,
    },

    /// Follow a contract's clauses until interrupted
    Watch { contract: String },

    /// Delete a clause by number
    Delete { contract: String, clause: String },

    /// List accounts and roles
    Users,

    /// Change an account's role
    Promote { email: String, role: Role },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    info!("clausebook v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();

    let auth = AuthHandle::new();
    let identity = LocalIdentityProvider::open(auth.clone(), &cli.state_dir.join("accounts.json"))
        .context("opening account file")?;
    sign_in_or_up(&identity, &cli.user, &cli.password)?;

    let store = Arc::new(
        DuckStore::open_persistent(auth.clone(), &cli.db)
            .with_context(|| format!("opening {}", cli.db.display()))?,
    );
    let mut controller = SessionController::new(
        auth,
        store.clone(),
        store,
        Arc::new(DirArchive::new(&cli.archive)),
        Arc::new(FileFlagStore::new(cli.state_dir.join("device.json"))),
    );

    let user = controller
        .resolve()
        .await
        .context("could not resolve the signed-in profile")?;
    if user.is_pending() {
        println!(
            "Account {} is awaiting approval by an administrator.",
            user.identity.email
        );
        return Ok(());
    }

    if !matches!(cli.command, Command::Migrate { .. }) {
        match controller
            .migrate_after_sign_in(&user, &mut |p| {
                eprintln!("  Migrating {}/{}: {}", p.index, p.total, p.name)
            })
            .await
        {
            Ok(Some(report)) => eprintln!(
                "Migrated {} legacy contracts ({} clauses, {} failed)",
                report.contracts, report.clauses.saved, report.clauses.failed
            ),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "legacy migration failed, will retry next session"),
        }
    }

    run(&mut controller, &user, cli.command).await
}

fn sign_in_or_up(
    identity: &LocalIdentityProvider,
    email: &str,
    password: &str,
) -> anyhow::Result<()> {
    match identity.sign_in(email, password) {
        Ok(_) => Ok(()),
        Err(AuthError::InvalidCredentials) => match identity.sign_up(email, password) {
            Ok(_) => {
                eprintln!("Created account {email}");
                Ok(())
            }
            Err(AuthError::AccountExists(_)) => bail!("invalid email or password"),
            Err(e) => Err(e).context("creating account"),
        },
        Err(e) => Err(e).context("signing in"),
    }
}

async fn run(
    controller: &mut SessionController,
    user: &ActiveUser,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Contracts => {
            display::print_contracts(&controller.contracts(user).await?);
        }

        Command::Show { contract, clause } => {
            let clauses = controller.clauses(user, &contract).await?;
            match clause {
                Some(number) => {
                    let key = clause_key(&number);
                    let found = clauses
                        .iter()
                        .find(|c| c.key() == key)
                        .with_context(|| format!("no clause {number} in {contract}"))?;
                    display::print_clause_card(found);
                }
                None => display::print_clause_list(&clauses),
            }
        }

        Command::Search { contract, query } => {
            let hits = controller.search(user, &contract, &query).await?;
            display::print_clause_list(&hits);
        }

        Command::Analyze {
            document,
            particular,
            text,
            api_url,
            api_key,
            model,
            pages_per_chunk,
        } => {
            let extractor = LlmExtractor::new(ExtractorConfig {
                base_url: api_url,
                api_key,
                model,
                ..ExtractorConfig::default()
            });
            let driver = BatchDriver::new(&extractor, &TextLayer).with_config(DriverConfig {
                pages_per_side: pages_per_chunk,
            });
            let input = source_input(&document, particular.as_deref(), text).await?;

            let outcome = controller
                .analyze(user, &driver, input, &mut |p| {
                    eprint!("\r  {:>5.1}% {:<40}", p.percent, p.stage)
                })
                .await?;
            eprintln!();
            println!(
                "Stored {} as {} ({} saved, {} failed)",
                outcome.name, outcome.contract_id, outcome.report.saved, outcome.report.failed
            );
            for key in &outcome.report.failed_keys {
                println!("  failed: {key}");
            }
            display::print_clause_list(&outcome.snapshot.clauses);
        }

        Command::Import { file } => {
            let body = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let outcome = controller.import_backup(user, &body).await?;
            println!(
                "Imported {} as {} ({} saved, {} failed)",
                outcome.name, outcome.contract_id, outcome.report.saved, outcome.report.failed
            );
        }

        Command::Export { contract, out } => {
            let (name, body) = controller.export_backup(user, &contract).await?;
            let path = out.join(name);
            tokio::fs::write(&path, body)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote {}", path.display());
        }

        Command::Migrate { force } => {
            let mut progress =
                |p: MigrationProgress| eprintln!("  {}/{}: {}", p.index, p.total, p.name);
            let report = if force {
                Some(controller.migrate_now(user, &mut progress).await?)
            } else {
                controller.migrate_after_sign_in(user, &mut progress).await?
            };
            match report {
                Some(r) => println!(
                    "Migrated {} contracts ({} clauses saved, {} failed)",
                    r.contracts, r.clauses.saved, r.clauses.failed
                ),
                None => println!("Nothing to migrate."),
            }
        }

        Command::Watch { contract } => watch(controller, user, &contract).await?,

        Command::Delete { contract, clause } => {
            controller
                .delete_clause(user, &contract, &clause_key(&clause))
                .await?;
            println!("Deleted clause {clause} from {contract}");
        }

        Command::Users => display::print_users(&controller.list_users(user).await?),

        Command::Promote { email, role } => {
            let users = controller.list_users(user).await?;
            let (uid, _) = users
                .iter()
                .find(|(_, p)| p.email.eq_ignore_ascii_case(&email))
                .with_context(|| format!("no account for {email}"))?;
            let profile = controller.set_role(user, uid, role).await?;
            println!("{} is now {}", profile.email, profile.role.as_str());
        }
    }
    Ok(())
}

async fn source_input(
    document: &Path,
    particular: Option<&Path>,
    as_text: bool,
) -> anyhow::Result<SourceInput> {
    let read = |path: &Path| {
        let path = path.to_path_buf();
        async move {
            Document::read(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))
        }
    };
    let general = read(document).await?;
    let Some(particular) = particular else {
        return Ok(SourceInput::Document(general));
    };
    let particular = read(particular).await?;
    if as_text {
        return Ok(SourceInput::TextPair {
            general: String::from_utf8_lossy(&general.bytes).into_owned(),
            particular: String::from_utf8_lossy(&particular.bytes).into_owned(),
        });
    }
    Ok(SourceInput::DocumentPair {
        general,
        particular,
    })
}

async fn watch(
    controller: &SessionController,
    user: &ActiveUser,
    contract: &str,
) -> anyhow::Result<()> {
    let mut session = ContractSession::new(controller.store().clone())
        .with_archive(controller.archive().clone());
    let mut changes = session.changes();
    session.open(Some(contract), Some(user.role())).await;

    loop {
        {
            let view = session.view();
            if let Some(err) = view.error() {
                eprintln!("error: {err}");
            }
            println!(
                "--- {contract} (revision {}) ---",
                view.revision().map_or("-".to_string(), |r| r.to_string())
            );
            display::print_clause_list(view.clauses());
        }
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    session.close();
    Ok(())
}
