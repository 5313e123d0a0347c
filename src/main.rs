//! Sandbox manager CLI.
//!
//! Thin argument surface over the workflow entry points; all semantic
//! validation happens in the library's validation layer.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use sandbox_manager::workflow::{CreateRequest, SyncRequest, Workflow};
use sandbox_manager::{LocalRunner, Registry, Settings};

#[derive(Parser)]
#[command(name = "sandbox-manager", version, about = "Manage local development sandboxes")]
struct Cli {
    /// Settings file (default: $SANDBOX_SETTINGS, then ~/.sandboxes/settings.toml)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare the context root: tooling clones and base directories
    Setup,

    /// Create a new sandbox
    Create {
        #[arg(short, long)]
        name: String,

        /// Runtime token, e.g. python3.6 or nodejs
        #[arg(short, long)]
        language: String,

        /// Create a remote repository and clone it (false: local init only)
        #[arg(short, long, default_value_t = true, action = ArgAction::Set)]
        git: bool,

        /// Packages preinstalled into the environment
        #[arg(short, long)]
        packages: Option<String>,
    },

    /// Tear down a sandbox and all of its artifacts
    Remove {
        #[arg(short, long)]
        name: String,
    },

    /// Refresh an existing sandbox, or build one from a repository URL
    Sync {
        /// Existing sandbox to refresh
        #[arg(short, long)]
        name: Option<String>,

        /// Repository URL to build a new sandbox from
        #[arg(short, long)]
        repository: Option<String>,

        /// Name for the new sandbox (repository mode)
        #[arg(short, long)]
        environment: Option<String>,

        /// Runtime token (repository mode)
        #[arg(short, long)]
        language: Option<String>,

        #[arg(short, long)]
        packages: Option<String>,
    },

    /// Open an interactive session inside a sandbox
    Starter {
        #[arg(short, long)]
        name: String,
    },

    /// List persisted sandbox records
    Retrieve {
        #[arg(short, long)]
        name: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> sandbox_manager::Result<()> {
    let settings = Settings::resolve(cli.settings.as_deref())?;
    let mut registry = Registry::open(settings.boxes_dir())?;
    let runner = LocalRunner;
    let mut workflow = Workflow::new(&settings, &mut registry, &runner);

    match cli.command {
        Commands::Setup => workflow.setup(),
        Commands::Create {
            name,
            language,
            git,
            packages,
        } => {
            let record = workflow.create(CreateRequest {
                name,
                language,
                git,
                packages,
            })?;
            println!(
                "created sandbox '{}' (id {})",
                record.sandbox.name, record.id
            );
            Ok(())
        }
        Commands::Remove { name } => {
            workflow.remove(&name)?;
            println!("removed sandbox '{}'", name);
            Ok(())
        }
        Commands::Sync {
            name,
            repository,
            environment,
            language,
            packages,
        } => {
            let created = workflow.sync(SyncRequest {
                name,
                repository,
                environment,
                language,
                packages,
            })?;
            match created {
                Some(record) => println!(
                    "created sandbox '{}' (id {})",
                    record.sandbox.name, record.id
                ),
                None => println!("sandbox synchronized"),
            }
            Ok(())
        }
        Commands::Starter { name } => workflow.launch(&name),
        Commands::Retrieve { name } => {
            let records = workflow.retrieve(name.as_deref())?;
            for record in &records {
                println!("{}", record.to_pretty_json()?);
            }
            if records.is_empty() {
                println!("no sandboxes found");
            }
            Ok(())
        }
    }
}
