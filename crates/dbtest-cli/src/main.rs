mod progress;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use tracing::{error, info, warn};

use dbtest_core::{
    Config, ConfigError, Connector, Dialect, FileStorage, Status, Storage, StorageError, Target,
    TargetConfig, TestCase, TestSet,
};

use crate::progress::ProgressReporter;

#[derive(Parser)]
#[command(name = "dbtest")]
#[command(about = "Run declarative SQL test cases against database targets", long_about = None)]
struct Cli {
    /// Project root directory holding the test artifacts
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a single test case or a package of test cases
    Execute {
        #[command(flatten)]
        selection: Selection,

        /// Identifier of the target to execute at
        #[arg(long)]
        target: String,

        /// Run package members concurrently, optionally capping the
        /// worker pool size
        #[arg(long)]
        parallel: Option<Option<usize>>,

        /// Wall-clock window for a parallel run, in seconds
        #[arg(long, requires = "parallel")]
        timeout: Option<u64>,
    },
    /// Show the recorded statuses of a test case or package
    Status {
        #[command(flatten)]
        selection: Selection,
    },
    /// Register a new target interactively
    Addtarget,
    /// Create the project layout in the root directory
    Init,
}

/// Exactly one of --case and --set selects what to operate on.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct Selection {
    /// Test case identifier, e.g. de.tests.Case1
    #[arg(long)]
    case: Option<String>,

    /// Package identifier naming a set of test cases, e.g. de.tests
    #[arg(long)]
    set: Option<String>,
}

#[tokio::main]
async fn main() {
    let _ = color_eyre::install();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    let cli = Cli::parse();

    let root = cli
        .root
        .clone()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    info!(root = %root.display(), "Using project root");

    let config = match load_config(&root) {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Falling back to default configuration");
            Config::default()
        }
    };

    // A failed command degrades to a no-op plus diagnostic; the
    // process itself finishes normally.
    if let Err(report) = run(cli.command, &root, &config).await {
        error!("{report:#}");
    }
}

/// Prefers a project config under the root directory over the usual
/// lookup chain, so `--root` selects the configuration too.
fn load_config(root: &Path) -> Result<Config, ConfigError> {
    let project_file = root.join(dbtest_core::config::PROJECT_CONFIG_FILE);
    if project_file.exists() {
        Config::from_file(project_file)
    } else {
        Config::load()
    }
}

async fn run(command: Commands, root: &Path, config: &Config) -> Result<()> {
    let storage = FileStorage::with_config(root, config.storage.clone());

    match command {
        Commands::Execute {
            selection,
            target,
            parallel,
            timeout,
        } => cmd_execute(&storage, config, selection, &target, parallel, timeout).await,
        Commands::Status { selection } => cmd_status(&storage, selection),
        Commands::Addtarget => cmd_add_target(&storage),
        Commands::Init => cmd_init(&storage),
    }
}

async fn cmd_execute(
    storage: &FileStorage,
    config: &Config,
    selection: Selection,
    target_identifier: &str,
    parallel: Option<Option<usize>>,
    timeout: Option<u64>,
) -> Result<()> {
    let targets = storage.load_targets()?;
    let target = targets
        .target(target_identifier)
        .ok_or_else(|| {
            eyre!("Target {target_identifier} is not registered; run 'dbtest addtarget' first")
        })?
        .clone();

    match (selection.case, selection.set) {
        (Some(identifier), _) => {
            info!(case = %identifier, target = %target_identifier, "Executing test case");
            let case = storage.load_case(&identifier)?;
            case.execute(&target).await;
            print_verdict(&case, &target.identifier());
            storage.save_status(&case)?;
            Ok(())
        }
        (None, Some(package)) => {
            info!(package = %package, target = %target_identifier, "Executing test set");
            execute_set(storage, config, &package, &target, parallel, timeout).await
        }
        (None, None) => Err(eyre!("Select a test case with --case or a package with --set")),
    }
}

async fn execute_set(
    storage: &FileStorage,
    config: &Config,
    package: &str,
    target: &Target,
    parallel: Option<Option<usize>>,
    timeout: Option<u64>,
) -> Result<()> {
    let mut set = TestSet::new();
    set.add_all(storage.load_package(package)?)?;
    if set.is_empty() {
        println!("No test cases found in package [{}]", package);
        return Ok(());
    }

    let target_identifier = target.identifier();
    let reporter = ProgressReporter::new(set.len() as u64, target_identifier.clone());
    let subscription = set.add_listener(reporter.clone());

    match parallel {
        None => {
            set.execute(target).await;
        }
        Some(pool_size) => {
            let pool_size = pool_size.unwrap_or(config.execution.parallelism);
            let window = match timeout {
                Some(secs) => Duration::from_secs(secs),
                None => config.execution.batch_timeout(),
            };
            let shared: Arc<dyn Connector> = Arc::new(target.clone());

            let report = set.execute_parallel(shared, pool_size, window).await;
            for identifier in &report.abandoned {
                reporter.note(format!(
                    "Test case [{}] still running at target [{}] after {}s",
                    identifier,
                    target_identifier,
                    window.as_secs()
                ));
            }
        }
    }

    set.remove_listener(subscription);
    reporter.finish();

    // An abandoned unit is still Running; its earlier ledger records
    // stay until a verdict lands.
    for case in set.cases() {
        if resolved_at(&case, &target_identifier) {
            storage.save_status(&case)?;
        }
    }

    let passed = set.cases_with_status(Status::Passed, &target_identifier).len();
    println!("{} of {} test cases passed", passed, set.len());
    Ok(())
}

fn cmd_status(storage: &FileStorage, selection: Selection) -> Result<()> {
    match (selection.case, selection.set) {
        (Some(identifier), _) => print_recorded_status(storage, &identifier),
        (None, Some(package)) => {
            for case in storage.load_package(&package)? {
                if let Ok(identifier) = case.identifier() {
                    print_recorded_status(storage, &identifier)?;
                }
            }
            Ok(())
        }
        (None, None) => Err(eyre!("Select a test case with --case or a package with --set")),
    }
}

fn print_recorded_status(storage: &FileStorage, identifier: &str) -> Result<()> {
    let records = storage.load_status_for(identifier)?;
    if records.is_empty() {
        println!("No status recorded for test case [{}]", identifier);
        return Ok(());
    }

    for record in records {
        println!(
            "Test case [{}] executed at target [{}]: {}",
            record.test_case_identifier, record.target_identifier, record.status
        );
    }
    Ok(())
}

fn cmd_add_target(storage: &FileStorage) -> Result<()> {
    let dialect_name = prompt("Database type (sqlite, mysql, oracle): ")?;
    let dialect = Dialect::from_name(dialect_name.trim())
        .ok_or_else(|| eyre!("Unknown database type: {}", dialect_name.trim()))?;
    let host = prompt("Host: ")?;
    let port: u16 = prompt("Port: ")?.trim().parse()?;
    let database = prompt("Database / schema: ")?;
    let username = prompt("Username: ")?;
    let password = prompt("Password: ")?;

    let target = Target::new(
        dialect,
        host.trim(),
        port,
        database.trim(),
        username.trim(),
        password.trim(),
    );

    println!();
    let confirmation = prompt(&format!("Add target [{}]? (yes) ", target.identifier()))?;
    let confirmation = confirmation.trim();
    if !(confirmation.is_empty() || confirmation.eq_ignore_ascii_case("yes")) {
        println!("Aborted.");
        return Ok(());
    }

    let mut targets = match storage.load_targets() {
        Ok(targets) => targets,
        Err(StorageError::TargetsNotFound(_)) => TargetConfig::default(),
        Err(e) => return Err(e.into()),
    };
    let identifier = target.identifier();
    if !targets.add_target(target) {
        println!("Target [{}] is already registered.", identifier);
        return Ok(());
    }
    storage.save_targets(&targets)?;

    println!("Registered target [{}]", identifier);
    Ok(())
}

fn cmd_init(storage: &FileStorage) -> Result<()> {
    storage.initialize()?;

    // Seed an empty registry, but never touch an existing or even a
    // broken one.
    match storage.load_targets() {
        Ok(_) => {}
        Err(StorageError::TargetsNotFound(_)) => storage.save_targets(&TargetConfig::default())?,
        Err(e) => return Err(e.into()),
    }

    println!("Initialized dbtest project at [{}]", storage.root().display());
    Ok(())
}

fn print_verdict(case: &TestCase, target_identifier: &str) {
    let identifier = case
        .identifier()
        .unwrap_or_else(|_| "<unidentified>".to_string());
    let status = case.status(target_identifier).unwrap_or_default();
    println!(
        "Test case [{}] executed at target [{}]: {}",
        identifier, target_identifier, status
    );
}

/// True once the case's execution at the target reached a terminal
/// status; a case never executed there counts as resolved.
fn resolved_at(case: &TestCase, target_identifier: &str) -> bool {
    case.status(target_identifier)
        .map_or(true, |status| status.is_terminal())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input)
}
