//! Binary entrypoint for the classdiary CLI.
//!
//! Commands:
//! - `serve` - run the HTTP API
//! - `init` - create a starter `config.toml` and an empty data directory
//! - `status` - print a brief summary of the stored diary
//! - `admin-passwd --name <admin>` - interactively set an admin password (argon2 hashed)
//!
//! See the library crate docs for module‑level details: `classdiary::`.
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::info;

use classdiary::config::{AdminCredential, Config};
use classdiary::diary::shop::format_catalog;
use classdiary::diary::types::SubmissionStatus;
use classdiary::storage::DocumentStore;

#[derive(Parser)]
#[command(name = "classdiary")]
#[command(about = "Backend for a class diary Telegram Mini App")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Write a default configuration and create the data directory
    Init,
    /// Show a summary of the stored diary
    Status,
    /// Set or update an admin password in the config file
    AdminPasswd {
        /// Admin name as used in `Authorization: Bearer <name>:<password>`
        #[arg(short, long)]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Init runs before a config file exists.
    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Some(Config::load(&cli.config).await?),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Serve => {
            let config = pre_config.ok_or_else(|| anyhow!("configuration not loaded"))?;
            config.validate()?;
            info!("Starting classdiary v{}", env!("CARGO_PKG_VERSION"));
            classdiary::api::serve(config).await?;
        }
        Commands::Init => {
            info!("Initializing new classdiary configuration");
            if tokio::fs::metadata(&cli.config).await.is_ok() {
                return Err(anyhow!("{} already exists; not overwriting", cli.config));
            }
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
            let cfg = Config::default();
            let store = DocumentStore::open(&cfg.storage.data_dir)?;
            info!("Initialized diary document at {}", store.document_path().display());
            println!(
                "Next: run `classdiary admin-passwd --name {}` to enable the admin API.",
                cfg.admins.first().map(|a| a.name.as_str()).unwrap_or("teacher")
            );
        }
        Commands::Status => {
            let config = pre_config.ok_or_else(|| anyhow!("configuration not loaded"))?;
            show_status(&config)?;
        }
        Commands::AdminPasswd { name } => {
            let mut config = pre_config.ok_or_else(|| anyhow!("configuration not loaded"))?;
            use password_hash::{PasswordHasher, SaltString};
            println!("Setting admin password for '{}'.", name);
            // Prompt twice without echo
            let pass1 = rpassword::prompt_password("New password: ")?;
            if pass1.len() < 8 {
                println!("Error: password too short (min 8).");
                return Ok(());
            }
            if pass1.len() > 128 {
                println!("Error: password too long.");
                return Ok(());
            }
            let pass2 = rpassword::prompt_password("Confirm password: ")?;
            if pass1 != pass2 {
                println!("Error: passwords do not match.");
                return Ok(());
            }
            let salt = SaltString::generate(&mut rand::thread_rng());
            let argon = config.argon2()?;
            let hash = match argon.hash_password(pass1.as_bytes(), &salt) {
                Ok(h) => h.to_string(),
                Err(e) => {
                    println!("Hash error: {e}");
                    return Ok(());
                }
            };
            match config.admins.iter_mut().find(|a| a.name == name) {
                Some(admin) => admin.password_hash = Some(hash),
                None => config.admins.push(AdminCredential {
                    name: name.clone(),
                    password_hash: Some(hash),
                }),
            }
            config.validate()?;
            config.save(&cli.config).await?;
            log::warn!(target: "security", "ADMIN password set for {}", name);
            println!("Admin password updated successfully.");
        }
    }
    Ok(())
}

fn show_status(config: &Config) -> Result<()> {
    let store = DocumentStore::open(&config.storage.data_dir)?;
    let doc = store.read()?;
    let alive = doc
        .users
        .iter()
        .filter(|u| u.pet.as_ref().is_some_and(|p| p.is_alive()))
        .count();
    let dead = doc
        .users
        .iter()
        .filter(|u| u.pet.as_ref().is_some_and(|p| p.is_dead))
        .count();
    let pending = doc
        .submissions
        .iter()
        .filter(|s| s.status == SubmissionStatus::Pending)
        .count();
    println!("classdiary status");
    println!("  document:     {} (revision {})", store.document_path().display(), doc.revision);
    println!("  users:        {} ({} blocked)", doc.users.len(), doc.users.iter().filter(|u| u.is_blocked).count());
    println!("  pets:         {} alive, {} dead", alive, dead);
    println!("  topics:       {}", doc.topics.len());
    println!("  homework:     {}", doc.homework.len());
    println!("  submissions:  {} ({} pending)", doc.submissions.len(), pending);
    println!("  gift every:   {} stickers", doc.settings.gift_threshold);
    println!(
        "  admins:       {}",
        config
            .admins
            .iter()
            .map(|a| if a.password_hash.is_some() { a.name.clone() } else { format!("{} (no password)", a.name) })
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!();
    print!("{}", format_catalog(&config.shop.catalog()));
    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    let log_file = config.as_ref().and_then(|cfg| {
        let path = cfg.logging.file.as_ref()?;
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });
    let security_path = config.as_ref().and_then(|cfg| cfg.logging.security_file.clone());

    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Under a service manager stdout is not a TTY; the file is enough then
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if record.target() == "security" {
                append_security_line(security_path.as_deref(), &line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if record.target() == "security" {
                append_security_line(security_path.as_deref(), &line);
            }
            writeln!(fmt, "{}", line)
        });
    }
    let _ = builder.try_init();
}

fn append_security_line(path: Option<&str>, line: &str) {
    use std::io::Write;
    let Some(path) = path else {
        return;
    };
    if let Ok(mut sf) = std::fs::OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(sf, "{}", line);
    }
}
