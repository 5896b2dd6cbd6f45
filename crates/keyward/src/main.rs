use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use keyward_cli::{Cli, Command, KeyCommand};
use keyward_config::{AgentBackend, AppConfig, AppPaths, ConfigManager};
use keyward_core::{reconcile, DisplayedKey, KeyId};
use keyward_keychain::testdata::WITH_PASSPHRASE;
use keyward_keychain::{KeyManager, KeyStore, LocalKeyManager, MemoryAgent, SystemAgent};
use keyward_ui::{selftest, Coordinator, MemoryDocument};
use std::io::BufRead;
use std::sync::Arc;
use tracing_subscriber::prelude::*;
use zeroize::Zeroizing;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = AppPaths::new()?;
    let config_manager = ConfigManager::new(paths.clone());
    let project = cli.project.clone().or_else(|| std::env::current_dir().ok());
    let overrides = match &cli.config {
        Some(path) => Some(
            ConfigManager::load_layer(path)
                .with_context(|| format!("reading {}", path.display()))?,
        ),
        None => None,
    };
    let mut config = config_manager.load(project.as_deref(), overrides)?;
    if cli.memory_agent {
        config.agent.backend = AgentBackend::Memory;
    }
    let _log_guard = init_logging(&config, &paths, config.logging.stdout)?;
    tracing::info!(backend = ?config.agent.backend, "keyward starting");

    match cli.command {
        Command::Config { init } => {
            if init {
                config_manager.save_default()?;
                println!("config initialized at {}", paths.config_file.display());
            }
        }
        Command::Selftest => run_selftest().await?,
        Command::Keys { command } => {
            let store = KeyStore::open(config.storage.keys_file(&paths))?;
            match config.agent.backend {
                AgentBackend::System => {
                    let agent = SystemAgent::connect().await?;
                    handle_keys(&LocalKeyManager::new(store, agent), command).await?;
                }
                AgentBackend::Memory => {
                    handle_keys(&LocalKeyManager::new(store, MemoryAgent::new()), command).await?;
                }
            }
        }
    }

    Ok(())
}

fn init_logging(
    config: &AppConfig,
    paths: &AppPaths,
    enable_stdout: bool,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(&paths.log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&paths.log_dir, "keyward.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    let file_layer = if config.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed()
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    if enable_stdout {
        let stdout_layer = if config.logging.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .boxed()
        };
        tracing::subscriber::set_global_default(subscriber.with(stdout_layer))?;
    } else {
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(guard)
}

async fn handle_keys(manager: &dyn KeyManager, command: KeyCommand) -> Result<()> {
    match command {
        KeyCommand::List { json } => {
            let keys = displayed(manager).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&keys)?);
            } else {
                print_keys(&keys);
            }
        }
        KeyCommand::Add { name, file } => {
            let text = Zeroizing::new(
                std::fs::read_to_string(&file)
                    .with_context(|| format!("reading {}", file.display()))?,
            );
            manager
                .add(&name, &text)
                .await
                .context("failed to add key")?;
            println!("added {name}");
        }
        KeyCommand::Load { id } => {
            let id = KeyId::new(id);
            let configured = manager
                .configured()
                .await
                .context("failed to get configured keys")?;
            let key = configured
                .iter()
                .find(|k| k.id == id)
                .ok_or_else(|| anyhow!("no configured key with id {id}"))?;
            let passphrase = if key.encrypted {
                read_passphrase()?
            } else {
                Zeroizing::new(String::new())
            };
            manager
                .load(&id, &passphrase)
                .await
                .context("failed to load key")?;
            println!("loaded {}", key.name);
        }
        KeyCommand::Unload { id } => {
            let id = KeyId::new(id);
            let loaded = manager
                .loaded()
                .await
                .context("failed to get loaded keys")?;
            let Some(key) = loaded.iter().find(|k| k.id.as_ref() == Some(&id)) else {
                bail!("key {id} is not loaded");
            };
            manager.unload(key).await.context("failed to unload key")?;
            println!("unloaded {id}");
        }
        KeyCommand::Remove { id } => {
            let id = KeyId::new(id);
            manager.remove(&id).await.context("failed to remove key")?;
            println!("removed {id}");
        }
    }
    Ok(())
}

async fn displayed(manager: &dyn KeyManager) -> Result<Vec<DisplayedKey>> {
    let configured = manager
        .configured()
        .await
        .context("failed to get configured keys")?;
    let loaded = manager
        .loaded()
        .await
        .context("failed to get loaded keys")?;
    Ok(reconcile(&configured, &loaded))
}

fn print_keys(keys: &[DisplayedKey]) {
    for key in keys {
        let id = key.id.as_ref().map(KeyId::as_str).unwrap_or("-");
        let state = if key.loaded {
            "loaded"
        } else if key.encrypted {
            "encrypted"
        } else {
            "unloaded"
        };
        println!("{id}\t{}\t{state}\t{}\t{}", key.name, key.key_type, key.blob);
    }
}

fn read_passphrase() -> Result<Zeroizing<String>> {
    eprint!("passphrase: ");
    let mut line = Zeroizing::new(String::new());
    std::io::stdin().lock().read_line(&mut line)?;
    let trimmed = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(trimmed);
    Ok(line)
}

async fn run_selftest() -> Result<()> {
    let doc = MemoryDocument::options_page(true);
    let manager = Arc::new(LocalKeyManager::new(KeyStore::in_memory(), MemoryAgent::new()));
    let page = Coordinator::new(manager, doc.clone())?;
    doc.fire_content_loaded();
    page.idle().await;

    let errors = selftest::end_to_end(&page, &WITH_PASSPHRASE).await;
    if errors.is_empty() {
        println!("selftest passed");
        return Ok(());
    }
    for error in &errors {
        println!("FAIL {error}");
    }
    bail!("selftest failed with {} problem(s)", errors.len())
}
