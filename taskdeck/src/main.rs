//! `Taskdeck` client.
//!
//! Configuration via CLI flags, environment variables, or config file
//! (`~/.config/taskdeck/config.toml`).
//!
//! ```bash
//! # Ask the proxy for task ideas
//! cargo run --bin taskdeck -- suggest plan a weekend trip
//!
//! # Scripted session against in-memory services
//! cargo run --bin taskdeck -- demo
//!
//! # Point at another proxy
//! TASKDECK_PROXY_URL=http://10.0.0.5:3001 cargo run --bin taskdeck -- suggest ...
//! ```

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use serde_json::json;
use tracing_appender::non_blocking::WorkerGuard;

use taskdeck::binding::SessionBinding;
use taskdeck::config::{CliArgs, ClientConfig, Command};
use taskdeck::route::{self, Route};
use taskdeck::session::{AuthError, Identity, MemoryAuth, SessionManager};
use taskdeck::suggest::SuggestClient;
use taskdeck::sync::{MemoryTaskStore, SyncState, TaskCollectionSync};
use taskdeck_proto::task::RawTaskRecord;

#[tokio::main]
async fn main() {
    let cli = CliArgs::parse();

    // Load and resolve configuration (CLI args > env > config file > defaults).
    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let _log_guard = init_logging(&config.log_level, config.log_file.as_deref());

    match cli.command.unwrap_or(Command::Demo) {
        Command::Suggest { prompt } => suggest(&config, &prompt.join(" ")).await,
        Command::Demo => {
            if let Err(e) = demo().await {
                eprintln!("demo failed: {e}");
                std::process::exit(1);
            }
        }
    }
}

/// Initialize logging.
///
/// With a log file, entries go through a non-blocking appender and the
/// returned [`WorkerGuard`] must be held until shutdown so buffered lines
/// are flushed. Without one, logs go to stderr so stdout stays clean.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let Some((log_dir, file_name)) = file_path.and_then(|p| {
        let dir = p.parent()?;
        let name = p.file_name()?.to_str()?;
        Some((dir, name))
    }) else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter)
            .init();
        return None;
    };

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

async fn suggest(config: &ClientConfig, prompt: &str) {
    let client = match SuggestClient::new(config.proxy_url.as_str(), config.request_timeout) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    match client.generate(prompt).await {
        Ok(tasks) => {
            for task in tasks {
                println!("- {task}");
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Walks through sign-in, live updates, sign-out, and a second user,
/// printing what the task view would show at each step.
async fn demo() -> Result<(), AuthError> {
    let auth = Arc::new(MemoryAuth::new());
    let store = Arc::new(MemoryTaskStore::new());
    seed(&store);

    let session = SessionManager::new(Arc::clone(&auth));
    session.initialize()?;
    let settled = session.ready().await;
    println!("session settled, signed in: {}", settled.is_authenticated());
    println!(
        "navigating to /todos lands on {}",
        route::guard(Route::Todos, session.is_authenticated())
    );

    let sync = Arc::new(TaskCollectionSync::new(Arc::clone(&store)));
    let binding = SessionBinding::attach(&session, Arc::clone(&sync));

    auth.sign_in(Identity::new("alice").with_display_name("Alice"));
    print_state("alice signed in", &wait_for_owner(&sync, Some("alice")).await);

    store.put(
        "alice",
        RawTaskRecord::new("a3")
            .with_field("title", "Book train tickets")
            .with_field("priority", "high"),
    );
    print_state("alice added a task", &sync.state());

    session.sign_out().await?;
    print_state("alice signed out", &wait_for_owner(&sync, None).await);
    println!(
        "navigating to /todos lands on {}",
        route::guard(Route::Todos, session.is_authenticated())
    );

    auth.sign_in(Identity::new("bob"));
    print_state("bob signed in", &wait_for_owner(&sync, Some("bob")).await);

    binding.shutdown();
    Ok(())
}

fn seed(store: &MemoryTaskStore) {
    let tasks = [
        ("alice", "a1", json!({"title": "Plan weekend trip", "priority": "medium"})),
        ("alice", "a2", json!({"title": "Pack bags", "completed": true})),
        ("bob", "b1", json!({"title": "Renew passport", "syncFlag": "pending"})),
    ];
    for (owner, id, body) in tasks {
        store.put(owner, RawTaskRecord::from_json(id, body));
    }
}

/// Waits until the sync follows `owner` and has finished loading.
async fn wait_for_owner(
    sync: &TaskCollectionSync<MemoryTaskStore>,
    owner: Option<&str>,
) -> SyncState {
    let mut rx = sync.subscribe();
    let state = rx
        .wait_for(|s| s.owner.as_deref() == owner && !s.loading)
        .await
        .map(|s| s.clone());
    state.unwrap_or_else(|_| sync.state())
}

fn print_state(step: &str, state: &SyncState) {
    println!("\n[{step}]");
    match &state.owner {
        Some(owner) => println!("  tasks for {owner}: {}", state.snapshot.len()),
        None => println!("  no active subscription"),
    }
    for task in &state.snapshot {
        let mark = if task.completed { "x" } else { " " };
        println!("  [{mark}] {} ({})", task.title, task.priority);
    }
}
