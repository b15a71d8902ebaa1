use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use groupguard::api::guard_routes;
use groupguard::channels::{ChatTransport, StdoutTransport};
use groupguard::config::AppConfig;
use groupguard::error::Result;
use groupguard::events::{InboundEvent, parse_line};
use groupguard::guards::{self, GuardEngine, GuardRegistry, PatternCache, RateStore};
use groupguard::moderator::{ModerationOutcome, Moderator};
use groupguard::policy::PolicyBook;
use groupguard::store::{LibSqlViolationLog, ViolationLog};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = AppConfig::from_env()?;

    eprintln!("🛡️  GroupGuard v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Guard API: http://0.0.0.0:{}/api/guards", config.api_port);

    // ── Policies ─────────────────────────────────────────────────────────
    let policies = if config.policy_path.exists() {
        PolicyBook::load(&config.policy_path)?
    } else {
        eprintln!(
            "   Warning: no policy file at {}, every group passes unmoderated",
            config.policy_path.display()
        );
        PolicyBook::default()
    };
    eprintln!(
        "   Policies: {} group(s) from {}",
        policies.len(),
        config.policy_path.display()
    );

    // ── Guards ───────────────────────────────────────────────────────────
    let rate_store = RateStore::new();
    let pattern_cache = PatternCache::new(config.pattern_cache_key);
    let registry = Arc::new(GuardRegistry::builtin(
        Arc::clone(&rate_store),
        pattern_cache,
    ));
    for unknown in policies.validate(&registry) {
        tracing::warn!(
            chat_id = %unknown.chat_id,
            guard_id = %unknown.guard_id,
            "Policy references unknown guard, it will be skipped"
        );
    }
    eprintln!("   Guards: {} registered", registry.len());

    let sweep_handle = guards::spawn_sweep_task(Arc::clone(&rate_store), config.sweep_interval);

    // ── Database ─────────────────────────────────────────────────────────
    eprintln!("   Database: {}", config.db_path.display());
    let db = LibSqlViolationLog::new_local(&config.db_path).await?;
    let log: Arc<dyn ViolationLog> = Arc::new(db);

    // ── Moderator ────────────────────────────────────────────────────────
    let engine = GuardEngine::new(Arc::clone(&registry));
    let transport = Arc::new(StdoutTransport::new());
    let moderator = Moderator::new(
        engine.clone(),
        Arc::clone(&transport) as Arc<dyn ChatTransport>,
        Arc::clone(&log),
        &config.assistant_name,
    );

    // ── API ──────────────────────────────────────────────────────────────
    let app = guard_routes(engine, Arc::clone(&log));
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.api_port)).await?;
    let api_handle = tokio::spawn(async move {
        tracing::info!("Guard API server started");
        axum::serve(listener, app).await.ok();
    });

    eprintln!("   Reading events from stdin (one JSON object per line).\n");

    // ── Event loop ───────────────────────────────────────────────────────
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        handle_line(&line, &moderator, &transport, &policies).await;
                    }
                    Ok(None) => {
                        tracing::info!("Input closed, shutting down");
                        break;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Error reading stdin");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
        }
    }

    sweep_handle.abort();
    api_handle.abort();
    Ok(())
}

async fn handle_line(
    line: &str,
    moderator: &Moderator,
    transport: &StdoutTransport,
    policies: &PolicyBook,
) {
    let event = match parse_line(line) {
        None => return,
        Some(Ok(event)) => event,
        Some(Err(e)) => {
            tracing::warn!(error = %e, "Skipping malformed event");
            return;
        }
    };

    match event {
        InboundEvent::Message(msg) => {
            let outcome = moderator.moderate(&msg, policies.get(msg.chat_id())).await;
            if let ModerationOutcome::Blocked { guard_id, .. } = &outcome {
                tracing::debug!(message_id = %msg.key.id, guard_id = %guard_id, "Message withheld");
            }
        }
        InboundEvent::Admins { chat_id, admins } => {
            moderator.update_admin_cache(&chat_id, &admins).await;
            tracing::debug!(chat_id = %chat_id, admin_count = admins.len(), "Admin cache updated");
        }
        InboundEvent::Participants {
            chat_id,
            participants,
        } => {
            transport.set_participants(&chat_id, participants).await;
            moderator.refresh_admin_cache(&chat_id).await;
        }
    }
}
