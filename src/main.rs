use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use repo_conductor::actors::ActorRegistry;
use repo_conductor::config::CoreConfig;
use repo_conductor::hooks::{HookRegistry, LoggingChatNotifier, StaticCloneUrl};
use repo_conductor::pulse::JsonlPulse;
use repo_conductor::types::HookKind;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "repo_conductor=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CoreConfig::from_env();

    // The embedding service registers real provider hooks; standalone runs
    // get a logging chat backend and an optional fixed clone URL.
    let mut hooks = HookRegistry::new().register_chat(HookKind::GitHub, Arc::new(LoggingChatNotifier));
    if let Ok(url) = std::env::var("REPO_CONDUCTOR_CLONE_URL") {
        hooks = hooks.register_source(HookKind::GitHub, Arc::new(StaticCloneUrl(url)));
    }

    // Fail fast on misconfiguration instead of discovering it mid-event.
    if let Err(e) = hooks.validate(&[HookKind::GitHub]) {
        tracing::error!(error = %e, "hook configuration invalid");
        std::process::exit(1);
    }

    let pulse = Arc::new(JsonlPulse::new(config.pulse_dir.clone()));
    let registry = ActorRegistry::new(config, Arc::new(hooks), pulse);

    tracing::info!("control plane ready, awaiting shutdown signal");
    tokio::signal::ctrl_c().await.expect("install ctrl-c handler");

    registry.shutdown().await;
}
