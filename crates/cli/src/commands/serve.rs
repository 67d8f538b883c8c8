//! `parley serve` — Start the HTTP/WebSocket server.

use std::sync::Arc;
use std::time::Duration;

use parley_auth::TokenService;
use parley_chat::ChatPipeline;
use parley_config::AppConfig;
use parley_gateway::AppState;
use parley_provider::{AnthropicClient, CompletionService};
use parley_realtime::ConnectionRegistry;
use parley_store::SqliteStore;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.server.port = port;
    }

    if !config.has_jwt_secret() {
        return Err("auth.jwt_secret is not set. Put it in parley.toml or PARLEY_JWT_SECRET."
            .into());
    }

    if config.provider.api_key.is_none() {
        println!("⚠️  No provider API key configured — completions will fail.");
        println!("   Set PARLEY_API_KEY or ANTHROPIC_API_KEY, or provider.api_key in parley.toml.");
    }

    let store = Arc::new(SqliteStore::new(&config.database.url).await?);

    let mut client = AnthropicClient::new(
        config.provider.api_key.clone().unwrap_or_default(),
        Duration::from_secs(config.provider.timeout_secs),
    )?;
    if let Some(base_url) = &config.provider.base_url {
        client = client.with_base_url(base_url);
    }

    let completions = CompletionService::new(
        Arc::new(client),
        config.provider.model.clone(),
        config.provider.max_tokens,
    )
    .strict(config.provider.strict);

    let registry = Arc::new(ConnectionRegistry::new());
    let pipeline = Arc::new(
        ChatPipeline::new(store.clone(), store.clone(), completions)
            .with_notifier(registry.clone()),
    );

    let state = Arc::new(AppState {
        sessions: store.clone(),
        messages: store.clone(),
        users: store,
        pipeline,
        registry,
        tokens: TokenService::new(&config.auth.jwt_secret, config.auth.token_expire_minutes),
    });

    println!("🦀 Parley");
    println!("   Listening: {}:{}", config.server.host, config.server.port);
    println!("   Database:  {}", config.database.url);
    println!("   Model:     {}", config.provider.model);

    parley_gateway::serve(
        state,
        &config.server.host,
        config.server.port,
        &config.server.cors_origins,
    )
    .await?;

    Ok(())
}
