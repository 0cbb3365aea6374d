use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wili_api::{
    services::{
        providers::{DisabledLanguageModel, GeminiClient, HttpTextEncoder, LanguageModel},
        ExplanationGenerator, ExplanationSettings, RecommendationService, RecommendationSettings,
        SynopsisTable,
    },
    store::QdrantStore,
    create_router, AppState, Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("wili_api=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let store = QdrantStore::new(
        config.qdrant_url.clone(),
        config.qdrant_api_key.clone(),
        config.movies_collection.clone(),
        config.users_collection.clone(),
        config.scroll_page_size,
    );
    store
        .ensure_users_collection(config.embedding_dim)
        .await
        .context("failed to prepare users collection")?;

    let encoder = HttpTextEncoder::new(config.embedding_url.clone(), config.embedding_dim);

    let mut explanation_settings = ExplanationSettings::from(&config);
    let model: Arc<dyn LanguageModel> = if config.gemini_api_key.is_empty() {
        tracing::warn!("GEMINI_API_KEY not set, explanations will use fallback text");
        explanation_settings.max_retries = 0;
        Arc::new(DisabledLanguageModel)
    } else {
        Arc::new(GeminiClient::new(
            config.gemini_api_key.clone(),
            config.gemini_api_url.clone(),
            config.gemini_model.clone(),
        ))
    };

    let synopses = SynopsisTable::load(&config.movies_json_path)?;

    let explainer = ExplanationGenerator::new(model, Arc::new(synopses), explanation_settings);
    let recommender = RecommendationService::new(
        Arc::new(store),
        Arc::new(encoder),
        explainer,
        RecommendationSettings::from(&config),
    );

    let app = create_router(AppState::new(recommender));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(address = %addr, "Server running");
    axum::serve(listener, app).await?;

    Ok(())
}
