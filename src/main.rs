use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use dotenvy::dotenv;
use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use teloxide::utils::command::BotCommands;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use url::Url;

mod config;
mod handlers;
mod llm;
mod pipeline;
mod state;
mod storage;
mod utils;
mod vision;

use config::{ArtifactStoreKind, Config, CONFIG};
use handlers::{chat, web};
use llm::AzureOpenAiModel;
use pipeline::PipelineOrchestrator;
use state::AppState;
use storage::build_artifact_store;
use utils::logging::init_logging;
use vision::AzureVisionAnalyzer;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
enum Command {
    Start,
    Help,
}

type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;

fn build_state(config: &Config) -> AppState {
    if config.azure_vision_endpoint.trim().is_empty() {
        warn!("AZURE_VISION_ENDPOINT is not set; every analysis will fail");
    }
    if config.azure_openai_deployment.trim().is_empty() {
        warn!("AZURE_OPENAI_DEPLOYMENT is not set; critiques will fall back");
    }

    let vision = Arc::new(AzureVisionAnalyzer::new(
        &config.azure_vision_endpoint,
        &config.azure_vision_key,
        &config.azure_vision_api_version,
    ));
    let model = Arc::new(AzureOpenAiModel::new(
        &config.azure_openai_endpoint,
        &config.azure_openai_api_key,
        &config.azure_openai_api_version,
        &config.azure_openai_deployment,
    ));
    let store = build_artifact_store(config);
    let orchestrator =
        PipelineOrchestrator::new(vision, model, store, config.pipeline_settings());
    AppState::new(
        orchestrator,
        config.max_upload_bytes,
        Duration::from_secs(config.artifact_retention_secs),
    )
}

fn build_http_router(state: AppState, config: &Config) -> Router {
    let files_dir = match config.artifact_store {
        ArtifactStoreKind::Local => Some(config.static_dir.clone()),
        ArtifactStoreKind::Blob => None,
    };
    web::build_router(state, files_dir)
}

fn schema() -> UpdateHandler<Box<dyn Error + Send + Sync + 'static>> {
    let command_handler = dptree::entry()
        .filter_command::<Command>()
        .endpoint(handle_command);

    let message_handler = Update::filter_message()
        .branch(command_handler)
        .branch(
            dptree::filter(|msg: Message| chat::photo_file(&msg).is_some())
                .endpoint(handle_photo),
        )
        .branch(dptree::filter(|msg: Message| msg.text().is_some()).endpoint(handle_text))
        .endpoint(ignore_message);

    dptree::entry().branch(message_handler)
}

#[tokio::main]
async fn main() -> HandlerResult {
    dotenv().ok();
    let _guards = init_logging();

    let state = build_state(&CONFIG);
    let router = build_http_router(state.clone(), &CONFIG);
    let listener = TcpListener::bind(CONFIG.bind_addr).await?;
    info!("HTTP server listening on {}", CONFIG.bind_addr);

    if CONFIG.bot_token.trim().is_empty() {
        warn!("BOT_TOKEN is not set; running the web upload surface only");
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for shutdown signal: {err}");
                }
            })
            .await?;
        return Ok(());
    }

    let bot = Bot::new(CONFIG.bot_token.clone());
    info!("Starting photo critique bot");

    let mut dispatcher = Dispatcher::builder(bot.clone(), schema())
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build();

    if CONFIG.webhook_enabled() {
        let webhook_url = Url::parse(&format!(
            "{}{}",
            CONFIG.webhook_url.trim_end_matches('/'),
            CONFIG.webhook_path
        ))?;
        info!("Receiving updates via webhook at {}", webhook_url);
        let mut options = webhooks::Options::new(CONFIG.bind_addr, webhook_url)
            .path(CONFIG.webhook_path.clone());
        if !CONFIG.webhook_secret.trim().is_empty() {
            options = options.secret_token(CONFIG.webhook_secret.clone());
        }
        let (update_listener, stop_flag, webhook_router) =
            webhooks::axum_to_router(bot, options).await?;

        let app = router.merge(webhook_router);
        let server = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(stop_flag)
                .await
            {
                error!("HTTP server stopped with error: {err}");
            }
        });

        dispatcher
            .dispatch_with_listener(
                update_listener,
                LoggingErrorHandler::with_custom_text("An error from the update listener"),
            )
            .await;
        if let Err(err) = server.await {
            error!("HTTP server task failed: {err}");
        }
    } else {
        info!("Receiving updates via long polling");
        let server = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router).await {
                error!("HTTP server stopped with error: {err}");
            }
        });
        dispatcher.dispatch().await;
        server.abort();
    }

    Ok(())
}

async fn handle_command(bot: Bot, message: Message, command: Command) -> HandlerResult {
    match command {
        Command::Start | Command::Help => chat::send_photo_prompt(bot, message).await?,
    }
    Ok(())
}

async fn handle_photo(bot: Bot, state: AppState, message: Message) -> HandlerResult {
    tokio::spawn(async move {
        if let Err(err) = chat::photo_handler(bot, state, message).await {
            error!("photo handler failed: {err}");
        }
    });
    Ok(())
}

async fn handle_text(bot: Bot, message: Message) -> HandlerResult {
    chat::send_photo_prompt(bot, message).await?;
    Ok(())
}

async fn ignore_message(_message: Message) -> HandlerResult {
    Ok(())
}
