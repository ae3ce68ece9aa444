mod args;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use storyreel::batch::{Chapter, build_batch};
use storyreel::config::{RenderConfig, ServerConfig};
use storyreel::pipeline::{RenderRequest, Renderer};
use storyreel::server::{self, AppState};

use crate::args::{Args, BatchArgs, Command, RenderArgs, ServeArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let mut config = RenderConfig::from_env();
    if let Some(provider) = args.image_provider {
        config.image_provider = provider;
    }
    if let Some(dir) = args.assets_dir {
        config.assets_dir = dir;
    }
    info!(
        "Image provider: {}, assets: {}",
        config.image_provider,
        config.assets_dir.display()
    );
    let renderer = Renderer::new(config).context("failed to set up renderer")?;

    match args.command.unwrap_or(Command::Serve(ServeArgs::default())) {
        Command::Serve(serve) => run_server(renderer, serve).await,
        Command::Render(render) => run_render(&renderer, render).await,
        Command::Batch(batch) => run_batch(&renderer, batch).await,
    }
}

async fn run_server(renderer: Renderer, args: ServeArgs) -> anyhow::Result<()> {
    let mut config = ServerConfig::from_env();
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    server::serve(AppState::new(renderer, config))
        .await
        .context("server error")
}

async fn run_render(renderer: &Renderer, args: RenderArgs) -> anyhow::Result<()> {
    let story = match (args.story, args.file) {
        (Some(story), _) => story,
        (None, Some(path)) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read story from {}", path.display()))?,
        (None, None) => anyhow::bail!("either --story or --file is required"),
    };

    let request = RenderRequest {
        story,
        deity: args.deity,
        voice_lang: args
            .voice_lang
            .unwrap_or_else(|| renderer.config().voice_lang.clone()),
        target_duration: args.duration,
        image_prompt: args.image_prompt,
    };
    let result = renderer.render(&request, &args.out).await;
    if !result.ok {
        let reason = result.error.unwrap_or_default();
        error!("Render failed: {}", reason);
        anyhow::bail!("render failed: {}", reason);
    }
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn run_batch(renderer: &Renderer, args: BatchArgs) -> anyhow::Result<()> {
    let data = tokio::fs::read_to_string(&args.chapters)
        .await
        .with_context(|| format!("failed to read {}", args.chapters.display()))?;
    let chapters: Vec<Chapter> =
        serde_json::from_str(&data).context("chapters must be a JSON list")?;
    let voice_lang = args
        .voice_lang
        .unwrap_or_else(|| renderer.config().voice_lang.clone());

    let result = build_batch(renderer, &chapters, &args.deity, &voice_lang, &args.out_dir).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    let failed = result.episodes.iter().filter(|e| !e.ok).count();
    if failed > 0 {
        anyhow::bail!("{} of {} chapters failed", failed, result.episodes.len());
    }
    Ok(())
}
