use anyhow::Result;
use log::LevelFilter;
use mdcore::{MarkdownRenderer, SanitizeSchema};
use mdrender::config::OutputMode;
use clap::Parser;
use mdrender::{Config, Invocation};
use std::path::Path;
use tokio::io::AsyncReadExt;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger with debug fallback for development
    let mut logger = env_logger::Builder::from_default_env();
    if std::env::var_os("RUST_LOG").is_none() {
        logger.filter_level(LevelFilter::Info);
        logger.filter_module("mdrender", LevelFilter::Debug);
        logger.filter_module("mdcore", LevelFilter::Debug);
    }
    logger.init();

    let invocation = Invocation::parse();

    let config = match Config::load().await {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Failed to load config, using defaults: {}", e);
            Config::default()
        }
    };

    if invocation.print_schema {
        let schema = SanitizeSchema::for_flag(config.extended_html);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let source = match read_source(invocation.input_path()).await {
        Ok(source) => source,
        Err(e) => {
            log::error!("Failed to read markdown input: {}", e);
            eprintln!("入力の読み込みに失敗しました: {}", e);
            std::process::exit(1);
        }
    };

    let renderer = MarkdownRenderer::new(config.render_options());
    let rendered = renderer.render(&source);

    match invocation.output().unwrap_or(config.output) {
        OutputMode::Fragment => println!("{}", rendered.html),
        OutputMode::Document => print!("{}", rendered.to_document()),
    }

    log::debug!("Rendered {} bytes of markdown", source.len());
    Ok(())
}

async fn read_source(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => {
            let content = tokio::fs::read_to_string(path).await.map_err(|e| {
                anyhow::anyhow!("ファイル読み込みエラー: {} - {}", path.display(), e)
            })?;
            log::info!("Read markdown from: {}", path.display());
            Ok(content)
        }
        None => {
            let mut content = String::new();
            tokio::io::stdin().read_to_string(&mut content).await?;
            log::info!("Read markdown from stdin");
            Ok(content)
        }
    }
}
