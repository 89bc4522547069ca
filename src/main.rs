use std::future::Future;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod config;
mod engine;
mod messages;
mod sanitize;
#[cfg(test)]
mod tests;
mod web;

use cli::Command;
use config::Config;
use engine::Engine;
use sanitize::MessageDraft;

fn init_logging() {
    // logs go to stderr so stdout stays valid json
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn block_on<F: Future>(fut: F) -> anyhow::Result<F::Output> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    Ok(rt.block_on(fut))
}

fn load_engine() -> anyhow::Result<Engine> {
    let config = Config::load()?;
    Ok(Engine::from_config(&config.classifier)?)
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let args = cli::Args::parse();

    match args.command {
        Command::Daemon {} => {
            let config = Config::load()?;
            web::start_daemon(config)?;
        }

        Command::Duplicates { source, candidates } => {
            let content = source.read()?;
            let pool = messages::load_candidates(&candidates)?;
            let engine = load_engine()?;

            let found = block_on(engine.find_duplicates(&content, &pool))??;
            print_json(&found)?;
        }

        Command::Related { source, candidates } => {
            let content = source.read()?;
            let pool = messages::load_candidates(&candidates)?;
            let engine = load_engine()?;

            let found = block_on(engine.find_related(&content, &pool))??;
            print_json(&found)?;
        }

        Command::Tags { source } => {
            let content = source.read()?;
            let engine = load_engine()?;

            let tags = block_on(engine.suggest_tags(&content))??;
            print_json(&tags)?;
        }

        Command::Render { source } => {
            print!("{}", sanitize::render(&source.read()?));
        }

        Command::Sanitize { source } => {
            let draft: MessageDraft = serde_json::from_str(&source.read()?)
                .context("input is not a JSON message draft")?;
            print_json(&sanitize::validate_and_sanitize_message(&draft)?)?;
        }

        Command::Lexical { a, b } => {
            println!("{:.2}", engine::lexical::score(&a, &b));
        }
    }

    Ok(())
}
