pub mod api;
pub mod cli;
pub mod config;
pub mod database;
pub mod domain;
pub mod errors;
pub mod rating;
pub mod services;
pub mod store;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use log::{info, warn};
use std::sync::Arc;

use crate::cli::Command;
use crate::config::settings::AppConfig;
use crate::rating::{Entity, RatingType};
use crate::services::server::ServerService;
use crate::services::RatingEngine;
use crate::store::SqliteStore;

pub fn interpret() -> Command {
    let cli = Cli::parse();
    cli.command
}

fn open_engine(config: AppConfig) -> Result<RatingEngine> {
    let store = SqliteStore::open(&config.server.database_path)?;
    Ok(RatingEngine::new(Arc::new(store), config))
}

pub fn handle_serve(port: u16) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let config = AppConfig::new();
        let service = ServerService::new(port, config);
        service.run().await
    })
}

pub fn handle_init() -> Result<()> {
    let config = AppConfig::new();
    SqliteStore::open(&config.server.database_path)?;
    info!("Database ready at {}", config.server.database_path);
    Ok(())
}

pub fn handle_process(match_id: i64) -> Result<()> {
    let engine = open_engine(AppConfig::new())?;
    let report = engine
        .process_match(match_id)
        .with_context(|| format!("Failed to process match {}", match_id))?;

    info!("Wrote {} rating entries for match {}", report.entries.len(), match_id);
    for failure in &report.failures {
        warn!("{} {}: {}", failure.entity, failure.rating_type, failure.message);
    }
    Ok(())
}

pub fn handle_revert(match_id: i64) -> Result<()> {
    let engine = open_engine(AppConfig::new())?;
    let report = engine
        .revert_match(match_id)
        .with_context(|| format!("Failed to revert match {}", match_id))?;

    info!(
        "Reverted {} entries of match {} ({} failed)",
        report.reverted, match_id, report.failed
    );
    Ok(())
}

pub fn handle_recalculate(after_match_id: i64, players: &[i64], rating_type: &str) -> Result<()> {
    let rating_type: RatingType = rating_type.parse()?;
    let engine = open_engine(AppConfig::new())?;
    let entities: Vec<Entity> = players.iter().map(|p| Entity::Player(*p)).collect();

    let report = engine
        .recalculate_subsequent(&entities, rating_type, after_match_id)
        .context("Failed to recalculate matches")?;

    info!("Recalculated {} matches", report.recalculated);
    for failure in &report.failed {
        warn!("Match {} failed: {}", failure.match_id, failure.message);
    }
    Ok(())
}

pub fn handle_rebuild() -> Result<()> {
    let engine = open_engine(AppConfig::new())?;
    let report = engine.rebuild_all().context("Failed to rebuild ratings")?;

    info!(
        "Rebuilt ratings from {} matches ({} failed)",
        report.recalculated,
        report.failed.len()
    );
    Ok(())
}
