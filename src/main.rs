use std::path::Path;

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use tracing_subscriber::EnvFilter;

use coursebookd::api::{self, AppState};
use coursebookd::config::Config;
use coursebookd::db;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load().context("load configuration")?;
    let conn = db::open_db(Path::new(&config.data_dir)).context("open database")?;
    let state = web::Data::new(AppState::new(conn, config.ai.clone()));

    tracing::info!(addr = %config.bind_addr, "starting coursebookd");
    HttpServer::new(move || App::new().app_data(state.clone()).configure(api::configure))
        .bind(&config.bind_addr)
        .with_context(|| format!("bind {}", config.bind_addr))?
        .run()
        .await?;

    Ok(())
}
