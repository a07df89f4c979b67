use std::path::Path;

use anyhow::{bail, Context};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod app;
mod cli;
mod config;
mod embedding;
mod matching;
mod models;
mod store;
#[cfg(test)]
mod tests;
mod web;

use app::AppContext;
use config::Config;
use matching::ProductQuery;
use models::{Product, User};

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_file(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn fetch_image(url: &str) -> anyhow::Result<Vec<u8>> {
    let response = reqwest::blocking::get(url)
        .with_context(|| format!("failed to fetch {url}"))?
        .error_for_status()?;
    Ok(response.bytes()?.to_vec())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = cli::Args::parse();

    let mut config = Config::load_with(&app::base_path()?)?;
    if let cli::Command::Serve {
        listen: Some(listen),
    } = &args.command
    {
        config.server.listen = listen.clone();
        config.validate()?;
    }

    let ctx = AppContext::from_config(&config)?;
    log::debug!(
        "embedding model {} ({} dimensions)",
        ctx.embedder().name(),
        ctx.embedder().dimensions()
    );

    match args.command {
        cli::Command::Serve { .. } => {
            ctx.prepare()?;
            web::start_daemon(ctx, config)?;
        }

        cli::Command::SeedUsers { file } => {
            ctx.ensure_collections()?;
            let Some(file) = file.or_else(|| config.seed.users_file.clone()) else {
                bail!("no seed file given and seed.users_file is not set");
            };
            let count = ctx.users.seed(&file)?;
            println!("{count} users indexed");
        }

        cli::Command::IndexUser { file } => {
            ctx.ensure_collections()?;
            let user: User = serde_json::from_slice(&read_file(&file)?)
                .with_context(|| format!("{} is not a valid user profile", file.display()))?;
            let point_id = ctx.users.index_user(&user)?;
            println!("user {} indexed as point {point_id}", user.id);
        }

        cli::Command::IndexImage { path, id, labels } => {
            ctx.ensure_collections()?;
            let is_remote = path.starts_with("http://") || path.starts_with("https://");
            let bytes = if is_remote {
                fetch_image(&path)?
            } else {
                read_file(Path::new(&path))?
            };

            let filename = cli::default_image_id(&path);
            let id = id.unwrap_or_else(|| filename.clone());
            let labels = labels.as_deref().map(cli::parse_labels).unwrap_or_default();
            let source_url = is_remote.then_some(path.as_str());

            let record = ctx
                .images
                .index_image(&id, &bytes, &filename, labels, source_url)?;
            print_json(&record)?;
        }

        cli::Command::IndexProduct {
            id,
            name,
            category,
            price,
            image,
            description,
        } => {
            ctx.ensure_collections()?;
            let image_bytes = image.as_deref().map(read_file).transpose()?;
            let product = Product {
                id,
                name,
                category,
                price,
                image_path: image.map(|path| path.display().to_string()),
                description,
            };
            let point_id = ctx
                .products
                .index_product(&product, image_bytes.as_deref())?;
            println!("product {} indexed as point {point_id}", product.id);
        }

        cli::Command::Match {
            query,
            limit,
            page_token,
        } => {
            let response = ctx
                .users
                .find_matches(&query, limit, page_token.as_deref())?;
            print_json(&response)?;
        }

        cli::Command::Similar {
            id,
            limit,
            page_token,
        } => {
            let response = ctx.images.find_similar(&id, limit, page_token.as_deref())?;
            print_json(&response)?;
        }

        cli::Command::Search {
            text,
            image,
            limit,
            page_token,
        } => {
            let query = match (text, image) {
                (Some(text), None) => ProductQuery::Text(text),
                (None, Some(image)) => ProductQuery::Image(read_file(&image)?),
                _ => bail!("exactly one of --text or --image is required"),
            };
            let response = ctx
                .products
                .search(&query, limit, page_token.as_deref())?;
            print_json(&response)?;
        }

        cli::Command::Collections {} => {
            print_json(&ctx.collections()?)?;
        }
    }

    Ok(())
}
