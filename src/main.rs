use anyhow::Context;
use clap::Parser;
use serde_json::json;
use tracing_subscriber::EnvFilter;

mod app;
mod catalog;
mod cli;
mod config;
mod retrieval;
mod web;

use app::AppFactory;
use retrieval::Query;

fn main() -> anyhow::Result<()> {
    // stdout carries results, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();

    match args.command {
        #[cfg(feature = "markdown-docs")]
        cli::Command::MarkdownDocs {} => {
            clap_markdown::print_help_markdown::<cli::Args>();
            Ok(())
        }

        cli::Command::Daemon { addr } => {
            let (config, service) =
                AppFactory::create_service().context("style guru is unavailable")?;
            web::start_daemon(service, config.retrieval, &addr)
        }

        cli::Command::Search {
            text,
            k,
            gender,
            scores,
        } => {
            let (config, service) =
                AppFactory::create_service().context("style guru is unavailable")?;

            let query = Query::new(text, config.retrieval.clamp_k(k), gender);
            let results = service.search(&query).context("search failed, try again")?;

            if results.is_empty() {
                log::info!("no products matched");
            }

            let output = if scores {
                serde_json::to_string_pretty(&results)?
            } else {
                let products: Vec<_> = results.iter().map(|row| &row.product).collect();
                serde_json::to_string_pretty(&products)?
            };
            println!("{output}");
            Ok(())
        }

        cli::Command::Info {} => {
            let (config, service) =
                AppFactory::create_service().context("style guru is unavailable")?;

            let info = json!({
                "base_path": config.base_path(),
                "model": service.model_name(),
                "model_loaded": service.is_model_loaded(),
                "dimensions": service.dimensions(),
                "indexed": service.indexed_count(),
                "products": service.product_count(),
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(())
        }
    }
}
