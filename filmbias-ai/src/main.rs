//! filmbias-ai - Film gender-bias analyzer
//!
//! **Usage:**
//! ```bash
//! filmbias-ai analyze --manifest films.toml [--film <id>]... [--posters-dir <dir>] [--output <dir>] [--offline]
//! filmbias-ai taxonomy
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use filmbias_ai::extractors::{
    GeminiClient, HeuristicSynopsisParser, PosterAnalyzer, RemediationGenerator, SynopsisParser,
};
use filmbias_ai::input::{attach_posters, load_manifest, scan_posters, select_films};
use filmbias_ai::report::ReportWriter;
use filmbias_ai::workflow::{AnalysisEvent, AnalysisPipeline, PipelineConfig, Providers};
use filmbias_common::config::{load_config, resolve_gemini_api_key, TomlConfig};
use filmbias_common::Taxonomy;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter};

const DEFAULT_OUTPUT_DIR: &str = "reports";

#[derive(Parser, Debug)]
#[clap(name = "filmbias-ai", version)]
#[clap(about = "Detect and score gender stereotypes in film synopses and posters")]
struct Cli {
    /// Config file (overrides FILMBIAS_CONFIG)
    #[clap(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze the films of a manifest and write reports
    Analyze {
        /// Film manifest (TOML or JSON)
        #[clap(long, value_name = "FILE")]
        manifest: PathBuf,

        /// Only analyze these film ids (repeatable)
        #[clap(long = "film", value_name = "ID")]
        films: Vec<String>,

        /// Directory of `<title>_img_<n>` poster images to attach to films
        #[clap(long, value_name = "DIR")]
        posters_dir: Option<PathBuf>,

        /// Report directory (default: config `output_dir`, then ./reports)
        #[clap(long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Skip remote providers: heuristic synopsis parsing only
        #[clap(long)]
        offline: bool,
    },

    /// Print the effective stereotype taxonomy as TOML
    Taxonomy,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise start at info until the config is loaded
    let env_filter = EnvFilter::try_from_default_env().ok();
    let filter_from_env = env_filter.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;

    if !filter_from_env {
        match EnvFilter::try_new(&config.logging.level) {
            Ok(level) => filter_handle
                .reload(level)
                .context("Failed to apply configured log level")?,
            Err(e) => warn!(
                level = %config.logging.level,
                error = %e,
                "Invalid [logging] level; keeping info"
            ),
        }
    }

    debug!(version = env!("CARGO_PKG_VERSION"), "filmbias-ai starting");

    match cli.command {
        Command::Taxonomy => {
            let taxonomy = load_taxonomy(&config)?;
            print!("{}", taxonomy.to_toml_string()?);
            Ok(())
        }
        Command::Analyze {
            manifest,
            films,
            posters_dir,
            output,
            offline,
        } => {
            analyze(
                &config,
                &manifest,
                &films,
                posters_dir.as_deref(),
                output,
                offline,
            )
            .await
        }
    }
}

async fn analyze(
    config: &TomlConfig,
    manifest: &Path,
    film_ids: &[String],
    posters_dir: Option<&Path>,
    output: Option<PathBuf>,
    offline: bool,
) -> Result<()> {
    let all_films = load_manifest(manifest)
        .with_context(|| format!("Failed to load manifest {}", manifest.display()))?;
    let mut films = select_films(all_films, film_ids)?;

    if let Some(dir) = posters_dir {
        let posters = scan_posters(dir)
            .with_context(|| format!("Failed to scan posters in {}", dir.display()))?;
        let found = posters.len();
        let unmatched = attach_posters(&mut films, posters);
        info!(posters = found, unmatched, "Poster directory scanned");
        if unmatched > 0 {
            warn!(unmatched, "Some poster files match no selected film");
        }
    }

    let taxonomy = Arc::new(load_taxonomy(config)?);
    let providers = build_providers(config, offline)?;

    let (event_tx, mut event_rx) = mpsc::channel::<AnalysisEvent>(64);
    let event_logger = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            log_event(&event);
        }
    });

    let pipeline = AnalysisPipeline::new(
        PipelineConfig {
            max_concurrent_films: config.max_concurrent_films,
        },
        providers,
        taxonomy,
    )
    .with_events(event_tx);

    let outcome = pipeline.run(films).await;

    // Closing the channel ends the logger task
    drop(pipeline);
    if let Err(e) = event_logger.await {
        warn!(error = %e, "Event logger task ended abnormally");
    }

    let output_dir = output
        .or_else(|| config.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
    let writer = ReportWriter::new(&output_dir);
    let summary = writer
        .write_run(&outcome)
        .with_context(|| format!("Failed to write reports to {}", output_dir.display()))?;

    println!(
        "Analyzed {} film(s), {} decade rollup(s); reports in {} (run {})",
        outcome.films.len(),
        outcome.decades.len(),
        writer.output_dir().display(),
        summary.run_id
    );
    if !outcome.failures.is_empty() {
        println!("Failed films:");
        for failure in &outcome.failures {
            println!("  - {} ({}): {}", failure.film_id, failure.title, failure.reason);
        }
    }

    Ok(())
}

fn load_taxonomy(config: &TomlConfig) -> Result<Taxonomy> {
    match &config.taxonomy_path {
        Some(path) => {
            let taxonomy = Taxonomy::load(path)
                .with_context(|| format!("Failed to load taxonomy {}", path.display()))?;
            info!(path = %path.display(), entries = taxonomy.len(), "Taxonomy loaded");
            Ok(taxonomy)
        }
        None => Ok(Taxonomy::builtin()),
    }
}

fn build_providers(config: &TomlConfig, offline: bool) -> Result<Providers> {
    let api_key = if offline {
        None
    } else {
        let key = resolve_gemini_api_key(config);
        if key.is_none() {
            warn!("No Gemini API key configured; running offline (heuristic synopsis parsing only)");
        }
        key
    };

    let Some(api_key) = api_key else {
        info!("Offline mode: posters are not analyzed and no remediation is generated");
        return Ok(Providers {
            poster: None,
            synopsis: Some(Arc::new(HeuristicSynopsisParser::new()) as Arc<dyn SynopsisParser>),
            remediation: None,
        });
    };

    let client = Arc::new(
        GeminiClient::new(api_key, &config.gemini).context("Failed to create Gemini client")?,
    );
    info!(model = client.model(), "Using Gemini provider");

    Ok(Providers {
        poster: Some(client.clone() as Arc<dyn PosterAnalyzer>),
        synopsis: Some(client.clone() as Arc<dyn SynopsisParser>),
        remediation: Some(client as Arc<dyn RemediationGenerator>),
    })
}

fn log_event(event: &AnalysisEvent) {
    match event {
        AnalysisEvent::FilmStarted { film_id, .. } => {
            info!(film_id = %film_id, "Film started");
        }
        AnalysisEvent::SourceCompleted {
            film_id,
            source,
            provider,
            characters,
        } => {
            debug!(film_id = %film_id, source = %source, provider = %provider, characters, "Source processed");
        }
        AnalysisEvent::SourceFailed {
            film_id,
            source,
            provider,
            message,
        } => {
            warn!(film_id = %film_id, source = %source, provider = %provider, "Source skipped: {}", message);
        }
        AnalysisEvent::FilmCompleted {
            film_id,
            characters,
            total_severity,
            ..
        } => {
            info!(film_id = %film_id, characters, total_severity, "Film completed");
        }
        AnalysisEvent::FilmFailed { film_id, reason } => {
            warn!(film_id = %film_id, "Film failed: {}", reason);
        }
        AnalysisEvent::RunCompleted {
            films_analyzed,
            films_failed,
        } => {
            info!(films_analyzed, films_failed, "Run completed");
        }
    }
}
