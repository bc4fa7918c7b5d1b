//! Binary entrypoint: resolve the image list, then run the engine behind the
//! console viewer.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use clap::{ArgAction, Parser};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use slideshow::bad_images::BadImageLog;
use slideshow::config::Configuration;
use slideshow::events::{InputEvent, ViewEvent};
use slideshow::settings::SettingsStore;
use slideshow::source::{ImageSource, Source};
use slideshow::tasks::controller::NavigationController;
use slideshow::tasks::preload::PreloadCache;
use slideshow::tasks::viewer;
use slideshow_protocol::ensure_ext;

#[derive(Debug, Parser)]
#[command(name = "slideshow", version, about = "Timed image slideshow with background preloading")]
struct Args {
    /// Newline-delimited image list; `.lst` is appended when no extension is given
    #[arg(value_name = "PHOTOS_FILE", default_value = "photos.lst")]
    photos_file: String,
    /// Slideshow server base URL; images are read locally when omitted
    #[arg(long, value_name = "URL")]
    server: Option<String>,
    /// Path to YAML engine config
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Settings file, overriding `settings-path` from the config
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "info",
        1 => "slideshow=debug,info",
        _ => "slideshow=trace,debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .compact()
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let result = runtime.block_on(run(args));
    // A pending stdin read never completes on its own; do not wait for it.
    runtime.shutdown_background();
    result
}

async fn run(args: Args) -> Result<()> {
    let mut cfg = match &args.config {
        Some(path) => Configuration::from_yaml_file(path)?
            .validated()
            .context("invalid configuration values")?,
        None => Configuration::default(),
    };
    if let Some(path) = args.settings {
        cfg.settings_path = path;
    }
    tracing::debug!(?cfg, "configuration");

    let photos_file = ensure_ext(&args.photos_file)
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("photos file name is empty"))?;
    let source = Source::select(&photos_file, args.server.as_deref(), cfg.request_timeout)
        .context("failed to set up image source")?;
    tracing::info!(source = %source.describe(), "resolving image list");
    let mut list = source
        .resolve()
        .await
        .with_context(|| format!("cannot start slideshow from {}", photos_file.display()))?;
    if cfg.shuffle {
        let mut rng = match cfg.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        list = list.shuffled(&mut rng);
        tracing::info!(seed = ?cfg.shuffle_seed, "shuffled image list");
    }

    let settings = SettingsStore::load(&cfg.settings_path);
    let bad_images = BadImageLog::new(&cfg.bad_image_log_dir, Local::now());
    let cache = PreloadCache::new(Arc::new(source), list, cfg.max_concurrent_fetches);

    let (input_tx, input_rx) = mpsc::channel::<InputEvent>(16); // Console -> Controller
    let (view_tx, view_rx) = mpsc::channel::<ViewEvent>(64); // Controller -> Console
    let controller = NavigationController::new(cache, settings, bad_images, &cfg, view_tx);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    tracing::info!("{}", viewer::HELP);
    let mut tasks = JoinSet::new();

    // Console input
    tasks.spawn({
        let cancel = cancel.clone();
        async move {
            viewer::read_commands(BufReader::new(tokio::io::stdin()), input_tx, cancel)
                .await
                .context("console input failed")
        }
    });

    // Console output
    tasks.spawn(async move { viewer::run(view_rx).await.context("console viewer failed") });

    // Controller; its exit ends the session
    let session = controller.run(input_rx, cancel.clone()).await;
    cancel.cancel();

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }
    session
}
