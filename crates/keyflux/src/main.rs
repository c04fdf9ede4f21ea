mod cli;
mod render;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use keyflux_core::{BrowserConfig, ConfigStore, KeyBrowser, KeyValueApi, RefreshPolicy, ViewMode};
use keyflux_driver_redis::RedisKeyStore;
use log::info;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let cli = match cli::parse(&args) {
        Ok(Some(cli)) => cli,
        Ok(None) => {
            println!("{}", cli::USAGE);
            return;
        }
        Err(e) => {
            eprintln!("Error: {:#}\n\n{}", e, cli::USAGE);
            std::process::exit(2);
        }
    };

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn load_config(cli: &cli::CliArgs) -> BrowserConfig {
    let mut config = match ConfigStore::new().and_then(|store| store.load()) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Using default config: {}", e);
            BrowserConfig::default()
        }
    };

    if let Some(delimiter) = &cli.delimiter {
        config.delimiter = delimiter.clone();
    }
    if let Some(secs) = cli.watch_secs {
        config.refresh_policy = RefreshPolicy::from_secs(secs);
    }

    config.normalized()
}

fn run(cli: cli::CliArgs) -> anyhow::Result<()> {
    let config = load_config(&cli);
    let store = connect(&cli)?;

    let mut browser = KeyBrowser::new(config);
    browser.set_on_load_error(|e| eprintln!("Error loading keys: {}", e));
    browser.set_client(Some(Arc::new(store)));

    browser.set_type_filter(cli.type_filter);
    if let Some(scope) = &cli.scope {
        browser.set_scope(scope.clone());
    }
    if let Some(filter) = &cli.filter {
        browser.set_search_pattern(filter.clone());
        browser.flush_search();
    }
    if cli.tree {
        browser.toggle_view_mode();
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .enable_io()
        .build()
        .context("starting runtime")?;

    runtime.block_on(control_loop(&mut browser, cli.watch_secs.is_some()))
}

fn connect(cli: &cli::CliArgs) -> anyhow::Result<RedisKeyStore> {
    let store = match &cli.target {
        cli::Target::Uri(uri) => {
            let store = RedisKeyStore::connect_uri(uri).context("connecting to Redis")?;
            if let Some(database) = cli.database {
                store
                    .select_database(database)
                    .with_context(|| format!("selecting database {}", database))?;
            }
            store
        }
        cli::Target::Params(params) => {
            RedisKeyStore::connect(params).context("connecting to Redis")?
        }
    };

    info!("Browsing database {}", store.database().unwrap_or(0));
    Ok(store)
}

/// Drives the browser until the first load finishes, or until Ctrl-C when
/// watching.
async fn control_loop(browser: &mut KeyBrowser, watch: bool) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let mut printed_generation = None;

    browser.load_keys();

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                return Ok(());
            }
        }

        browser.process_completions();
        browser.tick(Instant::now());

        if browser.is_loading() {
            continue;
        }

        if !watch && browser.load_failed() {
            anyhow::bail!("failed to load keys");
        }

        let generation = browser.snapshot().generation();
        if printed_generation != Some(generation) {
            print_browser(browser);
            printed_generation = Some(generation);
        }

        if !watch {
            return Ok(());
        }
    }
}

fn print_browser(browser: &KeyBrowser) {
    let body = match (browser.view_mode(), browser.tree()) {
        (ViewMode::Tree, Some(tree)) => render::render_tree(tree),
        _ => render::render_list(browser.filtered_view()),
    };

    print!("{}", body);

    let scope = browser.scope().map(|s| format!(" in {}", s)).unwrap_or_default();
    println!("-- {}{} --", browser.status_line(), scope);
}
