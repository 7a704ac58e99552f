use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use agw_domain::config::{Config, ConfigSeverity};
use agw_gateway::api;
use agw_gateway::bootstrap::{build_app_state, spawn_background_tasks};
use agw_gateway::cli::{self, Cli, Command, ConfigAction};
use agw_gateway::rpc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, config_path) = cli::load_config(cli.config.as_ref())?;
            tracing::info!(config = %config_path.display(), "authgate starting");
            run_server(Arc::new(config)).await
        }
        Some(Command::Config(config_cmd)) => {
            let (config, config_path) = cli::load_config(cli.config.as_ref())?;
            match config_cmd.action {
                ConfigAction::Validate => {
                    if !cli::validate(&config, &config_path) {
                        std::process::exit(1);
                    }
                }
                ConfigAction::Show => cli::show(&config),
            }
            Ok(())
        }
        Some(Command::Version) => {
            println!("authgate {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize structured JSON tracing (only for the `serve` command).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,agw_gateway=debug")),
        )
        .json()
        .init();
}

/// Start both transports with the given configuration.
async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    let shutdown = Arc::new(tokio::sync::Notify::new());
    let state = build_app_state(config.clone(), shutdown.clone()).await?;
    let background = spawn_background_tasks(&state);

    // ── CORS layer (config-aware) ────────────────────────────────────
    let cors_layer = build_cors_layer(&config.server.cors);

    // ── Per-IP transport throttle (in front of the domain limiter) ───
    let governor_layer = config.server.rate_limit.map(|rl| {
        use tower_governor::governor::GovernorConfigBuilder;
        use tower_governor::GovernorLayer;

        let gov_config = GovernorConfigBuilder::default()
            .per_second(rl.requests_per_second)
            .burst_size(rl.burst_size)
            .finish()
            .expect("rate_limit: requests_per_second and burst_size must be > 0");

        tracing::info!(
            requests_per_second = rl.requests_per_second,
            burst_size = rl.burst_size,
            "per-IP transport throttle enabled"
        );
        GovernorLayer {
            config: Arc::new(gov_config),
        }
    });

    // ── Router ───────────────────────────────────────────────────────
    let router = api::router(state.clone())
        .layer(cors_layer)
        .layer(tower::limit::ConcurrencyLimitLayer::new(
            config.server.max_concurrent_requests,
        ));
    let app = if let Some(gov) = governor_layer {
        router.layer(gov).with_state(state.clone())
    } else {
        router.with_state(state.clone())
    };

    // ── Bind both transports ─────────────────────────────────────────
    let http_addr = format!("{}:{}", config.server.host, config.server.port);
    let http_listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("binding HTTP to {http_addr}"))?;

    let rpc_addr = format!("{}:{}", config.server.host, config.server.rpc_port);
    let rpc_listener = tokio::net::TcpListener::bind(&rpc_addr)
        .await
        .with_context(|| format!("binding RPC to {rpc_addr}"))?;

    tracing::info!(http = %http_addr, rpc = %rpc_addr, "authgate listening");

    let rpc_task = tokio::spawn(rpc::serve(
        state.clone(),
        rpc_listener,
        shutdown.clone(),
    ));

    // ── Serve until SIGINT, then drain ───────────────────────────────
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received, draining");
                shutdown.notify_waiters();
            }
        });
    }

    let graceful_shutdown = shutdown.clone();
    axum::serve(
        http_listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(async move { graceful_shutdown.notified().await })
    .await
    .context("http server error")?;

    let grace = std::time::Duration::from_secs(config.server.shutdown_grace_secs);

    // Give in-flight calls and the audit flush up to the grace window.
    let _ = tokio::time::timeout(grace, async {
        let _ = rpc_task.await;
        for handle in background {
            let _ = handle.await;
        }
    })
    .await;

    tracing::info!("authgate stopped");
    Ok(())
}

/// Build a [`CorsLayer`] from the configured allowed origins.
///
/// Origins may carry a trailing `*` wildcard for the port segment
/// (e.g. `http://localhost:*`). A literal `"*"` allows all origins
/// (not recommended for production).
fn build_cors_layer(cors: &agw_domain::config::CorsConfig) -> CorsLayer {
    use axum::http::header;

    // allow_credentials is incompatible with wildcard origins.
    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    }

    // Partition into exact origins and wildcard-port patterns.
    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();

    for origin in &cors.allowed_origins {
        if origin.ends_with(":*") {
            wildcard_prefixes.push(origin.trim_end_matches('*').to_owned());
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            // Validate the remainder is digits only to prevent
            // prefix-based bypass (e.g. "http://localhost:3000.evil.com").
            wildcard_prefixes.iter().any(|prefix| {
                origin_str
                    .strip_prefix(prefix.as_str())
                    .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
