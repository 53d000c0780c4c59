use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use darkroom::config::Config;
use darkroom::coordinator::PaymentCoordinator;
use darkroom::db::{create_pool, init_db, queries, AppState};
use darkroom::handlers;
use darkroom::models::{CreateOrder, CreateUser};
use darkroom::payments::{StripeClient, StripeConfig};
use darkroom::rate_limit;

#[derive(Parser, Debug)]
#[command(name = "darkroom")]
#[command(about = "Order and payment backend for the Darkroom print studio storefront")]
struct Cli {
    /// Seed the database with dev data (a user, a session, and a pending order)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Seeds a user with an open session and a pending order, and prints the
/// credentials for copy-paste into a client. Dev mode only.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    let existing: i64 = conn
        .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .expect("Failed to count users");
    if existing > 0 {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    let user = queries::create_user(
        &conn,
        &CreateUser {
            email: "dev@darkroom.local".to_string(),
        },
    )
    .expect("Failed to create dev user");

    let token = queries::create_session(&conn, &user.id, 30 * 86400)
        .expect("Failed to create dev session");

    let order = queries::create_order(
        &conn,
        &user.id,
        &CreateOrder {
            total_amount_cents: 4500,
            line_items: Some(r#"[{"sku":"print-a3-matte","qty":1}]"#.to_string()),
        },
    )
    .expect("Failed to create dev order");

    tracing::info!("Dev data seeded");
    println!();
    println!("--- COPY FROM HERE ---");
    println!("  user_id: {}", user.id);
    println!("  session_token: {}", token);
    println!("  order_id: {}", order.id);
    println!("--- END COPY ---");
    println!();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "darkroom=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let stripe = StripeClient::new(&StripeConfig {
        secret_key: config.stripe_secret_key.clone(),
        webhook_secret: config.stripe_webhook_secret.clone(),
    });

    // The Stripe client doubles as the injected processor in production;
    // tests inject a fake through the same seam.
    let coordinator = PaymentCoordinator::new(
        db_pool.clone(),
        Arc::new(stripe.clone()),
        config.currency.clone(),
    );

    let state = AppState {
        db: db_pool,
        coordinator,
        stripe,
    };

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set DARKROOM_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    let app = Router::new()
        .merge(handlers::health_router().layer(rate_limit::relaxed_layer(
            config.rate_limit.relaxed_rpm,
        )))
        .merge(handlers::payments::router(state.clone(), config.rate_limit))
        .merge(handlers::orders::router(state.clone(), config.rate_limit))
        .merge(handlers::webhook::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("Darkroom server listening on {}", addr);

    // Connect info enables the per-IP rate limiter key extractor.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
