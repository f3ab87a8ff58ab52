use crate::config::AppConfig;
use crate::db::{init_db, Database};
use crate::feed::FeedFetcher;
use crate::notify::{LogTransport, Notifier, TelegramTransport, Transport};
use crate::reconcile::Reconciler;
use crate::responses::error_to_response;
use crate::router::handle;
use crate::scheduler::Scheduler;
use astra::Server;
use tracing::{error, info, warn};

mod config;
mod db;
mod domain;
mod errors;
mod feed;
mod notify;
mod reconcile;
mod responses;
mod router;
mod scheduler;

#[cfg(test)]
mod tests;

fn main() {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = match AppConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    // 1️⃣ Database handle + schema
    let db = Database::new(cfg.database_path.clone());
    if let Err(e) = init_db(&db) {
        error!(error = %e, "database initialization failed");
        std::process::exit(1);
    }

    // 2️⃣ Reconcile loop on its own thread
    let fetcher = match FeedFetcher::new(&cfg.feed_url, cfg.fetch_timeout, cfg.feed_offset) {
        Ok(f) => f,
        Err(e) => {
            error!(error = %e, "could not build feed client");
            std::process::exit(1);
        }
    };

    let transport: Box<dyn Transport> = match cfg.telegram_bot_token.clone() {
        Some(token) => match TelegramTransport::new(token, cfg.delivery_timeout) {
            Ok(t) => Box::new(t),
            Err(e) => {
                error!(error = %e, "could not build bot client");
                std::process::exit(1);
            }
        },
        None => {
            warn!("TELEGRAM_BOT_TOKEN not set, notifications will only be logged");
            Box::new(LogTransport)
        }
    };

    let scheduler = Scheduler::new(
        Box::new(fetcher),
        Reconciler::new(db.clone(), cfg.vanish_policy),
        Notifier::new(Box::new(db.clone()), transport, cfg.delivery_workers),
        db.clone(),
        cfg.check_interval,
        cfg.feed_offset,
    );

    let (worker, shutdown) = match scheduler.spawn() {
        Ok(pair) => pair,
        Err(e) => {
            error!(error = %e, "could not start scheduler thread");
            std::process::exit(1);
        }
    };

    // 3️⃣ Read-only query surface
    info!(addr = %cfg.bind_addr, feed = %cfg.feed_url, "starting server");
    let server = Server::bind(&cfg.bind_addr).max_workers(8);
    let result = server.serve(move |req, _info| match handle(req, &db) {
        Ok(resp) => resp,
        Err(err) => error_to_response(err),
    });

    if let Err(e) = result {
        error!(error = %e, "server ended with error");
    }

    shutdown.shutdown();
    if worker.join().is_err() {
        error!("scheduler thread panicked");
    }
    info!("shut down cleanly");
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
