pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod notify;
pub mod routes;

use std::sync::Arc;

use config::Config;
use db::kv::KeyValueStore;
use db::pool::DbPool;
use gateway::broadcast::Broadcaster;
use gateway::registry::ConnectionRegistry;
use notify::directory::DbGroupDirectory;
use notify::fanout::NotificationFanout;
use notify::mailer::Mailer;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub kv: Arc<dyn KeyValueStore>,
    pub config: Arc<Config>,
    pub broadcaster: Broadcaster,
    pub mailer: Arc<dyn Mailer>,
    pub notifier: Arc<NotificationFanout>,
}

impl AppState {
    /// Wire the live-update and notification services around a pool and store.
    pub fn new(
        db: DbPool,
        kv: Arc<dyn KeyValueStore>,
        config: Config,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let notifier = NotificationFanout::new(
            Arc::new(DbGroupDirectory::new(db.clone())),
            mailer.clone(),
            config.notify_send_delay,
        );

        Self {
            db,
            kv,
            config: Arc::new(config),
            broadcaster: Broadcaster::new(Arc::new(ConnectionRegistry::new())),
            mailer,
            notifier: Arc::new(notifier),
        }
    }
}
