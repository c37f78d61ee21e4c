use std::sync::Arc;

use cowrite_db::DbPool;
use cowrite_events::EventBus;

use crate::collab::{
    ChangeCoordinator, CommentService, LockRegistry, PresenceTracker, SessionManager,
};
use crate::config::ServerConfig;
use crate::ws::ConnectionHub;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already
/// `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// WebSocket connection hub.
    pub hub: Arc<ConnectionHub>,
    /// Centralized event bus the services publish through.
    pub bus: Arc<EventBus>,
    /// Presence tracking service.
    pub presence: PresenceTracker,
    /// Session lifecycle service.
    pub sessions: SessionManager,
    /// Lock registry service.
    pub locks: LockRegistry,
    /// Change coordinator.
    pub coordinator: ChangeCoordinator,
    /// Comment threads service.
    pub comments: CommentService,
}

impl AppState {
    /// Wire up the state graph: one hub, one bus, services sharing both.
    pub fn new(pool: DbPool, config: Arc<ServerConfig>) -> Self {
        let hub = Arc::new(ConnectionHub::new());
        let bus = Arc::new(EventBus::default());

        Self {
            presence: PresenceTracker::new(pool.clone(), Arc::clone(&bus)),
            sessions: SessionManager::new(pool.clone(), Arc::clone(&bus)),
            locks: LockRegistry::new(pool.clone(), Arc::clone(&bus), Arc::clone(&hub)),
            coordinator: ChangeCoordinator::new(pool.clone()),
            comments: CommentService::new(pool.clone(), Arc::clone(&bus)),
            pool,
            config,
            hub,
            bus,
        }
    }
}
