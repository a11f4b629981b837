use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

use crate::api::error::ApiError;
use crate::config::AiConfig;

pub struct AppState {
    db: Mutex<Connection>,
    pub ai: AiConfig,
}

impl AppState {
    pub fn new(conn: Connection, ai: AiConfig) -> Self {
        Self {
            db: Mutex::new(conn),
            ai,
        }
    }

    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db.lock().map_err(|_| ApiError::lock_poisoned())
    }
}
