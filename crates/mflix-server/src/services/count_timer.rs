//! Periodic collection-count job
//!
//! Counts both collections on a fixed schedule and logs the totals so a
//! log scrape gives a cheap growth signal without hitting the API.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::storage::{Database, PersonStore};

pub fn spawn_count_timer(
    persons: Arc<dyn PersonStore>,
    db: Arc<Database>,
    interval: Duration,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            // The first tick fires immediately, giving a count at startup
            ticker.tick().await;

            match persons.count().await {
                Ok(n) => info!("There are {} persons in the store", n),
                Err(e) => warn!("Person count failed: {}", e),
            }
            match db.count_movies().await {
                Ok(n) => info!("There are {} movies in the store", n),
                Err(e) => warn!("Movie count failed: {}", e),
            }
        }
    });
}
