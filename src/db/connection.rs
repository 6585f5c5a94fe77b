//! Database connection with retry.

use anyhow::Result;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, info};

const CONNECT_ATTEMPTS: u32 = 6;
const RETRY_DELAY: Duration = Duration::from_millis(200);

/// Connect to the database, retrying transient failures such as a server
/// that is still starting up. Both `apply` and `monitor` go through here,
/// so a briefly unreachable database costs a short delay instead of a
/// failed run.
pub async fn connect_with_retry(url: &str) -> Result<PgPool> {
    let mut last_error = None;

    for attempt in 1..=CONNECT_ATTEMPTS {
        match PgPool::connect(url).await {
            Ok(pool) => {
                info!(attempt, "connected to database");
                return Ok(pool);
            }
            Err(e) => {
                debug!(attempt, error = %e, "database connection failed");
                last_error = Some(e);
                if attempt < CONNECT_ATTEMPTS {
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }

    Err(anyhow::anyhow!(
        "failed to connect to database after {} attempts: {}",
        CONNECT_ATTEMPTS,
        last_error.expect("at least one attempt was made")
    ))
}
