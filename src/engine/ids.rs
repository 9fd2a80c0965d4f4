use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tracing::warn;

use crate::storage::Storage;

pub const RIDE_ID_PREFIX: &str = "RID";
pub const SEQUENCE_FLOOR: u64 = 100_000;
pub const SEQUENCE_CEIL: u64 = 999_999;

/// Allocates externally-visible ride ids from the durable singleton
/// sequence counter, formatted `RID` + six zero-padded digits.
pub struct RideIdAllocator {
    storage: Arc<dyn Storage>,
}

impl RideIdAllocator {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Increment the durable counter and format the result. Past the
    /// six-digit ceiling the counter is reset to the floor and the floor
    /// value is returned, which reuses historical ids. If the durable
    /// increment fails, a timestamp-plus-random local id is produced
    /// instead, trading uniqueness guarantees for availability.
    pub async fn allocate(&self) -> String {
        match self.storage.next_ride_sequence().await {
            Ok(sequence) => {
                let sequence = if sequence > SEQUENCE_CEIL {
                    if let Err(err) = self.storage.reset_ride_sequence(SEQUENCE_FLOOR).await {
                        warn!(error = %err, "failed to reset ride sequence after wrap");
                    }
                    SEQUENCE_FLOOR
                } else {
                    sequence
                };
                format!("{RIDE_ID_PREFIX}{sequence:06}")
            }
            Err(err) => {
                warn!(error = %err, "durable sequence unavailable, using fallback ride id");
                fallback_ride_id()
            }
        }
    }
}

fn fallback_ride_id() -> String {
    let millis = Utc::now().timestamp_millis().to_string();
    let tail_start = millis.len().saturating_sub(6);
    let suffix: u32 = rand::thread_rng().gen_range(0..1000);
    format!("{RIDE_ID_PREFIX}{}{suffix:03}", &millis[tail_start..])
}
