//! Seam to the external persistence service. The dispatch core calls these
//! operations but does not own durable storage; the in-memory implementation
//! in [`memory`] backs the default wiring and the test suite.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::ride::{LocationSample, StoredRide};

#[derive(Debug, Error)]
pub enum StorageError {
    /// Per-field validation messages, surfaced verbatim to the caller.
    #[error("validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    /// The ride identifier already exists in the durable store.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// The durable store could not be reached or the write failed outright.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Append one driver-location sample to the location history.
    async fn save_location(&self, sample: LocationSample) -> Result<(), StorageError>;

    /// Persist a new ride. The store assigns and returns the durable id.
    /// Fails with [`StorageError::DuplicateKey`] if the ride id is taken.
    async fn create_ride(&self, ride: StoredRide) -> Result<String, StorageError>;

    /// Look up a ride by its externally-visible `RID...` identifier.
    async fn find_ride_by_external_id(
        &self,
        ride_id: &str,
    ) -> Result<Option<StoredRide>, StorageError>;

    /// Atomically increment the singleton ride-sequence counter and return
    /// the incremented value.
    async fn next_ride_sequence(&self) -> Result<u64, StorageError>;

    /// Reset the ride-sequence counter, used when the sequence wraps.
    async fn reset_ride_sequence(&self, value: u64) -> Result<(), StorageError>;
}
