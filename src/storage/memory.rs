use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::ride::{LocationSample, StoredRide};
use crate::storage::{Storage, StorageError};

pub const INITIAL_RIDE_SEQUENCE: u64 = 100_000;

/// In-memory stand-in for the external persistence service. Rides are keyed
/// by their external `RID...` id with a uniqueness constraint, matching the
/// durable store's duplicate-key behavior.
pub struct MemoryStorage {
    rides: DashMap<String, StoredRide>,
    locations: Mutex<Vec<LocationSample>>,
    sequence: AtomicU64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_sequence(INITIAL_RIDE_SEQUENCE)
    }

    pub fn with_sequence(sequence: u64) -> Self {
        Self {
            rides: DashMap::new(),
            locations: Mutex::new(Vec::new()),
            sequence: AtomicU64::new(sequence),
        }
    }

    pub fn location_count(&self) -> usize {
        self.locations.lock().map(|log| log.len()).unwrap_or(0)
    }

    pub fn ride_count(&self) -> usize {
        self.rides.len()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn save_location(&self, sample: LocationSample) -> Result<(), StorageError> {
        let mut log = self
            .locations
            .lock()
            .map_err(|_| StorageError::Unavailable("location log poisoned".to_string()))?;
        log.push(sample);
        Ok(())
    }

    async fn create_ride(&self, mut ride: StoredRide) -> Result<String, StorageError> {
        if self.rides.contains_key(&ride.ride_id) {
            return Err(StorageError::DuplicateKey(ride.ride_id));
        }

        ride.durable_id = Uuid::new_v4().to_string();
        let durable_id = ride.durable_id.clone();
        self.rides.insert(ride.ride_id.clone(), ride);
        Ok(durable_id)
    }

    async fn find_ride_by_external_id(
        &self,
        ride_id: &str,
    ) -> Result<Option<StoredRide>, StorageError> {
        Ok(self.rides.get(ride_id).map(|entry| entry.value().clone()))
    }

    async fn next_ride_sequence(&self) -> Result<u64, StorageError> {
        Ok(self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn reset_ride_sequence(&self, value: u64) -> Result<(), StorageError> {
        self.sequence.store(value, Ordering::SeqCst);
        Ok(())
    }
}
