use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use tokio::{fs, sync::Mutex};
use tracing::info;

use crate::{
    error::AppError,
    models::trip::{NewTrip, Trip, TripEvent, TripStatus},
};

const TRIPS_FILE: &str = "trips.json";

/// Owns the trip collection. All trips live in a single JSON document under
/// the data root; every mutating call rewrites the whole document, so each
/// call is atomic with respect to itself only. The write lock serializes the
/// read-modify-write sequence across concurrent requests.
#[derive(Clone)]
pub struct TripStore {
    root: Arc<PathBuf>,
    write_lock: Arc<Mutex<()>>,
}

impl TripStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root: Arc::new(root),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_structure(&self) -> Result<(), AppError> {
        fs::create_dir_all(self.root()).await?;
        Ok(())
    }

    fn trips_path(&self) -> PathBuf {
        self.root().join(TRIPS_FILE)
    }

    async fn load(&self) -> Result<Vec<Trip>, AppError> {
        let path = self.trips_path();
        if !fs::try_exists(&path).await? {
            return Ok(Vec::new());
        }
        let raw = fs::read(&path).await?;
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        let trips: Vec<Trip> =
            serde_json::from_slice(&raw).map_err(|err| AppError::Other(err.into()))?;
        Ok(trips)
    }

    async fn save(&self, trips: &[Trip]) -> Result<(), AppError> {
        self.ensure_structure().await?;
        let data = serde_json::to_vec_pretty(trips).map_err(|err| AppError::Other(err.into()))?;
        fs::write(self.trips_path(), data).await?;
        Ok(())
    }

    /// All trips, in insertion order.
    pub async fn list(&self) -> Result<Vec<Trip>, AppError> {
        self.load().await
    }

    pub async fn get(&self, id: &str) -> Result<Trip, AppError> {
        let trips = self.load().await?;
        trips
            .into_iter()
            .find(|trip| trip.id == id)
            .ok_or(AppError::NotFound)
    }

    /// Validates the request, assigns a fresh id, stamps creation time and
    /// stores the trip as pending.
    pub async fn insert(&self, new_trip: NewTrip) -> Result<Trip, AppError> {
        new_trip.validate()?;
        let _guard = self.write_lock.lock().await;
        let mut trips = self.load().await?;
        let trip = new_trip.into_trip();
        trips.push(trip.clone());
        self.save(&trips).await?;
        info!(trip = %trip.id, airport = %trip.airport, "trip created");
        Ok(trip)
    }

    /// Applies `mutate` to the stored record and persists the collection.
    /// The record is left untouched when the mutator fails.
    pub async fn update<F>(&self, id: &str, mutate: F) -> Result<Trip, AppError>
    where
        F: FnOnce(&mut Trip) -> Result<(), AppError>,
    {
        let _guard = self.write_lock.lock().await;
        let mut trips = self.load().await?;
        let trip = trips
            .iter_mut()
            .find(|trip| trip.id == id)
            .ok_or(AppError::NotFound)?;
        mutate(trip)?;
        let updated = trip.clone();
        self.save(&trips).await?;
        Ok(updated)
    }

    /// Drives the trip lifecycle through the transition table and writes the
    /// result back.
    pub async fn apply_event(&self, id: &str, event: &TripEvent) -> Result<Trip, AppError> {
        let updated = self.update(id, |trip| trip.apply(event)).await?;
        info!(trip = %updated.id, status = %updated.status, "trip transitioned");
        Ok(updated)
    }

    /// Loads the demo fixture into an empty store. A no-op when the trips
    /// document already exists, so restarts never clobber real data.
    pub async fn seed_demo_trips(&self) -> Result<bool, AppError> {
        let _guard = self.write_lock.lock().await;
        if fs::try_exists(&self.trips_path()).await? {
            return Ok(false);
        }
        let trips = demo_trips()?;
        self.save(&trips).await?;
        info!(count = trips.len(), "seeded demo trips");
        Ok(true)
    }
}

fn demo_trips() -> Result<Vec<Trip>, AppError> {
    Ok(vec![
        Trip {
            id: "trip-1".into(),
            owner_id: "demo-user".into(),
            owner_name: "Demo Rider".into(),
            pickup_location: "123 Main St, New York, NY".into(),
            airport: "JFK International Airport".into(),
            date: "2024-01-15".into(),
            time: "14:30".into(),
            seats: 2,
            is_flexible: true,
            status: TripStatus::Active,
            matches: vec!["Sarah Johnson".into(), "Mike Chen".into()],
            created_at: fixture_timestamp("2024-01-10T10:00:00Z")?,
        },
        Trip {
            id: "trip-2".into(),
            owner_id: "demo-user".into(),
            owner_name: "Demo Rider".into(),
            pickup_location: "456 Oak Ave, Brooklyn, NY".into(),
            airport: "LaGuardia Airport".into(),
            date: "2024-01-20".into(),
            time: "09:15".into(),
            seats: 1,
            is_flexible: false,
            status: TripStatus::Pending,
            matches: Vec::new(),
            created_at: fixture_timestamp("2024-01-12T15:30:00Z")?,
        },
        Trip {
            id: "trip-3".into(),
            owner_id: "other-user".into(),
            owner_name: "Alex Rodriguez".into(),
            pickup_location: "789 Pine St, Queens, NY".into(),
            airport: "Newark Liberty International Airport".into(),
            date: "2024-01-18".into(),
            time: "16:45".into(),
            seats: 3,
            is_flexible: true,
            status: TripStatus::Pending,
            matches: Vec::new(),
            created_at: fixture_timestamp("2024-01-11T12:00:00Z")?,
        },
    ])
}

fn fixture_timestamp(raw: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| AppError::Other(err.into()))
}
