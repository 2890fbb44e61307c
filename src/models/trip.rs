use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Pending => "pending",
            TripStatus::Active => "active",
            TripStatus::Completed => "completed",
            TripStatus::Cancelled => "cancelled",
        }
    }

    /// Completed and cancelled trips accept no further events.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TripStatus::Completed | TripStatus::Cancelled)
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The only ways a trip's status may change. Callers cannot set an
/// arbitrary target status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TripEvent {
    /// Owner withdraws a pending request.
    Cancel,
    /// A rider (by display name) is accepted onto the trip.
    AcceptMatch { rider: String },
    /// Owner marks an active trip as done.
    Complete,
}

impl TripEvent {
    fn describe(&self) -> &'static str {
        match self {
            TripEvent::Cancel => "cancel",
            TripEvent::AcceptMatch { .. } => "accept a match on",
            TripEvent::Complete => "complete",
        }
    }
}

/// A single airport ride request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: String,
    pub owner_id: String,
    pub owner_name: String,
    pub pickup_location: String,
    pub airport: String,
    /// Calendar date as entered by the requester, e.g. "2024-01-15".
    pub date: String,
    /// Wall-clock time as entered by the requester, e.g. "14:30".
    pub time: String,
    pub seats: u32,
    /// Requester tolerates a schedule shift. Stored and displayed only;
    /// nothing gates on it yet.
    pub is_flexible: bool,
    pub status: TripStatus,
    /// Display names of accepted riders, in acceptance order, deduplicated.
    #[serde(default)]
    pub matches: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Trip {
    /// Advances the lifecycle. The transition table is authoritative:
    ///
    /// pending --cancel--> cancelled
    /// pending --accept--> active (rider appended if absent)
    /// active  --accept--> active (additional rider appended if absent)
    /// active  --complete--> completed
    ///
    /// Anything else is rejected and the trip is left untouched.
    pub fn apply(&mut self, event: &TripEvent) -> Result<(), AppError> {
        match (self.status, event) {
            (TripStatus::Pending, TripEvent::Cancel) => {
                self.status = TripStatus::Cancelled;
                Ok(())
            }
            (TripStatus::Pending | TripStatus::Active, TripEvent::AcceptMatch { rider }) => {
                self.status = TripStatus::Active;
                if !self.matches.iter().any(|name| name == rider) {
                    self.matches.push(rider.clone());
                }
                Ok(())
            }
            (TripStatus::Active, TripEvent::Complete) => {
                self.status = TripStatus::Completed;
                Ok(())
            }
            (from, event) => Err(AppError::InvalidTransition(format!(
                "cannot {} a {from} trip",
                event.describe()
            ))),
        }
    }
}

/// Payload for creating a trip. Id, status and creation time are assigned
/// by the store, never by the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTrip {
    pub owner_id: String,
    pub owner_name: String,
    pub pickup_location: String,
    pub airport: String,
    pub date: String,
    pub time: String,
    pub seats: u32,
    pub is_flexible: bool,
}

impl NewTrip {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.pickup_location.trim().is_empty() {
            return Err(AppError::BadRequest("pickup location is required".into()));
        }
        if self.airport.trim().is_empty() {
            return Err(AppError::BadRequest("airport is required".into()));
        }
        if self.date.trim().is_empty() {
            return Err(AppError::BadRequest("date is required".into()));
        }
        if self.time.trim().is_empty() {
            return Err(AppError::BadRequest("time is required".into()));
        }
        if self.seats == 0 {
            return Err(AppError::BadRequest("at least one seat is required".into()));
        }
        Ok(())
    }

    pub fn into_trip(self) -> Trip {
        Trip {
            id: Uuid::new_v4().to_string(),
            owner_id: self.owner_id,
            owner_name: self.owner_name,
            pickup_location: self.pickup_location,
            airport: self.airport,
            date: self.date,
            time: self.time,
            seats: self.seats,
            is_flexible: self.is_flexible,
            status: TripStatus::Pending,
            matches: Vec::new(),
            created_at: Utc::now(),
        }
    }
}
