use serde::Serialize;

use crate::models::trip::Trip;

/// A trip offered as a potential pairing, not yet accepted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub id: String,
    pub rider_name: String,
    pub pickup_location: String,
    pub airport: String,
    pub date: String,
    pub time: String,
    pub seats: u32,
    pub is_flexible: bool,
}

/// Seam for the matching engine. Handlers only see this trait, so a real
/// scorer (airport equality, date equality, time proximity within the
/// flexibility window) can replace the stub without touching callers.
pub trait MatchFinder: Send + Sync {
    fn find_candidates(&self, trip: &Trip) -> Vec<Candidate>;
}

/// Demo matcher. Ignores everything about the trip except its airport and
/// date, which it echoes into two fixed candidates. Compatibility tests pin
/// these values.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubMatchFinder;

impl MatchFinder for StubMatchFinder {
    fn find_candidates(&self, trip: &Trip) -> Vec<Candidate> {
        vec![
            Candidate {
                id: "match-1".into(),
                rider_name: "Emma Wilson".into(),
                pickup_location: "321 Broadway, New York, NY".into(),
                airport: trip.airport.clone(),
                date: trip.date.clone(),
                time: "14:45".into(),
                seats: 1,
                is_flexible: true,
            },
            Candidate {
                id: "match-2".into(),
                rider_name: "David Kim".into(),
                pickup_location: "654 Park Ave, New York, NY".into(),
                airport: trip.airport.clone(),
                date: trip.date.clone(),
                time: "14:15".into(),
                seats: 2,
                is_flexible: false,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::trip::NewTrip;

    fn trip_to(airport: &str, date: &str) -> Trip {
        NewTrip {
            owner_id: "owner-1".into(),
            owner_name: "Taylor".into(),
            pickup_location: "123 Main St".into(),
            airport: airport.into(),
            date: date.into(),
            time: "08:00".into(),
            seats: 1,
            is_flexible: false,
        }
        .into_trip()
    }

    #[test]
    fn stub_echoes_airport_and_date_into_both_candidates() {
        let trip = trip_to("X", "D");
        let candidates = StubMatchFinder.find_candidates(&trip);
        assert_eq!(candidates.len(), 2);
        for candidate in &candidates {
            assert_eq!(candidate.airport, "X");
            assert_eq!(candidate.date, "D");
        }
    }

    #[test]
    fn stub_values_are_pinned() {
        let trip = trip_to("JFK International Airport", "2024-01-15");
        let candidates = StubMatchFinder.find_candidates(&trip);

        assert_eq!(candidates[0].id, "match-1");
        assert_eq!(candidates[0].rider_name, "Emma Wilson");
        assert_eq!(candidates[0].pickup_location, "321 Broadway, New York, NY");
        assert_eq!(candidates[0].time, "14:45");
        assert_eq!(candidates[0].seats, 1);
        assert!(candidates[0].is_flexible);

        assert_eq!(candidates[1].id, "match-2");
        assert_eq!(candidates[1].rider_name, "David Kim");
        assert_eq!(candidates[1].pickup_location, "654 Park Ave, New York, NY");
        assert_eq!(candidates[1].time, "14:15");
        assert_eq!(candidates[1].seats, 2);
        assert!(!candidates[1].is_flexible);
    }

    #[test]
    fn stub_does_not_depend_on_the_trip_time() {
        let trip = trip_to("LaGuardia Airport", "2024-02-01");
        let candidates = StubMatchFinder.find_candidates(&trip);
        assert_eq!(candidates[0].time, "14:45");
        assert_eq!(candidates[1].time, "14:15");
    }
}
