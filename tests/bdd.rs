use std::{fmt, fs::File, net::SocketAddr, sync::Arc};

use anyhow::Context;
use cucumber::{given, then, when, World as _};
use ridepool::{
    auth::{self, AuthenticatedUser},
    config::AppConfig,
    db::init_pool,
    error::AppError,
    models::trip::{NewTrip, Trip, TripEvent},
    services::{
        matching::{Candidate, StubMatchFinder},
        store::TripStore,
    },
    state::AppState,
};
use tempfile::TempDir;

#[derive(Debug, cucumber::World, Default)]
struct AppWorld {
    state: Option<TestState>,
    registered_user: Option<AuthenticatedUser>,
    trip: Option<Trip>,
    candidates: Vec<Candidate>,
    last_transition: Option<Result<Trip, AppError>>,
}

impl AppWorld {
    fn app_state(&self) -> &AppState {
        self.state
            .as_ref()
            .expect("state must be initialised first")
            .app()
    }

    fn trip_id(&self) -> &str {
        &self
            .trip
            .as_ref()
            .expect("a trip must be requested first")
            .id
    }

    async fn apply_event(&mut self, event: TripEvent) {
        let trip_id = self.trip_id().to_string();
        let result = self.app_state().store.apply_event(&trip_id, &event).await;
        self.last_transition = Some(result);
    }
}

struct TestState {
    app: AppState,
    _root: TempDir,
}

impl fmt::Debug for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestState").finish()
    }
}

impl TestState {
    async fn new() -> anyhow::Result<Self> {
        let root = TempDir::new().context("create temp dir for bdd world")?;
        let data_root = root.path().join("data");
        std::fs::create_dir_all(&data_root)?;

        let db_path = root.path().join("bdd.sqlite");
        File::create(&db_path)?;
        let database_url = format!("sqlite://{}", db_path.to_string_lossy());

        let config = AppConfig {
            database_url: database_url.clone(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            data_root: data_root.clone(),
            cookie_secret: "bdd-cookie-secret".into(),
            seed_demo_trips: false,
        };

        let db = init_pool(&config.database_url).await?;
        sqlx::migrate!("./migrations").run(&db).await?;

        let store = TripStore::new(config.data_root.clone());
        store.ensure_structure().await?;

        let app = AppState::new(config, db, store, Arc::new(StubMatchFinder));
        Ok(Self { app, _root: root })
    }

    fn app(&self) -> &AppState {
        &self.app
    }
}

#[given("a fresh application state")]
async fn given_fresh_state(world: &mut AppWorld) {
    world.state = Some(TestState::new().await.expect("state"));
    world.registered_user = None;
    world.trip = None;
    world.candidates = Vec::new();
    world.last_transition = None;
}

#[given(
    regex = r#"^a registered user \"([^\"]+)\" with email \"([^\"]+)\" and password \"([^\"]+)\"$"#
)]
async fn given_registered_user(
    world: &mut AppWorld,
    username: String,
    email: String,
    password: String,
) {
    register_user(world, username, email, password).await;
}

#[when(
    regex = r#"^I register a user \"([^\"]+)\" with email \"([^\"]+)\" and password \"([^\"]+)\"$"#
)]
async fn when_register_user(
    world: &mut AppWorld,
    username: String,
    email: String,
    password: String,
) {
    register_user(world, username, email, password).await;
}

#[then(regex = r#"^I can authenticate as \"([^\"]+)\" using password \"([^\"]+)\"$"#)]
async fn then_can_authenticate(world: &mut AppWorld, identifier: String, password: String) {
    let authed = auth::authenticate_user(world.app_state(), &identifier, &password)
        .await
        .expect("authentication");
    assert_eq!(authed.username, identifier);
}

#[then(regex = r#"^authenticating as \"([^\"]+)\" using password \"([^\"]+)\" is rejected$"#)]
async fn then_authentication_rejected(world: &mut AppWorld, identifier: String, password: String) {
    let err = auth::authenticate_user(world.app_state(), &identifier, &password)
        .await
        .expect_err("authentication should fail");
    assert!(matches!(err, AppError::Unauthorized));
}

#[when(
    regex = r#"^I request a ride to \"([^\"]+)\" on \"([^\"]+)\" at \"([^\"]+)\" with (\d+) seats$"#
)]
async fn when_request_ride(
    world: &mut AppWorld,
    airport: String,
    date: String,
    time: String,
    seats: u32,
) {
    let user = world
        .registered_user
        .as_ref()
        .expect("user must exist before requesting rides");
    let new_trip = NewTrip {
        owner_id: user.uuid.clone(),
        owner_name: user.username.clone(),
        pickup_location: "123 Main St, New York, NY".into(),
        airport,
        date,
        time,
        seats,
        is_flexible: true,
    };
    let trip = world
        .app_state()
        .store
        .insert(new_trip)
        .await
        .expect("insert trip");
    world.trip = Some(trip);
}

#[then(regex = r#"^the trip status is \"([^\"]+)\"$"#)]
async fn then_trip_status(world: &mut AppWorld, expected: String) {
    let trip_id = world.trip_id().to_string();
    let stored = world
        .app_state()
        .store
        .get(&trip_id)
        .await
        .expect("load trip");
    assert_eq!(stored.status.as_str(), expected);
}

#[then("the trip has no accepted riders")]
async fn then_no_riders(world: &mut AppWorld) {
    let trip_id = world.trip_id().to_string();
    let stored = world
        .app_state()
        .store
        .get(&trip_id)
        .await
        .expect("load trip");
    assert!(stored.matches.is_empty());
}

#[then("fetching the trip returns the stored record")]
async fn then_round_trips(world: &mut AppWorld) {
    let inserted = world.trip.clone().expect("a trip must be requested first");
    let stored = world
        .app_state()
        .store
        .get(&inserted.id)
        .await
        .expect("load trip");
    assert_eq!(stored, inserted);
}

#[when(regex = r#"^the rider \"([^\"]+)\" is accepted onto the trip$"#)]
async fn when_rider_accepted(world: &mut AppWorld, rider: String) {
    world.apply_event(TripEvent::AcceptMatch { rider }).await;
}

#[when("the owner marks the trip complete")]
async fn when_trip_completed(world: &mut AppWorld) {
    world.apply_event(TripEvent::Complete).await;
}

#[when("the owner cancels the trip")]
async fn when_trip_cancelled(world: &mut AppWorld) {
    world.apply_event(TripEvent::Cancel).await;
}

#[then(regex = r#"^the trip's accepted riders are exactly \"([^\"]+)\"$"#)]
async fn then_riders_exactly(world: &mut AppWorld, riders: String) {
    let expected: Vec<String> = riders.split(", ").map(str::to_string).collect();
    let trip_id = world.trip_id().to_string();
    let stored = world
        .app_state()
        .store
        .get(&trip_id)
        .await
        .expect("load trip");
    assert_eq!(stored.matches, expected);
}

#[then("the transition is rejected as invalid")]
async fn then_transition_rejected(world: &mut AppWorld) {
    let result = world
        .last_transition
        .take()
        .expect("a transition must have been attempted");
    let err = result.expect_err("transition should have been rejected");
    assert!(matches!(err, AppError::InvalidTransition(_)));
}

#[when("I look up candidates for my trip")]
async fn when_look_up_candidates(world: &mut AppWorld) {
    let trip = world.trip.clone().expect("a trip must be requested first");
    world.candidates = world.app_state().matcher.find_candidates(&trip);
}

#[then(regex = r"^I get exactly (\d+) candidates$")]
async fn then_candidate_count(world: &mut AppWorld, expected: usize) {
    assert_eq!(world.candidates.len(), expected);
}

#[then(regex = r#"^every candidate echoes airport \"([^\"]+)\" and date \"([^\"]+)\"$"#)]
async fn then_candidates_echo(world: &mut AppWorld, airport: String, date: String) {
    assert!(!world.candidates.is_empty());
    for candidate in &world.candidates {
        assert_eq!(candidate.airport, airport);
        assert_eq!(candidate.date, date);
    }
}

#[then(regex = r#"^the candidate riders are \"([^\"]+)\" and \"([^\"]+)\"$"#)]
async fn then_candidate_riders(world: &mut AppWorld, first: String, second: String) {
    assert_eq!(world.candidates[0].rider_name, first);
    assert_eq!(world.candidates[1].rider_name, second);
}

#[then(regex = r#"^the candidate times are \"([^\"]+)\" and \"([^\"]+)\"$"#)]
async fn then_candidate_times(world: &mut AppWorld, first: String, second: String) {
    assert_eq!(world.candidates[0].time, first);
    assert_eq!(world.candidates[1].time, second);
}

#[when("the demo dataset is seeded")]
async fn when_demo_seeded(world: &mut AppWorld) {
    world
        .app_state()
        .store
        .seed_demo_trips()
        .await
        .expect("seed demo trips");
}

#[then(regex = r"^the store holds (\d+) trips$")]
async fn then_store_holds(world: &mut AppWorld, expected: usize) {
    let trips = world.app_state().store.list().await.expect("list trips");
    assert_eq!(trips.len(), expected);
}

async fn register_user(world: &mut AppWorld, username: String, email: String, password: String) {
    let created = auth::register_user(world.app_state(), &username, &email, "555-0100", &password)
        .await
        .expect("register user");
    world.registered_user = Some(created);
}

#[tokio::main]
async fn main() {
    AppWorld::cucumber()
        .fail_on_skipped()
        .with_default_cli()
        .run("tests/features")
        .await;
}
