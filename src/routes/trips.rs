use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use chrono::{DateTime, Local, Utc};
use serde::Deserialize;

use crate::{
    auth::CurrentUser,
    error::AppError,
    models::trip::{NewTrip, Trip, TripEvent, TripStatus},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard))
        .route("/trips/new", get(trip_new_form).post(trip_new_submit))
        .route("/trips/:id", get(trip_detail))
        .route("/trips/:id/accept", post(trip_accept_match))
        .route("/trips/:id/cancel", post(trip_cancel))
        .route("/trips/:id/complete", post(trip_complete))
        .route("/matches", get(matches_list))
        .route("/matches/:id/join", post(match_join))
}

#[derive(Clone)]
struct TripRow {
    id: String,
    airport: String,
    date: String,
    time: String,
    seats: u32,
    status: String,
    riders_text: String,
    requested_at: String,
}

impl TripRow {
    fn from_trip(trip: Trip) -> Self {
        Self {
            id: trip.id,
            airport: trip.airport,
            date: trip.date,
            time: trip.time,
            seats: trip.seats,
            status: trip.status.to_string(),
            riders_text: if trip.matches.is_empty() {
                "-".into()
            } else {
                trip.matches.join(", ")
            },
            requested_at: format_timestamp(trip.created_at),
        }
    }
}

#[derive(Template)]
#[template(path = "user/dashboard.html")]
struct DashboardTemplate {
    display_name: String,
    trips: Vec<TripRow>,
    has_trips: bool,
}

async fn dashboard(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let mut trips = state.store.list().await?;
    trips.retain(|trip| trip.owner_id == user.uuid);
    trips.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let rows: Vec<TripRow> = trips.into_iter().map(TripRow::from_trip).collect();
    Ok(AskamaTemplateResponse::into_response(DashboardTemplate {
        display_name: user.username.clone(),
        has_trips: !rows.is_empty(),
        trips: rows,
    }))
}

#[derive(Template)]
#[template(path = "user/trip_new.html")]
struct TripNewTemplate {
    show_error: bool,
    error_message: String,
}

async fn trip_new_form(current: CurrentUser) -> Result<impl IntoResponse, AppError> {
    current.require_user()?;
    Ok(AskamaTemplateResponse::into_response(TripNewTemplate {
        show_error: false,
        error_message: String::new(),
    }))
}

#[derive(Deserialize)]
struct TripForm {
    pickup_location: String,
    airport: String,
    date: String,
    time: String,
    seats: u32,
    // Checkboxes post "on" when ticked and nothing otherwise.
    is_flexible: Option<String>,
}

async fn trip_new_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<TripForm>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let new_trip = NewTrip {
        owner_id: user.uuid.clone(),
        owner_name: user.username.clone(),
        pickup_location: form.pickup_location,
        airport: form.airport,
        date: form.date,
        time: form.time,
        seats: form.seats,
        is_flexible: form.is_flexible.is_some(),
    };
    match state.store.insert(new_trip).await {
        Ok(trip) => Ok(Redirect::to(&format!("/me/trips/{}", trip.id)).into_response()),
        Err(AppError::BadRequest(msg)) => Ok((
            StatusCode::BAD_REQUEST,
            AskamaTemplateResponse::into_response(TripNewTemplate {
                show_error: true,
                error_message: msg,
            }),
        )
            .into_response()),
        Err(err) => Err(err),
    }
}

#[derive(Clone)]
struct CandidateRow {
    rider_name: String,
    pickup_location: String,
    date: String,
    time: String,
    seats: u32,
    flexible_text: String,
}

#[derive(Template)]
#[template(path = "user/trip_detail.html")]
struct TripDetailTemplate {
    id: String,
    trip_ref: String,
    airport: String,
    pickup_location: String,
    date: String,
    time: String,
    seats: u32,
    flexible_text: String,
    status: String,
    owner_name: String,
    riders: Vec<String>,
    has_riders: bool,
    can_cancel: bool,
    can_complete: bool,
    candidates: Vec<CandidateRow>,
    has_candidates: bool,
}

async fn trip_detail(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let trip = state.store.get(&trip_id).await?;

    let is_owner = trip.owner_id == user.uuid;
    let candidates: Vec<CandidateRow> = if is_owner && trip.status == TripStatus::Pending {
        state
            .matcher
            .find_candidates(&trip)
            .into_iter()
            .map(|candidate| CandidateRow {
                rider_name: candidate.rider_name,
                pickup_location: candidate.pickup_location,
                date: candidate.date,
                time: candidate.time,
                seats: candidate.seats,
                flexible_text: flexible_text(candidate.is_flexible).into(),
            })
            .collect()
    } else {
        Vec::new()
    };

    Ok(AskamaTemplateResponse::into_response(TripDetailTemplate {
        trip_ref: trip.id.chars().take(8).collect(),
        id: trip.id,
        airport: trip.airport,
        pickup_location: trip.pickup_location,
        date: trip.date,
        time: trip.time,
        seats: trip.seats,
        flexible_text: flexible_text(trip.is_flexible).into(),
        status: trip.status.to_string(),
        owner_name: trip.owner_name,
        has_riders: !trip.matches.is_empty(),
        riders: trip.matches,
        can_cancel: is_owner && trip.status == TripStatus::Pending,
        can_complete: is_owner && trip.status == TripStatus::Active,
        has_candidates: !candidates.is_empty(),
        candidates,
    }))
}

#[derive(Deserialize)]
struct AcceptForm {
    rider: String,
}

async fn trip_accept_match(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
    Form(form): Form<AcceptForm>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    let trip = state.store.get(&trip_id).await?;
    if trip.owner_id != user.uuid {
        return Err(AppError::Forbidden);
    }
    state
        .store
        .apply_event(&trip_id, &TripEvent::AcceptMatch { rider: form.rider })
        .await?;
    Ok(Redirect::to(&format!("/me/trips/{trip_id}")))
}

async fn trip_cancel(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    let trip = state.store.get(&trip_id).await?;
    if trip.owner_id != user.uuid {
        return Err(AppError::Forbidden);
    }
    state.store.apply_event(&trip_id, &TripEvent::Cancel).await?;
    Ok(Redirect::to("/me"))
}

async fn trip_complete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    let trip = state.store.get(&trip_id).await?;
    if trip.owner_id != user.uuid {
        return Err(AppError::Forbidden);
    }
    state
        .store
        .apply_event(&trip_id, &TripEvent::Complete)
        .await?;
    Ok(Redirect::to("/me"))
}

#[derive(Clone)]
struct AvailableTripRow {
    id: String,
    airport: String,
    pickup_location: String,
    date: String,
    time: String,
    seats: u32,
    owner_name: String,
    flexible_text: String,
}

#[derive(Template)]
#[template(path = "user/matches.html")]
struct MatchesTemplate {
    trips: Vec<AvailableTripRow>,
    has_trips: bool,
}

/// Browse other riders' open requests. Plain predicate filtering over the
/// store listing, not the matching engine.
async fn matches_list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let mut trips = state.store.list().await?;
    trips.retain(|trip| trip.status == TripStatus::Pending && trip.owner_id != user.uuid);
    trips.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let rows: Vec<AvailableTripRow> = trips
        .into_iter()
        .map(|trip| AvailableTripRow {
            id: trip.id,
            airport: trip.airport,
            pickup_location: trip.pickup_location,
            date: trip.date,
            time: trip.time,
            seats: trip.seats,
            owner_name: trip.owner_name,
            flexible_text: flexible_text(trip.is_flexible).into(),
        })
        .collect();
    Ok(AskamaTemplateResponse::into_response(MatchesTemplate {
        has_trips: !rows.is_empty(),
        trips: rows,
    }))
}

async fn match_join(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    let trip = state.store.get(&trip_id).await?;
    if trip.owner_id == user.uuid {
        return Err(AppError::BadRequest("you cannot join your own trip".into()));
    }
    state
        .store
        .apply_event(
            &trip_id,
            &TripEvent::AcceptMatch {
                rider: user.username.clone(),
            },
        )
        .await?;
    Ok(Redirect::to(&format!("/me/trips/{trip_id}")))
}

fn flexible_text(is_flexible: bool) -> &'static str {
    if is_flexible {
        "Flexible (±30 min)"
    } else {
        "Exact time"
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%d.%m.%Y %H:%M").to_string()
}
