//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};

use crate::config::AppConfig;
use crate::engine::analytics::{self, AnalyticsSummary};
use crate::engine::scanner::RaceScanner;
use crate::engine::settlement::{self, ResultEntry, SettlementReport};
use crate::engine::tracker::{self, TipEdit, TrackRequest};
use crate::storage::{ProfileStore, RaceReader, SettingsStore, Store, TipRepository};
use crate::strategy::{BoardOptions, DailyTip, RaceBoard, RaceSignal};
use crate::types::{
    Bookmaker, BookmakerSet, EdgeError, EdgeResult, OddsFormat, Race, RaceId, Tip,
    TipCorrection, TipId, TipResult, UserProfile, UserSettings,
};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub store: Arc<dyn Store>,
    pub config: AppConfig,
    default_books: BookmakerSet,
}

pub type AppState = Arc<DashboardState>;

impl DashboardState {
    pub fn new(store: Arc<dyn Store>, config: AppConfig) -> anyhow::Result<Self> {
        let default_books = config.enabled_books()?;
        Ok(Self {
            store,
            config,
            default_books,
        })
    }

    fn user(&self, requested: Option<String>) -> String {
        requested
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| self.config.user.default_user.clone())
    }

    /// Requested bookmakers, or the configured default selection.
    fn books(&self, requested: Option<&str>) -> EdgeResult<BookmakerSet> {
        match requested {
            Some(list) => BookmakerSet::parse(list),
            None => Ok(self.default_books.clone()),
        }
    }

    /// Stored settings, or defaults seeded from config for a new user.
    async fn settings(&self, user_id: &str) -> EdgeResult<UserSettings> {
        Ok(self
            .store
            .settings(user_id.to_string())
            .await?
            .unwrap_or_else(|| {
                let mut seeded = UserSettings::defaults_for(user_id);
                seeded.default_min_edge = self.config.edge.default_min_edge;
                seeded
            }))
    }

    /// Opportunistic settlement on read paths, when both config and the
    /// user allow it.
    async fn settle_on_read(&self, settings: &UserSettings) -> EdgeResult<()> {
        if self.config.settlement.settle_on_read && settings.auto_settle_enabled {
            let store = self.store.as_ref();
            settlement::settle_user(store, store, &settings.user_id, Utc::now()).await?;
        }
        Ok(())
    }
}

fn race_date_or_today(requested: Option<NaiveDate>) -> NaiveDate {
    requested.unwrap_or_else(|| Local::now().date_naive())
}

fn board_options(settings: &UserSettings, min_edge: Option<f64>) -> EdgeResult<BoardOptions> {
    let min_edge = min_edge.unwrap_or(settings.default_min_edge);
    if !min_edge.is_finite() {
        return Err(EdgeError::Validation("min_edge must be a number.".into()));
    }
    Ok(BoardOptions {
        min_edge,
        bankroll_units: Some(settings.bankroll_units),
        odds_format: settings.odds_format,
    })
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Maps `EdgeError` onto HTTP status codes.
pub struct ApiError(EdgeError);

impl From<EdgeError> for ApiError {
    fn from(err: EdgeError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0 {
            EdgeError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            EdgeError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            EdgeError::Storage(msg) => {
                error!(error = %msg, "Storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage error".to_string())
            }
        };
        if status.is_client_error() {
            warn!(status = status.as_u16(), error = %message, "Request rejected");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ---------------------------------------------------------------------------
// Query & body types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RacesQuery {
    pub race_date: Option<NaiveDate>,
    pub track: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BoardQuery {
    pub min_edge: Option<f64>,
    pub books: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DailyQuery {
    pub race_date: Option<NaiveDate>,
    pub min_edge: Option<f64>,
    pub books: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SignalsQuery {
    pub race_date: Option<NaiveDate>,
    pub books: Option<String>,
    pub rec_edge: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct CorrectionBody {
    pub result: Option<String>,
    pub stake: Option<f64>,
    pub odds_at_tip: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct PublishBody {
    pub results: Vec<ResultEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    pub user_id: Option<String>,
    pub display_name: String,
    pub email: String,
}

/// Partial settings update; absent fields keep their current value.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsPatch {
    pub user_id: Option<String>,
    pub timezone: Option<String>,
    pub default_min_edge: Option<f64>,
    pub notifications_enabled: Option<bool>,
    pub notify_min_edge: Option<f64>,
    pub odds_format: Option<OddsFormat>,
    pub default_stake: Option<f64>,
    pub bankroll_units: Option<f64>,
    pub auto_settle_enabled: Option<bool>,
    /// 0 removes the cap.
    pub analytics_top_n: Option<u32>,
}

impl SettingsPatch {
    fn apply(self, settings: &mut UserSettings) {
        if let Some(v) = self.timezone {
            settings.timezone = v;
        }
        if let Some(v) = self.default_min_edge {
            settings.default_min_edge = v;
        }
        if let Some(v) = self.notifications_enabled {
            settings.notifications_enabled = v;
        }
        if let Some(v) = self.notify_min_edge {
            settings.notify_min_edge = v;
        }
        if let Some(v) = self.odds_format {
            settings.odds_format = v;
        }
        if let Some(v) = self.default_stake {
            settings.default_stake = v;
        }
        if let Some(v) = self.bankroll_units {
            settings.bankroll_units = v;
        }
        if let Some(v) = self.auto_settle_enabled {
            settings.auto_settle_enabled = v;
        }
        if let Some(v) = self.analytics_top_n {
            settings.analytics_top_n = (v > 0).then_some(v);
        }
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct BookmakerInfo {
    pub id: &'static str,
    pub symbol: &'static str,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyTipsResponse {
    pub race_date: NaiveDate,
    pub min_edge: f64,
    pub selected_books: Vec<String>,
    pub tips: Vec<DailyTip>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileResponse {
    pub profile: Option<UserProfile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishResponse {
    pub race_id: RaceId,
    pub published: usize,
    pub settlement: SettlementReport,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn list_bookmakers(State(state): State<AppState>) -> Json<Vec<BookmakerInfo>> {
    Json(
        Bookmaker::ALL
            .iter()
            .map(|b| BookmakerInfo {
                id: b.id(),
                symbol: b.symbol(),
                enabled: state.default_books.contains(*b),
            })
            .collect(),
    )
}

pub async fn list_races(
    State(state): State<AppState>,
    Query(q): Query<RacesQuery>,
) -> ApiResult<Vec<Race>> {
    let date = race_date_or_today(q.race_date);
    let track = q.track.filter(|t| !t.trim().is_empty());
    Ok(Json(state.store.races_on(date, track).await?))
}

pub async fn list_tracks(
    State(state): State<AppState>,
    Query(q): Query<RacesQuery>,
) -> ApiResult<Vec<String>> {
    let date = race_date_or_today(q.race_date);
    Ok(Json(state.store.tracks_on(date).await?))
}

pub async fn race_board(
    State(state): State<AppState>,
    Path(race_id): Path<RaceId>,
    Query(q): Query<BoardQuery>,
) -> ApiResult<RaceBoard> {
    let books = state.books(q.books.as_deref())?;
    let settings = state.settings(&state.user(q.user_id)).await?;
    let options = board_options(&settings, q.min_edge)?;

    let scanner = RaceScanner::new(state.store.as_ref(), books);
    Ok(Json(scanner.board(race_id, options).await?))
}

pub async fn race_signals(
    State(state): State<AppState>,
    Query(q): Query<SignalsQuery>,
) -> ApiResult<Vec<RaceSignal>> {
    let books = state.books(q.books.as_deref())?;
    let rec_edge = q.rec_edge.unwrap_or(state.config.edge.recommend_edge);
    if !rec_edge.is_finite() {
        return Err(EdgeError::Validation("rec_edge must be a number.".into()).into());
    }
    let scanner = RaceScanner::new(state.store.as_ref(), books);
    let date = race_date_or_today(q.race_date);
    Ok(Json(scanner.signals(date, rec_edge).await?))
}

pub async fn daily_tips(
    State(state): State<AppState>,
    Query(q): Query<DailyQuery>,
) -> ApiResult<DailyTipsResponse> {
    let books = state.books(q.books.as_deref())?;
    let settings = state.settings(&state.user(q.user_id)).await?;
    let options = board_options(&settings, q.min_edge)?;
    let min_edge = options.min_edge;
    let notify = settings
        .notifications_enabled
        .then_some(settings.notify_min_edge);

    let date = race_date_or_today(q.race_date);
    let scanner = RaceScanner::new(state.store.as_ref(), books);
    let tips = scanner.daily_tips(date, options, notify).await?;

    Ok(Json(DailyTipsResponse {
        race_date: date,
        min_edge,
        selected_books: scanner.books().ids(),
        tips,
    }))
}

pub async fn track_tip(
    State(state): State<AppState>,
    Json(mut request): Json<TrackRequest>,
) -> Result<(StatusCode, Json<Tip>), ApiError> {
    request.user_id = state.user(Some(request.user_id));
    let tip = tracker::track(state.store.as_ref(), request, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(tip)))
}

pub async fn tracked_tips(
    State(state): State<AppState>,
    Query(q): Query<UserQuery>,
) -> ApiResult<Vec<Tip>> {
    let settings = state.settings(&state.user(q.user_id)).await?;
    state.settle_on_read(&settings).await?;
    Ok(Json(state.store.tips_for_user(settings.user_id).await?))
}

pub async fn update_tip(
    State(state): State<AppState>,
    Path(tip_id): Path<TipId>,
    Json(mut edit): Json<TipEdit>,
) -> ApiResult<Tip> {
    edit.user_id = state.user(Some(edit.user_id));
    Ok(Json(tracker::edit(state.store.as_ref(), tip_id, edit).await?))
}

pub async fn delete_tip(
    State(state): State<AppState>,
    Path(tip_id): Path<TipId>,
    Query(q): Query<UserQuery>,
) -> ApiResult<serde_json::Value> {
    let user_id = state.user(q.user_id);
    tracker::delete(state.store.as_ref(), tip_id, &user_id).await?;
    Ok(Json(json!({ "deleted": tip_id })))
}

pub async fn correct_result(
    State(state): State<AppState>,
    Path(tip_id): Path<TipId>,
    Json(body): Json<CorrectionBody>,
) -> ApiResult<Tip> {
    let result = body
        .result
        .as_deref()
        .map(str::parse::<TipResult>)
        .transpose()?;
    let correction = TipCorrection {
        result,
        stake: body.stake,
        odds_at_tip: body.odds_at_tip,
        corrected_at: None,
    };
    Ok(Json(
        tracker::correct(state.store.as_ref(), tip_id, correction, Utc::now()).await?,
    ))
}

pub async fn publish_results(
    State(state): State<AppState>,
    Path(race_id): Path<RaceId>,
    Json(body): Json<PublishBody>,
) -> ApiResult<PublishResponse> {
    let store = state.store.as_ref();
    let now = Utc::now();
    let published = settlement::publish_results(store, race_id, &body.results, now).await?;
    let report = settlement::settle_race(store, store, race_id, now).await?;
    Ok(Json(PublishResponse {
        race_id,
        published,
        settlement: report,
    }))
}

pub async fn settle_tips(
    State(state): State<AppState>,
    Query(q): Query<UserQuery>,
) -> ApiResult<SettlementReport> {
    let user_id = state.user(q.user_id);
    let store = state.store.as_ref();
    Ok(Json(
        settlement::settle_user(store, store, &user_id, Utc::now()).await?,
    ))
}

pub async fn bet_analytics(
    State(state): State<AppState>,
    Query(q): Query<UserQuery>,
) -> ApiResult<AnalyticsSummary> {
    let settings = state.settings(&state.user(q.user_id)).await?;
    state.settle_on_read(&settings).await?;
    let top_n = settings.analytics_top_n.map(|n| n as usize);
    Ok(Json(
        analytics::user_summary(state.store.as_ref(), &settings.user_id, top_n).await?,
    ))
}

pub async fn get_settings(
    State(state): State<AppState>,
    Query(q): Query<UserQuery>,
) -> ApiResult<UserSettings> {
    Ok(Json(state.settings(&state.user(q.user_id)).await?))
}

pub async fn save_settings(
    State(state): State<AppState>,
    Query(q): Query<UserQuery>,
    Json(patch): Json<SettingsPatch>,
) -> ApiResult<UserSettings> {
    let user_id = state.user(patch.user_id.clone().or(q.user_id));
    let mut settings = state.settings(&user_id).await?;
    patch.apply(&mut settings);
    settings.validate()?;
    settings.updated_at = Utc::now();
    state.store.save_settings(settings.clone()).await?;
    Ok(Json(settings))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Query(q): Query<UserQuery>,
) -> ApiResult<ProfileResponse> {
    let profile = state.store.profile(state.user(q.user_id)).await?;
    Ok(Json(ProfileResponse { profile }))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Query(q): Query<UserQuery>,
    Json(body): Json<ProfileUpdate>,
) -> ApiResult<ProfileResponse> {
    let user_id = state.user(body.user_id.or(q.user_id));
    let now = Utc::now();
    let profile = match state.store.profile(user_id.clone()).await? {
        Some(mut existing) => {
            existing.update(&body.display_name, &body.email, now);
            existing
        }
        None => UserProfile::new(&user_id, &body.display_name, &body.email, now),
    };
    profile.validate()?;
    state.store.save_profile(profile.clone()).await?;
    Ok(Json(ProfileResponse {
        profile: Some(profile),
    }))
}
