//! SQLite store backed by an sqlx connection pool.
//!
//! Tables:
//! - races: scheduled races
//! - runners: entries with the model's normalised probability
//! - odds: current price per (runner, bookmaker)
//! - tracked_tips: user-tracked bets
//! - race_results: finishing positions per (race, runner)
//! - user_settings: one row per user
//! - user_profiles: display name, email and plan per user

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use tracing::info;

use super::{
    apply_correction, ProfileStore, RaceReader, RaceWriter, ResultRepository, SettingsStore,
    TipRepository,
};
use crate::types::{
    Bookmaker, EdgeError, EdgeResult, NewRace, NewRunner, NewTip, OddsFormat, OddsQuote, Race,
    RaceId, RaceResult, Runner, Tip, TipCorrection, TipId, TipResult, UserProfile, UserSettings,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS races (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        race_date TEXT NOT NULL,
        track TEXT NOT NULL,
        race_number INTEGER NOT NULL,
        distance_m INTEGER NOT NULL,
        jump_time TEXT NOT NULL,
        race_name TEXT NOT NULL,
        starters INTEGER NOT NULL,
        prize_pool REAL NOT NULL,
        track_rating TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS runners (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        race_id INTEGER NOT NULL REFERENCES races(id),
        horse_number INTEGER NOT NULL,
        horse_name TEXT NOT NULL,
        barrier INTEGER NOT NULL,
        trainer TEXT NOT NULL,
        jockey TEXT NOT NULL,
        model_prob REAL NOT NULL,
        predicted_price REAL NOT NULL,
        UNIQUE(race_id, horse_number)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS odds (
        runner_id INTEGER NOT NULL REFERENCES runners(id),
        bookmaker TEXT NOT NULL,
        price REAL NOT NULL,
        bet_url TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE(runner_id, bookmaker)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tracked_tips (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        race_id INTEGER NOT NULL,
        runner_id INTEGER NOT NULL,
        bookmaker TEXT NOT NULL,
        edge_pct REAL NOT NULL,
        odds_at_tip REAL NOT NULL,
        stake REAL NOT NULL,
        result TEXT NOT NULL DEFAULT 'pending',
        tracked_at TEXT NOT NULL,
        settled_at TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_tips_user ON tracked_tips(user_id, tracked_at)",
    r#"
    CREATE TABLE IF NOT EXISTS race_results (
        race_id INTEGER NOT NULL,
        runner_id INTEGER NOT NULL,
        finish_pos INTEGER NOT NULL,
        closing_odds REAL,
        published_at TEXT NOT NULL,
        PRIMARY KEY (race_id, runner_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_settings (
        user_id TEXT PRIMARY KEY,
        timezone TEXT NOT NULL,
        default_min_edge REAL NOT NULL,
        notifications_enabled INTEGER NOT NULL,
        notify_min_edge REAL NOT NULL,
        odds_format TEXT NOT NULL,
        default_stake REAL NOT NULL,
        bankroll_units REAL NOT NULL,
        auto_settle_enabled INTEGER NOT NULL,
        analytics_top_n INTEGER,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_profiles (
        user_id TEXT PRIMARY KEY,
        display_name TEXT NOT NULL,
        email TEXT NOT NULL,
        plan TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
];

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, FromRow)]
struct RaceRow {
    id: i64,
    race_date: NaiveDate,
    track: String,
    race_number: i64,
    distance_m: i64,
    jump_time: NaiveTime,
    race_name: String,
    starters: i64,
    prize_pool: f64,
    track_rating: String,
}

impl TryFrom<RaceRow> for Race {
    type Error = EdgeError;

    fn try_from(row: RaceRow) -> EdgeResult<Self> {
        Ok(Race {
            id: row.id,
            race_date: row.race_date,
            track: row.track,
            race_number: to_u32(row.race_number, "race_number")?,
            distance_m: to_u32(row.distance_m, "distance_m")?,
            jump_time: row.jump_time,
            race_name: row.race_name,
            starters: to_u32(row.starters, "starters")?,
            prize_pool: row.prize_pool,
            track_rating: row.track_rating,
        })
    }
}

#[derive(Debug, FromRow)]
struct RunnerRow {
    id: i64,
    race_id: i64,
    horse_number: i64,
    horse_name: String,
    barrier: i64,
    trainer: String,
    jockey: String,
    model_prob: f64,
    predicted_price: f64,
}

impl TryFrom<RunnerRow> for Runner {
    type Error = EdgeError;

    fn try_from(row: RunnerRow) -> EdgeResult<Self> {
        Ok(Runner {
            id: row.id,
            race_id: row.race_id,
            horse_number: to_u32(row.horse_number, "horse_number")?,
            horse_name: row.horse_name,
            barrier: to_u32(row.barrier, "barrier")?,
            trainer: row.trainer,
            jockey: row.jockey,
            model_prob: row.model_prob,
            predicted_price: row.predicted_price,
        })
    }
}

#[derive(Debug, FromRow)]
struct QuoteRow {
    runner_id: i64,
    bookmaker: String,
    price: f64,
    bet_url: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<QuoteRow> for OddsQuote {
    type Error = EdgeError;

    fn try_from(row: QuoteRow) -> EdgeResult<Self> {
        Ok(OddsQuote {
            runner_id: row.runner_id,
            bookmaker: stored(row.bookmaker.parse())?,
            price: row.price,
            bet_url: row.bet_url,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct TipRow {
    id: i64,
    user_id: String,
    race_id: i64,
    runner_id: i64,
    bookmaker: String,
    edge_pct: f64,
    odds_at_tip: f64,
    stake: f64,
    result: String,
    tracked_at: DateTime<Utc>,
    settled_at: Option<DateTime<Utc>>,
}

impl TryFrom<TipRow> for Tip {
    type Error = EdgeError;

    fn try_from(row: TipRow) -> EdgeResult<Self> {
        Ok(Tip {
            id: row.id,
            user_id: row.user_id,
            race_id: row.race_id,
            runner_id: row.runner_id,
            bookmaker: stored(row.bookmaker.parse::<Bookmaker>())?,
            edge_pct: row.edge_pct,
            odds_at_tip: row.odds_at_tip,
            stake: row.stake,
            result: stored(row.result.parse::<TipResult>())?,
            tracked_at: row.tracked_at,
            settled_at: row.settled_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ResultRow {
    race_id: i64,
    runner_id: i64,
    finish_pos: i64,
    closing_odds: Option<f64>,
    published_at: DateTime<Utc>,
}

impl TryFrom<ResultRow> for RaceResult {
    type Error = EdgeError;

    fn try_from(row: ResultRow) -> EdgeResult<Self> {
        Ok(RaceResult {
            race_id: row.race_id,
            runner_id: row.runner_id,
            finish_pos: to_u32(row.finish_pos, "finish_pos")?,
            closing_odds: row.closing_odds,
            published_at: row.published_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SettingsRow {
    user_id: String,
    timezone: String,
    default_min_edge: f64,
    notifications_enabled: bool,
    notify_min_edge: f64,
    odds_format: String,
    default_stake: f64,
    bankroll_units: f64,
    auto_settle_enabled: bool,
    analytics_top_n: Option<i64>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SettingsRow> for UserSettings {
    type Error = EdgeError;

    fn try_from(row: SettingsRow) -> EdgeResult<Self> {
        Ok(UserSettings {
            user_id: row.user_id,
            timezone: row.timezone,
            default_min_edge: row.default_min_edge,
            notifications_enabled: row.notifications_enabled,
            notify_min_edge: row.notify_min_edge,
            odds_format: stored(row.odds_format.parse::<OddsFormat>())?,
            default_stake: row.default_stake,
            bankroll_units: row.bankroll_units,
            auto_settle_enabled: row.auto_settle_enabled,
            analytics_top_n: row
                .analytics_top_n
                .map(|n| to_u32(n, "analytics_top_n"))
                .transpose()?,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ProfileRow {
    user_id: String,
    display_name: String,
    email: String,
    plan: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProfileRow> for UserProfile {
    fn from(row: ProfileRow) -> Self {
        UserProfile {
            user_id: row.user_id,
            display_name: row.display_name,
            email: row.email,
            plan: row.plan,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn to_u32(value: i64, column: &str) -> EdgeResult<u32> {
    u32::try_from(value)
        .map_err(|_| EdgeError::Storage(format!("Column {column} out of range: {value}")))
}

/// A value that fails to parse after being read back is a storage fault,
/// not a caller mistake.
fn stored<T>(parsed: EdgeResult<T>) -> EdgeResult<T> {
    parsed.map_err(|e| EdgeError::Storage(e.to_string()))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn collect<R, T>(rows: Vec<R>) -> EdgeResult<Vec<T>>
where
    T: TryFrom<R, Error = EdgeError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `url` and ensure the
    /// schema exists.
    pub async fn connect(url: &str, max_connections: u32) -> EdgeResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.create_tables().await?;
        info!(url, max_connections, "SQLite store ready");
        Ok(store)
    }

    async fn create_tables(&self) -> EdgeResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn race_exists(&self, race_id: RaceId) -> EdgeResult<bool> {
        let found: Option<(i64,)> = sqlx::query_as("SELECT id FROM races WHERE id = ?")
            .bind(race_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl RaceReader for SqliteStore {
    async fn race(&self, race_id: RaceId) -> EdgeResult<Option<Race>> {
        let row: Option<RaceRow> = sqlx::query_as("SELECT * FROM races WHERE id = ?")
            .bind(race_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Race::try_from).transpose()
    }

    async fn races_on(&self, date: NaiveDate, track: Option<String>) -> EdgeResult<Vec<Race>> {
        let rows: Vec<RaceRow> = sqlx::query_as(
            "SELECT * FROM races WHERE race_date = ? AND (? IS NULL OR track = ?) \
             ORDER BY track, race_number",
        )
        .bind(date)
        .bind(track.as_deref())
        .bind(track.as_deref())
        .fetch_all(&self.pool)
        .await?;
        collect(rows)
    }

    async fn tracks_on(&self, date: NaiveDate) -> EdgeResult<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT track FROM races WHERE race_date = ? ORDER BY track")
                .bind(date)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(track,)| track).collect())
    }

    async fn runners(&self, race_id: RaceId) -> EdgeResult<Vec<Runner>> {
        let rows: Vec<RunnerRow> =
            sqlx::query_as("SELECT * FROM runners WHERE race_id = ? ORDER BY horse_number")
                .bind(race_id)
                .fetch_all(&self.pool)
                .await?;
        collect(rows)
    }

    async fn quotes(&self, race_id: RaceId) -> EdgeResult<Vec<OddsQuote>> {
        let rows: Vec<QuoteRow> = sqlx::query_as(
            "SELECT o.* FROM odds o JOIN runners r ON r.id = o.runner_id \
             WHERE r.race_id = ? ORDER BY o.runner_id, o.bookmaker",
        )
        .bind(race_id)
        .fetch_all(&self.pool)
        .await?;
        collect(rows)
    }
}

#[async_trait]
impl RaceWriter for SqliteStore {
    async fn insert_race(&self, race: NewRace) -> EdgeResult<Race> {
        let id = sqlx::query(
            "INSERT INTO races (race_date, track, race_number, distance_m, jump_time, \
             race_name, starters, prize_pool, track_rating) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(race.race_date)
        .bind(&race.track)
        .bind(i64::from(race.race_number))
        .bind(i64::from(race.distance_m))
        .bind(race.jump_time)
        .bind(&race.race_name)
        .bind(i64::from(race.starters))
        .bind(race.prize_pool)
        .bind(&race.track_rating)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Race {
            id,
            race_date: race.race_date,
            track: race.track,
            race_number: race.race_number,
            distance_m: race.distance_m,
            jump_time: race.jump_time,
            race_name: race.race_name,
            starters: race.starters,
            prize_pool: race.prize_pool,
            track_rating: race.track_rating,
        })
    }

    async fn insert_runner(&self, runner: NewRunner) -> EdgeResult<Runner> {
        if !self.race_exists(runner.race_id).await? {
            return Err(EdgeError::NotFound(format!("Race {} not found", runner.race_id)));
        }
        let inserted = sqlx::query(
            "INSERT INTO runners (race_id, horse_number, horse_name, barrier, trainer, jockey, \
             model_prob, predicted_price) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(runner.race_id)
        .bind(i64::from(runner.horse_number))
        .bind(&runner.horse_name)
        .bind(i64::from(runner.barrier))
        .bind(&runner.trainer)
        .bind(&runner.jockey)
        .bind(runner.model_prob)
        .bind(runner.predicted_price)
        .execute(&self.pool)
        .await;

        let id = match inserted {
            Ok(done) => done.last_insert_rowid(),
            Err(e) if is_unique_violation(&e) => {
                return Err(EdgeError::Validation(format!(
                    "Horse number {} already entered in race {}",
                    runner.horse_number, runner.race_id
                )))
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Runner {
            id,
            race_id: runner.race_id,
            horse_number: runner.horse_number,
            horse_name: runner.horse_name,
            barrier: runner.barrier,
            trainer: runner.trainer,
            jockey: runner.jockey,
            model_prob: runner.model_prob,
            predicted_price: runner.predicted_price,
        })
    }

    async fn upsert_quote(&self, quote: OddsQuote) -> EdgeResult<()> {
        let known: Option<(i64,)> = sqlx::query_as("SELECT id FROM runners WHERE id = ?")
            .bind(quote.runner_id)
            .fetch_optional(&self.pool)
            .await?;
        if known.is_none() {
            return Err(EdgeError::NotFound(format!("Runner {} not found", quote.runner_id)));
        }
        sqlx::query(
            "INSERT INTO odds (runner_id, bookmaker, price, bet_url, updated_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(runner_id, bookmaker) DO UPDATE SET \
             price = excluded.price, bet_url = excluded.bet_url, updated_at = excluded.updated_at",
        )
        .bind(quote.runner_id)
        .bind(quote.bookmaker.id())
        .bind(quote.price)
        .bind(&quote.bet_url)
        .bind(quote.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TipRepository for SqliteStore {
    async fn insert_tip(&self, tip: NewTip) -> EdgeResult<Tip> {
        let id = sqlx::query(
            "INSERT INTO tracked_tips (user_id, race_id, runner_id, bookmaker, edge_pct, \
             odds_at_tip, stake, result, tracked_at) VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', ?)",
        )
        .bind(&tip.user_id)
        .bind(tip.race_id)
        .bind(tip.runner_id)
        .bind(tip.bookmaker.id())
        .bind(tip.edge_pct)
        .bind(tip.odds_at_tip)
        .bind(tip.stake)
        .bind(tip.tracked_at)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Tip {
            id,
            user_id: tip.user_id,
            race_id: tip.race_id,
            runner_id: tip.runner_id,
            bookmaker: tip.bookmaker,
            edge_pct: tip.edge_pct,
            odds_at_tip: tip.odds_at_tip,
            stake: tip.stake,
            result: TipResult::Pending,
            tracked_at: tip.tracked_at,
            settled_at: None,
        })
    }

    async fn tip(&self, tip_id: TipId) -> EdgeResult<Option<Tip>> {
        let row: Option<TipRow> = sqlx::query_as("SELECT * FROM tracked_tips WHERE id = ?")
            .bind(tip_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Tip::try_from).transpose()
    }

    async fn tips_for_user(&self, user_id: String) -> EdgeResult<Vec<Tip>> {
        let rows: Vec<TipRow> = sqlx::query_as(
            "SELECT * FROM tracked_tips WHERE user_id = ? ORDER BY tracked_at DESC, id DESC",
        )
        .bind(&user_id)
        .fetch_all(&self.pool)
        .await?;
        collect(rows)
    }

    async fn pending_for_race(&self, race_id: RaceId) -> EdgeResult<Vec<Tip>> {
        let rows: Vec<TipRow> = sqlx::query_as(
            "SELECT * FROM tracked_tips WHERE race_id = ? AND result = 'pending' ORDER BY id",
        )
        .bind(race_id)
        .fetch_all(&self.pool)
        .await?;
        collect(rows)
    }

    async fn update_stake_and_odds(
        &self,
        tip_id: TipId,
        stake: f64,
        odds_at_tip: f64,
    ) -> EdgeResult<bool> {
        let done = sqlx::query(
            "UPDATE tracked_tips SET stake = ?, odds_at_tip = ? \
             WHERE id = ? AND result = 'pending'",
        )
        .bind(stake)
        .bind(odds_at_tip)
        .bind(tip_id)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn settle_tip(
        &self,
        tip_id: TipId,
        result: TipResult,
        settled_at: DateTime<Utc>,
    ) -> EdgeResult<bool> {
        let done = sqlx::query(
            "UPDATE tracked_tips SET result = ?, settled_at = ? \
             WHERE id = ? AND result = 'pending'",
        )
        .bind(result.as_str())
        .bind(settled_at)
        .bind(tip_id)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn correct_tip(&self, tip_id: TipId, correction: TipCorrection) -> EdgeResult<bool> {
        let mut tx = self.pool.begin().await?;
        let row: Option<TipRow> = sqlx::query_as("SELECT * FROM tracked_tips WHERE id = ?")
            .bind(tip_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(false);
        };
        let mut tip = Tip::try_from(row)?;
        apply_correction(&mut tip, &correction);

        sqlx::query(
            "UPDATE tracked_tips SET result = ?, stake = ?, odds_at_tip = ?, settled_at = ? \
             WHERE id = ?",
        )
        .bind(tip.result.as_str())
        .bind(tip.stake)
        .bind(tip.odds_at_tip)
        .bind(tip.settled_at)
        .bind(tip_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn delete_tip(&self, tip_id: TipId, user_id: String) -> EdgeResult<bool> {
        let done = sqlx::query("DELETE FROM tracked_tips WHERE id = ? AND user_id = ?")
            .bind(tip_id)
            .bind(&user_id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }
}

#[async_trait]
impl ResultRepository for SqliteStore {
    async fn upsert_result(&self, result: RaceResult) -> EdgeResult<()> {
        sqlx::query(
            "INSERT INTO race_results (race_id, runner_id, finish_pos, closing_odds, published_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(race_id, runner_id) DO UPDATE SET \
             finish_pos = excluded.finish_pos, closing_odds = excluded.closing_odds, \
             published_at = excluded.published_at",
        )
        .bind(result.race_id)
        .bind(result.runner_id)
        .bind(i64::from(result.finish_pos))
        .bind(result.closing_odds)
        .bind(result.published_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn results_for_race(&self, race_id: RaceId) -> EdgeResult<Vec<RaceResult>> {
        let rows: Vec<ResultRow> =
            sqlx::query_as("SELECT * FROM race_results WHERE race_id = ? ORDER BY runner_id")
                .bind(race_id)
                .fetch_all(&self.pool)
                .await?;
        collect(rows)
    }
}

#[async_trait]
impl SettingsStore for SqliteStore {
    async fn settings(&self, user_id: String) -> EdgeResult<Option<UserSettings>> {
        let row: Option<SettingsRow> =
            sqlx::query_as("SELECT * FROM user_settings WHERE user_id = ?")
                .bind(&user_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(UserSettings::try_from).transpose()
    }

    async fn save_settings(&self, settings: UserSettings) -> EdgeResult<()> {
        sqlx::query(
            "INSERT INTO user_settings (user_id, timezone, default_min_edge, \
             notifications_enabled, notify_min_edge, odds_format, default_stake, \
             bankroll_units, auto_settle_enabled, analytics_top_n, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(user_id) DO UPDATE SET \
             timezone = excluded.timezone, default_min_edge = excluded.default_min_edge, \
             notifications_enabled = excluded.notifications_enabled, \
             notify_min_edge = excluded.notify_min_edge, odds_format = excluded.odds_format, \
             default_stake = excluded.default_stake, bankroll_units = excluded.bankroll_units, \
             auto_settle_enabled = excluded.auto_settle_enabled, \
             analytics_top_n = excluded.analytics_top_n, updated_at = excluded.updated_at",
        )
        .bind(&settings.user_id)
        .bind(&settings.timezone)
        .bind(settings.default_min_edge)
        .bind(settings.notifications_enabled)
        .bind(settings.notify_min_edge)
        .bind(settings.odds_format.as_str())
        .bind(settings.default_stake)
        .bind(settings.bankroll_units)
        .bind(settings.auto_settle_enabled)
        .bind(settings.analytics_top_n.map(i64::from))
        .bind(settings.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for SqliteStore {
    async fn profile(&self, user_id: String) -> EdgeResult<Option<UserProfile>> {
        let row: Option<ProfileRow> =
            sqlx::query_as("SELECT * FROM user_profiles WHERE user_id = ?")
                .bind(&user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(UserProfile::from))
    }

    async fn save_profile(&self, profile: UserProfile) -> EdgeResult<()> {
        sqlx::query(
            "INSERT INTO user_profiles (user_id, display_name, email, plan, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(user_id) DO UPDATE SET \
             display_name = excluded.display_name, email = excluded.email, \
             plan = excluded.plan, updated_at = excluded.updated_at",
        )
        .bind(&profile.user_id)
        .bind(&profile.display_name)
        .bind(&profile.email)
        .bind(&profile.plan)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
