//! Shared types for HORSEDGE.
//!
//! These types form the data model used across all modules: races, runners,
//! bookmaker quotes, tracked tips, published results and user settings.
//! Storage, strategy and engine modules depend on them without depending on
//! each other.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::prelude::*;
use rust_decimal::RoundingStrategy;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type RaceId = i64;
pub type RunnerId = i64;
pub type TipId = i64;

/// Caller identity used when none is supplied.
pub const DEFAULT_USER: &str = "demo";

// ---------------------------------------------------------------------------
// Bookmakers
// ---------------------------------------------------------------------------

/// Recognised bookmakers.
///
/// Declaration order is the canonical precedence used to break best-price
/// ties, so `Ord` is derived and must follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bookmaker {
    Sportsbet,
    Ladbrokes,
    Tab,
    Neds,
    Pointsbet,
}

impl Bookmaker {
    /// All bookmakers in canonical order.
    pub const ALL: &'static [Bookmaker] = &[
        Bookmaker::Sportsbet,
        Bookmaker::Ladbrokes,
        Bookmaker::Tab,
        Bookmaker::Neds,
        Bookmaker::Pointsbet,
    ];

    /// Stable identifier used in storage and query strings.
    pub fn id(&self) -> &'static str {
        match self {
            Bookmaker::Sportsbet => "sportsbet",
            Bookmaker::Ladbrokes => "ladbrokes",
            Bookmaker::Tab => "tab",
            Bookmaker::Neds => "neds",
            Bookmaker::Pointsbet => "pointsbet",
        }
    }

    /// Short display symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Bookmaker::Sportsbet => "SB",
            Bookmaker::Ladbrokes => "LB",
            Bookmaker::Tab => "TAB",
            Bookmaker::Neds => "NEDS",
            Bookmaker::Pointsbet => "PB",
        }
    }

    /// Position in the canonical precedence order (0 = highest).
    pub fn precedence(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Bookmaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl std::str::FromStr for Bookmaker {
    type Err = EdgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Bookmaker::ALL
            .iter()
            .copied()
            .find(|b| b.id() == wanted)
            .ok_or_else(|| EdgeError::Validation(format!("Unknown bookmaker: {s}")))
    }
}

/// A caller-chosen subset of bookmakers, iterated in canonical order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmakerSet {
    members: Vec<Bookmaker>,
}

impl BookmakerSet {
    /// Every recognised bookmaker.
    pub fn all() -> Self {
        Self {
            members: Bookmaker::ALL.to_vec(),
        }
    }

    /// Build a set from explicit members. Rejects an empty selection.
    pub fn new(members: impl IntoIterator<Item = Bookmaker>) -> EdgeResult<Self> {
        let mut members: Vec<Bookmaker> = members.into_iter().collect();
        members.sort();
        members.dedup();
        if members.is_empty() {
            return Err(EdgeError::Validation(
                "At least one bookmaker must be selected.".to_string(),
            ));
        }
        Ok(Self { members })
    }

    /// Parse a comma-separated list such as `"tab,neds"`.
    ///
    /// Blank entries are skipped; unknown names are rejected.
    pub fn parse(list: &str) -> EdgeResult<Self> {
        let members = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<Bookmaker>)
            .collect::<EdgeResult<Vec<_>>>()?;
        Self::new(members)
    }

    pub fn contains(&self, bookmaker: Bookmaker) -> bool {
        self.members.contains(&bookmaker)
    }

    pub fn iter(&self) -> impl Iterator<Item = Bookmaker> + '_ {
        self.members.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Identifiers in canonical order, for echoing back to callers.
    pub fn ids(&self) -> Vec<String> {
        self.members.iter().map(|b| b.id().to_string()).collect()
    }
}

impl Default for BookmakerSet {
    fn default() -> Self {
        Self::all()
    }
}

// ---------------------------------------------------------------------------
// Races, runners, quotes
// ---------------------------------------------------------------------------

/// A scheduled race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Race {
    pub id: RaceId,
    pub race_date: NaiveDate,
    pub track: String,
    pub race_number: u32,
    pub distance_m: u32,
    pub jump_time: NaiveTime,
    pub race_name: String,
    pub starters: u32,
    pub prize_pool: f64,
    pub track_rating: String,
}

/// Race fields supplied by the data collaborator before an id is assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRace {
    pub race_date: NaiveDate,
    pub track: String,
    pub race_number: u32,
    pub distance_m: u32,
    pub jump_time: NaiveTime,
    pub race_name: String,
    pub starters: u32,
    pub prize_pool: f64,
    pub track_rating: String,
}

/// A horse entered in one race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runner {
    pub id: RunnerId,
    pub race_id: RaceId,
    pub horse_number: u32,
    pub horse_name: String,
    pub barrier: u32,
    pub trainer: String,
    pub jockey: String,
    /// Race-normalised model win probability.
    pub model_prob: f64,
    /// Fair price implied by the model (1 / model_prob).
    pub predicted_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRunner {
    pub race_id: RaceId,
    pub horse_number: u32,
    pub horse_name: String,
    pub barrier: u32,
    pub trainer: String,
    pub jockey: String,
    pub model_prob: f64,
    pub predicted_price: f64,
}

/// A bookmaker's current price for one runner. Keyed by (runner, bookmaker).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsQuote {
    pub runner_id: RunnerId,
    pub bookmaker: Bookmaker,
    pub price: f64,
    pub bet_url: String,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tips & results
// ---------------------------------------------------------------------------

/// Settlement state of a tracked tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipResult {
    Pending,
    Won,
    Lost,
}

impl TipResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            TipResult::Pending => "pending",
            TipResult::Won => "won",
            TipResult::Lost => "lost",
        }
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self, TipResult::Pending)
    }

    /// Outcome implied by a finishing position (1 = winner).
    pub fn from_finish(finish_pos: u32) -> Self {
        if finish_pos == 1 {
            TipResult::Won
        } else {
            TipResult::Lost
        }
    }
}

impl fmt::Display for TipResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TipResult {
    type Err = EdgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(TipResult::Pending),
            "won" => Ok(TipResult::Won),
            "lost" => Ok(TipResult::Lost),
            _ => Err(EdgeError::Validation("Invalid result.".to_string())),
        }
    }
}

/// A user-tracked bet recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tip {
    pub id: TipId,
    pub user_id: String,
    pub race_id: RaceId,
    pub runner_id: RunnerId,
    pub bookmaker: Bookmaker,
    /// Edge observed when the tip was tracked.
    pub edge_pct: f64,
    /// Price taken when the tip was tracked.
    pub odds_at_tip: f64,
    pub stake: f64,
    pub result: TipResult,
    pub tracked_at: DateTime<Utc>,
    /// Set only on the transition out of `Pending`.
    pub settled_at: Option<DateTime<Utc>>,
}

/// A validated tip ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTip {
    pub user_id: String,
    pub race_id: RaceId,
    pub runner_id: RunnerId,
    pub bookmaker: Bookmaker,
    pub edge_pct: f64,
    pub odds_at_tip: f64,
    pub stake: f64,
    pub tracked_at: DateTime<Utc>,
}

/// Administrative override. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TipCorrection {
    pub result: Option<TipResult>,
    pub stake: Option<f64>,
    pub odds_at_tip: Option<f64>,
    /// Timestamp applied when the correction settles a tip that has none.
    pub corrected_at: Option<DateTime<Utc>>,
}

/// Official finishing position for one runner, plus the closing price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceResult {
    pub race_id: RaceId,
    pub runner_id: RunnerId,
    pub finish_pos: u32,
    pub closing_odds: Option<f64>,
    pub published_at: DateTime<Utc>,
}

impl RaceResult {
    /// Closing price usable for CLV: finite and strictly above 1.0.
    pub fn usable_closing_odds(&self) -> Option<f64> {
        self.closing_odds.filter(|p| p.is_finite() && *p > 1.0)
    }
}

// ---------------------------------------------------------------------------
// User settings
// ---------------------------------------------------------------------------

/// How prices are rendered for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OddsFormat {
    #[default]
    Decimal,
    American,
}

impl OddsFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OddsFormat::Decimal => "decimal",
            OddsFormat::American => "american",
        }
    }

    /// Render a decimal price, e.g. `$4.50` or `+350`.
    pub fn render(&self, price: f64) -> String {
        match self {
            OddsFormat::Decimal => format!("${price:.2}"),
            OddsFormat::American => {
                if price >= 2.0 {
                    format!("+{:.0}", (price - 1.0) * 100.0)
                } else if price > 1.0 {
                    format!("-{:.0}", 100.0 / (price - 1.0))
                } else {
                    "+0".to_string()
                }
            }
        }
    }
}

impl std::str::FromStr for OddsFormat {
    type Err = EdgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "decimal" => Ok(OddsFormat::Decimal),
            "american" => Ok(OddsFormat::American),
            _ => Err(EdgeError::Validation(format!("Unknown odds format: {s}"))),
        }
    }
}

/// Per-user preferences consumed by the board, tracker and analytics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    pub user_id: String,
    pub timezone: String,
    pub default_min_edge: f64,
    pub notifications_enabled: bool,
    pub notify_min_edge: f64,
    pub odds_format: OddsFormat,
    pub default_stake: f64,
    pub bankroll_units: f64,
    pub auto_settle_enabled: bool,
    /// Breakdown lists are truncated to this many entries; `None` keeps all.
    #[serde(default)]
    pub analytics_top_n: Option<u32>,
    pub updated_at: DateTime<Utc>,
}

impl UserSettings {
    pub const MIN_EDGE_RANGE: (f64, f64) = (-100.0, 1000.0);
    pub const MAX_TOP_N: u32 = 100;

    /// Defaults seeded for a user with no stored settings.
    pub fn defaults_for(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            timezone: "Australia/Sydney".to_string(),
            default_min_edge: 1.0,
            notifications_enabled: true,
            notify_min_edge: 1.0,
            odds_format: OddsFormat::Decimal,
            default_stake: 1.0,
            bankroll_units: 100.0,
            auto_settle_enabled: true,
            analytics_top_n: None,
            updated_at: Utc::now(),
        }
    }

    /// Reject out-of-range values before they are written.
    pub fn validate(&self) -> EdgeResult<()> {
        let (lo, hi) = Self::MIN_EDGE_RANGE;
        if self.timezone.trim().is_empty() {
            return Err(EdgeError::Validation("Timezone must not be empty".into()));
        }
        for (name, value) in [
            ("default_min_edge", self.default_min_edge),
            ("notify_min_edge", self.notify_min_edge),
        ] {
            if !value.is_finite() || value < lo || value > hi {
                return Err(EdgeError::Validation(format!(
                    "{name} must be between {lo} and {hi}"
                )));
            }
        }
        if !self.default_stake.is_finite() || self.default_stake < 0.0 {
            return Err(EdgeError::Validation(
                "default_stake must be non-negative".into(),
            ));
        }
        if !self.bankroll_units.is_finite() || self.bankroll_units <= 0.0 {
            return Err(EdgeError::Validation(
                "bankroll_units must be positive".into(),
            ));
        }
        if let Some(n) = self.analytics_top_n {
            if n == 0 || n > Self::MAX_TOP_N {
                return Err(EdgeError::Validation(format!(
                    "analytics_top_n must be between 1 and {}",
                    Self::MAX_TOP_N
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// User profiles
// ---------------------------------------------------------------------------

/// Account details shown on the profile page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub display_name: String,
    pub email: String,
    pub plan: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub const DEFAULT_PLAN: &'static str = "free";

    /// New profile on the default plan.
    pub fn new(user_id: &str, display_name: &str, email: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            display_name: display_name.trim().to_string(),
            email: email.trim().to_string(),
            plan: Self::DEFAULT_PLAN.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Change name and email, keeping plan and creation time.
    pub fn update(&mut self, display_name: &str, email: &str, now: DateTime<Utc>) {
        self.display_name = display_name.trim().to_string();
        self.email = email.trim().to_string();
        self.updated_at = now;
    }

    pub fn validate(&self) -> EdgeResult<()> {
        if self.display_name.is_empty() {
            return Err(EdgeError::Validation("Display name must not be empty".into()));
        }
        let well_formed = self
            .email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !well_formed {
            return Err(EdgeError::Validation("Email address is not valid".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Presentation rounding
// ---------------------------------------------------------------------------

/// Round to two decimal places, half away from zero.
///
/// Goes through `Decimal` so midpoints round on the decimal representation
/// rather than the binary one.
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for HORSEDGE.
#[derive(Debug, thiserror::Error)]
pub enum EdgeError {
    /// Bad request: rejected before any mutation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Bad reference: unknown race, runner or tip.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for EdgeError {
    fn from(err: sqlx::Error) -> Self {
        EdgeError::Storage(err.to_string())
    }
}

pub type EdgeResult<T> = std::result::Result<T, EdgeError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
