//! Persistence layer.
//!
//! Defines the storage traits the engine consumes and provides two
//! implementations:
//! - `SqliteStore`: sqlx-backed SQLite database used by the binary
//! - `MemoryStore`: in-process store for tests and embedding
//!
//! Implementations guarantee single-row atomicity only: the pending check
//! and the state change of one tip are a single conditional update, and a
//! result publication is a single upsert on (race, runner).

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

#[cfg(test)]
use mockall::automock;

use crate::types::{
    EdgeResult, NewRace, NewRunner, NewTip, OddsQuote, Race, RaceId, RaceResult, Runner, Tip,
    TipCorrection, TipId, TipResult, UserProfile, UserSettings,
};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Read access to races, runners and current quotes.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RaceReader: Send + Sync {
    async fn race(&self, race_id: RaceId) -> EdgeResult<Option<Race>>;

    /// Races on `date`, optionally restricted to one track, ordered by
    /// track then race number.
    async fn races_on(&self, date: NaiveDate, track: Option<String>) -> EdgeResult<Vec<Race>>;

    /// Distinct tracks racing on `date`, sorted.
    async fn tracks_on(&self, date: NaiveDate) -> EdgeResult<Vec<String>>;

    async fn runners(&self, race_id: RaceId) -> EdgeResult<Vec<Runner>>;

    /// Every bookmaker quote for every runner in the race.
    async fn quotes(&self, race_id: RaceId) -> EdgeResult<Vec<OddsQuote>>;
}

/// Write access used by the data collaborator that loads race cards.
#[async_trait]
pub trait RaceWriter: Send + Sync {
    async fn insert_race(&self, race: NewRace) -> EdgeResult<Race>;

    async fn insert_runner(&self, runner: NewRunner) -> EdgeResult<Runner>;

    /// Insert or replace the quote keyed by (runner, bookmaker).
    async fn upsert_quote(&self, quote: OddsQuote) -> EdgeResult<()>;
}

/// Tracked tips.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TipRepository: Send + Sync {
    async fn insert_tip(&self, tip: NewTip) -> EdgeResult<Tip>;

    async fn tip(&self, tip_id: TipId) -> EdgeResult<Option<Tip>>;

    /// All tips for a user, most recently tracked first.
    async fn tips_for_user(&self, user_id: String) -> EdgeResult<Vec<Tip>>;

    /// Pending tips on one race, across all users.
    async fn pending_for_race(&self, race_id: RaceId) -> EdgeResult<Vec<Tip>>;

    /// Update stake and odds only if the tip is still pending.
    /// Returns whether a row changed.
    async fn update_stake_and_odds(
        &self,
        tip_id: TipId,
        stake: f64,
        odds_at_tip: f64,
    ) -> EdgeResult<bool>;

    /// Move a pending tip to `result`, stamping `settled_at`.
    /// Returns `false` when the tip was no longer pending.
    async fn settle_tip(
        &self,
        tip_id: TipId,
        result: TipResult,
        settled_at: DateTime<Utc>,
    ) -> EdgeResult<bool>;

    /// Administrative override that ignores the pending guard.
    async fn correct_tip(&self, tip_id: TipId, correction: TipCorrection) -> EdgeResult<bool>;

    async fn delete_tip(&self, tip_id: TipId, user_id: String) -> EdgeResult<bool>;
}

/// Published race results.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResultRepository: Send + Sync {
    /// Insert or overwrite the result for (race, runner).
    async fn upsert_result(&self, result: RaceResult) -> EdgeResult<()>;

    async fn results_for_race(&self, race_id: RaceId) -> EdgeResult<Vec<RaceResult>>;
}

/// Per-user settings.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Stored settings; `None` for a user who never saved any.
    async fn settings(&self, user_id: String) -> EdgeResult<Option<UserSettings>>;

    async fn save_settings(&self, settings: UserSettings) -> EdgeResult<()>;
}

/// Per-user account profiles.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn profile(&self, user_id: String) -> EdgeResult<Option<UserProfile>>;

    /// Insert or replace the profile keyed by user id.
    async fn save_profile(&self, profile: UserProfile) -> EdgeResult<()>;
}

/// Everything the request layer needs from one backing store.
pub trait Store:
    RaceReader + RaceWriter + TipRepository + ResultRepository + SettingsStore + ProfileStore
{
}

impl<T> Store for T where
    T: RaceReader
        + RaceWriter
        + TipRepository
        + ResultRepository
        + SettingsStore
        + ProfileStore
{
}

/// Apply an administrative correction to a tip in place.
///
/// Shared by both stores so they agree on how `settled_at` moves.
pub(crate) fn apply_correction(tip: &mut Tip, correction: &TipCorrection) {
    if let Some(stake) = correction.stake {
        tip.stake = stake;
    }
    if let Some(odds) = correction.odds_at_tip {
        tip.odds_at_tip = odds;
    }
    if let Some(result) = correction.result {
        tip.result = result;
        if result.is_settled() {
            if tip.settled_at.is_none() {
                tip.settled_at = Some(correction.corrected_at.unwrap_or_else(Utc::now));
            }
        } else {
            tip.settled_at = None;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Bookmaker;
    use chrono::TimeZone;

    fn make_tip(result: TipResult) -> Tip {
        Tip {
            id: 1,
            user_id: "demo".to_string(),
            race_id: 1,
            runner_id: 10,
            bookmaker: Bookmaker::Tab,
            edge_pct: 5.0,
            odds_at_tip: 4.0,
            stake: 1.0,
            result,
            tracked_at: Utc.with_ymd_and_hms(2026, 10, 18, 1, 0, 0).unwrap(),
            settled_at: None,
        }
    }

    #[test]
    fn test_correction_settles_and_stamps() {
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 5, 0, 0).unwrap();
        let mut tip = make_tip(TipResult::Pending);
        apply_correction(
            &mut tip,
            &TipCorrection {
                result: Some(TipResult::Won),
                corrected_at: Some(at),
                ..Default::default()
            },
        );
        assert_eq!(tip.result, TipResult::Won);
        assert_eq!(tip.settled_at, Some(at));
    }

    #[test]
    fn test_correction_back_to_pending_clears_stamp() {
        let mut tip = make_tip(TipResult::Lost);
        tip.settled_at = Some(Utc::now());
        apply_correction(
            &mut tip,
            &TipCorrection {
                result: Some(TipResult::Pending),
                stake: Some(3.0),
                ..Default::default()
            },
        );
        assert_eq!(tip.result, TipResult::Pending);
        assert!(tip.settled_at.is_none());
        assert_eq!(tip.stake, 3.0);
    }

    #[test]
    fn test_correction_keeps_existing_stamp() {
        let first = Utc.with_ymd_and_hms(2026, 10, 18, 5, 0, 0).unwrap();
        let mut tip = make_tip(TipResult::Lost);
        tip.settled_at = Some(first);
        apply_correction(
            &mut tip,
            &TipCorrection {
                result: Some(TipResult::Won),
                odds_at_tip: Some(5.5),
                corrected_at: Some(Utc::now()),
                ..Default::default()
            },
        );
        assert_eq!(tip.settled_at, Some(first));
        assert_eq!(tip.odds_at_tip, 5.5);
    }
}
