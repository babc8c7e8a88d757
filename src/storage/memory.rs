//! In-memory store.
//!
//! Mirrors the SQLite semantics (conditional settlement, result upsert,
//! quote upsert) behind a single `RwLock`, so every write is atomic with
//! respect to concurrent readers and writers.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::{
    apply_correction, ProfileStore, RaceReader, RaceWriter, ResultRepository, SettingsStore,
    TipRepository,
};
use crate::types::{
    Bookmaker, EdgeError, EdgeResult, NewRace, NewRunner, NewTip, OddsQuote, Race, RaceId,
    RaceResult, Runner, RunnerId, Tip, TipCorrection, TipId, TipResult, UserProfile,
    UserSettings,
};

#[derive(Default)]
struct Inner {
    races: BTreeMap<RaceId, Race>,
    runners: BTreeMap<RunnerId, Runner>,
    quotes: BTreeMap<(RunnerId, Bookmaker), OddsQuote>,
    tips: BTreeMap<TipId, Tip>,
    results: BTreeMap<(RaceId, RunnerId), RaceResult>,
    settings: HashMap<String, UserSettings>,
    profiles: HashMap<String, UserProfile>,
    next_race_id: RaceId,
    next_runner_id: RunnerId,
    next_tip_id: TipId,
}

/// Thread-safe in-memory implementation of every storage trait.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored result rows (for idempotency checks).
    pub async fn result_count(&self) -> usize {
        self.inner.read().await.results.len()
    }
}

#[async_trait]
impl RaceReader for MemoryStore {
    async fn race(&self, race_id: RaceId) -> EdgeResult<Option<Race>> {
        Ok(self.inner.read().await.races.get(&race_id).cloned())
    }

    async fn races_on(&self, date: NaiveDate, track: Option<String>) -> EdgeResult<Vec<Race>> {
        let inner = self.inner.read().await;
        let mut races: Vec<Race> = inner
            .races
            .values()
            .filter(|r| r.race_date == date)
            .filter(|r| track.as_deref().map_or(true, |t| r.track == t))
            .cloned()
            .collect();
        races.sort_by(|a, b| {
            a.track
                .cmp(&b.track)
                .then(a.race_number.cmp(&b.race_number))
        });
        Ok(races)
    }

    async fn tracks_on(&self, date: NaiveDate) -> EdgeResult<Vec<String>> {
        let inner = self.inner.read().await;
        let mut tracks: Vec<String> = inner
            .races
            .values()
            .filter(|r| r.race_date == date)
            .map(|r| r.track.clone())
            .collect();
        tracks.sort();
        tracks.dedup();
        Ok(tracks)
    }

    async fn runners(&self, race_id: RaceId) -> EdgeResult<Vec<Runner>> {
        let inner = self.inner.read().await;
        let mut runners: Vec<Runner> = inner
            .runners
            .values()
            .filter(|r| r.race_id == race_id)
            .cloned()
            .collect();
        runners.sort_by_key(|r| r.horse_number);
        Ok(runners)
    }

    async fn quotes(&self, race_id: RaceId) -> EdgeResult<Vec<OddsQuote>> {
        let inner = self.inner.read().await;
        Ok(inner
            .quotes
            .values()
            .filter(|q| {
                inner
                    .runners
                    .get(&q.runner_id)
                    .is_some_and(|r| r.race_id == race_id)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RaceWriter for MemoryStore {
    async fn insert_race(&self, race: NewRace) -> EdgeResult<Race> {
        let mut inner = self.inner.write().await;
        inner.next_race_id += 1;
        let stored = Race {
            id: inner.next_race_id,
            race_date: race.race_date,
            track: race.track,
            race_number: race.race_number,
            distance_m: race.distance_m,
            jump_time: race.jump_time,
            race_name: race.race_name,
            starters: race.starters,
            prize_pool: race.prize_pool,
            track_rating: race.track_rating,
        };
        inner.races.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn insert_runner(&self, runner: NewRunner) -> EdgeResult<Runner> {
        let mut inner = self.inner.write().await;
        if !inner.races.contains_key(&runner.race_id) {
            return Err(EdgeError::NotFound(format!("Race {} not found", runner.race_id)));
        }
        let duplicate = inner
            .runners
            .values()
            .any(|r| r.race_id == runner.race_id && r.horse_number == runner.horse_number);
        if duplicate {
            return Err(EdgeError::Validation(format!(
                "Horse number {} already entered in race {}",
                runner.horse_number, runner.race_id
            )));
        }
        inner.next_runner_id += 1;
        let stored = Runner {
            id: inner.next_runner_id,
            race_id: runner.race_id,
            horse_number: runner.horse_number,
            horse_name: runner.horse_name,
            barrier: runner.barrier,
            trainer: runner.trainer,
            jockey: runner.jockey,
            model_prob: runner.model_prob,
            predicted_price: runner.predicted_price,
        };
        inner.runners.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn upsert_quote(&self, quote: OddsQuote) -> EdgeResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.runners.contains_key(&quote.runner_id) {
            return Err(EdgeError::NotFound(format!("Runner {} not found", quote.runner_id)));
        }
        inner.quotes.insert((quote.runner_id, quote.bookmaker), quote);
        Ok(())
    }
}

#[async_trait]
impl TipRepository for MemoryStore {
    async fn insert_tip(&self, tip: NewTip) -> EdgeResult<Tip> {
        let mut inner = self.inner.write().await;
        inner.next_tip_id += 1;
        let stored = Tip {
            id: inner.next_tip_id,
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
        };
        inner.tips.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn tip(&self, tip_id: TipId) -> EdgeResult<Option<Tip>> {
        Ok(self.inner.read().await.tips.get(&tip_id).cloned())
    }

    async fn tips_for_user(&self, user_id: String) -> EdgeResult<Vec<Tip>> {
        let inner = self.inner.read().await;
        let mut tips: Vec<Tip> = inner
            .tips
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tips.sort_by(|a, b| b.tracked_at.cmp(&a.tracked_at).then(b.id.cmp(&a.id)));
        Ok(tips)
    }

    async fn pending_for_race(&self, race_id: RaceId) -> EdgeResult<Vec<Tip>> {
        let inner = self.inner.read().await;
        Ok(inner
            .tips
            .values()
            .filter(|t| t.race_id == race_id && t.result == TipResult::Pending)
            .cloned()
            .collect())
    }

    async fn update_stake_and_odds(
        &self,
        tip_id: TipId,
        stake: f64,
        odds_at_tip: f64,
    ) -> EdgeResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.tips.get_mut(&tip_id) {
            Some(tip) if tip.result == TipResult::Pending => {
                tip.stake = stake;
                tip.odds_at_tip = odds_at_tip;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn settle_tip(
        &self,
        tip_id: TipId,
        result: TipResult,
        settled_at: DateTime<Utc>,
    ) -> EdgeResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.tips.get_mut(&tip_id) {
            Some(tip) if tip.result == TipResult::Pending => {
                tip.result = result;
                tip.settled_at = Some(settled_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn correct_tip(&self, tip_id: TipId, correction: TipCorrection) -> EdgeResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.tips.get_mut(&tip_id) {
            Some(tip) => {
                apply_correction(tip, &correction);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_tip(&self, tip_id: TipId, user_id: String) -> EdgeResult<bool> {
        let mut inner = self.inner.write().await;
        let owned = inner
            .tips
            .get(&tip_id)
            .is_some_and(|t| t.user_id == user_id);
        if owned {
            inner.tips.remove(&tip_id);
        }
        Ok(owned)
    }
}

#[async_trait]
impl ResultRepository for MemoryStore {
    async fn upsert_result(&self, result: RaceResult) -> EdgeResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .results
            .insert((result.race_id, result.runner_id), result);
        Ok(())
    }

    async fn results_for_race(&self, race_id: RaceId) -> EdgeResult<Vec<RaceResult>> {
        let inner = self.inner.read().await;
        Ok(inner
            .results
            .range((race_id, RunnerId::MIN)..=(race_id, RunnerId::MAX))
            .map(|(_, r)| r.clone())
            .collect())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn settings(&self, user_id: String) -> EdgeResult<Option<UserSettings>> {
        Ok(self.inner.read().await.settings.get(&user_id).cloned())
    }

    async fn save_settings(&self, settings: UserSettings) -> EdgeResult<()> {
        let mut inner = self.inner.write().await;
        inner.settings.insert(settings.user_id.clone(), settings);
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn profile(&self, user_id: String) -> EdgeResult<Option<UserProfile>> {
        Ok(self.inner.read().await.profiles.get(&user_id).cloned())
    }

    async fn save_profile(&self, profile: UserProfile) -> EdgeResult<()> {
        let mut inner = self.inner.write().await;
        inner.profiles.insert(profile.user_id.clone(), profile);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
