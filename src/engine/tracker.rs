//! Tip tracker.
//!
//! Validates and records user-tracked tips, and applies the edits that are
//! allowed on them: stake/odds changes while pending, administrative
//! corrections at any time, and deletion.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::storage::{RaceReader, SettingsStore, TipRepository};
use crate::strategy::edge;
use crate::types::{
    round2, Bookmaker, EdgeError, EdgeResult, NewTip, RaceId, RunnerId, Tip, TipCorrection,
    TipId, TipResult, UserSettings,
};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A request to track a tip, as submitted by a caller.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackRequest {
    /// Filled in by the request layer when the caller omits it.
    #[serde(default)]
    pub user_id: String,
    pub race_id: RaceId,
    pub runner_id: RunnerId,
    pub bookmaker: String,
    pub odds_at_tip: f64,
    /// Defaults to the user's `default_stake`.
    #[serde(default)]
    pub stake: Option<f64>,
    /// Edge shown when the tip was taken. Recomputed from the runner's model
    /// probability when absent.
    #[serde(default)]
    pub edge_pct: Option<f64>,
}

/// Stake/odds edit on a pending tip.
#[derive(Debug, Clone, Deserialize)]
pub struct TipEdit {
    #[serde(default)]
    pub user_id: String,
    pub stake: f64,
    pub odds_at_tip: f64,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate_odds(odds: f64) -> EdgeResult<()> {
    if odds.is_finite() && odds > 1.0 {
        Ok(())
    } else {
        Err(EdgeError::Validation("Odds must be greater than 1.0.".into()))
    }
}

pub fn validate_stake(stake: f64) -> EdgeResult<()> {
    if stake.is_finite() && stake >= 0.0 {
        Ok(())
    } else {
        Err(EdgeError::Validation("Stake must be zero or more.".into()))
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Validate and record a tip. Nothing is written unless every check passes.
pub async fn track<S>(store: &S, request: TrackRequest, now: DateTime<Utc>) -> EdgeResult<Tip>
where
    S: RaceReader + TipRepository + SettingsStore + ?Sized,
{
    if request.user_id.trim().is_empty() {
        return Err(EdgeError::Validation("user_id is required.".into()));
    }
    let bookmaker: Bookmaker = request.bookmaker.parse()?;
    validate_odds(request.odds_at_tip)?;

    let stake = match request.stake {
        Some(stake) => stake,
        None => store
            .settings(request.user_id.clone())
            .await?
            .unwrap_or_else(|| UserSettings::defaults_for(&request.user_id))
            .default_stake,
    };
    validate_stake(stake)?;

    if store.race(request.race_id).await?.is_none() {
        return Err(EdgeError::NotFound(format!("Race {} not found", request.race_id)));
    }
    let runner = store
        .runners(request.race_id)
        .await?
        .into_iter()
        .find(|r| r.id == request.runner_id)
        .ok_or_else(|| {
            EdgeError::NotFound(format!(
                "Runner {} not found in race {}",
                request.runner_id, request.race_id
            ))
        })?;

    let edge_pct = match request.edge_pct {
        Some(e) if e.is_finite() => e,
        _ => round2(edge::edge_pct(runner.model_prob, request.odds_at_tip)),
    };

    let tip = store
        .insert_tip(NewTip {
            user_id: request.user_id,
            race_id: request.race_id,
            runner_id: request.runner_id,
            bookmaker,
            edge_pct,
            odds_at_tip: request.odds_at_tip,
            stake,
            tracked_at: now,
        })
        .await?;

    info!(
        tip_id = tip.id,
        user_id = %tip.user_id,
        race_id = tip.race_id,
        runner = %runner.horse_name,
        bookmaker = %tip.bookmaker,
        odds = format!("{:.2}", tip.odds_at_tip),
        edge = format!("{:.2}%", tip.edge_pct),
        "Tip tracked"
    );
    Ok(tip)
}

/// Fetch a tip owned by `user_id`. Another user's tip reads as not found.
pub async fn owned_tip<S>(store: &S, tip_id: TipId, user_id: &str) -> EdgeResult<Tip>
where
    S: TipRepository + ?Sized,
{
    store
        .tip(tip_id)
        .await?
        .filter(|t| t.user_id == user_id)
        .ok_or_else(|| EdgeError::NotFound(format!("Tip {tip_id} not found")))
}

/// Change stake and odds on a pending tip.
pub async fn edit<S>(store: &S, tip_id: TipId, edit: TipEdit) -> EdgeResult<Tip>
where
    S: TipRepository + ?Sized,
{
    validate_stake(edit.stake)?;
    validate_odds(edit.odds_at_tip)?;

    let tip = owned_tip(store, tip_id, &edit.user_id).await?;
    if tip.result.is_settled() {
        warn!(tip_id, result = %tip.result, "Edit rejected on settled tip");
        return Err(settled_edit_error());
    }

    // The pending guard is re-checked in the update itself.
    if !store
        .update_stake_and_odds(tip_id, edit.stake, edit.odds_at_tip)
        .await?
    {
        warn!(tip_id, "Edit lost race with settlement");
        return Err(settled_edit_error());
    }
    owned_tip(store, tip_id, &edit.user_id).await
}

fn settled_edit_error() -> EdgeError {
    EdgeError::Validation("Settled tips cannot be edited.".into())
}

/// Administrative correction of result, stake or odds, ignoring the
/// pending guard.
pub async fn correct<S>(
    store: &S,
    tip_id: TipId,
    mut correction: TipCorrection,
    now: DateTime<Utc>,
) -> EdgeResult<Tip>
where
    S: TipRepository + ?Sized,
{
    if let Some(stake) = correction.stake {
        validate_stake(stake)?;
    }
    if let Some(odds) = correction.odds_at_tip {
        validate_odds(odds)?;
    }
    correction.corrected_at.get_or_insert(now);

    let result = correction.result;
    if !store.correct_tip(tip_id, correction).await? {
        return Err(EdgeError::NotFound(format!("Tip {tip_id} not found")));
    }
    info!(tip_id, result = ?result.map(|r: TipResult| r.as_str()), "Tip corrected");

    store
        .tip(tip_id)
        .await?
        .ok_or_else(|| EdgeError::NotFound(format!("Tip {tip_id} not found")))
}

pub async fn delete<S>(store: &S, tip_id: TipId, user_id: &str) -> EdgeResult<()>
where
    S: TipRepository + ?Sized,
{
    if store.delete_tip(tip_id, user_id.to_string()).await? {
        info!(tip_id, user_id, "Tip deleted");
        Ok(())
    } else {
        Err(EdgeError::NotFound(format!("Tip {tip_id} not found")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, RaceWriter};
    use crate::types::{NewRace, NewRunner, Race, Runner};
    use chrono::{NaiveDate, NaiveTime};

    async fn make_store() -> (MemoryStore, Race, Runner) {
        let store = MemoryStore::new();
        let race = store
            .insert_race(NewRace {
                race_date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
                track: "Rosehill".to_string(),
                race_number: 3,
                distance_m: 1100,
                jump_time: NaiveTime::from_hms_opt(12, 45, 0).unwrap(),
                race_name: "Maiden Plate".to_string(),
                starters: 12,
                prize_pool: 50_000.0,
                track_rating: "Heavy 8".to_string(),
            })
            .await
            .unwrap();
        let runner = store
            .insert_runner(NewRunner {
                race_id: race.id,
                horse_number: 4,
                horse_name: "Spirit Level".to_string(),
                barrier: 7,
                trainer: "Gai Waterhouse".to_string(),
                jockey: "Tommy Berry".to_string(),
                model_prob: 0.25,
                predicted_price: 4.0,
            })
            .await
            .unwrap();
        (store, race, runner)
    }

    fn make_request(race: &Race, runner: &Runner) -> TrackRequest {
        TrackRequest {
            user_id: "demo".to_string(),
            race_id: race.id,
            runner_id: runner.id,
            bookmaker: "tab".to_string(),
            odds_at_tip: 5.0,
            stake: Some(2.0),
            edge_pct: None,
        }
    }

    #[tokio::test]
    async fn test_track_records_pending_tip() {
        let (store, race, runner) = make_store().await;
        let tip = track(&store, make_request(&race, &runner), Utc::now())
            .await
            .unwrap();
        assert_eq!(tip.result, TipResult::Pending);
        assert_eq!(tip.bookmaker, Bookmaker::Tab);
        assert_eq!(tip.edge_pct, 25.0);
        assert_eq!(tip.stake, 2.0);
    }

    #[tokio::test]
    async fn test_track_defaults_stake_from_settings() {
        let (store, race, runner) = make_store().await;
        let mut settings = UserSettings::defaults_for("demo");
        settings.default_stake = 3.5;
        store.save_settings(settings).await.unwrap();

        let mut request = make_request(&race, &runner);
        request.stake = None;
        let tip = track(&store, request, Utc::now()).await.unwrap();
        assert_eq!(tip.stake, 3.5);
    }

    #[tokio::test]
    async fn test_track_validation_errors() {
        let (store, race, runner) = make_store().await;

        let mut bad_book = make_request(&race, &runner);
        bad_book.bookmaker = "bet365".into();
        assert!(matches!(
            track(&store, bad_book, Utc::now()).await,
            Err(EdgeError::Validation(_))
        ));

        let mut evens_or_less = make_request(&race, &runner);
        evens_or_less.odds_at_tip = 1.0;
        assert!(matches!(
            track(&store, evens_or_less, Utc::now()).await,
            Err(EdgeError::Validation(_))
        ));

        let mut negative = make_request(&race, &runner);
        negative.stake = Some(-1.0);
        assert!(matches!(
            track(&store, negative, Utc::now()).await,
            Err(EdgeError::Validation(_))
        ));

        assert!(store.tips_for_user("demo".into()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_track_unknown_race_or_runner() {
        let (store, race, runner) = make_store().await;

        let mut wrong_race = make_request(&race, &runner);
        wrong_race.race_id = 999;
        assert!(matches!(
            track(&store, wrong_race, Utc::now()).await,
            Err(EdgeError::NotFound(_))
        ));

        let mut wrong_runner = make_request(&race, &runner);
        wrong_runner.runner_id = 999;
        assert!(matches!(
            track(&store, wrong_runner, Utc::now()).await,
            Err(EdgeError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_edit_pending_then_rejected_after_settlement() {
        let (store, race, runner) = make_store().await;
        let tip = track(&store, make_request(&race, &runner), Utc::now())
            .await
            .unwrap();

        let edited = edit(
            &store,
            tip.id,
            TipEdit { user_id: "demo".into(), stake: 4.0, odds_at_tip: 5.5 },
        )
        .await
        .unwrap();
        assert_eq!(edited.stake, 4.0);
        assert_eq!(edited.odds_at_tip, 5.5);

        store.settle_tip(tip.id, TipResult::Won, Utc::now()).await.unwrap();
        let err = edit(
            &store,
            tip.id,
            TipEdit { user_id: "demo".into(), stake: 9.0, odds_at_tip: 9.0 },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EdgeError::Validation(_)));
    }

    #[tokio::test]
    async fn test_edit_other_users_tip_is_not_found() {
        let (store, race, runner) = make_store().await;
        let tip = track(&store, make_request(&race, &runner), Utc::now())
            .await
            .unwrap();
        let err = edit(
            &store,
            tip.id,
            TipEdit { user_id: "intruder".into(), stake: 1.0, odds_at_tip: 2.0 },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EdgeError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_correct_reopens_settled_tip() {
        let (store, race, runner) = make_store().await;
        let tip = track(&store, make_request(&race, &runner), Utc::now())
            .await
            .unwrap();
        store.settle_tip(tip.id, TipResult::Lost, Utc::now()).await.unwrap();

        let reopened = correct(
            &store,
            tip.id,
            TipCorrection { result: Some(TipResult::Pending), ..Default::default() },
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(reopened.result, TipResult::Pending);
        assert!(reopened.settled_at.is_none());

        let err = correct(&store, 999, TipCorrection::default(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, EdgeError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, race, runner) = make_store().await;
        let tip = track(&store, make_request(&race, &runner), Utc::now())
            .await
            .unwrap();
        delete(&store, tip.id, "demo").await.unwrap();
        assert!(matches!(
            delete(&store, tip.id, "demo").await,
            Err(EdgeError::NotFound(_))
        ));
    }
}
