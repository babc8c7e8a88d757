//! Settlement engine.
//!
//! `settle` is pure: pending tips and published results in, transitions out.
//! The async passes around it load the inputs, then persist each transition
//! with the repository's pending-only update and count only the rows that
//! actually changed. Running a pass twice, or two passes at once, therefore
//! converges on the same state.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::storage::{RaceReader, ResultRepository, TipRepository};
use crate::types::{
    EdgeError, EdgeResult, RaceId, RaceResult, RunnerId, Tip, TipId, TipResult,
};

// ---------------------------------------------------------------------------
// Pure settlement
// ---------------------------------------------------------------------------

/// One pending → won/lost transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub tip_id: TipId,
    pub race_id: RaceId,
    pub runner_id: RunnerId,
    pub result: TipResult,
    pub settled_at: DateTime<Utc>,
}

/// Results indexed by (race, runner).
pub type ResultIndex = HashMap<(RaceId, RunnerId), RaceResult>;

/// Decide the outcome of every pending tip that has a published result.
///
/// Tips without a result are left out (they stay pending). Tips that are
/// already settled are ignored.
pub fn settle(pending: &[Tip], results: &ResultIndex, now: DateTime<Utc>) -> Vec<Settlement> {
    pending
        .iter()
        .filter(|tip| tip.result == TipResult::Pending)
        .filter_map(|tip| {
            results
                .get(&(tip.race_id, tip.runner_id))
                .map(|result| Settlement {
                    tip_id: tip.id,
                    race_id: tip.race_id,
                    runner_id: tip.runner_id,
                    result: TipResult::from_finish(result.finish_pos),
                    settled_at: now,
                })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Settlement passes
// ---------------------------------------------------------------------------

/// Outcome of one settlement pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SettlementReport {
    /// Pending tips examined.
    pub checked: usize,
    /// Transitions that were actually written.
    pub settled: usize,
    pub won: usize,
    pub lost: usize,
    /// Pending tips whose race has no result for their runner yet.
    pub awaiting: usize,
}

/// Settle every pending tip belonging to `user_id`.
pub async fn settle_user<T, R>(
    tips: &T,
    results: &R,
    user_id: &str,
    now: DateTime<Utc>,
) -> EdgeResult<SettlementReport>
where
    T: TipRepository + ?Sized,
    R: ResultRepository + ?Sized,
{
    let pending: Vec<Tip> = tips
        .tips_for_user(user_id.to_string())
        .await?
        .into_iter()
        .filter(|t| t.result == TipResult::Pending)
        .collect();

    let report = run_pass(tips, results, &pending, now).await?;
    info!(
        user_id,
        checked = report.checked,
        settled = report.settled,
        won = report.won,
        lost = report.lost,
        "Settlement pass complete"
    );
    Ok(report)
}

/// Settle every user's pending tips on one race.
pub async fn settle_race<T, R>(
    tips: &T,
    results: &R,
    race_id: RaceId,
    now: DateTime<Utc>,
) -> EdgeResult<SettlementReport>
where
    T: TipRepository + ?Sized,
    R: ResultRepository + ?Sized,
{
    let pending = tips.pending_for_race(race_id).await?;
    let report = run_pass(tips, results, &pending, now).await?;
    info!(
        race_id,
        checked = report.checked,
        settled = report.settled,
        "Race settlement pass complete"
    );
    Ok(report)
}

async fn run_pass<T, R>(
    tips: &T,
    results: &R,
    pending: &[Tip],
    now: DateTime<Utc>,
) -> EdgeResult<SettlementReport>
where
    T: TipRepository + ?Sized,
    R: ResultRepository + ?Sized,
{
    let index = load_results(results, pending).await?;
    let transitions = settle(pending, &index, now);

    let mut report = SettlementReport {
        checked: pending.len(),
        awaiting: pending.len() - transitions.len(),
        ..Default::default()
    };

    for transition in &transitions {
        let applied = tips
            .settle_tip(transition.tip_id, transition.result, transition.settled_at)
            .await?;
        if !applied {
            debug!(tip_id = transition.tip_id, "Tip already settled elsewhere");
            continue;
        }
        report.settled += 1;
        match transition.result {
            TipResult::Won => report.won += 1,
            TipResult::Lost => report.lost += 1,
            TipResult::Pending => {}
        }
    }
    Ok(report)
}

/// Fetch results for every distinct race among `pending`, concurrently.
async fn load_results<R>(results: &R, pending: &[Tip]) -> EdgeResult<ResultIndex>
where
    R: ResultRepository + ?Sized,
{
    let race_ids: BTreeSet<RaceId> = pending.iter().map(|t| t.race_id).collect();
    let per_race =
        try_join_all(race_ids.into_iter().map(|id| results.results_for_race(id))).await?;
    Ok(per_race
        .into_iter()
        .flatten()
        .map(|r| ((r.race_id, r.runner_id), r))
        .collect())
}

// ---------------------------------------------------------------------------
// Result publication
// ---------------------------------------------------------------------------

/// One runner's official placing as submitted for publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub runner_id: RunnerId,
    pub finish_pos: u32,
    #[serde(default)]
    pub closing_odds: Option<f64>,
}

/// Validate and upsert a race's results. Returns the number of rows written.
///
/// Every entry is checked before anything is written. Republishing a
/// runner's result overwrites the previous row.
pub async fn publish_results<S>(
    store: &S,
    race_id: RaceId,
    entries: &[ResultEntry],
    now: DateTime<Utc>,
) -> EdgeResult<usize>
where
    S: RaceReader + ResultRepository + ?Sized,
{
    if store.race(race_id).await?.is_none() {
        return Err(EdgeError::NotFound(format!("Race {race_id} not found")));
    }
    if entries.is_empty() {
        return Err(EdgeError::Validation("No results supplied.".into()));
    }

    let field: HashSet<RunnerId> = store
        .runners(race_id)
        .await?
        .into_iter()
        .map(|r| r.id)
        .collect();
    let mut seen = HashSet::new();
    for entry in entries {
        if !field.contains(&entry.runner_id) {
            return Err(EdgeError::NotFound(format!(
                "Runner {} is not in race {race_id}",
                entry.runner_id
            )));
        }
        if entry.finish_pos == 0 {
            return Err(EdgeError::Validation(
                "Finish position must be 1 or greater.".into(),
            ));
        }
        if !seen.insert(entry.runner_id) {
            return Err(EdgeError::Validation(format!(
                "Runner {} listed more than once",
                entry.runner_id
            )));
        }
        if let Some(odds) = entry.closing_odds {
            if !odds.is_finite() || odds <= 1.0 {
                warn!(race_id, runner_id = entry.runner_id, odds, "Closing odds ignored for CLV");
            }
        }
    }

    for entry in entries {
        store
            .upsert_result(RaceResult {
                race_id,
                runner_id: entry.runner_id,
                finish_pos: entry.finish_pos,
                closing_odds: entry.closing_odds,
                published_at: now,
            })
            .await?;
    }

    info!(race_id, results = entries.len(), "Results published");
    Ok(entries.len())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
