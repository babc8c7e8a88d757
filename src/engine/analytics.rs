//! Analytics aggregator: P&L, ROI, CLV, drawdown and streaks.
//!
//! Works only on settled tips; pending tips are counted but never enter the
//! P&L. The aggregator never fails, and every ratio with a zero denominator
//! is reported as 0.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use futures::future::try_join_all;
use serde::Serialize;
use tracing::info;

use crate::storage::{RaceReader, ResultRepository, TipRepository};
use crate::types::{round2, EdgeResult, RaceId, RunnerId, Tip, TipResult};

/// A tip joined with the race context analytics needs.
#[derive(Debug, Clone, PartialEq)]
pub struct TipView {
    pub tip: Tip,
    pub track: String,
    /// Closing price of the tipped runner, if one was published.
    pub closing_odds: Option<f64>,
}

// ---------------------------------------------------------------------------
// Summary types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StreakType {
    Won,
    Lost,
    #[default]
    None,
}

/// Tips counted per edge% band, over all tips including pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct EdgeDistribution {
    /// edge < -5
    pub below_minus_5: usize,
    /// -5 <= edge < 0
    pub minus_5_to_0: usize,
    /// 0 <= edge < 5
    pub zero_to_5: usize,
    /// 5 <= edge < 10
    pub five_to_10: usize,
    /// edge >= 10
    pub above_10: usize,
}

impl EdgeDistribution {
    fn record(&mut self, edge_pct: f64) {
        let band = if edge_pct < -5.0 {
            &mut self.below_minus_5
        } else if edge_pct < 0.0 {
            &mut self.minus_5_to_0
        } else if edge_pct < 5.0 {
            &mut self.zero_to_5
        } else if edge_pct < 10.0 {
            &mut self.five_to_10
        } else {
            &mut self.above_10
        };
        *band += 1;
    }
}

/// Performance of one track or one bookmaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakdown {
    pub name: String,
    pub count: usize,
    pub wins: usize,
    pub profit: f64,
    /// Profit per tip, in percent of one unit.
    pub roi_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct AnalyticsSummary {
    pub total_bets: usize,
    pub settled_bets: usize,
    pub pending_bets: usize,
    pub wins: usize,
    pub losses: usize,
    pub total_stake: f64,
    /// Stake × odds summed over won tips.
    pub total_return_units: f64,
    pub profit_units: f64,
    pub roi_pct: f64,
    pub win_rate_pct: f64,
    pub avg_clv_pct: f64,
    pub clv_samples: usize,
    pub max_drawdown_units: f64,
    pub best_win_streak: usize,
    pub best_loss_streak: usize,
    pub current_streak_type: StreakType,
    pub current_streak: usize,
    /// Averages and maximum over all tips, pending included.
    pub avg_edge_pct: f64,
    pub avg_odds: f64,
    pub top_edge_pct: f64,
    /// Strike rate and profit over the most recently tracked tips.
    pub recent_win_rate_pct: f64,
    pub recent_profit_units: f64,
    pub edge_distribution: EdgeDistribution,
    pub by_track: Vec<Breakdown>,
    pub by_bookmaker: Vec<Breakdown>,
}

/// Number of most recently tracked tips behind the `recent_*` figures.
pub const RECENT_WINDOW: usize = 20;

// ---------------------------------------------------------------------------
// Per-tip figures
// ---------------------------------------------------------------------------

/// Stake used for P&L. Non-positive stakes count as one unit.
pub fn effective_stake(stake: f64) -> f64 {
    if stake.is_finite() && stake > 0.0 {
        stake
    } else {
        1.0
    }
}

/// Profit of a settled tip in units; 0 while pending.
pub fn tip_pnl(tip: &Tip) -> f64 {
    let stake = effective_stake(tip.stake);
    match tip.result {
        TipResult::Won => stake * (tip.odds_at_tip - 1.0),
        TipResult::Lost => -stake,
        TipResult::Pending => 0.0,
    }
}

/// Closing-line value in percent: positive when the tip beat the close.
pub fn clv_pct(odds_at_tip: f64, closing_odds: f64) -> Option<f64> {
    (closing_odds.is_finite() && closing_odds > 1.0)
        .then(|| (odds_at_tip / closing_odds - 1.0) * 100.0)
}

fn ratio_pct(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator * 100.0
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Summarise a user's tips. `top_n` truncates both breakdown lists.
pub fn summarize(views: &[TipView], top_n: Option<usize>) -> AnalyticsSummary {
    let mut settled: Vec<&TipView> = views.iter().filter(|v| v.tip.result.is_settled()).collect();
    settled.sort_by(|a, b| {
        a.tip
            .tracked_at
            .cmp(&b.tip.tracked_at)
            .then(a.tip.id.cmp(&b.tip.id))
    });

    let mut summary = AnalyticsSummary {
        total_bets: views.len(),
        settled_bets: settled.len(),
        pending_bets: views.len() - settled.len(),
        ..Default::default()
    };

    let mut total_stake = 0.0;
    let mut total_return = 0.0;
    let mut profit = 0.0;
    let mut clv_total = 0.0;
    let mut peak = 0.0_f64;
    let mut max_drawdown = 0.0_f64;
    let mut run: (StreakType, usize) = (StreakType::None, 0);

    for view in &settled {
        let tip = &view.tip;
        let won = tip.result == TipResult::Won;
        if won {
            summary.wins += 1;
        } else {
            summary.losses += 1;
        }

        total_stake += effective_stake(tip.stake);
        if won {
            total_return += effective_stake(tip.stake) * tip.odds_at_tip;
        }
        profit += tip_pnl(tip);
        peak = peak.max(profit);
        max_drawdown = max_drawdown.max(peak - profit);

        if let Some(clv) = view.closing_odds.and_then(|c| clv_pct(tip.odds_at_tip, c)) {
            clv_total += clv;
            summary.clv_samples += 1;
        }

        let kind = if won { StreakType::Won } else { StreakType::Lost };
        run = if run.0 == kind { (kind, run.1 + 1) } else { (kind, 1) };
        match kind {
            StreakType::Won => summary.best_win_streak = summary.best_win_streak.max(run.1),
            StreakType::Lost => summary.best_loss_streak = summary.best_loss_streak.max(run.1),
            StreakType::None => {}
        }
    }

    // The final run is the current streak counted back from the latest tip.
    summary.current_streak_type = run.0;
    summary.current_streak = run.1;

    summary.total_stake = round2(total_stake);
    summary.total_return_units = round2(total_return);
    summary.profit_units = round2(profit);
    summary.roi_pct = round2(ratio_pct(profit, total_stake));
    summary.win_rate_pct = round2(ratio_pct(summary.wins as f64, settled.len() as f64));
    summary.avg_clv_pct = if summary.clv_samples == 0 {
        0.0
    } else {
        round2(clv_total / summary.clv_samples as f64)
    };
    summary.max_drawdown_units = round2(max_drawdown);

    let count = views.len() as f64;
    if !views.is_empty() {
        summary.avg_edge_pct = round2(views.iter().map(|v| v.tip.edge_pct).sum::<f64>() / count);
        summary.avg_odds = round2(views.iter().map(|v| v.tip.odds_at_tip).sum::<f64>() / count);
        summary.top_edge_pct = round2(
            views
                .iter()
                .map(|v| v.tip.edge_pct)
                .fold(f64::NEG_INFINITY, f64::max),
        );
    }
    for view in views {
        summary.edge_distribution.record(view.tip.edge_pct);
    }

    let mut recent: Vec<&TipView> = views.iter().collect();
    recent.sort_by(|a, b| {
        b.tip
            .tracked_at
            .cmp(&a.tip.tracked_at)
            .then(b.tip.id.cmp(&a.tip.id))
    });
    recent.truncate(RECENT_WINDOW);
    let recent_settled: Vec<&Tip> = recent
        .iter()
        .map(|v| &v.tip)
        .filter(|t| t.result.is_settled())
        .collect();
    let recent_wins = recent_settled
        .iter()
        .filter(|t| t.result == TipResult::Won)
        .count();
    summary.recent_win_rate_pct =
        round2(ratio_pct(recent_wins as f64, recent_settled.len() as f64));
    summary.recent_profit_units = round2(recent_settled.iter().map(|t| tip_pnl(t)).sum());

    summary.by_track = breakdown(&settled, |v| v.track.clone(), top_n);
    summary.by_bookmaker = breakdown(&settled, |v| v.tip.bookmaker.id().to_string(), top_n);
    summary
}

fn breakdown<F>(settled: &[&TipView], key: F, top_n: Option<usize>) -> Vec<Breakdown>
where
    F: Fn(&TipView) -> String,
{
    let mut groups: BTreeMap<String, (usize, usize, f64)> = BTreeMap::new();
    for view in settled {
        let entry = groups.entry(key(view)).or_insert((0, 0, 0.0));
        entry.0 += 1;
        if view.tip.result == TipResult::Won {
            entry.1 += 1;
        }
        entry.2 += tip_pnl(&view.tip);
    }

    let mut rows: Vec<Breakdown> = groups
        .into_iter()
        .map(|(name, (count, wins, profit))| Breakdown {
            name,
            count,
            wins,
            profit: round2(profit),
            roi_pct: round2(ratio_pct(profit, count as f64)),
        })
        .collect();
    rows.sort_by(|a, b| b.profit.total_cmp(&a.profit).then_with(|| a.name.cmp(&b.name)));
    if let Some(n) = top_n {
        rows.truncate(n);
    }
    rows
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a user's tips joined with track names and closing prices.
pub async fn load_views<S>(store: &S, user_id: &str) -> EdgeResult<Vec<TipView>>
where
    S: RaceReader + TipRepository + ResultRepository + ?Sized,
{
    let tips = store.tips_for_user(user_id.to_string()).await?;
    let race_ids: Vec<RaceId> = tips
        .iter()
        .map(|t| t.race_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let races = try_join_all(race_ids.iter().map(|id| store.race(*id))).await?;
    let results = try_join_all(race_ids.iter().map(|id| store.results_for_race(*id))).await?;

    let tracks: HashMap<RaceId, String> = races
        .into_iter()
        .flatten()
        .map(|race| (race.id, race.track))
        .collect();
    let closing: HashMap<(RaceId, RunnerId), f64> = results
        .into_iter()
        .flatten()
        .filter_map(|r| r.usable_closing_odds().map(|odds| ((r.race_id, r.runner_id), odds)))
        .collect();

    Ok(tips
        .into_iter()
        .map(|tip| TipView {
            track: tracks
                .get(&tip.race_id)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string()),
            closing_odds: closing.get(&(tip.race_id, tip.runner_id)).copied(),
            tip,
        })
        .collect())
}

/// Load and summarise in one step.
pub async fn user_summary<S>(
    store: &S,
    user_id: &str,
    top_n: Option<usize>,
) -> EdgeResult<AnalyticsSummary>
where
    S: RaceReader + TipRepository + ResultRepository + ?Sized,
{
    let views = load_views(store, user_id).await?;
    let summary = summarize(&views, top_n);
    info!(
        user_id,
        settled = summary.settled_bets,
        pending = summary.pending_bets,
        profit = format!("{:.2}u", summary.profit_units),
        roi = format!("{:.1}%", summary.roi_pct),
        "Analytics computed"
    );
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
