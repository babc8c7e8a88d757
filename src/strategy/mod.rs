//! Strategy engine: probability normalisation, best-price selection,
//! edge calculation and Kelly stake suggestions.
//!
//! Everything here is pure: inputs in, board out. Storage access lives in
//! `engine::scanner`.

pub mod edge;
pub mod kelly;
pub mod normalizer;
pub mod selector;

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use tracing::debug;

use crate::types::{
    round2, Bookmaker, BookmakerSet, OddsFormat, OddsQuote, Race, RaceId, Runner, RunnerId,
};
use edge::{EdgeCalculator, EdgeConfig};
use kelly::KellyCalculator;
use normalizer::{fair_price_pct, normalize, Strength};

// ---------------------------------------------------------------------------
// Board types
// ---------------------------------------------------------------------------

/// Options that shape one board computation.
#[derive(Debug, Clone)]
pub struct BoardOptions {
    /// Inclusive edge% threshold for the `qualifies` flag.
    pub min_edge: f64,
    /// When set, rows carry a half-Kelly stake suggestion.
    pub bankroll_units: Option<f64>,
    pub odds_format: OddsFormat,
}

impl Default for BoardOptions {
    fn default() -> Self {
        Self {
            min_edge: 0.0,
            bankroll_units: None,
            odds_format: OddsFormat::Decimal,
        }
    }
}

/// One runner on a race board. Numbers are rounded to 2 dp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardRow {
    pub runner_id: RunnerId,
    pub horse_number: u32,
    pub horse_name: String,
    pub barrier: u32,
    pub trainer: String,
    pub jockey: String,
    pub predicted_price: f64,
    /// Implied probability of the model's fair price.
    pub predicted_price_pct: f64,
    pub market_odds: f64,
    pub display_odds: String,
    pub best_bookmaker: Bookmaker,
    pub best_book_symbol: &'static str,
    pub bet_url: String,
    pub model_prob_pct: f64,
    pub bookmaker_pct: f64,
    pub edge_pct: f64,
    pub qualifies: bool,
    pub suggested_stake: Option<f64>,
}

/// Race-level percentage totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardTotals {
    pub model_pct_total: f64,
    /// Sum of raw bookmaker-implied percentages; exceeds 100 by the overround.
    pub bookmaker_pct_total: f64,
    pub overround_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceBoard {
    pub race: Race,
    pub min_edge: f64,
    pub selected_books: Vec<String>,
    pub rows: Vec<BoardRow>,
    pub totals: BoardTotals,
}

/// A board row lifted into the cross-race daily list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTip {
    pub race_id: RaceId,
    pub race_date: NaiveDate,
    pub track: String,
    pub race_number: u32,
    pub jump_time: NaiveTime,
    #[serde(flatten)]
    pub row: BoardRow,
    /// Edge clears the user's notification threshold.
    pub notify: bool,
}

/// Per-race summary used to badge races that carry tips.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceSignal {
    pub race_id: RaceId,
    pub has_tip: bool,
    pub tip_count: usize,
    pub max_edge: f64,
}

// ---------------------------------------------------------------------------
// Board builder
// ---------------------------------------------------------------------------

/// Pipelines best-price selection → probability normalisation → edge
/// calculation → stake suggestion for a single race.
pub struct BoardBuilder {
    edge: EdgeCalculator,
    kelly: KellyCalculator,
    options: BoardOptions,
}

impl BoardBuilder {
    pub fn new(options: BoardOptions) -> Self {
        Self {
            edge: EdgeCalculator::new(EdgeConfig {
                min_edge: options.min_edge,
            }),
            kelly: KellyCalculator::default(),
            options,
        }
    }

    pub fn options(&self) -> &BoardOptions {
        &self.options
    }

    /// Build the board for `race`.
    ///
    /// Runners without a quote from an enabled bookmaker are left off the
    /// board, and the model distribution is renormalised over the runners
    /// that remain.
    pub fn build(
        &self,
        race: &Race,
        runners: &[Runner],
        quotes: &[OddsQuote],
        books: &BookmakerSet,
    ) -> RaceBoard {
        // Step 1: best price per runner
        let best = selector::best_by_runner(quotes, books);
        let quoted: BTreeMap<RunnerId, &Runner> = runners
            .iter()
            .filter(|r| r.race_id == race.id && best.contains_key(&r.id))
            .map(|r| (r.id, r))
            .collect();

        // Step 2: renormalise fair prices over the quoted field
        let strengths: BTreeMap<RunnerId, Strength> = quoted
            .iter()
            .map(|(id, r)| (*id, Strength::FairPrice(r.predicted_price)))
            .collect();
        let probs = normalize(&strengths);

        // Step 3: edge per runner
        let mut rows = Vec::with_capacity(quoted.len());
        let mut model_total = 0.0;
        let mut book_total = 0.0;
        for (runner_id, runner) in &quoted {
            let quote = best[runner_id];
            let model_prob = probs.get(runner_id).copied().unwrap_or(0.0);
            let edge = self.edge.evaluate(model_prob, quote.price);
            model_total += edge.model_pct;
            book_total += edge.bookmaker_pct;

            let suggested_stake = self
                .options
                .bankroll_units
                .and_then(|bankroll| self.kelly.suggested_stake(model_prob, quote.price, bankroll))
                .map(round2);

            rows.push(BoardRow {
                runner_id: *runner_id,
                horse_number: runner.horse_number,
                horse_name: runner.horse_name.clone(),
                barrier: runner.barrier,
                trainer: runner.trainer.clone(),
                jockey: runner.jockey.clone(),
                predicted_price: round2(runner.predicted_price),
                predicted_price_pct: round2(fair_price_pct(runner.predicted_price)),
                market_odds: round2(quote.price),
                display_odds: self.options.odds_format.render(quote.price),
                best_bookmaker: quote.bookmaker,
                best_book_symbol: quote.bookmaker.symbol(),
                bet_url: quote.bet_url.clone(),
                model_prob_pct: round2(edge.model_pct),
                bookmaker_pct: round2(edge.bookmaker_pct),
                edge_pct: round2(edge.edge_pct),
                qualifies: edge.qualifies,
                suggested_stake,
            });
        }

        rows.sort_by_key(|r| (r.horse_number, r.runner_id));

        let totals = BoardTotals {
            model_pct_total: round2(model_total),
            bookmaker_pct_total: round2(book_total),
            overround_pct: if rows.is_empty() {
                0.0
            } else {
                round2(book_total - 100.0)
            },
        };

        debug!(
            race_id = race.id,
            runners = runners.len(),
            rows = rows.len(),
            qualifying = rows.iter().filter(|r| r.qualifies).count(),
            overround = format!("{:.2}%", totals.overround_pct),
            "Board built"
        );

        RaceBoard {
            race: race.clone(),
            min_edge: self.options.min_edge,
            selected_books: books.ids(),
            rows,
            totals,
        }
    }
}

// ---------------------------------------------------------------------------
// Cross-race views
// ---------------------------------------------------------------------------

/// Collect qualifying rows from every board into one list, best edge first.
///
/// Ties on edge are ordered by race then horse number so the list is stable.
/// `notify_min_edge` is `None` when the user has notifications turned off.
pub fn collect_daily_tips(
    boards: &[RaceBoard],
    min_edge: f64,
    notify_min_edge: Option<f64>,
) -> Vec<DailyTip> {
    let mut tips: Vec<DailyTip> = boards
        .iter()
        .flat_map(|board| {
            board
                .rows
                .iter()
                .filter(move |row| edge::qualifies(row.edge_pct, min_edge))
                .map(move |row| DailyTip {
                    race_id: board.race.id,
                    race_date: board.race.race_date,
                    track: board.race.track.clone(),
                    race_number: board.race.race_number,
                    jump_time: board.race.jump_time,
                    row: row.clone(),
                    notify: notify_min_edge
                        .map(|threshold| edge::qualifies(row.edge_pct, threshold))
                        .unwrap_or(false),
                })
        })
        .collect();

    tips.sort_by(|a, b| {
        b.row
            .edge_pct
            .total_cmp(&a.row.edge_pct)
            .then_with(|| a.race_id.cmp(&b.race_id))
            .then_with(|| a.row.horse_number.cmp(&b.row.horse_number))
    });
    tips
}

impl RaceSignal {
    /// Summarise a board against a recommendation threshold.
    pub fn from_board(board: &RaceBoard, rec_edge: f64) -> Self {
        let tip_count = board
            .rows
            .iter()
            .filter(|r| edge::qualifies(r.edge_pct, rec_edge))
            .count();
        let max_edge = board
            .rows
            .iter()
            .map(|r| r.edge_pct)
            .fold(None, |acc: Option<f64>, e| Some(acc.map_or(e, |m| m.max(e))))
            .unwrap_or(0.0);
        Self {
            race_id: board.race.id,
            has_tip: tip_count > 0,
            tip_count,
            max_edge,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
