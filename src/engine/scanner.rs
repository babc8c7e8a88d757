//! Race scanner.
//!
//! Loads race cards and quotes from storage and runs them through the
//! board builder: one race for the board view, or every race on a date
//! for the daily tips list and the race signals.

use chrono::NaiveDate;
use futures::future::try_join_all;
use tracing::{debug, info};

use crate::storage::RaceReader;
use crate::strategy::{collect_daily_tips, BoardBuilder, BoardOptions, DailyTip, RaceBoard, RaceSignal};
use crate::types::{BookmakerSet, EdgeError, EdgeResult, Race, RaceId};

pub struct RaceScanner<'a, S: ?Sized> {
    store: &'a S,
    books: BookmakerSet,
}

impl<'a, S> RaceScanner<'a, S>
where
    S: RaceReader + ?Sized,
{
    /// Create a scanner restricted to `books`.
    pub fn new(store: &'a S, books: BookmakerSet) -> Self {
        Self { store, books }
    }

    pub fn books(&self) -> &BookmakerSet {
        &self.books
    }

    /// Board for a single race.
    pub async fn board(&self, race_id: RaceId, options: BoardOptions) -> EdgeResult<RaceBoard> {
        let race = self
            .store
            .race(race_id)
            .await?
            .ok_or_else(|| EdgeError::NotFound(format!("Race {race_id} not found")))?;
        let board = self.build(race, &BoardBuilder::new(options)).await?;

        info!(
            race_id,
            track = %board.race.track,
            rows = board.rows.len(),
            qualifying = board.rows.iter().filter(|r| r.qualifies).count(),
            books = board.selected_books.join(","),
            "Race board built"
        );
        Ok(board)
    }

    /// Boards for every race on `date`, optionally at one track.
    pub async fn boards_on(
        &self,
        date: NaiveDate,
        track: Option<String>,
        options: BoardOptions,
    ) -> EdgeResult<Vec<RaceBoard>> {
        let races = self.store.races_on(date, track).await?;
        let builder = BoardBuilder::new(options);
        let boards = try_join_all(races.into_iter().map(|race| self.build(race, &builder))).await?;
        debug!(%date, races = boards.len(), "Boards built for date");
        Ok(boards)
    }

    /// Qualifying rows across the day's races, best edge first.
    pub async fn daily_tips(
        &self,
        date: NaiveDate,
        options: BoardOptions,
        notify_min_edge: Option<f64>,
    ) -> EdgeResult<Vec<DailyTip>> {
        let min_edge = options.min_edge;
        let boards = self.boards_on(date, None, options).await?;
        let tips = collect_daily_tips(&boards, min_edge, notify_min_edge);

        info!(
            %date,
            races = boards.len(),
            tips = tips.len(),
            min_edge = format!("{min_edge:.2}%"),
            "Daily tips collected"
        );
        Ok(tips)
    }

    /// Per-race tip counts and best edge for the day.
    pub async fn signals(&self, date: NaiveDate, rec_edge: f64) -> EdgeResult<Vec<RaceSignal>> {
        let options = BoardOptions {
            min_edge: rec_edge,
            ..Default::default()
        };
        let boards = self.boards_on(date, None, options).await?;
        Ok(boards
            .iter()
            .map(|board| RaceSignal::from_board(board, rec_edge))
            .collect())
    }

    async fn build(&self, race: Race, builder: &BoardBuilder) -> EdgeResult<RaceBoard> {
        let (runners, quotes) =
            futures::try_join!(self.store.runners(race.id), self.store.quotes(race.id))?;
        Ok(builder.build(&race, &runners, &quotes, &self.books))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MockRaceReader;
    use crate::types::{Bookmaker, OddsQuote, Runner};
    use chrono::{NaiveTime, Utc};

    fn make_race(id: RaceId, number: u32) -> Race {
        Race {
            id,
            race_date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
            track: "Flemington".to_string(),
            race_number: number,
            distance_m: 1200,
            jump_time: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
            race_name: format!("Race {number}"),
            starters: 2,
            prize_pool: 60_000.0,
            track_rating: "Good 4".to_string(),
        }
    }

    fn make_runner(id: i64, race_id: RaceId, number: u32, fair_price: f64) -> Runner {
        Runner {
            id,
            race_id,
            horse_number: number,
            horse_name: format!("Horse {id}"),
            barrier: number,
            trainer: "T".to_string(),
            jockey: "J".to_string(),
            model_prob: 1.0 / fair_price,
            predicted_price: fair_price,
        }
    }

    fn make_quote(runner_id: i64, bookmaker: Bookmaker, price: f64) -> OddsQuote {
        OddsQuote {
            runner_id,
            bookmaker,
            price,
            bet_url: format!("https://example.com/{runner_id}"),
            updated_at: Utc::now(),
        }
    }

    /// Race 1: evens pair priced at 2.2 and 1.8 (edges +10, −10).
    /// Race 2: evens pair priced at 2.1 and 1.9 (edges +5, −5).
    fn make_reader() -> MockRaceReader {
        let mut reader = MockRaceReader::new();
        reader
            .expect_race()
            .returning(|id| Ok((id <= 2).then(|| make_race(id, id as u32))));
        reader
            .expect_races_on()
            .returning(|_, _| Ok(vec![make_race(1, 1), make_race(2, 2)]));
        reader.expect_runners().returning(|race_id| {
            let base = race_id * 10;
            Ok(vec![
                make_runner(base + 1, race_id, 1, 2.0),
                make_runner(base + 2, race_id, 2, 2.0),
            ])
        });
        reader.expect_quotes().returning(|race_id| {
            let base = race_id * 10;
            let (a, b) = if race_id == 1 { (2.2, 1.8) } else { (2.1, 1.9) };
            Ok(vec![
                make_quote(base + 1, Bookmaker::Tab, a),
                make_quote(base + 2, Bookmaker::Neds, b),
            ])
        });
        reader
    }

    #[tokio::test]
    async fn test_board_for_unknown_race() {
        let reader = make_reader();
        let scanner = RaceScanner::new(&reader, BookmakerSet::all());
        let err = scanner.board(7, BoardOptions::default()).await.unwrap_err();
        assert!(matches!(err, EdgeError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_board_edges() {
        let reader = make_reader();
        let scanner = RaceScanner::new(&reader, BookmakerSet::all());
        let board = scanner.board(1, BoardOptions::default()).await.unwrap();
        let edges: Vec<f64> = board.rows.iter().map(|r| r.edge_pct).collect();
        assert_eq!(edges, vec![10.0, -10.0]);
    }

    #[tokio::test]
    async fn test_board_respects_selected_books() {
        let reader = make_reader();
        let scanner = RaceScanner::new(&reader, BookmakerSet::new([Bookmaker::Tab]).unwrap());
        let board = scanner.board(1, BoardOptions::default()).await.unwrap();
        assert_eq!(board.rows.len(), 1);
        assert_eq!(board.rows[0].best_bookmaker, Bookmaker::Tab);
        assert_eq!(board.selected_books, vec!["tab"]);
    }

    #[tokio::test]
    async fn test_daily_tips_across_races() {
        let reader = make_reader();
        let scanner = RaceScanner::new(&reader, BookmakerSet::all());
        let date = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let options = BoardOptions {
            min_edge: 1.0,
            ..Default::default()
        };
        let tips = scanner.daily_tips(date, options, Some(8.0)).await.unwrap();
        let summary: Vec<(RaceId, f64, bool)> = tips
            .iter()
            .map(|t| (t.race_id, t.row.edge_pct, t.notify))
            .collect();
        assert_eq!(summary, vec![(1, 10.0, true), (2, 5.0, false)]);
    }

    #[tokio::test]
    async fn test_signals() {
        let reader = make_reader();
        let scanner = RaceScanner::new(&reader, BookmakerSet::all());
        let date = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let signals = scanner.signals(date, 6.0).await.unwrap();
        assert_eq!(signals.len(), 2);
        assert!(signals[0].has_tip);
        assert_eq!(signals[0].tip_count, 1);
        assert_eq!(signals[0].max_edge, 10.0);
        assert!(!signals[1].has_tip);
        assert_eq!(signals[1].max_edge, 5.0);
    }
}
