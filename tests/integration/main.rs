//! End-to-end flows over the public API: board → track → publish →
//! settle → analytics, all against the in-memory store.

mod fixture;

use fixture::{at, race_day, seeded_card};

use horsedge::engine::analytics::{user_summary, StreakType};
use horsedge::engine::scanner::RaceScanner;
use horsedge::engine::settlement::{publish_results, settle_race, settle_user, ResultEntry};
use horsedge::engine::tracker::{self, TipEdit, TrackRequest};
use horsedge::storage::TipRepository;
use horsedge::strategy::BoardOptions;
use horsedge::types::{Bookmaker, BookmakerSet, EdgeError, TipResult};

fn request(user: &str, race_id: i64, runner_id: i64, odds: f64, stake: f64) -> TrackRequest {
    TrackRequest {
        user_id: user.into(),
        race_id,
        runner_id,
        bookmaker: "ladbrokes".into(),
        odds_at_tip: odds,
        stake: Some(stake),
        edge_pct: None,
    }
}

#[tokio::test]
async fn test_board_picks_best_book_and_flags_edges() {
    let card = seeded_card().await;
    let scanner = RaceScanner::new(&card.store, BookmakerSet::all());

    let board = scanner
        .board(
            card.race.id,
            BoardOptions {
                min_edge: 12.5,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(board.rows.len(), 3);
    for row in &board.rows {
        assert_eq!(row.best_bookmaker, Bookmaker::Ladbrokes);
    }
    let edges: Vec<(u32, f64, bool)> = {
        let mut v: Vec<_> = board
            .rows
            .iter()
            .map(|r| (r.horse_number, r.edge_pct, r.qualifies))
            .collect();
        v.sort_by_key(|(n, _, _)| *n);
        v
    };
    assert_eq!(
        edges,
        vec![(1, -10.0, false), (2, 12.5, true), (3, 25.0, true)]
    );
}

#[tokio::test]
async fn test_restricting_books_changes_best_price() {
    let card = seeded_card().await;
    let books = BookmakerSet::parse("sportsbet").unwrap();
    let scanner = RaceScanner::new(&card.store, books);

    let board = scanner
        .board(card.race.id, BoardOptions::default())
        .await
        .unwrap();
    let roughie = board.rows.iter().find(|r| r.horse_number == 3).unwrap();
    assert_eq!(roughie.best_bookmaker, Bookmaker::Sportsbet);
    assert_eq!(roughie.market_odds, 4.8);
    assert_eq!(roughie.edge_pct, 20.0);
    assert_eq!(board.selected_books, vec!["sportsbet".to_string()]);
}

#[tokio::test]
async fn test_daily_tips_sorted_by_edge() {
    let card = seeded_card().await;
    let scanner = RaceScanner::new(&card.store, BookmakerSet::all());

    let tips = scanner
        .daily_tips(
            race_day(),
            BoardOptions {
                min_edge: 10.0,
                ..Default::default()
            },
            Some(20.0),
        )
        .await
        .unwrap();

    let summary: Vec<(u32, bool)> = tips.iter().map(|t| (t.row.horse_number, t.notify)).collect();
    assert_eq!(summary, vec![(3, true), (2, false)]);
}

#[tokio::test]
async fn test_full_tip_lifecycle() {
    let card = seeded_card().await;
    let store = &card.store;
    let roughie = card.runner(3).id;
    let stayer = card.runner(2).id;

    let won = tracker::track(store, request("alice", card.race.id, roughie, 5.0, 2.0), at(10, 0))
        .await
        .unwrap();
    assert_eq!(won.edge_pct, 25.0);
    assert_eq!(won.result, TipResult::Pending);

    let lost = tracker::track(store, request("alice", card.race.id, stayer, 4.5, 1.0), at(10, 5))
        .await
        .unwrap();

    // Pending tips are still editable.
    let lost = tracker::edit(
        store,
        lost.id,
        TipEdit {
            user_id: "alice".into(),
            stake: 1.0,
            odds_at_tip: 4.4,
        },
    )
    .await
    .unwrap();
    assert_eq!(lost.odds_at_tip, 4.4);

    let entries = vec![
        ResultEntry {
            runner_id: roughie,
            finish_pos: 1,
            closing_odds: Some(4.0),
        },
        ResultEntry {
            runner_id: stayer,
            finish_pos: 3,
            closing_odds: Some(4.4),
        },
    ];
    let written = publish_results(store, card.race.id, &entries, at(16, 0))
        .await
        .unwrap();
    assert_eq!(written, 2);

    let report = settle_race(store, store, card.race.id, at(16, 1)).await.unwrap();
    assert_eq!(report.settled, 2);
    assert_eq!(report.won, 1);
    assert_eq!(report.lost, 1);

    let tip = store.tip(won.id).await.unwrap().unwrap();
    assert_eq!(tip.result, TipResult::Won);
    assert_eq!(tip.settled_at, Some(at(16, 1)));

    // Settled tips are frozen.
    let err = tracker::edit(
        store,
        won.id,
        TipEdit {
            user_id: "alice".into(),
            stake: 5.0,
            odds_at_tip: 6.0,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, EdgeError::Validation(_)));

    let summary = user_summary(store, "alice", None).await.unwrap();
    assert_eq!(summary.total_bets, 2);
    assert_eq!(summary.settled_bets, 2);
    assert_eq!(summary.wins, 1);
    assert_eq!(summary.losses, 1);
    assert_eq!(summary.profit_units, 7.0);
    assert_eq!(summary.total_stake, 3.0);
    assert_eq!(summary.clv_samples, 2);
    assert_eq!(summary.avg_clv_pct, 12.5);
    assert_eq!(summary.current_streak_type, StreakType::Lost);
    assert_eq!(summary.by_track.len(), 1);
    assert_eq!(summary.by_track[0].name, "Flemington");
}

#[tokio::test]
async fn test_settlement_is_idempotent() {
    let card = seeded_card().await;
    let store = &card.store;
    let roughie = card.runner(3).id;

    tracker::track(store, request("bob", card.race.id, roughie, 5.0, 1.0), at(10, 0))
        .await
        .unwrap();

    let first = settle_user(store, store, "bob", at(11, 0)).await.unwrap();
    assert_eq!(first.settled, 0);
    assert_eq!(first.awaiting, 1);

    let entries = vec![ResultEntry {
        runner_id: roughie,
        finish_pos: 2,
        closing_odds: None,
    }];
    publish_results(store, card.race.id, &entries, at(16, 0))
        .await
        .unwrap();

    let second = settle_user(store, store, "bob", at(16, 1)).await.unwrap();
    assert_eq!(second.settled, 1);
    assert_eq!(second.lost, 1);

    let third = settle_user(store, store, "bob", at(16, 2)).await.unwrap();
    assert_eq!(third.checked, 0);
    assert_eq!(third.settled, 0);
}

#[tokio::test]
async fn test_republishing_overwrites_result_row() {
    let card = seeded_card().await;
    let store = &card.store;
    let favourite = card.runner(1).id;

    for pos in [2, 1] {
        let entries = vec![ResultEntry {
            runner_id: favourite,
            finish_pos: pos,
            closing_odds: Some(1.9),
        }];
        publish_results(store, card.race.id, &entries, at(16, 0))
            .await
            .unwrap();
    }
    assert_eq!(store.result_count().await, 1);

    tracker::track(store, request("carol", card.race.id, favourite, 1.8, 1.0), at(10, 0))
        .await
        .unwrap();
    let report = settle_race(store, store, card.race.id, at(16, 5)).await.unwrap();
    assert_eq!(report.won, 1);
}

#[tokio::test]
async fn test_users_cannot_touch_each_others_tips() {
    let card = seeded_card().await;
    let store = &card.store;
    let roughie = card.runner(3).id;

    let tip = tracker::track(store, request("alice", card.race.id, roughie, 5.0, 1.0), at(10, 0))
        .await
        .unwrap();

    let err = tracker::delete(store, tip.id, "mallory").await.unwrap_err();
    assert!(matches!(err, EdgeError::NotFound(_)));
    assert!(store.tip(tip.id).await.unwrap().is_some());

    tracker::delete(store, tip.id, "alice").await.unwrap();
    assert!(store.tip(tip.id).await.unwrap().is_none());
}
