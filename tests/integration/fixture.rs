//! Seeded in-memory race card for integration testing.
//!
//! One race at Flemington with three runners priced by the model at
//! 2.00 / 4.00 / 4.00 and quoted by two bookmakers.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

use horsedge::storage::{MemoryStore, RaceWriter};
use horsedge::types::{Bookmaker, NewRace, NewRunner, OddsQuote, Race, Runner};

pub struct RaceCard {
    pub store: MemoryStore,
    pub race: Race,
    pub runners: Vec<Runner>,
}

impl RaceCard {
    pub fn runner(&self, horse_number: u32) -> &Runner {
        self.runners
            .iter()
            .find(|r| r.horse_number == horse_number)
            .expect("runner seeded")
    }
}

pub fn race_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 7).unwrap()
}

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 7, hour, minute, 0).unwrap()
}

/// Build the card. Ladbrokes is best on every runner:
/// 1.80 / 4.50 / 5.00 against fair 2.00 / 4.00 / 4.00.
pub async fn seeded_card() -> RaceCard {
    let store = MemoryStore::new();
    let race = store
        .insert_race(NewRace {
            race_date: race_day(),
            track: "Flemington".into(),
            race_number: 7,
            distance_m: 1600,
            jump_time: NaiveTime::from_hms_opt(15, 40, 0).unwrap(),
            race_name: "Newmarket Handicap".into(),
            starters: 3,
            prize_pool: 1_500_000.0,
            track_rating: "Good 4".into(),
        })
        .await
        .unwrap();

    let mut runners = Vec::new();
    for (number, name, prob) in [
        (1, "Favourite", 0.50),
        (2, "Stayer", 0.25),
        (3, "Roughie", 0.25),
    ] {
        let runner = store
            .insert_runner(NewRunner {
                race_id: race.id,
                horse_number: number,
                horse_name: name.into(),
                barrier: number,
                trainer: "C. Waller".into(),
                jockey: "J. McDonald".into(),
                model_prob: prob,
                predicted_price: 1.0 / prob,
            })
            .await
            .unwrap();
        runners.push(runner);
    }

    let quotes = [
        (Bookmaker::Ladbrokes, [1.80, 4.50, 5.00]),
        (Bookmaker::Sportsbet, [1.70, 4.20, 4.80]),
    ];
    for (book, prices) in quotes {
        for (runner, price) in runners.iter().zip(prices) {
            store
                .upsert_quote(OddsQuote {
                    runner_id: runner.id,
                    bookmaker: book,
                    price,
                    bet_url: format!("https://{}.example/{}", book.id(), runner.id),
                    updated_at: at(9, 0),
                })
                .await
                .unwrap();
        }
    }

    RaceCard {
        store,
        race,
        runners,
    }
}
