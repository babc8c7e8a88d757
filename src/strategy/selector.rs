//! Best-price selection across bookmakers.
//!
//! For each runner, picks the highest offered price among the enabled
//! bookmakers. Ties go to the bookmaker earliest in canonical order, so the
//! result never depends on how storage happened to return the quotes.

use std::collections::BTreeMap;

use crate::types::{BookmakerSet, OddsQuote, RunnerId};

/// Whether `candidate` beats `incumbent` as the best quote.
fn beats(candidate: &OddsQuote, incumbent: &OddsQuote) -> bool {
    candidate.price > incumbent.price
        || (candidate.price == incumbent.price && candidate.bookmaker < incumbent.bookmaker)
}

/// Best quote among `quotes` restricted to `enabled` bookmakers.
///
/// Quotes with a non-finite or non-positive price are ignored. Returns `None`
/// when nothing usable remains. Callers drop such runners from the board.
pub fn best_quote<'a, I>(quotes: I, enabled: &BookmakerSet) -> Option<&'a OddsQuote>
where
    I: IntoIterator<Item = &'a OddsQuote>,
{
    quotes
        .into_iter()
        .filter(|q| enabled.contains(q.bookmaker))
        .filter(|q| q.price.is_finite() && q.price > 0.0)
        .fold(None, |best, q| match best {
            Some(current) if !beats(q, current) => Some(current),
            _ => Some(q),
        })
}

/// Best quote per runner, for every runner that has at least one usable
/// quote from an enabled bookmaker.
pub fn best_by_runner<'a>(
    quotes: &'a [OddsQuote],
    enabled: &BookmakerSet,
) -> BTreeMap<RunnerId, &'a OddsQuote> {
    let mut grouped: BTreeMap<RunnerId, Vec<&'a OddsQuote>> = BTreeMap::new();
    for quote in quotes {
        grouped.entry(quote.runner_id).or_default().push(quote);
    }

    grouped
        .into_iter()
        .filter_map(|(runner_id, runner_quotes)| {
            best_quote(runner_quotes, enabled).map(|best| (runner_id, best))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
