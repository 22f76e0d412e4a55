//! Aggregator
//!
//! Merges a primary and a secondary quote list keyed by symbol, and swaps in
//! a complete fallback dataset when the primary source produced nothing.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use thiserror::Error;

use crate::domain::{Quote, SourceTag};
use crate::ports::source::AdapterError;

/// Where the rows of a merged result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergedQuotes {
    pub quotes: Vec<Quote>,
    pub origin: DataOrigin,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregateError {
    #[error("primary failed ({primary}) and fallback failed ({fallback})")]
    Exhausted {
        primary: AdapterError,
        fallback: AdapterError,
    },
}

/// Copy fields `primary` left unset from `secondary`
fn fill_missing(primary: &mut Quote, secondary: &Quote) {
    if primary.price.is_none() {
        primary.price = secondary.price;
    }
    if primary.change_percent.is_none() {
        primary.change_percent = secondary.change_percent;
    }
    if primary.volume.is_none() {
        primary.volume = secondary.volume.clone();
    }
    if primary.market_cap.is_none() {
        primary.market_cap = secondary.market_cap;
    }
}

/// Merge two lists keyed by case-insensitive symbol.
///
/// Primary order first, each primary record completed field by field from the
/// matching secondary record, then secondary-only records tagged `Fallback`.
/// Later duplicates of a symbol are dropped on either side.
pub fn merge(primary: Vec<Quote>, secondary: Vec<Quote>) -> Vec<Quote> {
    let mut seen = HashSet::with_capacity(primary.len() + secondary.len());
    let mut merged = Vec::with_capacity(primary.len() + secondary.len());

    // first secondary record per symbol
    let mut by_key: HashMap<String, usize> = HashMap::with_capacity(secondary.len());
    for (i, quote) in secondary.iter().enumerate() {
        by_key.entry(quote.key()).or_insert(i);
    }

    for mut quote in primary {
        let key = quote.key();
        if !seen.insert(key.clone()) {
            tracing::debug!("aggregator: duplicate primary symbol {}", quote.symbol);
            continue;
        }
        if let Some(&i) = by_key.get(&key) {
            fill_missing(&mut quote, &secondary[i]);
        }
        merged.push(quote);
    }

    for quote in secondary {
        if seen.insert(quote.key()) {
            merged.push(quote.with_source(SourceTag::Fallback));
        }
    }

    merged
}

/// Merge primary and secondary results, substituting `fallback` when the
/// primary failed or came back empty. A failed secondary counts as empty.
///
/// `fallback` is only awaited when needed. Its rows lose the USD anchor and
/// are all tagged `Fallback`.
pub async fn merge_with_fallback<F, Fut>(
    primary: Result<Vec<Quote>, AdapterError>,
    secondary: Result<Vec<Quote>, AdapterError>,
    fallback: F,
) -> Result<MergedQuotes, AggregateError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<Quote>, AdapterError>>,
{
    let secondary = secondary.unwrap_or_else(|e| {
        tracing::warn!("aggregator: secondary source failed, continuing without it: {}", e);
        Vec::new()
    });

    let primary_error = match primary {
        Ok(quotes) if !quotes.is_empty() => {
            return Ok(MergedQuotes {
                quotes: merge(quotes, secondary),
                origin: DataOrigin::Primary,
            });
        }
        Ok(_) => AdapterError::NoData("primary source returned no rows".to_string()),
        Err(e) => e,
    };

    tracing::warn!("aggregator: primary source failed, using fallback: {}", primary_error);

    let fallback_rows = match fallback().await {
        Ok(quotes) => quotes,
        Err(fallback_error) => {
            return Err(AggregateError::Exhausted {
                primary: primary_error,
                fallback: fallback_error,
            })
        }
    };

    let quotes: Vec<Quote> = fallback_rows
        .into_iter()
        .filter(|q| !q.is_anchor())
        .map(|q| q.with_source(SourceTag::Fallback))
        .collect();

    if quotes.is_empty() {
        return Err(AggregateError::Exhausted {
            primary: primary_error,
            fallback: AdapterError::NoData("fallback source returned no rows".to_string()),
        });
    }

    Ok(MergedQuotes {
        quotes,
        origin: DataOrigin::Fallback,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Volume;
    use crate::ports::{FetchError, Provider};

    fn q(symbol: &str, price: f64) -> Quote {
        Quote::new(symbol, symbol).with_price(price).with_change_percent(1.0)
    }

    fn network(provider: Provider) -> AdapterError {
        AdapterError::Fetch(FetchError::Network {
            provider,
            message: "unreachable".into(),
        })
    }

    #[test]
    fn test_merge_with_empty_secondary_is_identity() {
        let primary = vec![q("AAPL", 190.0), q("MSFT", 410.0)];
        assert_eq!(merge(primary.clone(), Vec::new()), primary);
    }

    #[test]
    fn test_merge_fills_missing_fields() {
        let primary = vec![Quote::new("AAPL", "Apple").with_price(190.0)];
        let secondary = vec![Quote::new("aapl", "Apple Inc.")
            .with_price(1.0)
            .with_change_percent(0.5)
            .with_volume(Volume::Units(1000.0))];

        let merged = merge(primary, secondary);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].display_name, "Apple");
        assert_eq!(merged[0].price, Some(190.0));
        assert_eq!(merged[0].change_percent, Some(0.5));
        assert_eq!(merged[0].volume, Some(Volume::Units(1000.0)));
        assert_eq!(merged[0].source, SourceTag::Primary);
    }

    #[test]
    fn test_merge_appends_secondary_only_as_fallback() {
        let merged = merge(
            vec![q("AAPL", 190.0)],
            vec![q("AMD", 160.0), q("AAPL", 1.0), q("F", 12.0)],
        );

        let symbols: Vec<_> = merged.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "AMD", "F"]);
        assert_eq!(merged[0].source, SourceTag::Primary);
        assert_eq!(merged[1].source, SourceTag::Fallback);
        assert_eq!(merged[2].source, SourceTag::Fallback);
    }

    #[test]
    fn test_merge_keeps_first_duplicate() {
        let merged = merge(vec![q("AAPL", 1.0), q("aapl", 2.0)], Vec::new());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].price, Some(1.0));
    }

    #[test]
    fn test_merge_fills_from_first_secondary_match() {
        let primary = vec![Quote::new("TSLA", "Tesla").with_price(170.0)];
        let secondary = vec![
            Quote::new("tsla", "Tesla").with_change_percent(-2.0),
            Quote::new("TSLA", "Tesla").with_change_percent(9.0),
        ];

        let merged = merge(primary, secondary);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].change_percent, Some(-2.0));
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let result = merge_with_fallback(
            Ok(vec![q("NVDA", 900.0)]),
            Ok(vec![q("AMD", 160.0)]),
            || async { Err::<Vec<Quote>, _>(AdapterError::NoData("fallback must not run".into())) },
        )
        .await
        .unwrap();

        assert_eq!(result.origin, DataOrigin::Primary);
        assert_eq!(result.quotes.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_secondary_is_ignored() {
        let result = merge_with_fallback(
            Ok(vec![q("NVDA", 900.0)]),
            Err(network(Provider::Fmp)),
            || async { Ok::<_, AdapterError>(Vec::new()) },
        )
        .await
        .unwrap();

        assert_eq!(result.origin, DataOrigin::Primary);
        assert_eq!(result.quotes, vec![q("NVDA", 900.0)]);
    }

    #[tokio::test]
    async fn test_primary_failure_substitutes_fallback() {
        let crypto = vec![Quote::usd_anchor(), q("bitcoin", 65000.0), q("ethereum", 3200.0)];

        let result = merge_with_fallback(
            Err(AdapterError::Unparseable("prose".into())),
            Ok(vec![q("AMD", 160.0)]),
            || async move { Ok::<_, AdapterError>(crypto) },
        )
        .await
        .unwrap();

        assert_eq!(result.origin, DataOrigin::Fallback);
        let symbols: Vec<_> = result.quotes.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["bitcoin", "ethereum"]);
        assert!(result.quotes.iter().all(|q| q.source == SourceTag::Fallback));
    }

    #[tokio::test]
    async fn test_empty_primary_counts_as_failure() {
        let result = merge_with_fallback(Ok(Vec::new()), Ok(Vec::new()), || async {
            Ok::<_, AdapterError>(vec![q("bitcoin", 65000.0)])
        })
        .await
        .unwrap();

        assert_eq!(result.origin, DataOrigin::Fallback);
    }

    #[tokio::test]
    async fn test_both_failing_is_exhausted() {
        let err = merge_with_fallback(
            Err(network(Provider::MoversScraper)),
            Ok(Vec::new()),
            || async { Err::<Vec<Quote>, _>(network(Provider::CoinGecko)) },
        )
        .await
        .unwrap_err();

        let AggregateError::Exhausted { primary, fallback } = err;
        assert!(primary.is_network());
        assert_eq!(fallback, network(Provider::CoinGecko));
    }

    #[tokio::test]
    async fn test_anchor_only_fallback_is_exhausted() {
        let err = merge_with_fallback(
            Err(AdapterError::NoData("none".into())),
            Ok(Vec::new()),
            || async { Ok::<_, AdapterError>(vec![Quote::usd_anchor()]) },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AggregateError::Exhausted { .. }));
    }
}
