use super::cache::{Clock, SystemClock, TtlCache};
use crate::errors::{EngineError, EngineResult};
use crate::state::PerfCounters;
use futures_util::future::join_all;
use portable_atomic::Ordering;
use reqwest::{Client, StatusCode};
use std::sync::{Arc, Mutex};

pub const INDICES: [&str; 4] = ["^GSPC", "^IXIC", "^DJI", "^RUT"];
pub const WATCHLIST: [&str; 8] = ["AAPL", "MSFT", "GOOGL", "AMZN", "META", "NVDA", "TSLA", "JPM"];
const EXTRA_SYMBOLS: [&str; 7] = ["GLD", "TLT", "QQQ", "SPY", "VOO", "BTC-USD", "ETH-USD"];

pub const MAX_BATCH: usize = 30;
const TOP_MOVERS: usize = 5;
const MAX_SEARCH_RESULTS: usize = 15;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: u64,
    pub high: f64,
    pub low: f64,
}

/// Result of a lookup that reached the provider. Transient failures are
/// errors instead and are never cached.
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteLookup {
    Found(Quote),
    NotFound,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MarketSummary {
    pub indices: Vec<Quote>,
    pub watchlist: Vec<Quote>,
    pub gainers: Vec<Quote>,
    pub losers: Vec<Quote>,
    pub sp500: Option<Quote>,
    pub timestamp: String,
}

// Chart endpoint response (fields we use):
// {
//   "chart": {
//     "result": [{
//       "meta": { "symbol": "AAPL", "shortName": "Apple Inc.",
//                 "regularMarketPrice": 227.5, "chartPreviousClose": 225.1 },
//       "indicators": { "quote": [{ "close": [..], "high": [..],
//                                   "low": [..], "volume": [..] }] }
//     }],
//     "error": null
//   }
// }

#[derive(serde::Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(serde::Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
}

#[derive(serde::Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    indicators: Option<Indicators>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    short_name: Option<String>,
    long_name: Option<String>,
    regular_market_price: Option<f64>,
    chart_previous_close: Option<f64>,
    regular_market_volume: Option<u64>,
    regular_market_day_high: Option<f64>,
    regular_market_day_low: Option<f64>,
}

#[derive(serde::Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteBars>,
}

#[derive(serde::Deserialize, Default)]
struct QuoteBars {
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[inline]
fn cents(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Normalize user input: trimmed, upper case. None when empty.
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let s = raw.trim().to_ascii_uppercase();
    (!s.is_empty()).then_some(s)
}

/// Split a comma list into normalized symbols, capped at `MAX_BATCH`.
pub fn parse_symbol_list(raw: &str) -> Vec<String> {
    raw.split(',').filter_map(normalize_symbol).take(MAX_BATCH).collect()
}

/// Known symbols containing `query`, for client-side autocomplete.
pub fn search_symbols(query: &str) -> Vec<String> {
    let Some(q) = normalize_symbol(query) else {
        return Vec::new();
    };
    let mut out: Vec<String> = INDICES
        .iter()
        .chain(WATCHLIST.iter())
        .chain(EXTRA_SYMBOLS.iter())
        .filter(|s| s.contains(q.as_str()))
        .map(|s| s.to_string())
        .collect();
    out.sort();
    out.dedup();
    out.truncate(MAX_SEARCH_RESULTS);
    out
}

/// Build a quote from a chart payload. Uses the last two daily bars when
/// present, otherwise the meta block. None when neither has a price.
fn quote_from_chart(symbol: &str, resp: ChartResponse) -> Option<Quote> {
    let result = resp.chart.result?.into_iter().next()?;
    let meta = result.meta;
    let name = meta
        .short_name
        .or(meta.long_name)
        .unwrap_or_else(|| symbol.to_string());

    let bars = result
        .indicators
        .and_then(|i| i.quote.into_iter().next())
        .unwrap_or_default();

    let closes: Vec<(usize, f64)> = bars
        .close
        .iter()
        .enumerate()
        .filter_map(|(i, c)| (*c).filter(|v| v.is_finite()).map(|v| (i, v)))
        .collect();

    let (price, prev, volume, high, low) = match closes.as_slice() {
        [.., (_, prev), (last_i, last)] => {
            let at = |v: &Vec<Option<f64>>| v.get(*last_i).copied().flatten().unwrap_or(*last);
            let volume = bars.volume.get(*last_i).copied().flatten().unwrap_or(0);
            (*last, *prev, volume, at(&bars.high), at(&bars.low))
        }
        [(last_i, last)] => {
            let at = |v: &Vec<Option<f64>>| v.get(*last_i).copied().flatten().unwrap_or(*last);
            let volume = bars.volume.get(*last_i).copied().flatten().unwrap_or(0);
            (*last, *last, volume, at(&bars.high), at(&bars.low))
        }
        [] => {
            let price = meta.regular_market_price.or(meta.chart_previous_close)?;
            let prev = meta.chart_previous_close.unwrap_or(price);
            (
                price,
                prev,
                meta.regular_market_volume.unwrap_or(0),
                meta.regular_market_day_high.unwrap_or(price),
                meta.regular_market_day_low.unwrap_or(price),
            )
        }
    };

    let change = price - prev;
    let change_percent = if prev != 0.0 { change / prev * 100.0 } else { 0.0 };

    Some(Quote {
        symbol: symbol.to_string(),
        name,
        price: cents(price),
        change: cents(change),
        change_percent: cents(change_percent),
        volume,
        high: cents(high),
        low: cents(low),
    })
}

/// Indices, watchlist and top movers from a batch of quotes.
pub fn summarize(quotes: Vec<Quote>, timestamp: String) -> MarketSummary {
    let indices: Vec<Quote> = quotes
        .iter()
        .filter(|q| INDICES.contains(&q.symbol.as_str()))
        .cloned()
        .collect();
    let watchlist: Vec<Quote> = quotes
        .iter()
        .filter(|q| WATCHLIST.contains(&q.symbol.as_str()))
        .cloned()
        .collect();
    let sp500 = quotes.iter().find(|q| q.symbol == "^GSPC").cloned();

    let mut sorted = quotes;
    sorted.sort_by(|a, b| b.change_percent.total_cmp(&a.change_percent));
    let gainers: Vec<Quote> = sorted.iter().take(TOP_MOVERS).cloned().collect();
    let losers: Vec<Quote> = sorted.iter().rev().take(TOP_MOVERS).cloned().collect();

    MarketSummary {
        indices,
        watchlist,
        gainers,
        losers,
        sp500,
        timestamp,
    }
}

/// Quote client with a TTL cache in front. All methods return Result, never panic.
pub struct QuoteService<C: Clock = SystemClock> {
    client: Client,
    base_url: String,
    cache: Mutex<TtlCache<QuoteLookup, C>>,
    counters: Arc<PerfCounters>,
}

impl QuoteService<SystemClock> {
    pub fn new(base_url: &str, ttl_secs: i64, counters: Arc<PerfCounters>) -> Self {
        Self::with_clock(base_url, ttl_secs, SystemClock, counters)
    }
}

impl<C: Clock> QuoteService<C> {
    pub fn with_clock(base_url: &str, ttl_secs: i64, clock: C, counters: Arc<PerfCounters>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .user_agent(concat!("aegris_sim/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: Mutex::new(TtlCache::new(chrono::Duration::seconds(ttl_secs), clock)),
            counters,
        }
    }

    /// Cached lookup for one normalized symbol.
    pub async fn quote(&self, symbol: &str) -> EngineResult<QuoteLookup> {
        if let Some(hit) = self.cached(symbol) {
            return Ok(hit);
        }

        let lookup = self.fetch(symbol).await?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.purge();
            cache.insert(symbol, lookup.clone());
        }
        Ok(lookup)
    }

    /// Found quotes only, in request order. Misses and failures are logged
    /// and skipped.
    pub async fn quotes(&self, symbols: &[String]) -> Vec<Quote> {
        let lookups = join_all(symbols.iter().map(|s| self.quote(s))).await;
        symbols
            .iter()
            .zip(lookups)
            .filter_map(|(symbol, res)| match res {
                Ok(QuoteLookup::Found(q)) => Some(q),
                Ok(QuoteLookup::NotFound) => None,
                Err(e) => {
                    tracing::warn!(symbol = %symbol, error = %e, "quote fetch failed");
                    None
                }
            })
            .collect()
    }

    pub async fn summary(&self) -> MarketSummary {
        let mut symbols: Vec<String> = Vec::with_capacity(INDICES.len() + WATCHLIST.len());
        for s in INDICES.iter().chain(WATCHLIST.iter()) {
            if !symbols.iter().any(|x| x == s) {
                symbols.push(s.to_string());
            }
        }
        let quotes = self.quotes(&symbols).await;
        summarize(quotes, chrono::Utc::now().to_rfc3339())
    }

    fn cached(&self, symbol: &str) -> Option<QuoteLookup> {
        self.cache.lock().ok().and_then(|mut c| c.get(symbol))
    }

    async fn fetch(&self, symbol: &str) -> EngineResult<QuoteLookup> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        self.counters.quote_fetches.fetch_add(1, Ordering::Relaxed);

        let resp = self
            .client
            .get(&url)
            .query(&[("range", "5d"), ("interval", "1d")])
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(symbol = %symbol, "quote not found");
            return Ok(QuoteLookup::NotFound);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::QuoteFeed(format!("HTTP {status}: {body}")));
        }

        let data: ChartResponse = resp
            .json()
            .await
            .map_err(|e| EngineError::QuoteFeed(format!("parse {symbol}: {e}")))?;

        Ok(match quote_from_chart(symbol, data) {
            Some(q) => QuoteLookup::Found(q),
            None => QuoteLookup::NotFound,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::cache::tests::ManualClock;

    fn parse(symbol: &str, raw: &str) -> Option<Quote> {
        quote_from_chart(symbol, serde_json::from_str(raw).unwrap())
    }

    fn quote(symbol: &str, change_percent: f64) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            price: 100.0,
            change: change_percent,
            change_percent,
            volume: 0,
            high: 100.0,
            low: 100.0,
        }
    }

    #[test]
    fn test_quote_from_bars() {
        let raw = r#"{"chart":{"result":[{
            "meta":{"symbol":"AAPL","shortName":"Apple Inc."},
            "indicators":{"quote":[{
                "close":[190.0,200.0,null],
                "high":[191.0,201.234,null],
                "low":[189.0,198.111,null],
                "volume":[1000,2000,null]}]}}],"error":null}}"#;
        let q = parse("AAPL", raw).unwrap();
        assert_eq!(q.name, "Apple Inc.");
        assert_eq!(q.price, 200.0);
        assert_eq!(q.change, 10.0);
        assert_eq!(q.change_percent, 5.26);
        assert_eq!(q.volume, 2000);
        assert_eq!(q.high, 201.23);
        assert_eq!(q.low, 198.11);
    }

    #[test]
    fn test_quote_from_meta() {
        let raw = r#"{"chart":{"result":[{
            "meta":{"regularMarketPrice":50.0,"chartPreviousClose":40.0}}],"error":null}}"#;
        let q = parse("XYZ", raw).unwrap();
        assert_eq!(q.name, "XYZ");
        assert_eq!(q.change_percent, 25.0);
        assert_eq!(q.high, 50.0);
    }

    #[test]
    fn test_empty_result_is_none() {
        assert!(parse("NOPE", r#"{"chart":{"result":null,"error":{"code":"Not Found"}}}"#).is_none());
        assert!(parse("NOPE", r#"{"chart":{"result":[{"meta":{}}]}}"#).is_none());
    }

    #[test]
    fn test_wire_field_names() {
        let json = serde_json::to_value(quote("A", 1.5)).unwrap();
        assert_eq!(json["changePercent"], 1.5);
    }

    #[test]
    fn test_summary_movers() {
        let quotes = vec![
            quote("^GSPC", 0.5),
            quote("AAPL", 3.0),
            quote("MSFT", -2.0),
            quote("NVDA", 5.0),
            quote("TSLA", -4.0),
            quote("JPM", 0.1),
            quote("META", 1.0),
        ];
        let s = summarize(quotes, "t".into());
        assert_eq!(s.indices.len(), 1);
        assert_eq!(s.watchlist.len(), 6);
        assert_eq!(s.sp500.as_ref().map(|q| q.symbol.as_str()), Some("^GSPC"));
        assert_eq!(s.gainers[0].symbol, "NVDA");
        assert_eq!(s.gainers.len(), 5);
        assert_eq!(s.losers[0].symbol, "TSLA");
        assert_eq!(s.losers[1].symbol, "MSFT");
    }

    #[test]
    fn test_symbol_parsing() {
        assert_eq!(normalize_symbol("  aapl "), Some("AAPL".to_string()));
        assert_eq!(normalize_symbol("   "), None);
        assert_eq!(parse_symbol_list("aapl, ,msft,"), vec!["AAPL", "MSFT"]);
        let many = vec!["X"; 40].join(",");
        assert_eq!(parse_symbol_list(&many).len(), MAX_BATCH);
        assert_eq!(search_symbols("usd"), vec!["BTC-USD", "ETH-USD"]);
        assert!(search_symbols("").is_empty());
    }

    #[tokio::test]
    async fn test_cached_lookup_skips_network() {
        let clock = ManualClock::new();
        let counters = Arc::new(PerfCounters::new());
        // unroutable: any real fetch fails
        let svc = QuoteService::with_clock("http://127.0.0.1:9", 60, clock.clone(), counters.clone());
        svc.cache.lock().unwrap().insert("AAPL", QuoteLookup::Found(quote("AAPL", 1.0)));
        svc.cache.lock().unwrap().insert("GONE", QuoteLookup::NotFound);

        assert!(matches!(svc.quote("AAPL").await, Ok(QuoteLookup::Found(_))));
        assert_eq!(svc.quote("GONE").await.unwrap(), QuoteLookup::NotFound);
        assert_eq!(counters.quote_fetches.load(Ordering::Relaxed), 0);

        clock.advance(61);
        assert!(svc.quote("AAPL").await.is_err());
        assert_eq!(counters.quote_fetches.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_not_cached() {
        let counters = Arc::new(PerfCounters::new());
        let svc = QuoteService::with_clock("http://127.0.0.1:9", 60, ManualClock::new(), counters.clone());
        assert!(matches!(svc.quote("AAPL").await, Err(EngineError::Network(_))));
        assert!(svc.cache.lock().unwrap().is_empty());
        assert!(svc.quotes(&["AAPL".to_string()]).await.is_empty());
        assert_eq!(counters.quote_fetches.load(Ordering::Relaxed), 2);
    }
}
