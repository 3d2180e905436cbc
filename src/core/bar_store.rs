use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::core::bar::Bar;
use crate::core::series::TimeframeSeries;
use crate::core::timeframe::Timeframe;
use crate::error::{ViewerError, ViewerResult};

#[derive(Debug, Deserialize)]
struct RawFeed {
    #[serde(default)]
    symbol: Option<String>,
    timeframes: IndexMap<String, RawSeries>,
}

#[derive(Debug, Deserialize)]
struct RawSeries {
    #[serde(default)]
    bars: Vec<RawBar>,
}

#[derive(Debug, Deserialize)]
struct RawBar {
    i: i64,
    t: String,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
}

/// Read-only collection of timeframe series loaded once per session.
///
/// Insertion order follows the data feed, so `first_timeframe` is the feed's
/// first timeframe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarStore {
    symbol: Option<String>,
    series: IndexMap<Timeframe, TimeframeSeries>,
}

impl BarStore {
    #[must_use]
    pub fn new(symbol: Option<String>) -> Self {
        Self {
            symbol,
            series: IndexMap::new(),
        }
    }

    /// Parses the `{ symbol, timeframes: { TF: { bars: [...] } } }` feed.
    ///
    /// Unknown timeframe codes and malformed series are skipped with a warning.
    pub fn from_json_str(input: &str) -> ViewerResult<Self> {
        let feed: RawFeed = serde_json::from_str(input)
            .map_err(|e| ViewerError::InvalidData(format!("failed to parse bar feed: {e}")))?;

        let mut store = Self::new(feed.symbol);
        for (code, raw) in feed.timeframes {
            let timeframe = match code.parse::<Timeframe>() {
                Ok(timeframe) => timeframe,
                Err(err) => {
                    warn!(error = %err, "skipping unknown timeframe in bar feed");
                    continue;
                }
            };
            let bars: ViewerResult<Vec<Bar>> = raw
                .bars
                .into_iter()
                .map(|bar| Bar::new(bar.i, bar.t, bar.o, bar.h, bar.l, bar.c))
                .collect();
            match bars.and_then(|bars| TimeframeSeries::new(timeframe, bars)) {
                Ok(series) => store.insert(series),
                Err(err) => warn!(timeframe = %timeframe, error = %err, "skipping malformed series"),
            }
        }
        debug!(
            symbol = store.symbol.as_deref().unwrap_or(""),
            timeframes = store.series.len(),
            "bar store loaded"
        );
        Ok(store)
    }

    pub fn insert(&mut self, series: TimeframeSeries) {
        self.series.insert(series.timeframe(), series);
    }

    #[must_use]
    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }

    #[must_use]
    pub fn get(&self, timeframe: Timeframe) -> Option<&TimeframeSeries> {
        self.series.get(&timeframe)
    }

    /// Series for `timeframe` when it exists and holds bars.
    #[must_use]
    pub fn non_empty(&self, timeframe: Timeframe) -> Option<&TimeframeSeries> {
        self.get(timeframe).filter(|series| !series.is_empty())
    }

    #[must_use]
    pub fn contains(&self, timeframe: Timeframe) -> bool {
        self.non_empty(timeframe).is_some()
    }

    pub fn timeframes(&self) -> impl Iterator<Item = Timeframe> + '_ {
        self.series.keys().copied()
    }

    #[must_use]
    pub fn first_timeframe(&self) -> Option<Timeframe> {
        self.series.keys().next().copied()
    }

    /// Finest timeframe with data, used when the configured aggregation base is missing.
    #[must_use]
    pub fn finest_timeframe(&self) -> Option<Timeframe> {
        self.series
            .values()
            .filter(|series| !series.is_empty())
            .map(TimeframeSeries::timeframe)
            .min_by_key(|tf| tf.minutes())
    }
}
