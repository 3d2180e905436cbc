use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::primitives::{parse_display_time, parse_locale_number};
use crate::error::{ViewerError, ViewerResult};

use super::annotations::{Direction, SetupBox, Trade};

const ENTRY_PRICE_FIELDS: [&str; 4] = ["entry_price", "entry", "entry_px", "entry_close"];
const SL_PRICE_FIELDS: [&str; 4] = ["sl_price", "sl", "stop_price", "stop"];
const TP_PRICE_FIELDS: [&str; 4] = ["tp_price", "tp", "target_price", "target"];
const EXIT_PRICE_FIELDS: [&str; 4] = ["exit_price", "exit", "exit_px", "exit_close"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    Setups,
    Trades,
}

impl FeedKind {
    /// Whether `name` is a file of this feed kind.
    #[must_use]
    pub fn matches_file(self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        if !lower.ends_with(".csv") || lower.ends_with('/') {
            return false;
        }
        match self {
            Self::Setups => lower.contains("_setups_") || lower.ends_with("_setups.csv"),
            Self::Trades => lower.contains("_trades_"),
        }
    }
}

struct CsvRow<'a> {
    columns: &'a HashMap<String, usize>,
    record: &'a csv::StringRecord,
}

impl CsvRow<'_> {
    fn get(&self, name: &str) -> Option<&str> {
        self.columns
            .get(name)
            .and_then(|&col| self.record.get(col))
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    fn first(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.get(name))
    }

    fn number(&self, names: &[&str]) -> Option<f64> {
        names
            .iter()
            .filter_map(|name| self.get(name))
            .find_map(parse_locale_number)
    }

    fn time(&self, names: &[&str]) -> Option<i64> {
        self.first(names).and_then(parse_display_time)
    }

    fn text(&self, names: &[&str]) -> String {
        self.first(names).unwrap_or_default().to_owned()
    }
}

fn for_each_row(text: &str, mut visit: impl FnMut(usize, &CsvRow<'_>)) -> ViewerResult<()> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| ViewerError::InvalidData(format!("failed to read csv header: {e}")))?
        .clone();
    let columns: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(col, name)| (name.to_owned(), col))
        .collect();

    for (row_index, record) in reader.records().enumerate() {
        match record {
            Ok(record) => visit(
                row_index,
                &CsvRow {
                    columns: &columns,
                    record: &record,
                },
            ),
            Err(err) => warn!(row = row_index, error = %err, "skipping unreadable csv row"),
        }
    }
    Ok(())
}

/// Parses a setups feed into boxes sorted by start time.
///
/// Rows without a parseable signal start/end time are dropped. The setup
/// index is the row's position in the file.
pub fn parse_setup_boxes(text: &str) -> ViewerResult<Vec<SetupBox>> {
    let mut boxes = Vec::new();
    let mut dropped = 0usize;
    for_each_row(text, |row_index, row| {
        let (Some(start), Some(end)) = (
            row.time(&["signal_start_time"]),
            row.time(&["signal_end_time"]),
        ) else {
            dropped += 1;
            return;
        };
        let Ok(direction) = row.text(&["direction"]).parse::<Direction>() else {
            dropped += 1;
            return;
        };
        boxes.push(SetupBox {
            direction,
            top_ts: start,
            bottom_ts: end,
            signal_ts: Some(end),
            date_ny: row.text(&["date_ny", "date"]),
            setup_index: row_index,
            signal_tf: row.get("signal_tf").map(str::to_owned),
            price_bounds: None,
            is_snapshot_active: false,
        });
    })?;
    boxes.sort_by_key(|b| b.top_ts);
    debug!(boxes = boxes.len(), dropped, "setup feed parsed");
    Ok(boxes)
}

fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(str::to_ascii_lowercase).as_deref(),
        Some("true" | "1" | "yes")
    )
}

/// Parses a trades feed sorted by entry (else expiration) time.
///
/// Filled trades lacking an entry or exit time are dropped.
pub fn parse_trades(text: &str) -> ViewerResult<Vec<Trade>> {
    let mut trades = Vec::new();
    let mut dropped = 0usize;
    for_each_row(text, |_, row| {
        let filled = parse_flag(row.get("filled"));
        let entry_ts = row.time(&["entry_time", "entry_idx"]);
        let exit_ts = row.time(&["exit_time", "exit_idx"]);
        if filled && (entry_ts.is_none() || exit_ts.is_none()) {
            dropped += 1;
            return;
        }
        trades.push(Trade {
            direction: row.get("direction").and_then(|d| d.parse().ok()),
            filled,
            entry_ts,
            exit_ts,
            expiration_ts: row.time(&["expiration_time"]),
            entry_price: row.number(&ENTRY_PRICE_FIELDS),
            sl_price: row.number(&SL_PRICE_FIELDS),
            tp_price: row.number(&TP_PRICE_FIELDS),
            exit_price: row.number(&EXIT_PRICE_FIELDS),
            result_r: row.number(&["result_R"]),
            setup_index: row.get("setup_index").and_then(|v| v.parse().ok()),
            date_ny: row.text(&["date_ny", "date"]),
            symbol: row.text(&["symbol"]),
            scenario_id: row.text(&["scenario_id"]),
            exit_mode: row.text(&["exit_mode"]),
            miss_reason: row.text(&["miss_reason"]),
        });
    })?;
    trades.sort_by_key(|t| t.reference_ts().unwrap_or(0));
    debug!(trades = trades.len(), dropped, "trade feed parsed");
    Ok(trades)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SeenContent {
    filename: String,
    fingerprint: Option<u64>,
}

fn fingerprint(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Outcome of offering fetched feed content to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedUpdate {
    /// Content belongs to a file that is no longer selected.
    Stale,
    /// Same file and content as last time.
    Unchanged,
    Changed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct FeedSlot {
    files: Vec<String>,
    selected: Option<String>,
    last_seen: Option<SeenContent>,
}

/// Tracks the annotation files offered by the host and which content was
/// already applied, so polling only triggers a reload on real changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationFeedTracker {
    setups: FeedSlot,
    trades: FeedSlot,
}

impl AnnotationFeedTracker {
    fn slot(&self, kind: FeedKind) -> &FeedSlot {
        match kind {
            FeedKind::Setups => &self.setups,
            FeedKind::Trades => &self.trades,
        }
    }

    fn slot_mut(&mut self, kind: FeedKind) -> &mut FeedSlot {
        match kind {
            FeedKind::Setups => &mut self.setups,
            FeedKind::Trades => &mut self.trades,
        }
    }

    #[must_use]
    pub fn files(&self, kind: FeedKind) -> &[String] {
        &self.slot(kind).files
    }

    #[must_use]
    pub fn selected(&self, kind: FeedKind) -> Option<&str> {
        self.slot(kind).selected.as_deref()
    }

    /// Classifies a directory listing. Returns `true` when either file list changed.
    ///
    /// A selection that disappeared falls back to the first listed file.
    pub fn update_listing<S: AsRef<str>>(&mut self, names: &[S]) -> bool {
        let mut changed = false;
        for kind in [FeedKind::Setups, FeedKind::Trades] {
            let mut files: Vec<String> = names
                .iter()
                .map(AsRef::as_ref)
                .filter(|name| kind.matches_file(name))
                .map(str::to_owned)
                .collect();
            files.sort();
            let slot = self.slot_mut(kind);
            if slot.files != files {
                changed = true;
                slot.files = files;
            }
            let keep = slot
                .selected
                .as_ref()
                .is_some_and(|current| slot.files.contains(current));
            if !keep {
                slot.selected = slot.files.first().cloned();
            }
        }
        if changed {
            debug!(
                setups = self.setups.files.len(),
                trades = self.trades.files.len(),
                "annotation file list changed"
            );
        }
        changed
    }

    pub fn select(&mut self, kind: FeedKind, filename: Option<String>) {
        self.slot_mut(kind).selected = filename;
    }

    /// Offers fetched content; only the selected file's new content is accepted.
    pub fn offer_content(&mut self, kind: FeedKind, filename: &str, text: &str) -> FeedUpdate {
        let slot = self.slot_mut(kind);
        if slot.selected.as_deref() != Some(filename) {
            return FeedUpdate::Stale;
        }
        let seen = SeenContent {
            filename: filename.to_owned(),
            fingerprint: Some(fingerprint(text)),
        };
        if slot.last_seen.as_ref() == Some(&seen) {
            return FeedUpdate::Unchanged;
        }
        slot.last_seen = Some(seen);
        FeedUpdate::Changed
    }

    /// Records a failed fetch of the selected file. `Changed` means previously
    /// applied content must be cleared.
    pub fn offer_failure(&mut self, kind: FeedKind, filename: &str) -> FeedUpdate {
        let slot = self.slot_mut(kind);
        if slot.selected.as_deref() != Some(filename) {
            return FeedUpdate::Stale;
        }
        let seen = SeenContent {
            filename: filename.to_owned(),
            fingerprint: None,
        };
        if slot.last_seen.as_ref() == Some(&seen) {
            return FeedUpdate::Unchanged;
        }
        slot.last_seen = Some(seen);
        FeedUpdate::Changed
    }
}
