use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, Timelike, Weekday};

use crate::core::primitives::datetime_from_ms;
use crate::core::{LabelUnit, TickGranularity, TimeframeSeries};

pub(crate) const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Hour at which a Sunday session opens and gets the day label.
const SUNDAY_OPEN_HOUR: u32 = 17;

#[derive(Debug, Clone, PartialEq)]
pub(super) struct FormattedLabel {
    pub text: String,
    pub unit: LabelUnit,
}

pub(super) struct LabelContext<'a> {
    pub series: &'a TimeframeSeries,
    pub granularity: TickGranularity,
    pub visible: Option<(f64, f64)>,
    pub chart_width_px: Option<f64>,
    pub collision_radius_px: f64,
}

fn month_name(month: u32) -> &'static str {
    MONTH_NAMES
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("")
}

/// Promotes a date to year or month label when it is the first trading date of one.
fn anchored_label(series: &TimeframeSeries, date: NaiveDate) -> Option<FormattedLabel> {
    if series.year_first_trading_date(date.year()) == Some(date) {
        return Some(FormattedLabel {
            text: date.year().to_string(),
            unit: LabelUnit::Year,
        });
    }
    if series.month_first_trading_date(date.year(), date.month()) == Some(date) {
        return Some(FormattedLabel {
            text: month_name(date.month()).to_owned(),
            unit: LabelUnit::Month,
        });
    }
    None
}

fn calendar_label(series: &TimeframeSeries, granularity: TickGranularity, date: NaiveDate) -> FormattedLabel {
    match granularity {
        TickGranularity::Year => FormattedLabel {
            text: date.year().to_string(),
            unit: LabelUnit::Year,
        },
        TickGranularity::Quarter => FormattedLabel {
            text: format!("Q{}", date.month0() / 3 + 1),
            unit: LabelUnit::Month,
        },
        TickGranularity::Month => FormattedLabel {
            text: month_name(date.month()).to_owned(),
            unit: LabelUnit::Month,
        },
        _ => anchored_label(series, date).unwrap_or_else(|| {
            if date.day() == 1 && date.month() == 1 {
                FormattedLabel {
                    text: date.year().to_string(),
                    unit: LabelUnit::Year,
                }
            } else if date.day() == 1 {
                FormattedLabel {
                    text: month_name(date.month()).to_owned(),
                    unit: LabelUnit::Month,
                }
            } else {
                FormattedLabel {
                    text: date.day().to_string(),
                    unit: LabelUnit::Day,
                }
            }
        }),
    }
}

/// Builds the hierarchical label of every tick and blanks finer labels that
/// crowd a coarser one.
///
/// Returns the labels in tick order plus the indices whose label was hidden.
pub(super) fn format_tick_labels(
    tick_times: &[i64],
    tick_indices: &[i64],
    ctx: &LabelContext<'_>,
) -> (Vec<FormattedLabel>, Vec<i64>) {
    let mut labels = Vec::with_capacity(tick_times.len());
    let mut labeled_dates: HashSet<NaiveDate> = HashSet::new();

    for &ts in tick_times {
        let Some(dt) = datetime_from_ms(ts) else {
            labels.push(FormattedLabel {
                text: String::new(),
                unit: ctx.granularity.base_unit(),
            });
            continue;
        };
        let date = dt.date();
        let label = if ctx.granularity.is_intraday() {
            let is_sunday = date.weekday() == Weekday::Sun;
            let is_midnight = dt.hour() == 0 && dt.minute() == 0;
            let is_sunday_open = dt.hour() == SUNDAY_OPEN_HOUR && dt.minute() == 0;
            let time_label = FormattedLabel {
                text: format!("{:02}:{:02}", dt.hour(), dt.minute()),
                unit: LabelUnit::Time,
            };
            if ((is_midnight && !is_sunday) || (is_sunday_open && is_sunday))
                && labeled_dates.insert(date)
            {
                anchored_label(ctx.series, date).unwrap_or_else(|| FormattedLabel {
                    text: date.day().to_string(),
                    unit: LabelUnit::Day,
                })
            } else {
                time_label
            }
        } else {
            calendar_label(ctx.series, ctx.granularity, date)
        };
        labels.push(label);
    }

    let hidden = hide_crowded_labels(&mut labels, tick_indices, ctx);
    (labels, hidden)
}

fn hide_crowded_labels(
    labels: &mut [FormattedLabel],
    tick_indices: &[i64],
    ctx: &LabelContext<'_>,
) -> Vec<i64> {
    let mut hidden = Vec::new();
    if labels.is_empty() || labels.len() != tick_indices.len() {
        return hidden;
    }

    let vis_span = match ctx.visible {
        Some((start, end)) => (end - start).max(1.0),
        None => {
            let min = tick_indices.iter().min().copied().unwrap_or(0);
            let max = tick_indices.iter().max().copied().unwrap_or(0);
            ((max - min) as f64).max(1.0)
        }
    };
    let radius = match ctx.chart_width_px {
        Some(width) if width.is_finite() && width > 0.0 => {
            ctx.collision_radius_px / (width / vis_span)
        }
        _ => 0.5,
    };

    let base = ctx.granularity.base_unit();
    for j in 0..labels.len() {
        let coarse_unit = labels[j].unit;
        if coarse_unit <= base {
            continue;
        }
        let coarse_idx = tick_indices[j] as f64;
        for i in 0..labels.len() {
            if i == j || labels[i].text.is_empty() || labels[i].unit >= coarse_unit {
                continue;
            }
            if (tick_indices[i] as f64 - coarse_idx).abs() <= radius {
                labels[i].text.clear();
                hidden.push(tick_indices[i]);
            }
        }
    }
    hidden.sort_unstable();
    hidden.dedup();
    hidden
}

/// Hover text of one candle, e.g. `Mon 04 Mar '24 09:30`.
#[must_use]
pub fn format_hover_time(ts: i64) -> String {
    datetime_from_ms(ts)
        .map(|dt| dt.format("%a %d %b '%y %H:%M").to_string())
        .unwrap_or_default()
}
