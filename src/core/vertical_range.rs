use tracing::debug;

use crate::core::bar::price_extent;
use crate::core::primitives::round_half_up;
use crate::core::series::TimeframeSeries;
use crate::core::types::PriceRange;
use crate::core::window::ViewState;

pub const DEFAULT_AUTO_PAN_PADDING_RATIO: f64 = 0.10;

/// Which way an auto-pan correction moved the vertical range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerticalCorrection {
    pub range: PriceRange,
    pub direction: CorrectionDirection,
}

/// Price envelope of the visible bars, or of the whole buffered window when the
/// visible slice is empty.
#[must_use]
pub fn auto_range(series: &TimeframeSeries, state: &ViewState) -> Option<PriceRange> {
    let visible = series.slice_for_range(state.visible_start_idx, state.visible_end_idx);
    if let Some(extent) = price_extent(visible) {
        return Some(extent);
    }
    let window = series.slice_for_range(state.window_start as f64, state.window_end as f64);
    price_extent(window)
}

/// Shifts `current` so candles that left the vertical view come back into it.
///
/// The range height is preserved. When every visible candle sits above the
/// view, the new top is the lowest low plus `padding_ratio * height`; when every
/// candle sits below, the new bottom is the highest high minus the same padding.
/// Returns `None` when any candle already intersects the view or the inputs are
/// unusable.
#[must_use]
pub fn vertical_correction(
    series: &TimeframeSeries,
    visible_start_idx: f64,
    visible_end_idx: f64,
    current: PriceRange,
    padding_ratio: f64,
) -> Option<VerticalCorrection> {
    let (y_min, y_max) = current;
    if !y_min.is_finite() || !y_max.is_finite() || y_max <= y_min {
        return None;
    }
    if !visible_start_idx.is_finite() || !visible_end_idx.is_finite() || series.is_empty() {
        return None;
    }

    let start = (series.min_idx() as f64).max(round_half_up(visible_start_idx));
    let end = (series.max_idx() as f64).min(round_half_up(visible_end_idx));
    let (low, high) = price_extent(series.slice_for_range(start, end))?;

    let height = y_max - y_min;
    let padding = height * padding_ratio.max(0.0);

    if low > y_max {
        let new_max = low + padding;
        debug!(low, new_max, "auto-pan: candles above view, correcting up");
        return Some(VerticalCorrection {
            range: (new_max - height, new_max),
            direction: CorrectionDirection::Up,
        });
    }
    if high < y_min {
        let new_min = high - padding;
        debug!(high, new_min, "auto-pan: candles below view, correcting down");
        return Some(VerticalCorrection {
            range: (new_min, new_min + height),
            direction: CorrectionDirection::Down,
        });
    }
    None
}
