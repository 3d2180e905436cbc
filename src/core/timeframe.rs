use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::primitives::MS_PER_MINUTE;
use crate::core::types::{PaneSide, Regime};
use crate::error::ViewerError;

/// Bar aggregation period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M3,
    M5,
    M15,
    H1,
    H4,
    #[serde(rename = "D")]
    D1,
    #[serde(rename = "W")]
    W1,
    #[serde(rename = "M")]
    MN1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 9] = [
        Timeframe::M1,
        Timeframe::M3,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
        Timeframe::W1,
        Timeframe::MN1,
    ];

    #[must_use]
    pub const fn minutes(self) -> i64 {
        match self {
            Self::M1 => 1,
            Self::M3 => 3,
            Self::M5 => 5,
            Self::M15 => 15,
            Self::H1 => 60,
            Self::H4 => 240,
            Self::D1 => 1_440,
            Self::W1 => 10_080,
            Self::MN1 => 43_200,
        }
    }

    #[must_use]
    pub const fn duration_ms(self) -> i64 {
        self.minutes() * MS_PER_MINUTE
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::M1 => "M1",
            Self::M3 => "M3",
            Self::M5 => "M5",
            Self::M15 => "M15",
            Self::H1 => "H1",
            Self::H4 => "H4",
            Self::D1 => "D",
            Self::W1 => "W",
            Self::MN1 => "M",
        }
    }

    /// Regime whose viewport memory this timeframe shares on `pane`.
    ///
    /// M15 counts as hourly on the left pane, where it is the finest
    /// higher-timeframe choice.
    #[must_use]
    pub const fn regime(self, pane: PaneSide) -> Regime {
        match self {
            Self::M15 => match pane {
                PaneSide::Left => Regime::Hourly,
                PaneSide::Right => Regime::Minute,
            },
            Self::M1 | Self::M3 | Self::M5 => Regime::Minute,
            Self::H1 | Self::H4 => Regime::Hourly,
            Self::D1 | Self::W1 | Self::MN1 => Regime::Daily,
        }
    }

    #[must_use]
    pub const fn allowed_on(self, pane: PaneSide) -> bool {
        match pane {
            PaneSide::Right => !matches!(self, Self::W1 | Self::MN1),
            PaneSide::Left => !matches!(self, Self::M1 | Self::M3 | Self::M5),
        }
    }

    /// Session background bands only make sense below four-hour bars.
    #[must_use]
    pub const fn shows_session_bands(self) -> bool {
        !matches!(self, Self::H4 | Self::D1 | Self::W1 | Self::MN1)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = ViewerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "M1" => Ok(Self::M1),
            "M3" => Ok(Self::M3),
            "M5" => Ok(Self::M5),
            "M15" => Ok(Self::M15),
            "H1" => Ok(Self::H1),
            "H4" => Ok(Self::H4),
            "D" | "D1" => Ok(Self::D1),
            "W" | "W1" => Ok(Self::W1),
            "M" | "MN" | "MN1" => Ok(Self::MN1),
            other => Err(ViewerError::UnknownTimeframe(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_prints_codes() {
        for tf in Timeframe::ALL {
            assert_eq!(tf.as_str().parse::<Timeframe>().expect("parse"), tf);
        }
        assert!("H2".parse::<Timeframe>().is_err());
    }

    #[test]
    fn m15_regime_depends_on_pane() {
        assert_eq!(Timeframe::M15.regime(PaneSide::Right), Regime::Minute);
        assert_eq!(Timeframe::M15.regime(PaneSide::Left), Regime::Hourly);
        assert_eq!(Timeframe::H4.regime(PaneSide::Right), Regime::Hourly);
        assert_eq!(Timeframe::W1.regime(PaneSide::Left), Regime::Daily);
    }

    #[test]
    fn pane_allow_lists() {
        assert!(!Timeframe::W1.allowed_on(PaneSide::Right));
        assert!(!Timeframe::M5.allowed_on(PaneSide::Left));
        assert!(Timeframe::M15.allowed_on(PaneSide::Left));
    }
}
