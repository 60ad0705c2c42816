//! Fan curves and hysteresis level selection
//!
//! A curve is nine temperature bands, one per fan level. Level 0-7 are the
//! firmware's native speed steps; level 8 is our own "disengaged" level.
//! Neighbouring bands overlap on purpose so that a temperature hovering
//! around a boundary does not make the fan hunt between two levels.

use crate::errors::{FanCurveError, Result};
use log::{debug, error};
use std::fmt;
use std::str::FromStr;

/// Fan level, 0 (slowest) to [`MAX_LEVEL`] (disengaged)
pub type Level = u8;

/// Highest level. The firmware only accepts 0-7, so 8 means "disengaged".
pub const MAX_LEVEL: Level = 8;

/// Number of bands in every curve
pub const LEVEL_COUNT: usize = MAX_LEVEL as usize + 1;

const UNBOUNDED_LOW: i32 = i32::MIN;
const UNBOUNDED_HIGH: i32 = i32::MAX;

/// Half-open temperature band `[min, max)` in whole degrees Celsius.
///
/// A `min` of `i32::MIN` or a `max` of `i32::MAX` leaves that side open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub min: i32,
    pub max: i32,
}

impl Range {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, temp: i32) -> bool {
        temp >= self.min && (temp < self.max || self.max == UNBOUNDED_HIGH)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (UNBOUNDED_LOW, UNBOUNDED_HIGH) => write!(f, "any"),
            (UNBOUNDED_LOW, max) => write!(f, "<{}", max),
            (min, UNBOUNDED_HIGH) => write!(f, "{}+", min),
            (min, max) => write!(f, "{}-{}", min, max),
        }
    }
}

/// Nine bands indexed by fan level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Curve {
    ranges: [Range; LEVEL_COUNT],
}

impl Curve {
    pub const fn new(ranges: [Range; LEVEL_COUNT]) -> Self {
        Self { ranges }
    }

    /// Band for `level`, or `None` if the level is out of range
    pub fn range(&self, level: Level) -> Option<&Range> {
        self.ranges.get(level as usize)
    }

    pub fn ranges(&self) -> &[Range; LEVEL_COUNT] {
        &self.ranges
    }
}

static HOT: Curve = Curve::new([
    Range::new(UNBOUNDED_LOW, 56),
    Range::new(55, 60),
    Range::new(58, 63),
    Range::new(61, 66),
    Range::new(64, 69),
    Range::new(66, 71),
    Range::new(71, 76),
    Range::new(73, 77),
    Range::new(75, UNBOUNDED_HIGH),
]);

static WARM: Curve = Curve::new([
    Range::new(UNBOUNDED_LOW, 51),
    Range::new(50, 55),
    Range::new(53, 58),
    Range::new(56, 61),
    Range::new(59, 64),
    Range::new(62, 67),
    Range::new(66, 72),
    Range::new(70, 77),
    Range::new(75, UNBOUNDED_HIGH),
]);

static MEDIUM: Curve = Curve::new([
    Range::new(UNBOUNDED_LOW, 45),
    Range::new(43, 50),
    Range::new(48, 55),
    Range::new(53, 60),
    Range::new(58, 65),
    Range::new(63, 70),
    Range::new(68, 75),
    Range::new(73, 77),
    Range::new(75, UNBOUNDED_HIGH),
]);

static COOL: Curve = Curve::new([
    Range::new(UNBOUNDED_LOW, 45),
    Range::new(42, 47),
    Range::new(46, 51),
    Range::new(50, 55),
    Range::new(54, 59),
    Range::new(58, 63),
    Range::new(62, 67),
    Range::new(64, 71),
    Range::new(68, UNBOUNDED_HIGH),
]);

static COLD: Curve = Curve::new([
    Range::new(UNBOUNDED_LOW, 45),
    Range::new(42, 47),
    Range::new(44, 49),
    Range::new(46, 51),
    Range::new(48, 53),
    Range::new(51, 56),
    Range::new(54, 59),
    Range::new(57, 62),
    Range::new(60, UNBOUNDED_HIGH),
]);

/// Identifier of one of the built-in curves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CurveId {
    Cold,
    Cool,
    #[default]
    Medium,
    Warm,
    Hot,
}

impl CurveId {
    pub const ALL: [CurveId; 5] = [
        CurveId::Cold,
        CurveId::Cool,
        CurveId::Medium,
        CurveId::Warm,
        CurveId::Hot,
    ];

    /// Look a curve up by its name
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|id| id.name() == name)
            .ok_or_else(|| FanCurveError::UnknownCurve {
                name: name.to_string(),
            })
    }

    pub fn name(self) -> &'static str {
        match self {
            CurveId::Cold => "cold",
            CurveId::Cool => "cool",
            CurveId::Medium => "medium",
            CurveId::Warm => "warm",
            CurveId::Hot => "hot",
        }
    }

    pub fn curve(self) -> &'static Curve {
        match self {
            CurveId::Cold => &COLD,
            CurveId::Cool => &COOL,
            CurveId::Medium => &MEDIUM,
            CurveId::Warm => &WARM,
            CurveId::Hot => &HOT,
        }
    }
}

impl fmt::Display for CurveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CurveId {
    type Err = FanCurveError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

impl TryFrom<String> for CurveId {
    type Error = FanCurveError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_name(&value)
    }
}

impl From<CurveId> for String {
    fn from(id: CurveId) -> Self {
        id.name().to_string()
    }
}

/// Pick the next fan level for `temp`, reporting invariant violations.
///
/// The current level is kept while `temp` stays inside its own band.
/// Otherwise the bands are searched from the top down, so that where two
/// bands overlap the higher (more cooling) level wins.
pub fn try_select_level(curve: &Curve, previous: Level, temp: i32) -> Result<Level> {
    let current = curve
        .range(previous)
        .ok_or(FanCurveError::InvalidLevel { level: previous })?;

    if current.contains(temp) {
        debug!(
            "Current temp {} is in existing range {}, level {}",
            temp, current, previous
        );
        return Ok(previous);
    }

    for (level, range) in curve.ranges().iter().enumerate().rev() {
        if range.contains(temp) {
            debug!("Current temp is in new range {}, level {}", range, level);
            return Ok(level as Level);
        }
    }

    Err(FanCurveError::TemperatureOutOfCurve { temp })
}

/// Pick the next fan level for `temp`.
///
/// Never fails: on an internal error the problem is logged and `previous`
/// is returned unchanged.
pub fn select_level(curve: &Curve, previous: Level, temp: i32) -> Level {
    match try_select_level(curve, previous, temp) {
        Ok(level) => level,
        Err(e) => {
            error!("{}", e);
            previous
        }
    }
}
