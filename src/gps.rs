//! Exact GPS timestamps as (seconds, nanoseconds) integer pairs.

use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

const NANOSECONDS_PER_SECOND: i64 = 1_000_000_000;

/// A GPS time or time offset with nanosecond resolution.
///
/// Timestamps are kept as two integers rather than a float so that offset
/// arithmetic stays exact over observation spans of years: adding and
/// removing a time-slide offset restores the original value bit for bit.
///
/// The nanosecond field is always normalized into `0..1_000_000_000`, so the
/// derived lexicographic ordering agrees with the time line and negative
/// offsets are representable (e.g. −0.5 s is `(-1 s, 500_000_000 ns)`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GpsTime {
    seconds: i64,
    nanoseconds: i32,
}

impl GpsTime {
    /// The zero time / zero offset.
    pub const ZERO: GpsTime = GpsTime {
        seconds: 0,
        nanoseconds: 0,
    };

    /// Create a timestamp from seconds and nanoseconds.
    ///
    /// The nanoseconds may be any magnitude or sign; they are normalized
    /// into `0..1_000_000_000` with the excess carried into the seconds.
    pub const fn new(seconds: i64, nanoseconds: i64) -> Self {
        Self {
            seconds: seconds + nanoseconds.div_euclid(NANOSECONDS_PER_SECOND),
            nanoseconds: nanoseconds.rem_euclid(NANOSECONDS_PER_SECOND) as i32,
        }
    }

    /// The whole seconds, rounded towards negative infinity.
    pub const fn seconds(&self) -> i64 {
        self.seconds
    }

    /// The nanosecond remainder, in `0..1_000_000_000`.
    pub const fn nanoseconds(&self) -> i32 {
        self.nanoseconds
    }

    /// Convert from seconds, rounding to the nearest nanosecond.
    pub fn from_secs_f64(seconds: f64) -> Self {
        let nanoseconds = (seconds * NANOSECONDS_PER_SECOND as f64).round() as i64;
        Self::new(0, nanoseconds)
    }

    /// Convert to seconds. Lossy above ~2^53 ns; only used for statistics,
    /// never for bookkeeping.
    pub fn as_secs_f64(&self) -> f64 {
        self.seconds as f64 + self.nanoseconds as f64 / NANOSECONDS_PER_SECOND as f64
    }

    /// The absolute value.
    pub fn abs(self) -> Self {
        if self < Self::ZERO { -self } else { self }
    }
}

impl Add for GpsTime {
    type Output = GpsTime;

    fn add(self, rhs: GpsTime) -> GpsTime {
        GpsTime::new(
            self.seconds + rhs.seconds,
            self.nanoseconds as i64 + rhs.nanoseconds as i64,
        )
    }
}

impl AddAssign for GpsTime {
    fn add_assign(&mut self, rhs: GpsTime) {
        *self = *self + rhs;
    }
}

impl Sub for GpsTime {
    type Output = GpsTime;

    fn sub(self, rhs: GpsTime) -> GpsTime {
        GpsTime::new(
            self.seconds - rhs.seconds,
            self.nanoseconds as i64 - rhs.nanoseconds as i64,
        )
    }
}

impl SubAssign for GpsTime {
    fn sub_assign(&mut self, rhs: GpsTime) {
        *self = *self - rhs;
    }
}

impl Neg for GpsTime {
    type Output = GpsTime;

    fn neg(self) -> GpsTime {
        GpsTime::new(-self.seconds, -(self.nanoseconds as i64))
    }
}

impl fmt::Display for GpsTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut seconds = self.seconds;
        let mut nanoseconds = self.nanoseconds as i64;
        if seconds < 0 && nanoseconds > 0 {
            seconds += 1;
            nanoseconds -= NANOSECONDS_PER_SECOND;
        }
        if seconds == 0 && nanoseconds < 0 {
            write!(f, "-0.{:09}", -nanoseconds)
        } else {
            write!(f, "{}.{:09}", seconds, nanoseconds.abs())
        }
    }
}
