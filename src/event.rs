//! Single-detector inspiral trigger events.

use std::fmt;

use crate::gps::GpsTime;

/// Identifier of a single-detector trigger, unique within a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sngl_inspiral:event_id:{}", self.0)
    }
}

/// Intrinsic template parameters entering the ellipsoidal coincidence
/// statistic.
///
/// The metric components correspond to the Gamma0–Gamma5 columns of a
/// `sngl_inspiral` row: the packed upper triangle of the symmetric 3×3
/// parameter-space metric in (end time, τ0, τ3) coordinates, in the order
/// `[g_tt, g_tτ0, g_tτ3, g_τ0τ0, g_τ0τ3, g_τ3τ3]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InspiralParams {
    /// Newtonian chirp time τ0, in seconds.
    pub tau0: f64,
    /// 1.5 PN chirp time τ3, in seconds.
    pub tau3: f64,
    /// Packed upper triangle of the parameter-space metric.
    pub metric: [f64; 6],
}

impl Default for InspiralParams {
    /// Zero chirp times with the identity metric, under which the
    /// ellipsoidal statistic reduces to the squared parameter distance.
    fn default() -> Self {
        Self {
            tau0: 0.0,
            tau3: 0.0,
            metric: [1.0, 0.0, 0.0, 1.0, 0.0, 1.0],
        }
    }
}

/// One detector's candidate detection.
///
/// Immutable apart from the end time, which the owning
/// [`EventList`](crate::EventList) shifts while a time-slide offset is
/// applied and restores afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct TriggerEvent {
    /// Trigger identifier, carried through to the coincidence records.
    pub id: EventId,
    /// Detector that produced the trigger, e.g. `"H1"`.
    pub instrument: String,
    end: GpsTime,
    /// Payload consumed only by the pairwise coincidence test.
    pub params: InspiralParams,
}

impl TriggerEvent {
    /// Create a new trigger.
    pub fn new(
        id: EventId,
        instrument: impl Into<String>,
        end: GpsTime,
        params: InspiralParams,
    ) -> Self {
        Self {
            id,
            instrument: instrument.into(),
            end,
            params,
        }
    }

    /// The end time, including any currently applied time-slide offset.
    pub fn end(&self) -> GpsTime {
        self.end
    }

    pub(crate) fn shift(&mut self, delta: GpsTime) {
        self.end += delta;
    }
}
