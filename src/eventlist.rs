//! Per-instrument event list management.

use std::ops::Range;

use thiserror::Error;

use crate::event::TriggerEvent;
use crate::gps::GpsTime;

/// Violation of the offset/index state machine.
///
/// These are programming-contract errors: they indicate a driver bug and
/// abort the run, since the list's event times can no longer be trusted.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StateError {
    /// A range query was issued before [`EventList::build_index`].
    #[error("event list for {0} has not been indexed")]
    NotIndexed(String),
    /// [`EventList::apply_offset`] was called while an offset was still
    /// applied.
    #[error("event list for {0} already has an offset applied")]
    OffsetAlreadyApplied(String),
    /// [`EventList::remove_offset`] was called with no offset applied.
    #[error("event list for {0} has no offset applied")]
    OffsetNotApplied(String),
}

/// The ordered collection of one instrument's triggers.
///
/// Events are sorted by end time by [`build_index`](EventList::build_index)
/// so that [`coincident_candidates`](EventList::coincident_candidates) can
/// locate time-compatible triggers with bisection searches.
#[derive(Clone, Debug)]
pub struct EventList {
    instrument: String,
    events: Vec<TriggerEvent>,
    offset: Option<GpsTime>,
    indexed: bool,
}

impl EventList {
    /// Create an empty list for one instrument.
    pub fn new(instrument: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            events: Vec::new(),
            offset: None,
            indexed: false,
        }
    }

    /// The instrument this list belongs to.
    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// The events, in index order once [`build_index`](EventList::build_index)
    /// has run.
    pub fn events(&self) -> &[TriggerEvent] {
        &self.events
    }

    /// The number of events in the list.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the list holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The currently applied time-slide offset, if any.
    pub fn offset(&self) -> Option<GpsTime> {
        self.offset
    }

    /// Append an event, invalidating the index.
    pub fn push(&mut self, event: TriggerEvent) {
        self.indexed = false;
        self.events.push(event);
    }

    /// Sort events by end time ascending, nanosecond remainder breaking
    /// ties, so that bisection searches can retrieve them.
    ///
    /// Must be called before any range query. It does not need to be called
    /// again after [`apply_offset`](EventList::apply_offset) or
    /// [`remove_offset`](EventList::remove_offset): this list only supports
    /// a single uniform offset across all events, which preserves the sort
    /// order.
    pub fn build_index(&mut self) {
        self.events.sort_by_key(TriggerEvent::end);
        self.indexed = true;
    }

    /// Add `delta` to the end time of every event.
    ///
    /// The shift is additive and uniform, so the index stays valid. Fails if
    /// an offset is already applied; offsets do not stack.
    pub fn apply_offset(&mut self, delta: GpsTime) -> Result<(), StateError> {
        if self.offset.is_some() {
            return Err(StateError::OffsetAlreadyApplied(self.instrument.clone()));
        }
        for event in &mut self.events {
            event.shift(delta);
        }
        self.offset = Some(delta);
        Ok(())
    }

    /// Reverse the currently applied offset, restoring every event's
    /// original end time exactly.
    ///
    /// Fails if no offset is applied.
    pub fn remove_offset(&mut self) -> Result<(), StateError> {
        let delta = self
            .offset
            .take()
            .ok_or_else(|| StateError::OffsetNotApplied(self.instrument.clone()))?;
        for event in &mut self.events {
            event.shift(-delta);
        }
        Ok(())
    }

    /// The events whose end time lies within `window` of `end` (inclusive
    /// on both sides), located with two bisection searches.
    ///
    /// The window is a necessary but not sufficient condition for
    /// coincidence: final admission is decided by the pairwise coincidence
    /// test.
    pub fn coincident_candidates(
        &self,
        end: GpsTime,
        window: GpsTime,
    ) -> Result<&[TriggerEvent], StateError> {
        Ok(&self.events[self.coincident_range(end, window)?])
    }

    /// The index range of the events returned by
    /// [`coincident_candidates`](EventList::coincident_candidates).
    pub(crate) fn coincident_range(
        &self,
        end: GpsTime,
        window: GpsTime,
    ) -> Result<Range<usize>, StateError> {
        if !self.indexed {
            return Err(StateError::NotIndexed(self.instrument.clone()));
        }
        let lo = end - window;
        let hi = end + window;
        let start = self.events.partition_point(|e| e.end() < lo);
        let stop = self.events.partition_point(|e| e.end() <= hi);
        Ok(start..stop)
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;
    use crate::event::{EventId, InspiralParams};

    fn event(id: u64, end: GpsTime) -> TriggerEvent {
        TriggerEvent::new(EventId(id), "H1", end, InspiralParams::default())
    }

    fn list(ends: &[GpsTime]) -> EventList {
        let mut list = EventList::new("H1");
        for (id, &end) in ends.iter().enumerate() {
            list.push(event(id as u64, end));
        }
        list.build_index();
        list
    }

    #[test]
    fn index_sorts_with_nanosecond_tie_break() {
        let list = list(&[
            GpsTime::new(100, 2),
            GpsTime::new(99, 999_999_999),
            GpsTime::new(100, 1),
        ]);
        let ends: Vec<GpsTime> = list.events().iter().map(TriggerEvent::end).collect();
        assert_eq!(
            ends,
            vec![
                GpsTime::new(99, 999_999_999),
                GpsTime::new(100, 1),
                GpsTime::new(100, 2),
            ]
        );
    }

    #[test]
    fn range_query_matches_linear_scan() {
        let mut rng = rand::rng();
        let ends: Vec<GpsTime> = (0..500)
            .map(|_| GpsTime::new(rng.random_range(0..100), rng.random_range(0..1_000_000_000)))
            .collect();
        let list = list(&ends);
        let window = GpsTime::from_secs_f64(0.5);

        for _ in 0..100 {
            let reference =
                GpsTime::new(rng.random_range(0..100), rng.random_range(0..1_000_000_000));
            let candidates = list.coincident_candidates(reference, window).unwrap();
            let brute: Vec<&TriggerEvent> = list
                .events()
                .iter()
                .filter(|e| (e.end() - reference).abs() <= window)
                .collect();
            assert_eq!(candidates.iter().collect::<Vec<_>>(), brute);
        }
    }

    #[test]
    fn range_query_window_is_inclusive() {
        let list = list(&[
            GpsTime::new(99, 500_000_000),
            GpsTime::new(100, 0),
            GpsTime::new(100, 500_000_000),
            GpsTime::new(100, 500_000_001),
        ]);
        let candidates = list
            .coincident_candidates(GpsTime::new(100, 0), GpsTime::from_secs_f64(0.5))
            .unwrap();
        assert_eq!(candidates.len(), 3);
    }

    #[test]
    fn query_before_index_fails() {
        let mut list = EventList::new("L1");
        list.push(event(0, GpsTime::new(100, 0)));
        assert_eq!(
            list.coincident_candidates(GpsTime::new(100, 0), GpsTime::ZERO),
            Err(StateError::NotIndexed("L1".to_string()))
        );
    }

    #[test]
    fn offset_round_trip_restores_times() {
        let mut rng = rand::rng();
        let ends: Vec<GpsTime> = (0..100)
            .map(|_| {
                GpsTime::new(
                    rng.random_range(800_000_000..900_000_000),
                    rng.random_range(0..1_000_000_000),
                )
            })
            .collect();
        let mut list = list(&ends);
        let original = list.events().to_vec();

        for delta in [
            GpsTime::from_secs_f64(17.524),
            GpsTime::from_secs_f64(-3.999999999),
            GpsTime::ZERO,
        ] {
            list.apply_offset(delta).unwrap();
            assert_eq!(list.offset(), Some(delta));
            list.remove_offset().unwrap();
            assert_eq!(list.offset(), None);
            assert_eq!(list.events(), original.as_slice());
        }
    }

    #[test]
    fn offset_state_machine_is_enforced() {
        let mut list = list(&[GpsTime::new(100, 0)]);
        assert_eq!(
            list.remove_offset(),
            Err(StateError::OffsetNotApplied("H1".to_string()))
        );
        list.apply_offset(GpsTime::from_secs_f64(1.0)).unwrap();
        assert_eq!(
            list.apply_offset(GpsTime::from_secs_f64(2.0)),
            Err(StateError::OffsetAlreadyApplied("H1".to_string()))
        );
        list.remove_offset().unwrap();
        assert_eq!(
            list.remove_offset(),
            Err(StateError::OffsetNotApplied("H1".to_string()))
        );
    }

    #[test]
    fn query_reflects_applied_offset() {
        let mut list = list(&[GpsTime::new(100, 0)]);
        list.apply_offset(GpsTime::from_secs_f64(2.0)).unwrap();
        assert!(
            list.coincident_candidates(GpsTime::new(100, 0), GpsTime::from_secs_f64(0.5))
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            list.coincident_candidates(GpsTime::new(102, 0), GpsTime::from_secs_f64(0.5))
                .unwrap()
                .len(),
            1
        );
        list.remove_offset().unwrap();
    }
}
