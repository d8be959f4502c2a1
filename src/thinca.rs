//! The time-slide driver and the coincidence recording seam.

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use log::{debug, info, warn};
use thiserror::Error;

use crate::coinc::{CoincidenceGraph, CoincidentNtuples, ThresholdTable, replicate_threshold};
use crate::ethinca::ethinca_coincidence;
use crate::event::{EventId, TriggerEvent};
use crate::eventlist::{EventList, StateError};
use crate::gps::GpsTime;

/// Identifier of the process whose triggers are being searched, carried
/// through unmodified to the coincidence records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProcessId(pub u64);

/// Identifier of one time slide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlideId(pub u64);

/// A named offset vector: one signed time offset per participating
/// instrument. Instruments absent from the mapping are not relocated in
/// this slide.
#[derive(Clone, Debug)]
pub struct TimeSlide {
    /// Identifier the slide's coincidences are tagged with.
    pub id: SlideId,
    /// Per-instrument signed time offsets.
    pub offsets: BTreeMap<String, GpsTime>,
}

/// Coincidence threshold configuration.
#[derive(Clone, Debug)]
pub enum Thresholds {
    /// One scalar, replicated over both orderings of every participating
    /// instrument pair.
    Single(f64),
    /// Explicit per-ordered-pair thresholds. Must contain both orderings of
    /// every pair named by the time slides; the two orderings may differ
    /// since the statistic is not required to be symmetric.
    PerPair(ThresholdTable),
}

/// Default ± window for the time-compatibility pre-filter: 0.5 s, a
/// conservative bound on inter-site light travel time plus timing error.
pub const DEFAULT_COINCIDENCE_WINDOW: GpsTime = GpsTime::new(0, 500_000_000);

/// Errors that abort a coincidence run.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ThincaError {
    /// A threshold is not a finite, non-negative number. Reported before
    /// any slide is attempted.
    #[error("invalid coincidence threshold {0}")]
    InvalidThreshold(f64),
    /// A per-pair threshold table lacks an instrument pair required by the
    /// time slides, or lacks one ordering of a pair it names.
    #[error("threshold table is missing instrument pair ({0}, {1})")]
    MissingThreshold(String, String),
    /// Offset/index state machine violation; indicates a driver bug, and
    /// times can no longer be trusted.
    #[error(transparent)]
    State(#[from] StateError),
}

/// Record of one accepted coincidence: the process, the time slide and the
/// participating triggers. Append-only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoincRecord {
    /// The process the coincidence belongs to.
    pub process_id: ProcessId,
    /// The time slide the coincidence was found in.
    pub slide_id: SlideId,
    /// The triggers forming the n-tuple, one per instrument.
    pub event_ids: Vec<EventId>,
}

/// Sink for accepted n-tuples.
///
/// The driver calls [`record_coinc`](CoincRecorder::record_coinc) exactly
/// once per accepted tuple, and never for vetoed tuples or skipped slides.
pub trait CoincRecorder {
    /// Record one accepted n-tuple.
    fn record_coinc(&mut self, process_id: ProcessId, slide_id: SlideId, event_ids: &[EventId]);
}

/// Append-only in-memory coincidence table, the provided
/// [`CoincRecorder`] implementation.
#[derive(Clone, Debug, Default)]
pub struct CoincTable {
    rows: Vec<CoincRecord>,
}

impl CoincTable {
    /// The recorded coincidences, in recording order.
    pub fn rows(&self) -> &[CoincRecord] {
        &self.rows
    }
}

impl CoincRecorder for CoincTable {
    fn record_coinc(&mut self, process_id: ProcessId, slide_id: SlideId, event_ids: &[EventId]) {
        self.rows.push(CoincRecord {
            process_id,
            slide_id,
            event_ids: event_ids.to_vec(),
        });
    }
}

/// Default pairwise coincidence test, the ellipsoidal statistic from
/// [`ethinca`](crate::ethinca_coincidence).
pub type DefaultCoincidenceTest = fn(&TriggerEvent, &TriggerEvent, f64) -> bool;

/// Placeholder n-tuple veto type when none is configured.
pub type DefaultNtupleVeto = fn(&[&TriggerEvent]) -> bool;

/// The central struct of this library.
///
/// Use this to configure and run the coincidence search over a set of
/// triggers and time slides. Construct it with [`Thinca::new`], adjust
/// parameters with the `with_*()` functions, then consume it with
/// [`run`](Thinca::run) (or [`run_par`](Thinca::run_par) with the
/// `parallel` feature).
#[derive(Clone)]
pub struct Thinca<C = DefaultCoincidenceTest, V = DefaultNtupleVeto>
where
    C: Fn(&TriggerEvent, &TriggerEvent, f64) -> bool,
    V: Fn(&[&TriggerEvent]) -> bool,
{
    lists: BTreeMap<String, EventList>,
    slides: Vec<TimeSlide>,
    process_id: ProcessId,
    thresholds: Thresholds,
    window: GpsTime,
    max_slide_gap: Option<GpsTime>,
    is_coincident: C,
    ntuple_veto: Option<V>,
}

impl Thinca {
    /// Create a search over `events` and `slides`, with one global
    /// `threshold` and the ellipsoidal coincidence test.
    ///
    /// Events are grouped into one [`EventList`] per instrument. The
    /// time-compatibility window defaults to
    /// [`DEFAULT_COINCIDENCE_WINDOW`]; no slide-gap pruning and no n-tuple
    /// veto are configured.
    pub fn new(
        events: impl IntoIterator<Item = TriggerEvent>,
        slides: Vec<TimeSlide>,
        process_id: ProcessId,
        threshold: f64,
    ) -> Self {
        let mut lists: BTreeMap<String, EventList> = BTreeMap::new();
        for event in events {
            lists
                .entry(event.instrument.clone())
                .or_insert_with(|| EventList::new(event.instrument.clone()))
                .push(event);
        }
        Self {
            lists,
            slides,
            process_id,
            thresholds: Thresholds::Single(threshold),
            window: DEFAULT_COINCIDENCE_WINDOW,
            max_slide_gap: None,
            is_coincident: ethinca_coincidence,
            ntuple_veto: None,
        }
    }
}

impl<C, V> Thinca<C, V>
where
    C: Fn(&TriggerEvent, &TriggerEvent, f64) -> bool,
    V: Fn(&[&TriggerEvent]) -> bool,
{
    /// Set a single global threshold, replicated over every instrument
    /// pair.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.thresholds = Thresholds::Single(threshold);
        self
    }

    /// Set explicit per-ordered-pair thresholds.
    pub fn with_thresholds(mut self, thresholds: ThresholdTable) -> Self {
        self.thresholds = Thresholds::PerPair(thresholds);
        self
    }

    /// Set the ± time-compatibility window used by the range queries.
    pub fn with_coincidence_window(mut self, window: GpsTime) -> Self {
        self.window = window;
        self
    }

    /// Prune slides whose offset spread (largest minus smallest offset)
    /// exceeds `gap`, before any offset is applied.
    ///
    /// An optimization, not a correctness requirement: pruned slides could
    /// only ever produce candidates the window rejects anyway.
    pub fn with_max_slide_gap(mut self, gap: GpsTime) -> Self {
        self.max_slide_gap = Some(gap);
        self
    }

    /// Replace the pairwise coincidence test.
    pub fn with_coincidence_test<C2>(self, test: C2) -> Thinca<C2, V>
    where
        C2: Fn(&TriggerEvent, &TriggerEvent, f64) -> bool,
    {
        Thinca {
            lists: self.lists,
            slides: self.slides,
            process_id: self.process_id,
            thresholds: self.thresholds,
            window: self.window,
            max_slide_gap: self.max_slide_gap,
            is_coincident: test,
            ntuple_veto: self.ntuple_veto,
        }
    }

    /// Set a veto applied to each otherwise-accepted n-tuple before it is
    /// recorded; return true to reject the tuple.
    pub fn with_ntuple_veto<V2>(self, veto: V2) -> Thinca<C, V2>
    where
        V2: Fn(&[&TriggerEvent]) -> bool,
    {
        Thinca {
            lists: self.lists,
            slides: self.slides,
            process_id: self.process_id,
            thresholds: self.thresholds,
            window: self.window,
            max_slide_gap: self.max_slide_gap,
            is_coincident: self.is_coincident,
            ntuple_veto: Some(veto),
        }
    }

    /// Run the search, feeding every accepted n-tuple to `recorder`.
    ///
    /// Slides are processed in source order. A slide naming fewer than two
    /// instruments, naming an instrument with no data, or exceeding the
    /// configured slide gap is logged and skipped without failing the run.
    /// After the run every event list is back at zero offset.
    pub fn run<R: CoincRecorder>(mut self, recorder: &mut R) -> Result<(), ThincaError> {
        self.validate()?;

        info!("indexing ...");
        for list in self.lists.values_mut() {
            list.build_index();
        }
        let avail: BTreeSet<String> = self
            .lists
            .values()
            .filter(|list| !list.is_empty())
            .map(|list| list.instrument().to_string())
            .collect();

        let n_slides = self.slides.len();
        for (n, slide) in self.slides.iter().enumerate() {
            info!(
                "time slide {}/{}: {}",
                n + 1,
                n_slides,
                slide
                    .offsets
                    .iter()
                    .map(|(instrument, offset)| format!("{instrument} = {offset} s"))
                    .join(", ")
            );
            if let Some(reason) = skip_reason(slide, &avail, self.max_slide_gap) {
                warn!("\t{reason}: skipped");
                continue;
            }

            debug!("\tapplying time offsets ...");
            for (instrument, &offset) in &slide.offsets {
                if let Some(list) = self.lists.get_mut(instrument) {
                    list.apply_offset(offset)?;
                }
            }

            debug!("\tsearching ...");
            let instruments: Vec<String> = slide.offsets.keys().cloned().collect();
            let thresholds = match &self.thresholds {
                Thresholds::Single(value) => replicate_threshold(*value, &instruments),
                Thresholds::PerPair(table) => table.clone(),
            };
            let mut accepted = 0usize;
            {
                let participating: Vec<&EventList> =
                    instruments.iter().map(|i| &self.lists[i]).collect();
                let graph = CoincidenceGraph::build(
                    &participating,
                    &thresholds,
                    self.window,
                    &self.is_coincident,
                )?;
                for ntuple in CoincidentNtuples::new(graph) {
                    if let Some(veto) = &self.ntuple_veto {
                        if veto(&ntuple) {
                            continue;
                        }
                    }
                    let event_ids: Vec<EventId> = ntuple.iter().map(|e| e.id).collect();
                    recorder.record_coinc(self.process_id, slide.id, &event_ids);
                    accepted += 1;
                }
            }
            debug!("\trecorded {accepted} coincidences");

            debug!("\tremoving time offsets ...");
            for instrument in slide.offsets.keys() {
                if let Some(list) = self.lists.get_mut(instrument) {
                    list.remove_offset()?;
                }
            }
        }

        Ok(())
    }

    /// Fail on malformed configuration before any slide is attempted.
    fn validate(&self) -> Result<(), ThincaError> {
        match &self.thresholds {
            Thresholds::Single(value) => {
                if !value.is_finite() || *value < 0.0 {
                    return Err(ThincaError::InvalidThreshold(*value));
                }
            }
            Thresholds::PerPair(table) => {
                for ((a, b), value) in table {
                    if !value.is_finite() || *value < 0.0 {
                        return Err(ThincaError::InvalidThreshold(*value));
                    }
                    if !table.contains_key(&(b.clone(), a.clone())) {
                        return Err(ThincaError::MissingThreshold(b.clone(), a.clone()));
                    }
                }
                for slide in &self.slides {
                    for (a, b) in slide.offsets.keys().tuple_combinations() {
                        if !table.contains_key(&(a.clone(), b.clone())) {
                            return Err(ThincaError::MissingThreshold(a.clone(), b.clone()));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Why a slide cannot be searched, or `None` if it can.
fn skip_reason(
    slide: &TimeSlide,
    avail: &BTreeSet<String>,
    max_slide_gap: Option<GpsTime>,
) -> Option<String> {
    if slide.offsets.len() < 2 {
        return Some("single-instrument time slide".to_string());
    }
    let missing = slide
        .offsets
        .keys()
        .filter(|instrument| !avail.contains(*instrument))
        .join(", ");
    if !missing.is_empty() {
        return Some(format!("no data for instrument(s) {missing}"));
    }
    if let Some(gap) = max_slide_gap {
        if let Some((min, max)) = slide.offsets.values().copied().minmax().into_option() {
            let spread = max - min;
            if spread > gap {
                return Some(format!(
                    "offset spread {spread} s exceeds the maximum slide gap"
                ));
            }
        }
    }
    None
}

#[cfg(feature = "parallel")]
mod parallel {
    use super::*;
    use rayon::prelude::*;

    impl<C, V> Thinca<C, V>
    where
        C: Fn(&TriggerEvent, &TriggerEvent, f64) -> bool + Sync,
        V: Fn(&[&TriggerEvent]) -> bool + Sync,
    {
        /// Run the search with the time slides distributed across rayon
        /// workers.
        ///
        /// Each worker searches private copies of the event lists it needs,
        /// since the offset protocol mutates lists in place; the shared
        /// originals are never offset. Results are recorded sequentially in
        /// slide order, preserving the exactly-once contract of
        /// [`run`](Thinca::run).
        pub fn run_par<R: CoincRecorder>(mut self, recorder: &mut R) -> Result<(), ThincaError> {
            self.validate()?;

            info!("indexing ...");
            for list in self.lists.values_mut() {
                list.build_index();
            }
            let avail: BTreeSet<String> = self
                .lists
                .values()
                .filter(|list| !list.is_empty())
                .map(|list| list.instrument().to_string())
                .collect();

            let lists = &self.lists;
            let is_coincident = &self.is_coincident;
            let ntuple_veto = &self.ntuple_veto;
            let global_thresholds = &self.thresholds;
            let window = self.window;
            let max_slide_gap = self.max_slide_gap;
            let n_slides = self.slides.len();

            let results: Vec<Vec<Vec<EventId>>> = self
                .slides
                .par_iter()
                .enumerate()
                .map(|(n, slide)| {
                    info!(
                        "time slide {}/{}: {}",
                        n + 1,
                        n_slides,
                        slide
                            .offsets
                            .iter()
                            .map(|(instrument, offset)| format!("{instrument} = {offset} s"))
                            .join(", ")
                    );
                    if let Some(reason) = skip_reason(slide, &avail, max_slide_gap) {
                        warn!("\t{reason}: skipped");
                        return Ok(Vec::new());
                    }

                    let mut copies: Vec<EventList> = slide
                        .offsets
                        .keys()
                        .map(|instrument| lists[instrument].clone())
                        .collect();
                    for (copy, &offset) in copies.iter_mut().zip(slide.offsets.values()) {
                        copy.apply_offset(offset)?;
                    }

                    let instruments: Vec<String> = slide.offsets.keys().cloned().collect();
                    let thresholds = match global_thresholds {
                        Thresholds::Single(value) => replicate_threshold(*value, &instruments),
                        Thresholds::PerPair(table) => table.clone(),
                    };
                    let participating: Vec<&EventList> = copies.iter().collect();
                    let graph = CoincidenceGraph::build(
                        &participating,
                        &thresholds,
                        window,
                        is_coincident,
                    )?;
                    let mut tuples = Vec::new();
                    for ntuple in CoincidentNtuples::new(graph) {
                        if let Some(veto) = ntuple_veto {
                            if veto(&ntuple) {
                                continue;
                            }
                        }
                        tuples.push(ntuple.iter().map(|e| e.id).collect());
                    }
                    Ok(tuples)
                })
                .collect::<Result<_, ThincaError>>()?;

            for (slide, tuples) in self.slides.iter().zip(results) {
                for event_ids in tuples {
                    recorder.record_coinc(self.process_id, slide.id, &event_ids);
                }
            }

            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Once;

    use super::*;
    use crate::event::InspiralParams;

    fn init_logging() {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            let _ = simplelog::SimpleLogger::init(
                simplelog::LevelFilter::Debug,
                simplelog::Config::default(),
            );
        });
    }

    fn event(id: u64, instrument: &str, end: GpsTime) -> TriggerEvent {
        TriggerEvent::new(EventId(id), instrument, end, InspiralParams::default())
    }

    fn slide(id: u64, offsets: &[(&str, GpsTime)]) -> TimeSlide {
        TimeSlide {
            id: SlideId(id),
            offsets: offsets
                .iter()
                .map(|(instrument, offset)| (instrument.to_string(), *offset))
                .collect(),
        }
    }

    fn zero_lag(id: u64, instruments: &[&str]) -> TimeSlide {
        TimeSlide {
            id: SlideId(id),
            offsets: instruments
                .iter()
                .map(|i| (i.to_string(), GpsTime::ZERO))
                .collect(),
        }
    }

    /// Two triggers 0.3 s apart: one zero-lag double (identity metric
    /// distance 0.09 ≤ 10).
    #[test]
    fn zero_lag_double_is_recorded_once() {
        init_logging();
        let events = vec![
            event(1, "H1", GpsTime::new(100, 0)),
            event(2, "L1", GpsTime::from_secs_f64(100.3)),
        ];
        let mut coincs = CoincTable::default();
        Thinca::new(events, vec![zero_lag(0, &["H1", "L1"])], ProcessId(9), 10.0)
            .with_coincidence_window(GpsTime::from_secs_f64(0.5))
            .run(&mut coincs)
            .unwrap();

        assert_eq!(
            coincs.rows().to_vec(),
            vec![CoincRecord {
                process_id: ProcessId(9),
                slide_id: SlideId(0),
                event_ids: vec![EventId(1), EventId(2)],
            }]
        );
    }

    /// Sliding L1 by +2.0 s pushes the gap past the window: no candidates,
    /// no tuples.
    #[test]
    fn slide_past_window_yields_nothing() {
        let events = vec![
            event(1, "H1", GpsTime::new(100, 0)),
            event(2, "L1", GpsTime::from_secs_f64(100.3)),
        ];
        let slides = vec![slide(
            3,
            &[
                ("H1", GpsTime::ZERO),
                ("L1", GpsTime::from_secs_f64(2.0)),
            ],
        )];
        let thinca = Thinca::new(events, slides, ProcessId(0), 10.0)
            .with_coincidence_window(GpsTime::from_secs_f64(0.5));

        let mut recorded: Vec<(SlideId, Vec<EventId>)> = Vec::new();
        struct Probe<'a>(&'a mut Vec<(SlideId, Vec<EventId>)>);
        impl CoincRecorder for Probe<'_> {
            fn record_coinc(&mut self, _: ProcessId, slide_id: SlideId, ids: &[EventId]) {
                self.0.push((slide_id, ids.to_vec()));
            }
        }
        thinca.run(&mut Probe(&mut recorded)).unwrap();
        assert!(recorded.is_empty());
    }

    #[test]
    fn skipped_slides_produce_no_records_and_leave_no_offsets() {
        let events = vec![
            event(1, "H1", GpsTime::new(100, 0)),
            event(2, "L1", GpsTime::from_secs_f64(100.3)),
        ];
        let slides = vec![
            // fewer than two instruments
            zero_lag(0, &["H1"]),
            // references an instrument with no data
            zero_lag(1, &["H1", "V1"]),
            // usable
            zero_lag(2, &["H1", "L1"]),
        ];
        let mut coincs = CoincTable::default();
        Thinca::new(events, slides, ProcessId(0), 10.0)
            .run(&mut coincs)
            .unwrap();

        assert_eq!(coincs.rows().len(), 1);
        assert_eq!(coincs.rows()[0].slide_id, SlideId(2));
    }

    #[test]
    fn skip_rules() {
        let avail: BTreeSet<String> = ["H1", "L1"].iter().map(|s| s.to_string()).collect();
        let gap = Some(GpsTime::new(100, 0));

        assert_eq!(
            skip_reason(&zero_lag(0, &["H1"]), &avail, gap),
            Some("single-instrument time slide".to_string())
        );
        assert_eq!(
            skip_reason(&zero_lag(0, &["H1", "V1"]), &avail, gap),
            Some("no data for instrument(s) V1".to_string())
        );
        let wide = slide(0, &[("H1", GpsTime::ZERO), ("L1", GpsTime::new(500, 0))]);
        assert_eq!(
            skip_reason(&wide, &avail, gap),
            Some("offset spread 500.000000000 s exceeds the maximum slide gap".to_string())
        );
        assert_eq!(skip_reason(&wide, &avail, None), None);
        assert_eq!(skip_reason(&zero_lag(0, &["H1", "L1"]), &avail, gap), None);
    }

    #[test]
    fn max_slide_gap_prunes_wide_slides() {
        let events = vec![
            event(1, "H1", GpsTime::new(100, 0)),
            event(2, "L1", GpsTime::from_secs_f64(100.3)),
        ];
        let slides = vec![
            slide(0, &[("H1", GpsTime::ZERO), ("L1", GpsTime::new(500, 0))]),
            zero_lag(1, &["H1", "L1"]),
        ];
        let mut coincs = CoincTable::default();
        Thinca::new(events, slides, ProcessId(0), 10.0)
            .with_max_slide_gap(GpsTime::new(100, 0))
            .run(&mut coincs)
            .unwrap();

        assert_eq!(coincs.rows().len(), 1);
        assert_eq!(coincs.rows()[0].slide_id, SlideId(1));
    }

    /// A slide that relocates L1 onto an otherwise distant H1 trigger finds
    /// the double, and the zero-lag slide before and after it does not.
    #[test]
    fn offsets_apply_per_slide_and_are_removed_between_slides() {
        let events = vec![
            event(1, "H1", GpsTime::new(100, 0)),
            event(2, "L1", GpsTime::new(105, 0)),
        ];
        let slides = vec![
            zero_lag(0, &["H1", "L1"]),
            slide(
                1,
                &[("H1", GpsTime::ZERO), ("L1", GpsTime::from_secs_f64(-5.0))],
            ),
            zero_lag(2, &["H1", "L1"]),
        ];
        let mut coincs = CoincTable::default();
        Thinca::new(events, slides, ProcessId(0), 10.0)
            .run(&mut coincs)
            .unwrap();

        assert_eq!(coincs.rows().len(), 1);
        assert_eq!(coincs.rows()[0].slide_id, SlideId(1));
        assert_eq!(
            coincs.rows()[0].event_ids,
            vec![EventId(1), EventId(2)]
        );
    }

    #[test]
    fn ntuple_veto_filters_before_recording() {
        let events = vec![
            event(1, "H1", GpsTime::new(100, 0)),
            event(2, "L1", GpsTime::from_secs_f64(100.3)),
        ];
        let mut coincs = CoincTable::default();
        Thinca::new(events, vec![zero_lag(0, &["H1", "L1"])], ProcessId(0), 10.0)
            .with_ntuple_veto(|tuple: &[&TriggerEvent]| {
                tuple.iter().any(|e| e.instrument == "L1")
            })
            .run(&mut coincs)
            .unwrap();
        assert!(coincs.rows().is_empty());
    }

    #[test]
    fn clique_policy_chain_yields_both_pairs() {
        // A at 100.0, B at 100.3, C at 100.6: with a 0.5 s window the A–C
        // pair is never time-compatible, while a permissive threshold makes
        // A–B and B–C coincident
        let events = vec![
            event(1, "H1", GpsTime::new(100, 0)),
            event(2, "L1", GpsTime::from_secs_f64(100.3)),
            event(3, "V1", GpsTime::from_secs_f64(100.6)),
        ];
        let mut coincs = CoincTable::default();
        Thinca::new(
            events,
            vec![zero_lag(0, &["H1", "L1", "V1"])],
            ProcessId(0),
            1e6,
        )
        .with_coincidence_window(GpsTime::from_secs_f64(0.5))
        .run(&mut coincs)
        .unwrap();

        let mut tuples: Vec<Vec<EventId>> =
            coincs.rows().iter().map(|r| r.event_ids.clone()).collect();
        tuples.sort();
        assert_eq!(
            tuples,
            vec![
                vec![EventId(1), EventId(2)],
                vec![EventId(2), EventId(3)],
            ]
        );
    }

    #[test]
    fn clique_policy_full_triple_yields_only_the_triple() {
        let events = vec![
            event(1, "H1", GpsTime::new(100, 0)),
            event(2, "L1", GpsTime::from_secs_f64(100.1)),
            event(3, "V1", GpsTime::from_secs_f64(100.2)),
        ];
        let mut coincs = CoincTable::default();
        Thinca::new(
            events,
            vec![zero_lag(0, &["H1", "L1", "V1"])],
            ProcessId(0),
            1e6,
        )
        .run(&mut coincs)
        .unwrap();

        assert_eq!(coincs.rows().len(), 1);
        assert_eq!(
            coincs.rows()[0].event_ids,
            vec![EventId(1), EventId(2), EventId(3)]
        );
    }

    #[test]
    fn invalid_threshold_fails_before_any_slide() {
        let events = vec![
            event(1, "H1", GpsTime::new(100, 0)),
            event(2, "L1", GpsTime::from_secs_f64(100.3)),
        ];
        let mut coincs = CoincTable::default();
        let result = Thinca::new(events, vec![zero_lag(0, &["H1", "L1"])], ProcessId(0), -1.0)
            .run(&mut coincs);
        assert_eq!(result, Err(ThincaError::InvalidThreshold(-1.0)));
        assert!(coincs.rows().is_empty());
    }

    #[test]
    fn asymmetric_per_pair_table_is_rejected() {
        let events = vec![
            event(1, "H1", GpsTime::new(100, 0)),
            event(2, "L1", GpsTime::from_secs_f64(100.3)),
        ];
        let mut table = ThresholdTable::new();
        table.insert(("H1".to_string(), "L1".to_string()), 10.0);
        let mut coincs = CoincTable::default();
        let result = Thinca::new(events, vec![zero_lag(0, &["H1", "L1"])], ProcessId(0), 10.0)
            .with_thresholds(table)
            .run(&mut coincs);
        assert_eq!(
            result,
            Err(ThincaError::MissingThreshold(
                "L1".to_string(),
                "H1".to_string()
            ))
        );
    }

    #[test]
    fn per_pair_table_must_cover_slide_pairs() {
        let events = vec![
            event(1, "H1", GpsTime::new(100, 0)),
            event(2, "L1", GpsTime::from_secs_f64(100.3)),
        ];
        let mut table = ThresholdTable::new();
        table.insert(("H1".to_string(), "V1".to_string()), 10.0);
        table.insert(("V1".to_string(), "H1".to_string()), 10.0);
        let mut coincs = CoincTable::default();
        let result = Thinca::new(events, vec![zero_lag(0, &["H1", "L1"])], ProcessId(0), 10.0)
            .with_thresholds(table)
            .run(&mut coincs);
        assert_eq!(
            result,
            Err(ThincaError::MissingThreshold(
                "H1".to_string(),
                "L1".to_string()
            ))
        );
    }

    #[test]
    fn custom_coincidence_test_is_used() {
        let events = vec![
            event(1, "H1", GpsTime::new(100, 0)),
            event(2, "L1", GpsTime::from_secs_f64(100.3)),
        ];
        let mut coincs = CoincTable::default();
        Thinca::new(events, vec![zero_lag(0, &["H1", "L1"])], ProcessId(0), 10.0)
            .with_coincidence_test(|_: &TriggerEvent, _: &TriggerEvent, _| false)
            .run(&mut coincs)
            .unwrap();
        assert!(coincs.rows().is_empty());
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_run_matches_sequential() {
        let events = vec![
            event(1, "H1", GpsTime::new(100, 0)),
            event(2, "L1", GpsTime::from_secs_f64(100.3)),
            event(3, "V1", GpsTime::from_secs_f64(100.1)),
            event(4, "H1", GpsTime::new(200, 0)),
            event(5, "L1", GpsTime::from_secs_f64(203.2)),
        ];
        let slides = vec![
            zero_lag(0, &["H1", "L1", "V1"]),
            slide(
                1,
                &[("H1", GpsTime::ZERO), ("L1", GpsTime::from_secs_f64(-3.0))],
            ),
            zero_lag(2, &["H1"]),
            slide(
                3,
                &[("H1", GpsTime::ZERO), ("L1", GpsTime::from_secs_f64(50.0))],
            ),
        ];

        let mut sequential = CoincTable::default();
        Thinca::new(events.clone(), slides.clone(), ProcessId(0), 1e6)
            .run(&mut sequential)
            .unwrap();

        let mut parallel = CoincTable::default();
        Thinca::new(events, slides, ProcessId(0), 1e6)
            .run_par(&mut parallel)
            .unwrap();

        assert_eq!(sequential.rows(), parallel.rows());
        assert!(!sequential.rows().is_empty());
    }
}
