#![warn(missing_docs)]

//! Rust port of the inspiral coincidence search `ligolw_thinca` from the
//! [pylal gravitational-wave analysis library](https://git.ligo.org/lscsoft/pylal). \
//! Given single-detector inspiral trigger events and a set of time slides,
//! it finds the n-tuples (n ≥ 2) of triggers from different detectors that
//! are mutually consistent with a common source, and feeds them to a
//! coincidence recorder. Document I/O, summary pages and plotting of the
//! original are not included; triggers come in as plain values and results
//! go out through the [`CoincRecorder`] seam.
//!
//! ## Interface
//! The central struct of this library is [`Thinca`]. It is used to supply
//! the triggers, the time slides and the matching parameters, and to run
//! the search. Additional parameters are set via `Thinca::with_*()`
//! functions.
//!
//! Example:
//! ```rust
//! # use std::collections::BTreeMap;
//! # use thinca::{
//! #     CoincTable, EventId, GpsTime, InspiralParams, ProcessId, SlideId, Thinca, TimeSlide,
//! #     TriggerEvent,
//! # };
//! let events = vec![
//!     TriggerEvent::new(EventId(1), "H1", GpsTime::new(100, 0), InspiralParams::default()),
//!     TriggerEvent::new(EventId(2), "L1", GpsTime::new(100, 300_000_000), InspiralParams::default()),
//! ];
//! let zero_lag = TimeSlide {
//!     id: SlideId(0),
//!     offsets: BTreeMap::from([
//!         ("H1".to_string(), GpsTime::ZERO),
//!         ("L1".to_string(), GpsTime::ZERO),
//!     ]),
//! };
//!
//! let mut coincs = CoincTable::default();
//! Thinca::new(events, vec![zero_lag], ProcessId(0), 10.0)
//!     .with_coincidence_window(GpsTime::from_secs_f64(0.5))
//!     .run(&mut coincs)?;
//! assert_eq!(coincs.rows().len(), 1);
//! # Ok::<(), thinca::ThincaError>(())
//! ```
//!
//! Slides can also be searched in parallel with [`Thinca::run_par()`]
//! (feature `parallel`, enabled by default); each worker operates on its own
//! copy of the event lists and results are recorded in slide order.
//!
//! ## Parameters
//! - `threshold`: Maximum allowed value of the pairwise coincidence
//!     statistic, either one global scalar replicated over every detector
//!     pair or an explicit per-pair table.
//! - `coincidence_window`: ± window on the end-time difference within which
//!     a trigger pair is even considered; necessary but not sufficient for
//!     coincidence. Defaults to 0.5 s.
//! - `max_slide_gap`: Optional pruning of time slides whose offset spread
//!     makes any coincidence unreachable.
//! - `ntuple_veto`: Optional rejection function applied to each
//!     otherwise-accepted tuple before it is recorded.
//!
//! The pairwise test defaults to the ellipsoidal statistic
//! [`ethinca_coincidence`] and can be replaced wholesale with
//! [`Thinca::with_coincidence_test()`]. Progress reporting goes through the
//! [`log`] facade and has no behavioral effect.

pub(crate) mod coinc;
pub(crate) mod ethinca;
pub(crate) mod event;
pub(crate) mod eventlist;
pub(crate) mod gps;
pub(crate) mod thinca;

pub use coinc::{ThresholdTable, replicate_threshold};
pub use ethinca::{EthincaError, ethinca_coincidence, ethinca_parameter};
pub use event::{EventId, InspiralParams, TriggerEvent};
pub use eventlist::{EventList, StateError};
pub use gps::GpsTime;
pub use thinca::{
    CoincRecord, CoincRecorder, CoincTable, DEFAULT_COINCIDENCE_WINDOW, DefaultCoincidenceTest,
    DefaultNtupleVeto, ProcessId, SlideId, Thinca, ThincaError, Thresholds, TimeSlide,
};
