// fretfinder/src/lib.rs

//! The core logic for a realtime guitar note detector.
//!
//! This crate listens to a monophonic guitar signal, detects which single
//! note is being played, and reports every position on the fretboard at
//! which that note can be fingered. It is completely headless: audio capture
//! is the embedder's job, and so is presenting the results.
//!
//! The embedder feeds mono `f32` samples into a [`SampleSource`] (typically
//! the [`RingSource`] half of a wait-free ring buffer whose producer half
//! lives in the audio callback) and receives [`NoteEvent`]s through a
//! [`NoteConsumer`], either by running [`Detector::analyze`] itself or by
//! letting a [`Session`] drive the analysis on a dedicated thread.

pub mod detect;
pub mod pitch;
pub mod session;
pub mod source;
pub mod tuning;

use serde::{Deserialize, Serialize};

use crate::tuning::{Semitone, STRINGS};

pub use crate::detect::{Detector, DetectorConfig};
pub use crate::pitch::{PeriodEstimate, PeriodEstimator};
pub use crate::session::Session;
pub use crate::source::{BufferSource, RingSource, SampleSource};
pub use crate::tuning::{Fretboard, STANDARD_TUNING, UNPLAYABLE};

/// A note transition reported by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteEvent {
    /// A note started sounding, or replaced the previous one.
    NoteOn {
        /// The detected note, in semitones from A0.
        note: Semitone,
        /// Fret positions at which the note can be played, one entry per
        /// string; unplayable strings hold [`UNPLAYABLE`].
        frets: [Semitone; STRINGS],
    },
    /// The signal fell silent or stopped being a note.
    NoteOff,
}

/// The receiving end of the detector's note reports.
///
/// Callbacks run synchronously on whichever thread drives the analysis;
/// forwarding to a UI thread without blocking is the implementor's concern.
pub trait NoteConsumer {
    /// A note started sounding, or replaced the previous one.
    fn on_note(&mut self, note: Semitone, frets: &[Semitone; STRINGS]);

    /// The signal fell silent or stopped being a note.
    fn on_silence(&mut self);
}

/// Any closure over [`NoteEvent`] is a consumer.
impl<F: FnMut(NoteEvent)> NoteConsumer for F {
    fn on_note(&mut self, note: Semitone, frets: &[Semitone; STRINGS]) {
        self(NoteEvent::NoteOn {
            note,
            frets: *frets,
        });
    }

    fn on_silence(&mut self) {
        self(NoteEvent::NoteOff);
    }
}

/// Forwards events over a channel, e.g. to a GUI thread.
///
/// The send never blocks; if the receiver cannot keep up, events are
/// dropped rather than stalling the analysis thread.
pub struct ChannelConsumer(pub crossbeam_channel::Sender<NoteEvent>);

impl NoteConsumer for ChannelConsumer {
    fn on_note(&mut self, note: Semitone, frets: &[Semitone; STRINGS]) {
        let _ = self.0.try_send(NoteEvent::NoteOn {
            note,
            frets: *frets,
        });
    }

    fn on_silence(&mut self) {
        let _ = self.0.try_send(NoteEvent::NoteOff);
    }
}
