//! # Note Detection Module
//!
//! This module turns a stream of audio samples into note events. It wraps the
//! period estimator in a realtime state machine that rejects noisy or
//! ambiguous blocks, distinguishes fresh attacks from sustained notes, and
//! reports every detected note together with the fret positions at which it
//! can be played.
//!
//! ## Features
//! - Periodicity quality gating to reject noise
//! - Per-period amplitude envelope tracking for re-attack detection
//! - Fifth and octave absorption to suppress harmonic ghosts
//! - Stale note watchdog that reports silence after one second without
//!   a successful analysis

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::pitch::{PeriodEstimate, PeriodEstimator};
use crate::source::SampleSource;
use crate::tuning::{self, Fretboard, Semitone};
use crate::NoteConsumer;

/// The lowest note searched for: E1, an octave below the lowest string of a
/// standard tuned guitar.
pub const DETECT_LOWEST: Semitone = 7;

/// The highest note searched for: E7, an octave above the highest note a
/// 24-fret standard tuned guitar can make.
pub const DETECT_HIGHEST: Semitone = 79;

/// Minimum periodicity quality for a block to count as a note.
pub const MIN_QUALITY: f64 = 0.85;

/// Minimum per-period amplitude peak for the signal to count as sounding.
pub const NOISE_THRESHOLD: f32 = 0.10;

/// Amplitude jump between consecutive periods that counts as a re-attack.
pub const RAISE_THRESHOLD: f32 = 0.12;

/// Length of the per-period amplitude peak history.
pub const PEAKS_SIZE: usize = 100;

/// Configuration for a [`Detector`].
///
/// The defaults cover a standard tuned six-string guitar; only the sample
/// rate has to be provided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// The sample rate of the incoming audio, in Hz.
    pub sample_rate: u32,
    /// The lowest note to search for.
    pub lowest: Semitone,
    /// The highest note to search for.
    pub highest: Semitone,
    /// The tuning and fret count used to resolve positions.
    pub fretboard: Fretboard,
}

impl DetectorConfig {
    pub fn new(sample_rate: u32) -> Self {
        DetectorConfig {
            sample_rate,
            lowest: DETECT_LOWEST,
            highest: DETECT_HIGHEST,
            fretboard: Fretboard::default(),
        }
    }
}

/// The realtime note detection state machine.
///
/// A detector is created once per recording session with a known sample rate
/// and fed sample blocks through [`Detector::analyze`]. It is either silent
/// (no current note) or sounding; transitions between the two, and between
/// different notes, are reported to a [`NoteConsumer`].
#[derive(Debug)]
pub struct Detector {
    /// The sample rate, needed to map periods to frequencies.
    rate: u32,
    /// Smallest period of interest in samples (highest frequency).
    min_period: usize,
    /// Largest period of interest in samples (lowest frequency).
    max_period: usize,
    fretboard: Fretboard,
    /// The last note reported to the consumer, if any.
    last_detected: Option<Semitone>,
    /// Circular history of per-period amplitude peaks.
    peaks: [f32; PEAKS_SIZE],
    /// Index of the most recent entry in `peaks`.
    last_peak: usize,
    /// Samples skipped since the last successful update.
    dropped_samples: u32,
    estimator: PeriodEstimator,
}

impl Detector {
    /// Creates a detector for a standard tuned guitar.
    ///
    /// # Arguments
    /// * `sample_rate` - The sample rate of the incoming audio in Hz; must
    ///   not be zero
    pub fn new(sample_rate: u32) -> Result<Self> {
        Detector::with_config(DetectorConfig::new(sample_rate))
    }

    /// Creates a detector with a custom search range and fretboard.
    pub fn with_config(config: DetectorConfig) -> Result<Self> {
        if config.sample_rate == 0 {
            bail!("the sample rate must not be zero");
        }

        let rate = config.sample_rate as f64;
        // Highest note means smallest period and vice versa.
        let min_period = (rate / tuning::semitone_to_frequency(config.highest)).floor() as usize;
        let max_period = (rate / tuning::semitone_to_frequency(config.lowest)).ceil() as usize;

        if min_period <= 1 || max_period <= min_period {
            bail!(
                "the search range {}..{} is not resolvable at {} Hz",
                config.lowest,
                config.highest,
                config.sample_rate
            );
        }

        Ok(Detector {
            rate: config.sample_rate,
            min_period,
            max_period,
            fretboard: config.fretboard,
            last_detected: None,
            peaks: [0.0; PEAKS_SIZE],
            // The first write advances the cursor, so it lands on index 0.
            last_peak: PEAKS_SIZE - 1,
            dropped_samples: 0,
            estimator: PeriodEstimator::new(),
        })
    }

    /// The number of samples a source must hold before a block is analyzed.
    pub fn window_size(&self) -> usize {
        2 * self.max_period
    }

    /// The currently reported note, if the detector is in the sounding state.
    pub fn current_note(&self) -> Option<Semitone> {
        self.last_detected
    }

    /// Analyzes all samples currently available from `source`.
    ///
    /// When fewer than [`Detector::window_size`] samples are available the
    /// call returns without consuming anything, so the next call sees the
    /// same data again. Otherwise the whole available window is consumed and
    /// at most one note transition is reported, in addition to a possible
    /// silence report from the stale note watchdog.
    ///
    /// Blocks that fail the quality, playability or amplitude filters are
    /// absorbed silently; they only feed the watchdog counter.
    pub fn analyze<S, C>(&mut self, source: &mut S, consumer: &mut C)
    where
        S: SampleSource,
        C: NoteConsumer,
    {
        let available = source.available();
        if available < 2 * self.max_period {
            return;
        }

        // One second without a successful update means the note died out in
        // a way the amplitude filter never saw, e.g. a muted string.
        if self.dropped_samples > self.rate {
            if self.last_detected.take().is_some() {
                log::debug!("note timed out, reporting silence");
                consumer.on_silence();
            }
            self.dropped_samples = 0;
        }

        let window = source.view(available);

        let (period, peak, quality) =
            match self.estimator.estimate(window, self.min_period, self.max_period) {
                PeriodEstimate::Pitch {
                    period,
                    peak,
                    quality,
                } if quality >= MIN_QUALITY => (period, peak, quality),
                PeriodEstimate::Pitch { quality, .. } => {
                    log::trace!("skipping block: quality {:.3} below threshold", quality);
                    self.drop_block(source, available);
                    return;
                }
                PeriodEstimate::NoPeak => {
                    log::trace!("skipping block: no periodicity peak");
                    self.drop_block(source, available);
                    return;
                }
            };

        let frequency = self.rate as f64 / period;
        let note = match tuning::frequency_to_semitone(frequency) {
            Some((note, _)) => note,
            None => {
                self.drop_block(source, available);
                return;
            }
        };

        let (frets, playable) = self.fretboard.positions(note);
        if playable == 0 {
            log::trace!(
                "skipping block: {} ({:.1} Hz) is not playable",
                tuning::semitone_name(note),
                frequency
            );
            self.drop_block(source, available);
            return;
        }

        // Walk the block one period at a time and track the amplitude
        // envelope. A jump relative to the immediately preceding period is a
        // fresh attack even when the pitch has not changed.
        let mut quick_raise = false;
        let mut min_surpassed = false;

        let mut start = 0;
        while start + peak <= available {
            let amplitude = window[start..start + peak]
                .iter()
                .fold(0.0f32, |max, &s| max.max(s.abs()));

            if amplitude - self.peaks[self.last_peak] > RAISE_THRESHOLD {
                quick_raise = true;
            }

            self.last_peak = (self.last_peak + 1) % PEAKS_SIZE;
            self.peaks[self.last_peak] = amplitude;

            if amplitude > NOISE_THRESHOLD {
                min_surpassed = true;
            }

            start += peak;
        }

        // The envelope was updated, so the block counts as a successful
        // analysis whatever gets reported below.
        self.dropped_samples = 0;

        if !min_surpassed {
            if self.last_detected.take().is_some() {
                log::debug!("amplitude under the noise floor, reporting silence");
                consumer.on_silence();
            }
        } else {
            let emit = quick_raise
                || match self.last_detected {
                    None => true,
                    Some(last) => {
                        // The same pitch class, or a perfect fifth away, is
                        // most likely the same note ringing on: those are the
                        // harmonic confusions octave correction can leave
                        // behind.
                        let delta = (note - last).abs() % 12;
                        delta != 0 && delta != 7
                    }
                };

            if emit {
                log::debug!(
                    "new note {} ({:.1} Hz, quality {:.3})",
                    tuning::semitone_name(note),
                    frequency,
                    quality
                );
                self.last_detected = Some(note);
                consumer.on_note(note, &frets);
            }
        }

        source.advance(available);
    }

    /// Counts a filtered-out block into the watchdog and releases it.
    fn drop_block<S: SampleSource>(&mut self, source: &mut S, available: usize) {
        self.dropped_samples = self.dropped_samples.saturating_add(available as u32);
        source.advance(available);
    }
}
