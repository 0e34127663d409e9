//! # Musical Tuning Module
//!
//! This module provides the note and fretboard calculations used by the
//! detection pipeline. It handles note name conversions, frequency
//! calculations, and the mapping from notes to guitar fret positions.
//!
//! Semitones are used as the common unit throughout: they are plain integers
//! (unlike note names), they form a linear scale (unlike frequencies), and on
//! a guitar the distance between one fret and the next is exactly one
//! semitone. A0, the lowest note of a piano, is semitone 0.
//!
//! ## Features
//! - Note name to semitone conversion (English notation, sharps and flats)
//! - Equal temperament frequency calculations with A0 = 27.5 Hz
//! - Semitone to fret position mapping for arbitrary tunings
//! - Note name formatting for display and logging

use serde::{Deserialize, Serialize};

/// Semitones relative to A0.
///
/// The audible range goes from C0 (16.35 Hz, -9 semitones from A0) to E10
/// (19912 Hz, +115 semitones). An `i8` would suffice, but `i16` leaves
/// headroom for intermediate arithmetic without risking overflow.
pub type Semitone = i16;

/// Marks a string on which a note cannot be played.
///
/// Fret 0 means the open string, so only negative values are free to act as
/// markers.
pub const UNPLAYABLE: Semitone = -1;

/// The number of strings on a standard guitar.
pub const STRINGS: usize = 6;

/// The number of frets on a standard guitar neck.
pub const FRETS: Semitone = 22;

/// Standard guitar tuning in semitones from A0, highest-pitched string first.
pub const STANDARD_TUNING: [Semitone; STRINGS] = [
    43, // E4
    38, // B3
    34, // G3
    29, // D3
    24, // A2
    19, // E2
];

/// The frequency of A0 in Hz.
const A0_FREQUENCY: f64 = 27.5;

/// Semitone offsets from A for the letters A through G within one octave.
const NOTE_INTERVALS: [Semitone; 7] = [0, 2, -9, -7, -5, -4, -2];

/// Note names in sharp notation, cycling from A.
const NOTE_NAMES: [&str; 12] = [
    "A", "A#", "B", "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#",
];

/// Converts a note name and octave to semitones relative to A0.
///
/// The name is a letter from A to G (either case) optionally followed by a
/// single `#` or `b`. B#, Cb, E# and Fb are accepted and resolve to their
/// neighboring semitones; double accidentals and any other trailing
/// characters are rejected.
///
/// # Arguments
/// * `name` - Note name, e.g. "A", "C#", "Bb"
/// * `octave` - The octave of the note
///
/// # Returns
/// * `Some(semitone)` - Semitones from A0
/// * `None` - The name is not a valid note
pub fn note_to_semitone(name: &str, octave: Semitone) -> Option<Semitone> {
    let mut chars = name.chars();

    let letter = chars.next()?;
    let index = match letter {
        'A'..='G' => letter as usize - 'A' as usize,
        'a'..='g' => letter as usize - 'a' as usize,
        _ => return None,
    };

    let mut semitone = 12 * octave + NOTE_INTERVALS[index];

    match chars.next() {
        None => return Some(semitone),
        Some('#') => semitone += 1,
        Some('b') => semitone -= 1,
        Some(_) => return None,
    }

    // Anything after a single accidental is invalid.
    if chars.next().is_some() {
        None
    } else {
        Some(semitone)
    }
}

/// Returns the equal temperament frequency of a semitone: `27.5 * 2^(s/12)`.
pub fn semitone_to_frequency(semitone: Semitone) -> f64 {
    A0_FREQUENCY * 2f64.powf(semitone as f64 / 12.0)
}

/// Converts a note name and octave directly to a frequency in Hz.
pub fn note_to_frequency(name: &str, octave: Semitone) -> Option<f64> {
    note_to_semitone(name, octave).map(semitone_to_frequency)
}

/// Converts a frequency to the nearest semitone relative to A0.
///
/// The conversion inverts `f = 27.5 * 2^(s/12)` and rounds to the nearest
/// semitone. The second element of the returned pair is the multiplicative
/// approximation error, `27.5 * 2^(s/12) / f`, which is exactly 1.0 when the
/// frequency lands on the semitone.
///
/// # Arguments
/// * `frequency` - The frequency in Hz
///
/// # Returns
/// * `Some((semitone, error))` - Nearest semitone and approximation error
/// * `None` - The frequency is not positive
pub fn frequency_to_semitone(frequency: f64) -> Option<(Semitone, f64)> {
    // The logarithm only misbehaves at exactly 0; even frequencies in the
    // 1e-30 range still produce usable values, so no epsilon check is needed.
    if frequency <= 0.0 {
        return None;
    }

    let semitone = (12.0 * (frequency / A0_FREQUENCY).log2()).round() as Semitone;
    let error = semitone_to_frequency(semitone) / frequency;

    Some((semitone, error))
}

/// Finds all fret positions at which a note can be played.
///
/// A note can usually be fingered in several positions on a guitar. For each
/// string, the output entry is the fret number (0 meaning the open string)
/// when the note is reachable on that string, or [`UNPLAYABLE`] otherwise.
///
/// # Arguments
/// * `note` - The note, in semitones from A0
/// * `tuning` - Open-string notes, one per string
/// * `frets` - Output array, one entry per string
/// * `fret_count` - The number of frets on the neck
///
/// # Returns
/// The number of strings on which the note is playable.
pub fn note_to_frets(
    note: Semitone,
    tuning: &[Semitone],
    frets: &mut [Semitone],
    fret_count: Semitone,
) -> usize {
    let mut valid = 0;

    for (fret, open) in frets.iter_mut().zip(tuning) {
        let position = note - open;

        if (0..=fret_count).contains(&position) {
            *fret = position;
            valid += 1;
        } else {
            *fret = UNPLAYABLE;
        }
    }

    valid
}

/// Formats a semitone as a note name in sharp notation, e.g. "E2" or "A#4".
pub fn semitone_name(semitone: Semitone) -> String {
    let name = NOTE_NAMES[semitone.rem_euclid(12) as usize];
    // The octave number changes at C, nine semitones above A.
    let octave = (semitone + 9).div_euclid(12);
    format!("{}{}", name, octave)
}

/// A tuning together with its fret count, as used by the detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fretboard {
    /// Open-string notes, highest-pitched string first.
    pub tuning: [Semitone; STRINGS],
    /// The highest playable fret.
    pub frets: Semitone,
}

impl Default for Fretboard {
    fn default() -> Self {
        Fretboard {
            tuning: STANDARD_TUNING,
            frets: FRETS,
        }
    }
}

impl Fretboard {
    /// Maps a note to its fret positions on this fretboard.
    pub fn positions(&self, note: Semitone) -> ([Semitone; STRINGS], usize) {
        let mut frets = [UNPLAYABLE; STRINGS];
        let valid = note_to_frets(note, &self.tuning, &mut frets, self.frets);
        (frets, valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_and_frequency_conversions() {
        let notes = [
            "C", "C#", "Db", "D", "D#", "Eb", "E", "F", "F#", "Gb", "G", "G#", "Ab", "A", "A#",
            "Bb", "B",
        ];
        let mut semitones: [Semitone; 17] =
            [-9, -8, -8, -7, -6, -6, -5, -4, -3, -3, -2, -1, -1, 0, 1, 1, 2];
        let mut freqs = [
            16.35, 17.32, 17.32, 18.35, 19.45, 19.45, 20.60, 21.83, 23.12, 23.12, 24.50, 25.96,
            25.96, 27.50, 29.14, 29.14, 30.87,
        ];

        for octave in 0..10 {
            for i in 0..notes.len() {
                assert_eq!(note_to_semitone(notes[i], octave), Some(semitones[i]));

                let (from_frequency, error) = frequency_to_semitone(freqs[i]).unwrap();
                assert_eq!(from_frequency, semitones[i]);
                assert!((error - 1.0).abs() < 1e-2);

                semitones[i] += 12;
                freqs[i] *= 2.0;
            }
        }
    }

    #[test]
    fn test_lower_case_and_enharmonic_names() {
        assert_eq!(note_to_semitone("a", 4), note_to_semitone("A", 4));
        assert_eq!(note_to_semitone("f#", 2), note_to_semitone("Gb", 2));

        // B#, Cb, E# and Fb resolve to the neighboring semitone.
        assert_eq!(note_to_semitone("B#", 0), Some(3));
        assert_eq!(note_to_semitone("Cb", 1), Some(2));
        assert_eq!(note_to_semitone("E#", 0), Some(-4));
        assert_eq!(note_to_semitone("Fb", 0), Some(-5));
    }

    #[test]
    fn test_invalid_names() {
        assert_eq!(note_to_semitone("H", 0), None);
        assert_eq!(note_to_semitone("", 0), None);
        assert_eq!(note_to_semitone("A##", 0), None);
        assert_eq!(note_to_semitone("Bbb", 0), None);
        assert_eq!(note_to_semitone("C#4", 0), None);
        assert_eq!(note_to_semitone("Ax", 0), None);
    }

    #[test]
    fn test_frequency_round_trip() {
        // Every semitone in the audible range must survive a conversion to
        // frequency and back, with a negligible reported error.
        for semitone in -9..=115 {
            let frequency = semitone_to_frequency(semitone);
            let (back, error) = frequency_to_semitone(frequency).unwrap();

            assert_eq!(back, semitone);
            assert!((error - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_non_positive_frequencies() {
        assert_eq!(frequency_to_semitone(0.0), None);
        assert_eq!(frequency_to_semitone(-440.0), None);
    }

    #[test]
    fn test_reference_frequencies() {
        assert!((note_to_frequency("A", 4).unwrap() - 440.0).abs() < 1e-5);
        assert!((note_to_frequency("E", 2).unwrap() - 82.407).abs() < 1e-3);
        assert_eq!(note_to_frequency("X", 4), None);
    }

    #[test]
    fn test_standard_tuning_notes() {
        assert_eq!(STANDARD_TUNING[0], note_to_semitone("E", 4).unwrap());
        assert_eq!(STANDARD_TUNING[1], note_to_semitone("B", 3).unwrap());
        assert_eq!(STANDARD_TUNING[2], note_to_semitone("G", 3).unwrap());
        assert_eq!(STANDARD_TUNING[3], note_to_semitone("D", 3).unwrap());
        assert_eq!(STANDARD_TUNING[4], note_to_semitone("A", 2).unwrap());
        assert_eq!(STANDARD_TUNING[5], note_to_semitone("E", 2).unwrap());
    }

    #[test]
    fn test_fret_positions() {
        let tests = [
            // Open strings.
            STANDARD_TUNING[0],
            STANDARD_TUNING[1],
            STANDARD_TUNING[2],
            STANDARD_TUNING[3],
            STANDARD_TUNING[4],
            STANDARD_TUNING[5],
            // A minor pentatonic scale, without the open-string notes above.
            note_to_semitone("C", 3).unwrap(),
            note_to_semitone("E", 3).unwrap(),
            note_to_semitone("A", 3).unwrap(),
            note_to_semitone("C", 4).unwrap(),
            note_to_semitone("D", 4).unwrap(),
            note_to_semitone("G", 4).unwrap(),
            note_to_semitone("A", 4).unwrap(),
            note_to_semitone("C", 5).unwrap(),
        ];

        let expected: [[Semitone; STRINGS]; 14] = [
            [0, 5, 9, 14, 19, -1],
            [-1, 0, 4, 9, 14, 19],
            [-1, -1, 0, 5, 10, 15],
            [-1, -1, -1, 0, 5, 10],
            [-1, -1, -1, -1, 0, 5],
            [-1, -1, -1, -1, -1, 0],
            [-1, -1, -1, -1, 3, 8],
            [-1, -1, -1, 2, 7, 12],
            [-1, -1, 2, 7, 12, 17],
            [-1, 1, 5, 10, 15, 20],
            [-1, 3, 7, 12, 17, 22],
            [3, 8, 12, 17, 22, -1],
            [5, 10, 14, 19, -1, -1],
            [8, 13, 17, 22, -1, -1],
        ];

        for (note, row) in tests.iter().zip(&expected) {
            let mut frets = [0; STRINGS];
            let valid = note_to_frets(*note, &STANDARD_TUNING, &mut frets, FRETS);

            assert_eq!(&frets, row);
            assert_eq!(valid, row.iter().filter(|&&f| f >= 0).count());

            // Whenever a position is playable, it must reproduce the note.
            for (string, &fret) in frets.iter().enumerate() {
                if fret != UNPLAYABLE {
                    assert!((0..=FRETS).contains(&fret));
                    assert_eq!(STANDARD_TUNING[string] + fret, *note);
                }
            }
        }
    }

    #[test]
    fn test_semitone_names() {
        assert_eq!(semitone_name(0), "A0");
        assert_eq!(semitone_name(-9), "C0");
        assert_eq!(semitone_name(19), "E2");
        assert_eq!(semitone_name(48), "A4");
        assert_eq!(semitone_name(13), "A#1");
    }

    #[test]
    fn test_fretboard_positions() {
        let fretboard = Fretboard::default();

        let (frets, valid) = fretboard.positions(19);
        assert_eq!(frets, [-1, -1, -1, -1, -1, 0]);
        assert_eq!(valid, 1);

        // A note above the neck range is unplayable everywhere.
        let (frets, valid) = fretboard.positions(70);
        assert_eq!(frets, [UNPLAYABLE; STRINGS]);
        assert_eq!(valid, 0);
    }
}
