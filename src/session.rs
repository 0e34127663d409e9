//! # Analysis Session Module
//!
//! Runs the detector on a dedicated thread. The audio callback keeps writing
//! into the ring buffer; the session thread wakes on a periodic tick, drains
//! whatever has accumulated, and reports note transitions to the consumer.
//!
//! The consumer is invoked synchronously on the session thread; use
//! [`crate::ChannelConsumer`] when the results have to cross to a GUI
//! thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::detect::Detector;
use crate::source::SampleSource;
use crate::NoteConsumer;

/// The pause between two runs of the analysis loop.
///
/// At 44.1 kHz a full analysis window spans roughly 50 ms of audio, so a
/// 20 ms tick drains the ring well before it can fill up.
const ANALYSIS_TICK: Duration = Duration::from_millis(20);

/// A running analysis thread.
///
/// Dropping the session stops it; [`Session::stop`] does the same
/// explicitly. In both cases one final analysis pass drains any trailing
/// samples so that the last note played is not lost.
pub struct Session {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Session {
    /// Spawns the analysis thread.
    ///
    /// The detector, the sample source and the consumer move onto the
    /// thread; the detector's state is never shared, so any number of
    /// sessions can run side by side.
    pub fn spawn<S, C>(mut detector: Detector, mut source: S, mut consumer: C) -> Session
    where
        S: SampleSource + Send + 'static,
        C: NoteConsumer + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let keep_running = Arc::clone(&running);

        let thread = std::thread::spawn(move || {
            while keep_running.load(Ordering::Acquire) {
                detector.analyze(&mut source, &mut consumer);
                std::thread::sleep(ANALYSIS_TICK);
            }

            // Cancellation happens at block boundaries only; analyze once
            // more so samples recorded during shutdown are not lost.
            detector.analyze(&mut source, &mut consumer);
            log::debug!("analysis session finished");
        });

        Session {
            running,
            thread: Some(thread),
        }
    }

    /// Stops the analysis thread and waits for it to drain.
    pub fn stop(mut self) {
        self.shutdown();
    }

    /// Whether the analysis thread is still running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RingSource;
    use crate::{ChannelConsumer, NoteEvent};
    use ringbuf::traits::Producer;
    use std::f64::consts::PI;

    const SAMPLE_RATE: u32 = 44100;

    fn sine(frequency: f64, amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                amplitude * (2.0 * PI * frequency * i as f64 / SAMPLE_RATE as f64).sin() as f32
            })
            .collect()
    }

    #[test]
    fn test_session_detects_note_from_ring() {
        let detector = Detector::new(SAMPLE_RATE).unwrap();
        let window = detector.window_size();

        let (mut producer, source) = RingSource::with_capacity(4 * window);
        let (sender, receiver) = crossbeam_channel::unbounded();

        let written = producer.push_slice(&sine(440.0, 0.8, 2 * window));
        assert_eq!(written, 2 * window);

        let session = Session::spawn(detector, source, ChannelConsumer(sender));

        let event = receiver
            .recv_timeout(Duration::from_secs(2))
            .expect("the session should report the note");
        assert!(matches!(event, NoteEvent::NoteOn { note: 48, .. }));

        session.stop();
    }

    #[test]
    fn test_stop_drains_trailing_samples() {
        let detector = Detector::new(SAMPLE_RATE).unwrap();
        let window = detector.window_size();

        let (mut producer, source) = RingSource::with_capacity(4 * window);
        let (sender, receiver) = crossbeam_channel::unbounded();

        let session = Session::spawn(detector, source, ChannelConsumer(sender));
        assert!(session.is_running());

        // The note arrives while the session is being torn down: the final
        // drain must still analyze it.
        producer.push_slice(&sine(440.0, 0.8, window));
        session.stop();

        let event = receiver.try_recv().expect("the final drain should run");
        assert!(matches!(event, NoteEvent::NoteOn { note: 48, .. }));
    }
}
