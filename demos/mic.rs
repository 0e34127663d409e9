//! Console note detector.
//!
//! Captures the default input device with CPAL, feeds the samples through a
//! detection session, and prints every detected note together with the fret
//! positions at which it can be played. Press Enter to stop.

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use fretfinder::tuning::semitone_name;
use fretfinder::{Detector, NoteEvent, RingSource, Session};
use ringbuf::traits::Producer;

/// How much audio the ring buffer can hold, in seconds.
///
/// The session drains every 20 ms, so this is generous; the headroom covers
/// scheduling hiccups without dropping samples.
const RING_SECONDS: usize = 8;

fn main() -> Result<()> {
    env_logger::init();

    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("no input device available"))?;

    println!("Using audio input device: {}", device.name()?);

    let config = device.default_input_config()?;
    if config.sample_format() != cpal::SampleFormat::F32 {
        return Err(anyhow!(
            "the default input format is {}, only f32 is supported",
            config.sample_format()
        ));
    }

    let channels = config.channels() as usize;
    let sample_rate = config.sample_rate().0;
    println!("Sample rate: {} Hz, {} channel(s)", sample_rate, channels);

    let (mut producer, source) = RingSource::with_capacity(sample_rate as usize * RING_SECONDS);

    // The callback must not block or allocate: downmix into a preallocated
    // scratch buffer and push; when the ring is full the samples are lost,
    // which the analyzer simply rides out.
    let mut mono = Vec::with_capacity(8192);
    let stream = device.build_input_stream(
        &config.into(),
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            mono.clear();
            mono.extend(
                data.chunks(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
            );

            let written = producer.push_slice(&mono);
            if written < mono.len() {
                log::warn!("ring buffer overflow, dropped {} samples", mono.len() - written);
            }
        },
        |err| log::error!("audio stream error: {}", err),
        None,
    )?;

    stream.play()?;

    let detector = Detector::new(sample_rate)?;
    let session = Session::spawn(detector, source, |event: NoteEvent| match event {
        NoteEvent::NoteOn { note, frets } => {
            let positions: Vec<String> = frets
                .iter()
                .enumerate()
                .filter(|(_, &fret)| fret >= 0)
                .map(|(string, &fret)| format!("string {} fret {}", string + 1, fret))
                .collect();

            println!("{:<4} {}", semitone_name(note), positions.join(", "));
        }
        NoteEvent::NoteOff => println!("(silence)"),
    });

    println!("Listening... press Enter to stop.");
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    session.stop();
    drop(stream);

    Ok(())
}
