//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware

use std::io::Cursor;

use murmur::voice::{
    DetectorState, SAMPLE_RATE, UtteranceDetector, calculate_energy, samples_to_wav,
};

/// Samples per 100ms chunk, the size the microphone recognizer polls
const CHUNK: usize = SAMPLE_RATE as usize / 10;

/// Generate sine wave audio samples
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}

/// Feed audio in polling-sized chunks, returning whether an utterance completed
fn feed(detector: &mut UtteranceDetector, samples: &[f32]) -> bool {
    samples
        .chunks(CHUNK)
        .fold(false, |done, chunk| detector.process(chunk) || done)
}

#[test]
fn test_energy_of_silence_and_tone() {
    assert!(calculate_energy(&generate_silence(0.1)) < 0.001);

    // RMS of a sine is amplitude / sqrt(2)
    let energy = calculate_energy(&generate_sine_samples(440.0, 1.0, 0.5));
    assert!((energy - 0.3536).abs() < 0.01, "energy was {energy}");
}

#[test]
fn test_silence_never_starts_utterance() {
    let mut detector = UtteranceDetector::new();

    assert!(!feed(&mut detector, &generate_silence(3.0)));
    assert_eq!(detector.state(), DetectorState::Idle);
    assert!(!detector.has_speech());
}

#[test]
fn test_speech_then_silence_completes_utterance() {
    let mut detector = UtteranceDetector::new();

    assert!(!feed(&mut detector, &generate_sine_samples(300.0, 1.0, 0.5)));
    assert_eq!(detector.state(), DetectorState::Speaking);

    assert!(feed(&mut detector, &generate_silence(0.7)));
    assert_eq!(detector.state(), DetectorState::Complete);

    let utterance = detector.take_utterance();
    assert!(utterance.len() >= SAMPLE_RATE as usize);
    assert_eq!(detector.state(), DetectorState::Idle);
}

#[test]
fn test_short_blip_is_discarded() {
    let mut detector = UtteranceDetector::new();

    feed(&mut detector, &generate_sine_samples(300.0, 0.1, 0.5));
    assert!(detector.has_speech());

    assert!(!feed(&mut detector, &generate_silence(1.0)));
    assert_eq!(detector.state(), DetectorState::Idle);
}

#[test]
fn test_samples_to_wav_is_readable() {
    let samples = generate_sine_samples(440.0, 0.5, 0.5);
    let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.len() as usize, samples.len());
}

#[test]
fn test_samples_to_wav_clamps_out_of_range() {
    let wav = samples_to_wav(&[2.0, -2.0, 0.0], SAMPLE_RATE).unwrap();

    let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    let decoded: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
    assert_eq!(decoded, vec![32767, -32768, 0]);
}
