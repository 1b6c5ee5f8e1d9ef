//! Engine lifecycle and stream plumbing, driven through the manual backend.

mod helpers;

use approx::assert_relative_eq;
use cantus::prelude::*;
use cantus::Error;
use helpers::*;

#[test]
fn test_start_stop_restart() {
    let backend = ManualBackend::new();
    let engine = manual_engine(&backend);

    assert_eq!(engine.state(), EngineState::Stopped);
    engine.start().unwrap();
    assert_eq!(engine.state(), EngineState::Running);
    assert!(backend.is_open());

    engine.stop().unwrap();
    assert_eq!(engine.state(), EngineState::Stopped);
    assert!(!backend.is_open(), "device handle must be released");

    engine.start().unwrap();
    assert!(engine.is_running());
    assert_eq!(backend.open_count(), 2);
    engine.stop().unwrap();
}

#[test]
fn test_redundant_calls_are_no_ops() {
    let backend = ManualBackend::new();
    let engine = manual_engine(&backend);

    engine.stop().unwrap();
    engine.start().unwrap();
    engine.start().unwrap();
    assert_eq!(backend.open_count(), 1);

    engine.stop().unwrap();
    engine.stop().unwrap();
    assert_eq!(engine.state(), EngineState::Stopped);
}

#[test]
fn test_device_open_failure_is_surfaced() {
    let backend = ManualBackend::new();
    let engine = manual_engine(&backend);

    backend.fail_next_open();
    let err = engine.start().unwrap_err();
    assert!(matches!(
        err,
        Error::Core(cantus::core::Error::DeviceOpen(_))
    ));
    assert_eq!(engine.state(), EngineState::Stopped);

    engine.start().unwrap();
    assert!(engine.is_running());
    engine.stop().unwrap();
}

#[test]
fn test_shortfall_is_filled_with_dry_input() {
    let backend = ManualBackend::new();
    let engine = manual_engine(&backend);
    engine.start().unwrap();

    // Less than one analysis block: nothing processed yet
    let input = generate_sine(220.0, TEST_SAMPLE_RATE, TEST_PERIOD);
    let output = drive_all(&backend, &input);

    assert_eq!(output, input);
    assert_eq!(engine.stats().output_underrun, TEST_PERIOD as u64);
    engine.stop().unwrap();
}

#[test]
fn test_processed_audio_reaches_output_and_mix() {
    let backend = ManualBackend::new();
    let engine = manual_engine(&backend);
    engine.start().unwrap();

    let input = generate_sine(330.0, TEST_SAMPLE_RATE, 4096);
    capture_all(&backend, &input);
    assert!(wait_until(|| engine.stats().blocks_processed == 1));

    // Effects are off, so the processed block is the input itself
    let output = drive_all(&backend, &vec![0.0; 4096]);
    assert_eq!(output, input);

    engine.stop().unwrap();

    let mix = engine.export_mix();
    assert_eq!(mix.len(), 4096);
    assert_relative_eq!(peak(&mix), 0.8, epsilon = FLOAT_EPSILON);

    engine.clear_mix();
    assert_eq!(engine.mix_len(), 0);
}

#[test]
fn test_mix_is_opt_in() {
    let backend = ManualBackend::new();
    let engine = CantusEngine::builder()
        .sample_rate(TEST_SAMPLE_RATE)
        .backend(backend.clone())
        .build()
        .unwrap();
    assert!(!engine.is_accumulating());
    engine.start().unwrap();

    capture_all(&backend, &generate_sine(330.0, TEST_SAMPLE_RATE, 4096));
    assert!(wait_until(|| engine.stats().blocks_processed == 1));
    assert_eq!(engine.mix_len(), 0);

    engine.set_accumulate(true);
    capture_all(&backend, &generate_sine(330.0, TEST_SAMPLE_RATE, 4096));
    assert!(wait_until(|| engine.stats().blocks_processed == 2));
    engine.stop().unwrap();

    assert_eq!(engine.mix_len(), 4096);
}

#[test]
fn test_autotune_corrects_live_stream() {
    let backend = ManualBackend::new();
    let engine = CantusEngine::builder()
        .sample_rate(TEST_SAMPLE_RATE)
        .backend(backend.clone())
        .autotune(true)
        .accumulate(true)
        .build()
        .unwrap();
    engine.start().unwrap();

    let input = generate_sine(430.0, TEST_SAMPLE_RATE, 8192);
    drive_all(&backend, &input);
    assert!(wait_until(|| engine.stats().blocks_processed == 2));
    engine.stop().unwrap();

    assert_eq!(engine.chain_stats().corrected, 2);
    let pitch = mean_pitch(&engine.export_mix()).expect("corrected mix is voiced");
    assert!((pitch - 440.0).abs() < 6.0, "corrected pitch {pitch}");
}

#[test]
fn test_settings_outlive_sessions() {
    let backend = ManualBackend::new();
    let engine = manual_engine(&backend);
    let control = engine.control();

    engine.start().unwrap();
    control.on_gesture(Gesture::OpenPalm);
    control.set_layers(3);
    engine.stop().unwrap();

    engine.start().unwrap();
    assert!(engine.settings().autotune);
    assert_eq!(engine.settings().layers, 3);
    engine.stop().unwrap();
}

#[test]
fn test_device_errors_do_not_stop_stream() {
    let backend = ManualBackend::new();
    let engine = manual_engine(&backend);
    engine.start().unwrap();

    assert!(backend.report_device_error("input overflow"));
    assert!(engine.is_running());
    assert_eq!(engine.stats().device_errors, 1);

    drive_all(&backend, &generate_noise(4096, 7));
    assert!(wait_until(|| engine.stats().blocks_processed == 1));
    engine.stop().unwrap();
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let backend = ManualBackend::new();

    let short_block = CantusEngine::builder()
        .backend(backend.clone())
        .analysis_block(1024)
        .build();
    assert!(short_block.is_err());

    let bad_range = CantusEngine::builder()
        .backend(backend.clone())
        .pitch_range(900.0, 100.0)
        .build();
    assert!(bad_range.is_err());

    let bad_rate = CantusEngine::builder()
        .backend(backend)
        .sample_rate(0.0)
        .build();
    assert!(bad_rate.is_err());
}
