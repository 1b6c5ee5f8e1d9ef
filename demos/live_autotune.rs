//! # Live Autotune
//!
//! Sing into the default input device and hear the corrected voice on the
//! default output. Type commands on stdin to drive the effects, standing in
//! for a gesture or UI collaborator.
//!
//! **Concepts:** Engine setup, control surface, gestures, export
//!
//! ```bash
//! RUST_LOG=info cargo run --example live_autotune
//! ```
//!
//! Commands: `autotune on|off`, `toggle`, `layering on|off`, `strength <0-1>`,
//! `layers <n>`, `palm`, `fist`, `stats`, `devices`, `quit`

use cantus::prelude::*;
use std::io::BufRead;
use tracing_subscriber::EnvFilter;

fn main() -> cantus::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let engine = CantusEngine::builder()
        .sample_rate(44100.0)
        .strength(1.0)
        .accumulate(true)
        .build()?;
    let control = engine.control();

    engine.start()?;
    println!("Streaming at {} Hz. Type a command:", engine.sample_rate());

    for line in std::io::stdin().lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim();

        match line {
            "" => continue,
            "quit" | "exit" => break,
            "palm" => control.on_gesture(Gesture::OpenPalm),
            "fist" => control.on_gesture(Gesture::Fist),
            "stats" => {
                println!("{:?}", engine.stats());
                println!("{:?}", engine.chain_stats());
            }
            "devices" => {
                for device in CantusEngine::list_input_devices()? {
                    println!("in  {}: {} ({} ch)", device.index, device.name, device.channels);
                }
                for device in CantusEngine::list_output_devices()? {
                    println!("out {}: {} ({} ch)", device.index, device.name, device.channels);
                }
            }
            command => match command.parse::<ControlEvent>() {
                Ok(event) => control.apply(event),
                Err(err) => println!("{err}"),
            },
        }
        println!("{:?}", control.settings());
    }

    engine.stop()?;

    let mix = engine.export_mix();
    println!(
        "Recorded {:.1} s of processed audio (peak-normalized to {})",
        mix.len() as f64 / engine.sample_rate(),
        engine.config().export_ceiling
    );

    Ok(())
}
