//! CPAL hardware backend.

use super::{AudioBackend, DeviceHandle};
use crate::callback::DeviceErrorReporter;
use crate::{DuplexCallback, Error, InputTap, OutputTap, Result, Sample, StreamConfig};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Sample as _;

/// Wrapper to hold `cpal::Stream` in a `Send` context.
///
/// # Safety
/// `cpal::Stream` is `!Send` due to platform internals. The handle is only
/// moved into the engine's session slot and dropped from there; it is never
/// used concurrently.
struct StreamHandle(#[allow(dead_code)] cpal::Stream);

unsafe impl Send for StreamHandle {}

struct DuplexStreams {
    _input: StreamHandle,
    _output: Option<StreamHandle>,
}

/// Input or output device information.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
    pub channels: u16,
    pub default_sample_rate: u32,
}

/// Backend on the default CPAL host.
///
/// Device indices in [`StreamConfig`] refer to the order returned by
/// [`list_input_devices`](Self::list_input_devices) and
/// [`list_output_devices`](Self::list_output_devices).
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }

    pub fn list_input_devices() -> Result<Vec<DeviceInfo>> {
        let host = cpal::default_host();
        host.input_devices()?
            .enumerate()
            .map(|(index, device)| {
                let config = device.default_input_config()?;
                Ok(DeviceInfo {
                    index,
                    name: device.name()?,
                    channels: config.channels(),
                    default_sample_rate: config.sample_rate().0,
                })
            })
            .collect()
    }

    pub fn list_output_devices() -> Result<Vec<DeviceInfo>> {
        let host = cpal::default_host();
        host.output_devices()?
            .enumerate()
            .map(|(index, device)| {
                let config = device.default_output_config()?;
                Ok(DeviceInfo {
                    index,
                    name: device.name()?,
                    channels: config.channels(),
                    default_sample_rate: config.sample_rate().0,
                })
            })
            .collect()
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> String {
        format!("cpal ({:?})", cpal::default_host().id())
    }

    fn open(&mut self, config: &StreamConfig, callback: DuplexCallback) -> Result<DeviceHandle> {
        let host = cpal::default_host();
        let passthrough = callback.passthrough();
        let reporter = callback.error_reporter();
        let (input_tap, output_tap) = callback.split();

        let input_device = input_device(&host, config.input_device)?;
        let input_name = input_device.name()?;
        let input_default = input_device.default_input_config()?;
        let input_config = stream_config(config, input_default.channels());

        let input = match input_default.sample_format() {
            cpal::SampleFormat::F32 => {
                build_input::<f32>(&input_device, &input_config, input_tap, reporter.clone())?
            }
            cpal::SampleFormat::I16 => {
                build_input::<i16>(&input_device, &input_config, input_tap, reporter.clone())?
            }
            cpal::SampleFormat::U16 => {
                build_input::<u16>(&input_device, &input_config, input_tap, reporter.clone())?
            }
            format => {
                return Err(Error::InvalidConfig(format!(
                    "Unsupported input sample format: {format:?}"
                )));
            }
        };

        let output = if passthrough {
            let output_device = output_device(&host, config.output_device)?;
            let output_default = output_device.default_output_config()?;
            let output_config = stream_config(config, output_default.channels());

            let stream = match output_default.sample_format() {
                cpal::SampleFormat::F32 => {
                    build_output::<f32>(&output_device, &output_config, output_tap, reporter)?
                }
                cpal::SampleFormat::I16 => {
                    build_output::<i16>(&output_device, &output_config, output_tap, reporter)?
                }
                cpal::SampleFormat::U16 => {
                    build_output::<u16>(&output_device, &output_config, output_tap, reporter)?
                }
                format => {
                    return Err(Error::InvalidConfig(format!(
                        "Unsupported output sample format: {format:?}"
                    )));
                }
            };
            Some(stream)
        } else {
            None
        };

        input.play()?;
        if let Some(stream) = &output {
            stream.play()?;
        }

        tracing::info!(
            "Opened input '{}' at {} Hz ({} ch), passthrough: {}",
            input_name,
            input_config.sample_rate.0,
            input_config.channels,
            passthrough
        );

        Ok(DeviceHandle::new(
            input_name,
            DuplexStreams {
                _input: StreamHandle(input),
                _output: output.map(StreamHandle),
            },
        ))
    }
}

fn stream_config(config: &StreamConfig, channels: u16) -> cpal::StreamConfig {
    cpal::StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(config.sample_rate as u32),
        buffer_size: match config.capture_block {
            Some(frames) => cpal::BufferSize::Fixed(frames),
            None => cpal::BufferSize::Default,
        },
    }
}

fn input_device(host: &cpal::Host, index: Option<usize>) -> Result<cpal::Device> {
    match index {
        Some(i) => {
            let devices: Vec<_> = host.input_devices()?.collect();
            let count = devices.len();
            devices.into_iter().nth(i).ok_or_else(|| {
                Error::InvalidDevice(format!(
                    "Input device index {i} out of range ({count} available)"
                ))
            })
        }
        None => host
            .default_input_device()
            .ok_or_else(|| Error::InvalidDevice("No input device available".into())),
    }
}

fn output_device(host: &cpal::Host, index: Option<usize>) -> Result<cpal::Device> {
    match index {
        Some(i) => {
            let devices: Vec<_> = host.output_devices()?.collect();
            let count = devices.len();
            devices.into_iter().nth(i).ok_or_else(|| {
                Error::InvalidDevice(format!(
                    "Output device index {i} out of range ({count} available)"
                ))
            })
        }
        None => host
            .default_output_device()
            .ok_or_else(|| Error::InvalidDevice("No output device available".into())),
    }
}

fn build_input<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut tap: InputTap,
    reporter: DeviceErrorReporter,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let channels = config.channels.max(1) as usize;
    // Grows on first callback, then stable
    let mut mono = Vec::<Sample>::new();

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let frames = data.len() / channels;
            if mono.len() < frames {
                mono.resize(frames, 0.0);
            }

            for (frame, chunk) in mono.iter_mut().zip(data.chunks_exact(channels)) {
                let sum: f32 = chunk.iter().map(|s| s.to_sample::<f32>()).sum();
                *frame = sum / channels as f32;
            }

            tap.capture(&mono[..frames]);
        },
        move |err| reporter.report(err),
        None,
    )?;

    Ok(stream)
}

fn build_output<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut tap: OutputTap,
    reporter: DeviceErrorReporter,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels.max(1) as usize;
    let mut mono = Vec::<Sample>::new();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                let frames = data.len() / channels;
                if mono.len() < frames {
                    mono.resize(frames, 0.0);
                }
                tap.render(&mut mono[..frames]);

                for (chunk, value) in data.chunks_exact_mut(channels).zip(&mono[..frames]) {
                    for sample in chunk {
                        *sample = T::from_sample(*value);
                    }
                }
            }));

            if result.is_err() {
                output_silence(data);
            }
        },
        move |err| reporter.report(err),
        None,
    )?;

    Ok(stream)
}

/// Output silence (panic recovery).
#[inline]
fn output_silence<T: cpal::SizedSample + cpal::FromSample<f32>>(data: &mut [T]) {
    for sample in data.iter_mut() {
        *sample = T::from_sample(0.0);
    }
}
