//! Stream session lifecycle and the background processing worker.

use crate::callback::{InputTap, OutputTap};
use crate::{
    AccumulationSink, AtomicFloat, AudioBackend, AudioBlock, DeviceHandle, DuplexCallback, Error,
    Result, SampleRing, StreamConfig,
};
use crossbeam_channel::{bounded, RecvTimeoutError};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, Thread};
use std::time::Duration;

/// How long `start()` waits for the worker to report in.
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(2);

/// Transforms one analysis block. Runs on the processing worker only.
pub trait BlockProcessor: Send + 'static {
    fn process(&mut self, block: AudioBlock) -> AudioBlock;
}

impl<F> BlockProcessor for F
where
    F: FnMut(AudioBlock) -> AudioBlock + Send + 'static,
{
    fn process(&mut self, block: AudioBlock) -> AudioBlock {
        self(block)
    }
}

/// Session lifecycle state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

impl EngineState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// Counters shared by the hardware callbacks, the worker and observers.
#[derive(Default)]
pub struct StreamStats {
    /// Samples discarded from the input ring (drop-oldest).
    pub input_overflow: AtomicU64,
    /// Samples discarded from the output ring (drop-oldest).
    pub output_trimmed: AtomicU64,
    /// Output samples not covered by processed audio.
    pub output_underrun: AtomicU64,
    pub blocks_processed: AtomicU64,
    pub device_errors: AtomicU64,
    pub shutdown_timeouts: AtomicU64,
    /// Blocks whose processor panicked and were passed through unmodified.
    pub processor_panics: AtomicU64,
    /// Held input peak with per-callback decay.
    pub input_peak: AtomicFloat,
}

impl StreamStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            input_overflow: self.input_overflow.load(Ordering::Relaxed),
            output_trimmed: self.output_trimmed.load(Ordering::Relaxed),
            output_underrun: self.output_underrun.load(Ordering::Relaxed),
            blocks_processed: self.blocks_processed.load(Ordering::Relaxed),
            device_errors: self.device_errors.load(Ordering::Relaxed),
            shutdown_timeouts: self.shutdown_timeouts.load(Ordering::Relaxed),
            processor_panics: self.processor_panics.load(Ordering::Relaxed),
            input_peak: self.input_peak.get(),
        }
    }
}

/// Point-in-time copy of [`StreamStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatsSnapshot {
    pub input_overflow: u64,
    pub output_trimmed: u64,
    pub output_underrun: u64,
    pub blocks_processed: u64,
    pub device_errors: u64,
    pub shutdown_timeouts: u64,
    pub processor_panics: u64,
    pub input_peak: f32,
}

/// Lets the capture callback unpark a worker waiting for input.
#[derive(Default)]
pub(crate) struct WorkerWaker {
    thread: OnceLock<Thread>,
}

impl WorkerWaker {
    pub(crate) fn set(&self, thread: Thread) {
        let _ = self.thread.set(thread);
    }

    #[inline]
    pub(crate) fn wake(&self) {
        if let Some(thread) = self.thread.get() {
            thread.unpark();
        }
    }
}

struct Session {
    device: DeviceHandle,
    running: Arc<AtomicBool>,
    worker: JoinHandle<()>,
    done: crossbeam_channel::Receiver<()>,
}

/// Owns one device session at a time plus the worker that processes it.
///
/// `start` and `stop` are idempotent: calling either in a state where it
/// does not apply is a no-op.
pub struct StreamEngine {
    config: StreamConfig,
    backend: Mutex<Box<dyn AudioBackend>>,
    processor: Arc<Mutex<Box<dyn BlockProcessor>>>,
    state: AtomicU8,
    session: Mutex<Option<Session>>,
    sink: Arc<AccumulationSink>,
    stats: Arc<StreamStats>,
}

impl StreamEngine {
    pub fn new(
        config: StreamConfig,
        backend: Box<dyn AudioBackend>,
        processor: Box<dyn BlockProcessor>,
    ) -> Result<Self> {
        config.validate()?;
        let sink = Arc::new(AccumulationSink::new(config.accumulate));

        Ok(Self {
            config,
            backend: Mutex::new(backend),
            processor: Arc::new(Mutex::new(processor)),
            state: AtomicU8::new(EngineState::Stopped as u8),
            session: Mutex::new(None),
            sink,
            stats: Arc::new(StreamStats::default()),
        })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.state() == EngineState::Running
    }

    pub fn stats(&self) -> &Arc<StreamStats> {
        &self.stats
    }

    pub fn sink(&self) -> &Arc<AccumulationSink> {
        &self.sink
    }

    /// Open the device and launch the worker.
    ///
    /// No-op unless the engine is `Stopped`. On failure every partially
    /// acquired resource is released and the engine is `Stopped` again.
    pub fn start(&self) -> Result<()> {
        if self
            .state
            .compare_exchange(
                EngineState::Stopped as u8,
                EngineState::Starting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            tracing::debug!("start() ignored in state {:?}", self.state());
            return Ok(());
        }

        match self.open_session() {
            Ok(session) => {
                *self.session.lock() = Some(session);
                self.set_state(EngineState::Running);
                tracing::info!(
                    "Stream started at {} Hz (block {}, passthrough: {})",
                    self.config.sample_rate,
                    self.config.analysis_block,
                    self.config.passthrough
                );
                Ok(())
            }
            Err(err) => {
                self.set_state(EngineState::Stopped);
                tracing::error!("Failed to start stream: {}", err);
                Err(err)
            }
        }
    }

    /// Signal the worker, wait for it up to `shutdown_timeout`, close the device.
    ///
    /// No-op unless the engine is `Running`. The engine always ends up
    /// `Stopped`; a worker that misses the deadline is detached and reported
    /// as [`Error::ShutdownTimeout`].
    pub fn stop(&self) -> Result<()> {
        if self
            .state
            .compare_exchange(
                EngineState::Running as u8,
                EngineState::Stopping as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            tracing::debug!("stop() ignored in state {:?}", self.state());
            return Ok(());
        }

        let Some(session) = self.session.lock().take() else {
            self.set_state(EngineState::Stopped);
            return Ok(());
        };

        session.running.store(false, Ordering::Release);
        session.worker.thread().unpark();

        let waited = self.config.shutdown_timeout;
        let result = match session.done.recv_timeout(waited) {
            Err(RecvTimeoutError::Timeout) => {
                self.stats.shutdown_timeouts.fetch_add(1, Ordering::Relaxed);
                tracing::error!("Processing worker still busy after {:?}, detaching", waited);
                drop(session.worker);
                Err(Error::ShutdownTimeout { waited })
            }
            _ => {
                if session.worker.join().is_err() {
                    tracing::error!("Processing worker panicked");
                }
                Ok(())
            }
        };

        session.device.close();
        self.set_state(EngineState::Stopped);
        tracing::info!("Stream stopped");
        result
    }

    fn set_state(&self, state: EngineState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn open_session(&self) -> Result<Session> {
        let capacity = self.config.ring_capacity();
        let input = Arc::new(SampleRing::new(capacity));
        let output = Arc::new(SampleRing::new(capacity));
        let dry = self
            .config
            .passthrough
            .then(|| Arc::new(SampleRing::new(capacity)));
        let waker = Arc::new(WorkerWaker::default());

        let callback = DuplexCallback::new(
            InputTap::new(
                input.clone(),
                dry.clone(),
                self.config.analysis_block,
                waker.clone(),
                self.stats.clone(),
            ),
            OutputTap::new(output.clone(), dry, self.stats.clone()),
            self.config.passthrough,
        );

        let device = {
            let mut backend = self.backend.lock();
            tracing::debug!("Opening device via {} backend", backend.name());
            backend.open(&self.config, callback)?
        };

        let running = Arc::new(AtomicBool::new(true));
        let (launched_tx, launched_rx) = bounded::<()>(1);
        let (done_tx, done_rx) = bounded::<()>(1);

        let worker = Worker {
            input,
            output,
            processor: self.processor.clone(),
            sink: self.sink.clone(),
            stats: self.stats.clone(),
            running: running.clone(),
            block_len: self.config.analysis_block,
            sample_rate: self.config.sample_rate,
            idle_poll: self.config.idle_poll,
        };

        // `device` drops on every early return below, closing the streams
        let handle = thread::Builder::new()
            .name("cantus-processing".into())
            .spawn(move || {
                let _done = done_tx;
                let _ = launched_tx.send(());
                worker.run();
            })?;

        if launched_rx.recv_timeout(LAUNCH_TIMEOUT).is_err() {
            running.store(false, Ordering::Release);
            handle.thread().unpark();
            return Err(Error::WorkerLaunch);
        }
        waker.set(handle.thread().clone());

        Ok(Session {
            device,
            running,
            worker: handle,
            done: done_rx,
        })
    }
}

impl Drop for StreamEngine {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

struct Worker {
    input: Arc<SampleRing>,
    output: Arc<SampleRing>,
    processor: Arc<Mutex<Box<dyn BlockProcessor>>>,
    sink: Arc<AccumulationSink>,
    stats: Arc<StreamStats>,
    running: Arc<AtomicBool>,
    block_len: usize,
    sample_rate: f64,
    idle_poll: Duration,
}

impl Worker {
    fn run(self) {
        let mut reported_overflow = 0u64;

        while self.running.load(Ordering::Acquire) {
            let Some(samples) = self.input.pop_block(self.block_len) else {
                thread::park_timeout(self.idle_poll);
                continue;
            };

            let block = AudioBlock::new(samples, self.sample_rate);
            let processed = self.process(block);

            let trimmed = self.output.push_slice(processed.samples());
            if trimmed > 0 {
                self.stats
                    .output_trimmed
                    .fetch_add(trimmed as u64, Ordering::Relaxed);
            }
            self.sink.append(processed.samples());
            self.stats.blocks_processed.fetch_add(1, Ordering::Relaxed);

            let overflow = self.stats.input_overflow.load(Ordering::Relaxed);
            if overflow > reported_overflow {
                tracing::warn!(
                    "Input ring overflowed, {} samples dropped so far",
                    overflow
                );
                reported_overflow = overflow;
            }
        }

        tracing::debug!("Processing worker exiting");
    }

    /// Run the processor on one block. A panic passes the block through
    /// unmodified and the worker keeps going.
    fn process(&self, block: AudioBlock) -> AudioBlock {
        let dry = block.clone();
        match panic::catch_unwind(AssertUnwindSafe(|| self.processor.lock().process(block))) {
            Ok(processed) => processed,
            Err(_) => {
                let count = self.stats.processor_panics.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    "Block processor panicked, passing block through ({} so far)",
                    count
                );
                dry
            }
        }
    }
}
