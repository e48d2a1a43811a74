//! Actor wrapper that owns a [`ConcentrationGrader`] inside one tokio task.
//!
//! Producers talk to it through a cloneable [`GraderHandle`]: intake is a
//! non-blocking channel send, graded intervals fan out over a broadcast
//! channel and, optionally, into an [`IntervalLog`] written by a separate
//! task so disk latency never delays a tick.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::blink::Landmark;
use crate::clock::Clock;
use crate::config::GraderConfig;
use crate::error::{GraderError, Result};
use crate::grader::{ConcentrationGrader, GraderStats};
use crate::persistence::{BufferedIntervalWriter, IntervalLog};
use crate::types::Interval;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug)]
enum Command {
    Frame,
    Face,
    Blink,
    Landmarks(Vec<Landmark>),
    BodyConcentration,
    BodyDistraction,
    FaceCenter { x: f64, y: f64 },
    Start(oneshot::Sender<Result<()>>),
    Stop(oneshot::Sender<()>),
    Tick(oneshot::Sender<Vec<Interval>>),
    Stats(oneshot::Sender<GraderStats>),
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Frame => "frame",
            Command::Face => "face",
            Command::Blink => "blink",
            Command::Landmarks(_) => "landmarks",
            Command::BodyConcentration => "body_concentration",
            Command::BodyDistraction => "body_distraction",
            Command::FaceCenter { .. } => "face_center",
            Command::Start(_) => "start",
            Command::Stop(_) => "stop",
            Command::Tick(_) => "tick",
            Command::Stats(_) => "stats",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GraderHandle {
    commands: mpsc::UnboundedSender<Command>,
    intervals: broadcast::Sender<Interval>,
    shutdown_tx: broadcast::Sender<()>,
}

impl GraderHandle {
    pub fn add_frame(&self) -> Result<()> {
        self.send(Command::Frame)
    }

    pub fn add_face(&self) -> Result<()> {
        self.send(Command::Face)
    }

    pub fn add_blink(&self) -> Result<()> {
        self.send(Command::Blink)
    }

    /// Queues one frame's eye landmarks; malformed sets are logged and skipped.
    pub fn detect_blink(&self, landmarks: &[Landmark]) -> Result<()> {
        self.send(Command::Landmarks(landmarks.to_vec()))
    }

    pub fn add_body_concentration(&self) -> Result<()> {
        self.send(Command::BodyConcentration)
    }

    pub fn add_body_distraction(&self) -> Result<()> {
        self.send(Command::BodyDistraction)
    }

    pub fn add_face_center(&self, x: f64, y: f64) -> Result<()> {
        self.send(Command::FaceCenter { x, y })
    }

    pub async fn start_grading(&self) -> Result<()> {
        self.request(Command::Start).await?
    }

    pub async fn stop_grading(&self) -> Result<()> {
        self.request(Command::Stop).await
    }

    /// Runs a tick right away, outside the timer. Intervals it emits are
    /// also broadcast and persisted as usual.
    pub async fn tick_now(&self) -> Result<Vec<Interval>> {
        self.request(Command::Tick).await
    }

    pub async fn stats(&self) -> Result<GraderStats> {
        self.request(Command::Stats).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Interval> {
        self.intervals.subscribe()
    }

    pub fn shutdown(&self) {
        if self.shutdown_tx.send(()).is_err() {
            debug!("grader service already stopped");
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| GraderError::ServiceClosed)
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx))?;
        rx.await.map_err(|_| GraderError::ServiceClosed)
    }
}

pub struct GraderService {
    grader: ConcentrationGrader,
    commands: mpsc::UnboundedReceiver<Command>,
    intervals: broadcast::Sender<Interval>,
    shutdown_rx: broadcast::Receiver<()>,
    outbox: Option<mpsc::UnboundedSender<Vec<Interval>>>,
    tick_interval: Duration,
}

impl GraderService {
    /// Builds the grader from `config` and persists to `config.log_path`.
    pub fn from_config(
        config: GraderConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<(GraderHandle, JoinHandle<()>)> {
        let log = IntervalLog::new(&config.log_path);
        let grader = ConcentrationGrader::new(config, clock)?;
        Ok(Self::spawn(grader, Some(log)))
    }

    /// Spawns the actor (and the log writer when `log` is set) on the current
    /// runtime. The join handle resolves once the service has shut down and
    /// the log writer has flushed.
    pub fn spawn(grader: ConcentrationGrader, log: Option<IntervalLog>) -> (GraderHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (interval_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let (outbox, writer) = match log {
            Some(log) => {
                let (tx, rx) = mpsc::unbounded_channel();
                (Some(tx), Some(tokio::spawn(write_intervals(log, rx))))
            }
            None => (None, None),
        };

        let service = Self {
            tick_interval: grader.config().tick_interval(),
            grader,
            commands: command_rx,
            intervals: interval_tx.clone(),
            shutdown_rx,
            outbox,
        };

        let task = tokio::spawn(async move {
            service.run().await;
            if let Some(writer) = writer {
                if let Err(e) = writer.await {
                    error!(error = %e, "interval log writer panicked");
                }
            }
        });

        let handle = GraderHandle {
            commands: command_tx,
            intervals: interval_tx,
            shutdown_tx,
        };
        (handle, task)
    }

    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(tick_ms = self.tick_interval.as_millis() as u64, "grader service started");

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("grader service received shutdown signal");
                    break;
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => {
                        info!("all grader handles dropped");
                        break;
                    }
                },
                _ = ticker.tick() => {
                    self.tick();
                }
            }
        }

        let stats = self.grader.stats();
        info!(
            emitted = stats.emitted,
            discarded = stats.discarded,
            dropped = stats.dropped,
            "grader service stopped"
        );
    }

    fn handle(&mut self, command: Command) {
        let name = command.name();
        let result = match command {
            Command::Frame => self.grader.add_frame(),
            Command::Face => self.grader.add_face(),
            Command::Blink => self.grader.add_blink(),
            Command::Landmarks(landmarks) => self.grader.detect_blink(&landmarks).map(|_| ()),
            Command::BodyConcentration => self.grader.add_body_concentration(),
            Command::BodyDistraction => self.grader.add_body_distraction(),
            Command::FaceCenter { x, y } => self.grader.add_face_center(x, y),
            Command::Start(reply) => {
                let _ = reply.send(self.grader.start_grading());
                Ok(())
            }
            Command::Stop(reply) => {
                self.grader.stop_grading();
                let _ = reply.send(());
                Ok(())
            }
            Command::Tick(reply) => {
                let _ = reply.send(self.tick());
                Ok(())
            }
            Command::Stats(reply) => {
                let _ = reply.send(self.grader.stats());
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!(command = name, error = %e, "grader rejected input");
        }
    }

    fn tick(&mut self) -> Vec<Interval> {
        let emitted = match self.grader.tick() {
            Ok(emitted) => emitted,
            Err(e) => {
                warn!(error = %e, "tick skipped");
                return Vec::new();
            }
        };
        if emitted.is_empty() {
            return emitted;
        }

        for interval in &emitted {
            // no subscribers is not an error
            let _ = self.intervals.send(*interval);
        }
        if let Some(outbox) = &self.outbox {
            if outbox.send(emitted.clone()).is_err() {
                error!(count = emitted.len(), "interval log writer is gone");
            }
        }
        emitted
    }
}

async fn write_intervals(log: IntervalLog, mut batches: mpsc::UnboundedReceiver<Vec<Interval>>) {
    if let Err(e) = log.init().await {
        error!(error = %e, "failed to initialize interval log");
    }

    let mut writer = BufferedIntervalWriter::new(log);
    while let Some(batch) = batches.recv().await {
        if let Err(e) = writer.write(batch).await {
            warn!(error = %e, pending = writer.pending().len(), "interval log write failed");
        }
    }

    if let Err(e) = writer.flush().await {
        error!(error = %e, lost = writer.pending().len(), "intervals not persisted on shutdown");
    }
}
