//! # Conversation Pipeline
//!
//! A linear chain of stages, one tokio task each, connected by depth-1 channels.
//!
//! ## Flow:
//! ```text
//! input → transport-input → protocol-framing → speech-recognition → context-aggregation(user)
//!       → interview-logic → language-model → transcript-capture → speech-synthesis
//!       → avatar-render → transport-output → context-aggregation(assistant) → output
//! ```
//!
//! ## Backpressure:
//! Every edge holds at most one frame. A stage blocked on sending stops reading, so a slow
//! consumer (synthesis, the network) throttles everything upstream instead of letting
//! audio pile up in memory.
//!
//! ## Cancellation:
//! All stages share one `CancellationToken`. Once it fires, a stage finishes nothing else:
//! pending sends and guarded collaborator calls return [`PipelineClosed`], the stage closes
//! its inbound queue (discarding what's buffered) and the task ends without an error.
//! A `Control(Cancel)` frame reaching any stage fires the token.

pub mod frame;
pub mod stages;

pub use frame::{AudioChunk, ControlSignal, Frame, SynthesizedAudio, SynthesizedVideo};

use async_trait::async_trait;
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Frames buffered per edge.
const EDGE_CAPACITY: usize = 1;

/// Downstream is gone or the session was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("pipeline closed")]
pub struct PipelineClosed;

/// Sending half handed to a stage while it processes a frame.
pub struct Outbox {
    tx: mpsc::Sender<Frame>,
    cancel: CancellationToken,
}

impl Outbox {
    /// Send a frame downstream, waiting for room on the edge.
    pub async fn send(&self, frame: Frame) -> Result<(), PipelineClosed> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(PipelineClosed),
            sent = self.tx.send(frame) => sent.map_err(|_| PipelineClosed),
        }
    }

    /// Run a collaborator call, abandoning it if the session is cancelled.
    pub async fn guard<F: Future>(&self, call: F) -> Result<F::Output, PipelineClosed> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(PipelineClosed),
            output = call => Ok(output),
        }
    }
}

/// One pipeline step: given a frame, produce zero or more frames.
#[async_trait]
pub trait Stage: Send + 'static {
    fn name(&self) -> &'static str;

    /// Handle one frame. Collaborator failures are handled here (usually with an
    /// apology frame); an error means the stage should stop.
    async fn process(&mut self, frame: Frame, out: &Outbox) -> Result<(), PipelineClosed>;

    /// Called once after the stage's loop ends.
    fn shutdown(&mut self) {}
}

pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Start every stage and return the ends of the chain.
    pub fn spawn(self, cancel: CancellationToken) -> PipelineHandle {
        debug!(stages = ?self.stage_names(), "Spawning pipeline");
        let (input, mut rx) = mpsc::channel(EDGE_CAPACITY);
        let mut tasks = Vec::with_capacity(self.stages.len());

        for stage in self.stages {
            let (tx, next_rx) = mpsc::channel(EDGE_CAPACITY);
            let out = Outbox { tx, cancel: cancel.clone() };
            tasks.push(tokio::spawn(run_stage(stage, rx, out)));
            rx = next_rx;
        }

        PipelineHandle {
            input,
            output: rx,
            tasks,
            cancel,
        }
    }
}

async fn run_stage(mut stage: Box<dyn Stage>, mut rx: mpsc::Receiver<Frame>, out: Outbox) {
    let name = stage.name();
    debug!(stage = name, "Stage started");

    loop {
        let frame = tokio::select! {
            biased;
            _ = out.cancel.cancelled() => break,
            frame = rx.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        if matches!(frame, Frame::Control(ControlSignal::Cancel)) {
            debug!(stage = name, "Cancel signal received");
            out.cancel.cancel();
            break;
        }

        trace!(stage = name, frame = frame.kind(), "Processing frame");
        if stage.process(frame, &out).await.is_err() {
            break;
        }
    }

    rx.close();
    stage.shutdown();
    debug!(stage = name, "Stage stopped");
}

/// Handle to a running pipeline.
pub struct PipelineHandle {
    input: mpsc::Sender<Frame>,
    output: mpsc::Receiver<Frame>,
    tasks: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl PipelineHandle {
    /// Sender feeding the first stage.
    pub fn input(&self) -> mpsc::Sender<Frame> {
        self.input.clone()
    }

    /// Next frame out of the last stage. `None` once the pipeline stopped or was cancelled.
    pub async fn next_output(&mut self) -> Option<Frame> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            frame = self.output.recv() => frame,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for every stage task to finish.
    pub async fn join(self) {
        drop(self.input);
        drop(self.output);
        for task in self.tasks {
            if let Err(err) = task.await {
                warn!(error = %err, "Pipeline stage task failed");
            }
        }
    }
}
