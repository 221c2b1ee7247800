//! Mapping engine with statum state machine
//!
//! Drives the [`LayoutManager`] from a stream of input snapshots. Each engine
//! runs in its own tokio task and forwards every mapped snapshot to an output
//! channel consumed by the virtual controller.
//!
//! # State Machine
//!
//! ```text
//! Initializing ──► Configured ──► Active ──► Deactivating ──► Deactivated
//!                                   │             ▲
//!                                   └─────────────┘
//!                            (shutdown or input closed)
//! ```
//!
//! # Architecture
//!
//! ```text
//! InputSnapshot ──► [LayoutManager::map] ──► OutputSnapshot
//!       ▲                    │                     │
//!   Input Channel       EmitterRequests       Output Channel
//! ```

use crate::mapping::{InputSnapshot, LayoutManager, MappingError, OutputSnapshot};
use statum::{machine, state};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// States for mapping engine lifecycle using statum
#[state]
#[derive(Debug, Clone)]
pub enum MappingEngineState {
    Initializing, // Channels wired, nothing checked yet
    Configured,   // Output channel verified
    Active,       // Mapping snapshots in the main loop
    Deactivating, // Shutting down gracefully
    Deactivated,  // Fully stopped
}

#[machine]
pub struct MappingEngine<S: MappingEngineState> {
    input_receiver: mpsc::Receiver<InputSnapshot>,
    output_sender: mpsc::Sender<OutputSnapshot>,
    manager: Arc<LayoutManager>,
    name: String,
    output: OutputSnapshot,
    ticks: u64,
    dropped: u64,
}

impl<S: MappingEngineState> MappingEngine<S> {
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl MappingEngine<Initializing> {
    pub fn create(
        input_receiver: mpsc::Receiver<InputSnapshot>,
        output_sender: mpsc::Sender<OutputSnapshot>,
        manager: Arc<LayoutManager>,
        name: String,
    ) -> Self {
        info!("Initializing new mapping engine: {}", name);

        Self::new(
            input_receiver,
            output_sender,
            manager,
            name,
            OutputSnapshot::default(),
            0, // ticks
            0, // dropped
        )
    }

    /// Checks that somebody is listening for output and transitions to
    /// Configured.
    pub fn configure(self) -> Result<MappingEngine<Configured>, MappingError> {
        info!("Configuring mapping engine: {}", self.name);

        if self.output_sender.is_closed() {
            error!("Output channel of {} is already closed", self.name);
            return Err(MappingError::ConfigError(format!(
                "Output channel of {} is closed",
                self.name
            )));
        }

        debug!(
            "Engine {} maps onto layout {}",
            self.name,
            self.manager.active_layout_name()
        );
        Ok(self.transition())
    }
}

impl MappingEngine<Configured> {
    pub fn activate(self) -> MappingEngine<Active> {
        info!("Activating mapping engine: {}", self.name);
        self.transition()
    }
}

impl MappingEngine<Active> {
    /// Maps one snapshot and hands the result to the output channel.
    ///
    /// A full output channel drops the snapshot; the next tick supersedes it.
    pub fn process_snapshot(&mut self, input: &InputSnapshot) -> Result<(), MappingError> {
        self.manager.map_into(input, &mut self.output);
        self.ticks += 1;

        match self.output_sender.try_send(self.output.clone()) {
            Ok(()) => {
                trace!("Tick {} sent", self.ticks);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                debug!("Output channel full, dropped tick {}", self.ticks);
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(MappingError::ChannelError(format!(
                "Output channel of {} closed",
                self.name
            ))),
        }
    }

    /// Main processing loop with graceful shutdown support
    ///
    /// Runs until the shutdown signal arrives, the input channel closes or the
    /// output channel is dropped.
    pub async fn run_until_shutdown(
        mut self,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) -> Result<MappingEngine<Deactivating>, MappingError> {
        info!("Starting mapping loop for: {}", self.name);

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Shutdown signal received for: {}", self.name);
                    break;
                }

                input = self.input_receiver.recv() => {
                    match input {
                        Some(snapshot) => {
                            if let Err(e) = self.process_snapshot(&snapshot) {
                                warn!("Stopping {}: {}", self.name, e);
                                break;
                            }
                        }
                        None => {
                            info!("Input channel closed for: {}", self.name);
                            break;
                        }
                    }
                }
            }
        }

        info!("Transitioning to Deactivating state: {}", self.name);
        Ok(self.transition())
    }
}

impl MappingEngine<Deactivating> {
    pub async fn shutdown(self) -> MappingEngine<Deactivated> {
        info!(
            "Engine {} shut down after {} ticks ({} dropped)",
            self.name, self.ticks, self.dropped
        );
        self.transition()
    }
}

impl MappingEngine<Deactivated> {}

/// Handle for managing a mapping engine in a tokio task
#[derive(Debug)]
pub struct MappingEngineHandle {
    pub name: String,

    task_handle: Option<JoinHandle<Result<u64, MappingError>>>,

    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MappingEngineHandle {
    pub fn new(name: String) -> Self {
        Self {
            name,
            task_handle: None,
            shutdown_tx: None,
        }
    }

    /// Starts the engine in a tokio task
    ///
    /// Returns the receiver for mapped output snapshots.
    pub fn start(
        &mut self,
        manager: Arc<LayoutManager>,
        input_receiver: mpsc::Receiver<InputSnapshot>,
        capacity: usize,
    ) -> Result<mpsc::Receiver<OutputSnapshot>, MappingError> {
        if self.task_handle.is_some() {
            return Err(MappingError::InitializationError(format!(
                "Engine {} is already running",
                self.name
            )));
        }

        let (output_sender, output_receiver) = mpsc::channel(capacity.max(1));
        let engine_name = self.name.clone();
        let active_engine =
            MappingEngine::create(input_receiver, output_sender, manager, engine_name.clone())
                .configure()?
                .activate();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);
        let task_handle = tokio::spawn(async move {
            info!("Spawning running engine: {}", engine_name);
            match active_engine.run_until_shutdown(shutdown_rx).await {
                Ok(deactivating_engine) => {
                    let deactivated = deactivating_engine.shutdown().await;
                    Ok(deactivated.ticks())
                }
                Err(e) => {
                    error!("Error running engine: {} - {}", engine_name, e);
                    Err(e)
                }
            }
        });

        self.task_handle = Some(task_handle);
        info!("Mapping engine activated: {}", self.name);
        Ok(output_receiver)
    }

    /// Gracefully shuts down the engine and returns the number of mapped ticks
    pub async fn shutdown(&mut self) -> Result<u64, MappingError> {
        debug!("Sending shutdown signal to engine: {}", self.name);

        if let Some(tx) = self.shutdown_tx.take() {
            if tx.send(()).is_err() {
                warn!("Engine task already terminated: {}", self.name);
            }
        }

        if let Some(handle) = self.task_handle.take() {
            match handle.await {
                Ok(result) => {
                    debug!("Engine task completed: {}", self.name);
                    result
                }
                Err(e) => {
                    error!("Engine task panicked: {} - {}", self.name, e);
                    Err(MappingError::ThreadError(format!(
                        "Engine task panicked: {}",
                        e
                    )))
                }
            }
        } else {
            debug!("Engine already shut down: {}", self.name);
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::mapping::emitter::NullEmitter;
    use crate::mapping::types::ButtonId;

    fn manager() -> Arc<LayoutManager> {
        Arc::new(LayoutManager::new(
            &Settings::default(),
            Box::new(NullEmitter),
        ))
    }

    #[tokio::test]
    async fn test_engine_maps_snapshots() {
        let (input_tx, input_rx) = mpsc::channel(8);
        let mut handle = MappingEngineHandle::new("test".to_string());
        let mut output_rx = handle.start(manager(), input_rx, 8).unwrap();

        input_tx
            .send(InputSnapshot::default().with_button(ButtonId::Y, true))
            .await
            .unwrap();
        let output = output_rx.recv().await.unwrap();
        assert!(output.is_pressed(ButtonId::Y));

        assert_eq!(handle.shutdown().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_engine_stops_when_input_closes() {
        let (input_tx, input_rx) = mpsc::channel(8);
        let mut handle = MappingEngineHandle::new("closing".to_string());
        let mut output_rx = handle.start(manager(), input_rx, 8).unwrap();

        input_tx.send(InputSnapshot::default()).await.unwrap();
        drop(input_tx);

        assert!(output_rx.recv().await.is_some());
        assert!(output_rx.recv().await.is_none());
        assert_eq!(handle.shutdown().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_configure_rejects_closed_output() {
        let (_input_tx, input_rx) = mpsc::channel(1);
        let (output_tx, output_rx) = mpsc::channel(1);
        drop(output_rx);

        let engine = MappingEngine::create(input_rx, output_tx, manager(), "closed".to_string());
        assert!(matches!(
            engine.configure(),
            Err(MappingError::ConfigError(_))
        ));
    }
}
