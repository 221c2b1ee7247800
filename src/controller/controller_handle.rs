//! Controller Handle - API for the gamepad input source
//!
//! Validates the controller settings and starts the collector. The mapping
//! engine only ever sees the [`InputSnapshot`]s arriving on the sender.

use crate::config::ControllerSettings;
use crate::mapping::InputSnapshot;
use tokio::sync::mpsc;
use tracing::{debug, info};

pub use super::event_collector::{CollectorError, CollectorHandle};

/// Errors that can occur during controller initialization or operation
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// Error from the event collection subsystem
    ///
    /// Typically indicates gamepad detection issues, driver problems,
    /// or a closed snapshot channel.
    #[error("Collector error: {0}")]
    CollectorError(#[from] CollectorError),

    #[error("Initialization error: {0}")]
    InitializationError(String),
}

/// Handle for the controller subsystem lifecycle
///
/// # Threading Model
///
/// gilrs is polled on a dedicated blocking thread which publishes one
/// snapshot every `poll_interval_ms`:
///
/// ```text
/// gilrs ──► EventCollector ─[InputSnapshot]→ MappingEngine
///           (blocking thread)  (provided sender)
/// ```
pub struct ControllerHandle {
    collector: CollectorHandle,
}

impl ControllerHandle {
    /// Spawns the input source.
    ///
    /// # Errors
    ///
    /// * [`ControllerError::InitializationError`] - invalid settings or a
    ///   sender whose receiver is already gone
    pub fn spawn(
        settings: &ControllerSettings,
        sender: mpsc::Sender<InputSnapshot>,
    ) -> Result<Self, ControllerError> {
        info!("Initializing Controller system with settings: {:?}", settings);
        validate(settings)?;
        if sender.is_closed() {
            return Err(ControllerError::InitializationError(
                "snapshot receiver already dropped".to_string(),
            ));
        }

        let collector = CollectorHandle::spawn(settings.clone(), sender);
        debug!("Event Collector spawned");
        Ok(Self { collector })
    }

    /// Stops polling and waits for the collector thread.
    pub async fn shutdown(self) -> Result<(), ControllerError> {
        info!("Stopping controller input");
        self.collector.join().await?;
        Ok(())
    }
}

fn validate(settings: &ControllerSettings) -> Result<(), ControllerError> {
    if settings.poll_interval_ms == 0 {
        return Err(ControllerError::InitializationError(
            "poll_interval_ms must be at least 1".to_string(),
        ));
    }
    if !(0.0..1.0).contains(&settings.stick_deadzone) {
        return Err(ControllerError::InitializationError(format!(
            "stick_deadzone {} outside [0, 1)",
            settings.stick_deadzone
        )));
    }
    Ok(())
}
