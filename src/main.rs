use color_eyre::{eyre::eyre, Result};
use padmapper::config::Settings;
use padmapper::controller::ControllerHandle;
use padmapper::mapping::{
    ChannelEmitter, EmitterRequest, LayoutManager, MappingEngineHandle, OutputSnapshot,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let settings = Settings::load()
        .await
        .map_err(|e| eyre!("Failed to load settings: {}", e))?;
    let capacity = settings.engine.channel_capacity.max(1);

    // Keyboard/mouse side effects
    let (emitter, emitter_rx) = ChannelEmitter::channel(capacity);
    let emitter_task = tokio::spawn(log_emitter_requests(emitter_rx));

    let manager = Arc::new(LayoutManager::new(&settings, Box::new(emitter)));
    info!("Active layout: {}", manager.active_layout_name());

    let (snapshot_tx, snapshot_rx) = mpsc::channel(capacity);
    let controller = ControllerHandle::spawn(&settings.controller, snapshot_tx)
        .map_err(|e| eyre!("Failed to spawn controller: {}", e))?;

    let mut engine = MappingEngineHandle::new("gamepad".to_string());
    let output_rx = engine
        .start(Arc::clone(&manager), snapshot_rx, capacity)
        .map_err(|e| eyre!("Failed to start mapping engine: {}", e))?;
    let output_task = tokio::spawn(log_output(output_rx));

    info!("Mapping running, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    if let Err(e) = controller.shutdown().await {
        warn!("Controller stopped with error: {}", e);
    }
    let ticks = engine
        .shutdown()
        .await
        .map_err(|e| eyre!("Mapping engine failed: {}", e))?;
    info!("Mapped {} ticks", ticks);

    // both consumers end once their senders are gone
    drop(manager);
    let _ = output_task.await;
    let _ = emitter_task.await;
    Ok(())
}

/// Stands in for the virtual keyboard/mouse device.
async fn log_emitter_requests(mut rx: mpsc::Receiver<EmitterRequest>) {
    while let Some(request) = rx.recv().await {
        match request {
            EmitterRequest::Key {
                key,
                modifiers,
                pressed,
            } => info!("Key {:?} ({:?}) pressed={}", key, modifiers, pressed),
            EmitterRequest::MouseButton { button, pressed } => {
                info!("Mouse {:?} pressed={}", button, pressed)
            }
            EmitterRequest::MouseMove { dx, dy } => debug!("Mouse move {} {}", dx, dy),
            EmitterRequest::Scroll { dx, dy } => debug!("Scroll {} {}", dx, dy),
        }
    }
}

/// Stands in for the virtual controller.
async fn log_output(mut rx: mpsc::Receiver<OutputSnapshot>) {
    let mut last = OutputSnapshot::default();
    while let Some(output) = rx.recv().await {
        if output.buttons != last.buttons {
            let pressed: Vec<_> = output
                .buttons
                .iter()
                .filter(|(_, pressed)| **pressed)
                .map(|(button, _)| button.to_string())
                .collect();
            info!("Buttons: [{}]", pressed.join(", "));
        }
        last = output;
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
