//! Scripted session against the in-process receiver.
//!
//! ```sh
//! cargo run -p pmocast --example memory_session
//! ```

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use pmocast::logging::init_logging;
use pmocast::{
    DeviceId, MediaRootResolver, MemoryDevice, SessionController, SessionEvent, Track,
};
use pmoconfig::get_config;
use tracing::info;

fn main() -> Result<()> {
    let config = get_config();
    init_logging(&config)?;

    let root = config.get_media_root()?;
    let resolver = Arc::new(MediaRootResolver::from_config(&config)?);
    let controller = SessionController::spawn(&config, resolver)
        .context("Failed to start the session worker")?;
    let events = controller.subscribe();

    let printer = thread::spawn(move || {
        while let Ok(event) = events.recv_timeout(Duration::from_secs(1)) {
            match event {
                SessionEvent::Busy => {}
                SessionEvent::QueueChanged(snapshot) => {
                    let names: Vec<_> = snapshot.tracks().iter().map(|t| t.name.clone()).collect();
                    println!("queue: {:?} (desync: {})", names, snapshot.desynchronized);
                }
                other => println!("{:?}", other),
            }
        }
    });

    let track = |name: &str| {
        Track::new(
            "Bill Evans Trio",
            "Sunday at the Village Vanguard",
            name,
            root.join("Bill Evans Trio").join(format!("{name}.flac")),
        )
    };

    controller.device_discovered(Arc::new(MemoryDevice::new("memory-1", "Living room")))?;
    controller.connect(DeviceId::new("memory-1"))?;
    controller.play(vec![track("Gloria's Step"), track("My Man's Gone Now")])?;
    controller.queue_next(vec![track("Alice in Wonderland")])?;
    controller.queue_last(vec![track("Jade Visions")])?;
    controller.next()?;
    controller.toggle_playback()?;
    controller.toggle_playback()?;
    controller.remove(0)?;
    controller.resync()?;
    controller.stop()?;
    controller.disconnect()?;

    info!("Script submitted, waiting for events");
    controller.shutdown();
    printer
        .join()
        .map_err(|_| anyhow::anyhow!("event printer panicked"))?;
    Ok(())
}
