//! sober-interlock - driver authorization daemon
//!
//! Configuration comes from `SOBER_*` environment variables; see
//! [`InterlockConfig::from_env`].

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use sober_biometric::{EuclideanComparator, SpoolCamera};
use sober_notify::{
    IpinfoFileLocation, LocationProvider, LogNotifier, NotificationDispatcher, Notifier,
    OutboxNotifier, UnknownLocation,
};
use sober_policy::PolicyEngine;
use sober_registry::FileRegistry;
use sober_runtime::{
    init_tracing, restore_state, Interlock, InterlockConfig, VehicleActuator,
};
use sober_time::{Clock, SystemClock};
use sober_transport::{start_line_reader, CommandWriter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = InterlockConfig::from_env()?;
    config.validate()?;
    init_tracing(config.log_format)?;

    info!(
        link = %config.link,
        baud_rate = config.baud_rate,
        registry = %config.registry_path.display(),
        spool = %config.spool_dir.display(),
        block_window = %humantime::format_duration(config.block_window),
        threshold = config.similarity_threshold,
        "Starting sober-interlock"
    );

    let clock = SystemClock;
    let registry = FileRegistry::new(&config.registry_path);
    let state = restore_state(&registry, clock.now());

    let (reader, writer) = config.link.connect(config.baud_rate).await?;
    let (lines, _reader_task) = start_line_reader(reader, config.line_queue);

    let engine = PolicyEngine::new(
        config.policy_config(),
        SpoolCamera::new(&config.spool_dir),
        EuclideanComparator::new(),
        clock,
    );

    let notifier: Arc<dyn Notifier> = match &config.outbox_dir {
        Some(dir) => Arc::new(OutboxNotifier::new(dir)),
        None => Arc::new(LogNotifier),
    };
    let locator: Arc<dyn LocationProvider> = match &config.location_file {
        Some(path) => Arc::new(IpinfoFileLocation::new(path)),
        None => Arc::new(UnknownLocation),
    };

    let mut interlock = Interlock::new(
        engine,
        state,
        Box::new(registry),
        VehicleActuator::new(CommandWriter::from_link(writer)),
        NotificationDispatcher::new(notifier, locator),
        lines,
        config.scheduler_config(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for Ctrl-C; running until the link closes");
                std::future::pending::<()>().await;
            }
        }
    });

    interlock.run(shutdown_rx).await?;
    info!("sober-interlock stopped");
    Ok(())
}
