//! Trading decision engine entry point.

use anyhow::Result;
use clap::Parser;
use std::collections::HashMap;
use std::sync::Arc;
use tgate_bot::{intake, AppConfig, Application};
use tgate_broker::BrokerSink;
use tgate_catalog::InstrumentCatalog;
use tgate_core::WallClock;
use tgate_feed::EventBus;
use tgate_signals::FilterMode;
use tokio::sync::mpsc;
use tracing::info;

/// Per-symbol trading decision engine.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via TRADEGATE_CONFIG).
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tgate_telemetry::init_logging()?;
    info!("Starting tradegate v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(args.config.as_deref())?;
    info!(
        catalog = %config.catalog_path,
        data_dir = %config.data_dir,
        capital = config.capital,
        "Configuration loaded"
    );

    let catalog = Arc::new(InstrumentCatalog::load_or_empty(&config.catalog_path));
    let clock = Arc::new(WallClock);

    let (bus, events_rx) = EventBus::channel(config.bus_capacity, clock.clone());
    let (control_tx, control_rx) = mpsc::channel(16);
    let (orders_tx, orders_rx) = mpsc::channel(256);

    let mut app = Application::new(&config, catalog.clone(), clock, orders_tx);
    app.load_persisted();

    // Broker sink: drains order intents until the engine drops the channel.
    let sink = BrokerSink::new(&config.order_url, catalog)?;
    tokio::spawn(sink.run(orders_rx));

    // Intake router: event ingestion, reset inputs, state snapshots.
    let signal_rx: HashMap<String, _> = FilterMode::ALL
        .iter()
        .map(|&mode| (mode.name().to_string(), app.subscribe_signals(mode)))
        .collect();
    let intake_state = intake::IntakeState::new(
        bus,
        control_tx,
        app.subscribe_fsm(),
        app.subscribe_trades(),
        signal_rx,
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "Intake listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, intake::router(intake_state)).await {
            tracing::error!(?e, "Intake server failed");
        }
    });

    app.run(events_rx, control_rx).await?;
    Ok(())
}
