//! Simulated Sale
//!
//! This example runs one complete sale on the tokio runtime with simulated
//! payment devices.
//!
//! Key concepts:
//! - Kiosk driven by a single event loop (`KioskRuntime`)
//! - Driver signals and operator commands sent through a `KioskHandle`
//! - Published events received through a broadcast subscription
//! - A snapshot of the kiosk once the sale is over
//!
//! Run with: cargo run --example simulated_sale
//! More detail: RUST_LOG=cashflow=debug cargo run --example simulated_sale

use cashflow::config::KioskConfig;
use cashflow::device::{ChangerSignal, PrepareOutcome, ValidatorSignal};
use cashflow::fsm::KioskEvent;
use cashflow::runtime::{KioskHandle, KioskRuntime};
use cashflow::sim::{CallLog, SimChanger, SimPreparer, SimValidator};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

/// Print events until `until` arrives.
async fn watch(events: &mut broadcast::Receiver<KioskEvent>, until: KioskEvent) {
    while let Ok(event) = events.recv().await {
        println!("  event: {event:?}");
        if event == until {
            return;
        }
    }
}

fn bring_up(handle: &KioskHandle) -> Result<(), Box<dyn std::error::Error>> {
    handle.start()?;
    handle.changer(ChangerSignal::Online)?;
    handle.changer(ChangerSignal::Initialized)?;
    handle.validator(ValidatorSignal::Online)?;
    handle.validator(ValidatorSignal::Initialized)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    println!("=== Simulated Sale ===\n");

    let config = KioskConfig::from_json_str(
        r#"{
            "products": { "tea": 30, "soup": 45 },
            "accept_timeout_secs": 60
        }"#,
    )?;

    let log = CallLog::new();
    let validator = SimValidator::new(log.clone());
    let (runtime, handle) = KioskRuntime::new(
        config,
        Box::new(SimChanger::new(log.clone())),
        Box::new(validator.clone()),
        Box::new(SimPreparer::new(log.clone())),
    )?;
    let mut events = handle.subscribe();
    let task = tokio::spawn(runtime.run());

    println!("1. Bringing devices up");
    bring_up(&handle)?;
    watch(&mut events, KioskEvent::Ready).await;

    println!("\n2. Customer picks tea (30) and pays with a 50 bill");
    handle.sell("tea")?;
    handle.validator(ValidatorSignal::CheckBill(50))?;
    // The bill is stacked once the kiosk permits it.
    validator.capture(50);
    handle.validator(ValidatorSignal::BillIn(50))?;
    watch(&mut events, KioskEvent::Accepted(50)).await;

    println!("\n3. Tea is prepared, change is paid out");
    handle.prepared(PrepareOutcome::Prepared)?;
    handle.changer(ChangerSignal::CoinOut(20))?;
    watch(&mut events, KioskEvent::Ready).await;

    println!("\n4. Device commands issued");
    for call in log.calls() {
        println!("  {call:?}");
    }

    let snapshot = handle.snapshot().await?;
    println!("\n5. Snapshot");
    println!("{}", snapshot.to_json()?);

    handle.shutdown()?;
    let kiosk = task.await?;
    println!("\nFinal state: {}", kiosk.state());

    Ok(())
}
