use conduit_core::{contract, create_proxy, CallRecorder, SharedObserver, TracingObserver};
use std::sync::Arc;

#[contract]
pub trait Inventory: Send + Sync {
    fn stock(&self, item: String) -> u32;
    fn restock(&self, item: String, amount: u32);
    fn withdraw(&self, item: String, amount: u32) -> Result<u32, String>;
}

struct Warehouse;

impl Inventory for Warehouse {
    fn stock(&self, item: String) -> u32 {
        item.len() as u32 * 10
    }

    fn restock(&self, item: String, amount: u32) {
        println!("  (warehouse) restocking {} x{}", item, amount);
    }

    fn withdraw(&self, item: String, amount: u32) -> Result<u32, String> {
        let available = self.stock(item.clone());
        if amount > available {
            Err(format!("only {} {} left", available, item))
        } else {
            Ok(available - amount)
        }
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("🔌 Conduit Logging Proxy Demo");
    println!("-----------------------------");

    // 1. An observer that turns every hook into a tracing event
    let traced = create_proxy::<dyn Inventory>(
        Box::new(Warehouse),
        Some(Arc::new(TracingObserver::new("inventory"))),
    )?;

    println!("stock(apples) = {}", traced.stock("apples".to_string()));
    traced.restock("pears".to_string(), 5);
    println!("withdraw(figs, 99) = {:?}", traced.withdraw("figs".to_string(), 99));

    // 2. An observer that records every hook for later inspection
    let recorder = CallRecorder::new();
    let observer: SharedObserver = Arc::new(recorder.clone());
    let recorded = create_proxy::<dyn Inventory>(Box::new(Warehouse), Some(observer))?;

    recorded.stock("plums".to_string());
    recorded.withdraw("plums".to_string(), 20)?;

    println!("\nRecorded events:\n{}", recorder.to_json()?);

    Ok(())
}
