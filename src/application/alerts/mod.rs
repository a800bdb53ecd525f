pub mod bus;
pub mod generator;

pub use bus::{AlertBus, AlertFilter, BusMessage, Subscription};
pub use generator::{AlertGenerator, AlertGeneratorConfig};

use crate::domain::signal::InstrumentSignal;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Single alert producer: diffs store writes and feeds the bus.
///
/// The generator sits behind a mutex so alerts for one symbol keep the order
/// of their source snapshot writes.
pub struct AlertService {
    generator: Mutex<AlertGenerator>,
    bus: Arc<AlertBus>,
}

impl AlertService {
    pub fn new(config: AlertGeneratorConfig, bus: Arc<AlertBus>) -> Self {
        Self {
            generator: Mutex::new(AlertGenerator::new(config)),
            bus,
        }
    }

    pub async fn on_store_write(
        &self,
        previous: Option<&InstrumentSignal>,
        current: &InstrumentSignal,
    ) {
        let alerts = self.generator.lock().await.diff(previous, current);
        for alert in alerts {
            self.bus.publish(alert).await;
        }
    }

    /// Publishes an alert produced outside the snapshot diff (price watches).
    pub async fn publish(&self, alert: crate::domain::alert::Alert) {
        self.bus.publish(alert).await;
    }

    pub fn bus(&self) -> Arc<AlertBus> {
        Arc::clone(&self.bus)
    }
}
