//! Power-user example — a hand-written bridge, custom port and timeouts.
//!
//! ```bash
//! MAJAKKA_BRIDGE_CONFIG=bridges.json cargo run -p majakka-runtime --example custom_bridge
//! ```
//!
//! with `bridges.json`:
//!
//! ```json
//! {"grpc-fleet": {"hosts": ["10.0.0.1", "10.0.0.2"], "port": 50051}}
//! ```

use async_trait::async_trait;
use majakka_runtime::prelude::*;
use std::time::Duration;

/// Publishes one gRPC record per configured host
struct GrpcFleetBridge;

#[async_trait]
impl Bridge for GrpcFleetBridge {
    fn name(&self) -> &str {
        "grpc-fleet"
    }

    async fn start(
        &self,
        discovery: &dyn ServiceDiscovery,
        config: BridgeConfig,
    ) -> Result<(), BridgeError> {
        let hosts: Vec<String> = config.get_as("hosts")?.unwrap_or_default();
        let port = config
            .get_u64("port")
            .and_then(|p| u16::try_from(p).ok())
            .unwrap_or(50051);

        for (i, host) in hosts.into_iter().enumerate() {
            let location = GrpcLocation {
                host: Some(host),
                port,
                ..Default::default()
            };
            let record = Record::new(format!("fleet-{i}"))
                .with_kind(GrpcLocation::TYPE)
                .with_location(location.to_json());
            discovery.publish(record).await?;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    RuntimeBuilder::new()
        .metrics_port(9091)
        .start_timeout(Some(Duration::from_secs(5)))
        .stop_timeout(Some(Duration::from_secs(2)))
        .configure(|mut coordinator| async move {
            coordinator.register(Arc::new(GrpcFleetBridge))?;
            Ok(coordinator)
        })
        .await
}
