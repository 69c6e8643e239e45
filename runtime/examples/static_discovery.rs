//! Minimal example — publish two static HTTP endpoints.
//!
//! ```bash
//! cargo run -p majakka-runtime --example static_discovery
//! ```

use majakka_runtime::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    majakka_runtime::run(|mut coordinator| async move {
        coordinator.register(Arc::new(
            StaticBridge::new("static")
                .with_record(Record::http_endpoint("static-record-1", "acme.org", 80, "/"))
                .with_record(Record::http_endpoint("static-record-2", "example.com", 80, "/")),
        ))?;
        Ok(coordinator)
    })
    .await
}
