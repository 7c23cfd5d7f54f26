//! Send a text message through the configured default instance.
//!
//! ```sh
//! cargo run --example send_text -- evogate.yaml 5511999999999 "Hello from evogate"
//! ```

use evogate::{Config, Gateway, SendText};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| "evogate.yaml".to_string());
    let target = args.next().expect("usage: send_text <config> <target> <message>");
    let message = args.next().expect("usage: send_text <config> <target> <message>");

    let config = Config::load(&config_path).await?;
    let gateway = Gateway::new(&config)?;

    let result = gateway.send_text(SendText::new(target, message)).await?;
    if result.success {
        println!(
            "accepted, message id: {}",
            result.message_id.as_deref().unwrap_or("(none)")
        );
    } else {
        println!(
            "gateway refused: {:?} {}",
            result.error_kind,
            result.detail.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
