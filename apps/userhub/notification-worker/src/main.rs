//! Notification Worker - Entry Point
//!
//! Background worker that turns user lifecycle events into emails.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    core_config::tracing::install_color_eyre();
    userhub_notification_worker::run().await
}
