use waitlist::configuration::get_configuration;
use waitlist::startup::Application;
use waitlist::telemetry::get_subscriber;
use waitlist::telemetry::init_subscriber;

/// Initialise telemetry, load config, and start the server
#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let subscriber = get_subscriber("waitlist", "info", std::io::stdout);
    init_subscriber(subscriber)?;

    // a signup looks like:
    // {"v":0,"name":"waitlist","msg":"waitlist signup","level":30,...,"email":"john@foo.com","source":"hero","client_id":"203.0.113.7","timestamp":"2025-01-01T00:00:00+00:00"}

    let cfg = get_configuration()?;
    let app = Application::build(cfg).await?;
    tracing::info!("listening on port {}", app.get_port());
    app.run_until_stopped().await?;
    Ok(())
}
