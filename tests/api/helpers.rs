use once_cell::sync::Lazy;
use serde_json::Value;
use waitlist::configuration::get_configuration;
use waitlist::configuration::EmailServiceKind;
use waitlist::startup::Application;
use waitlist::telemetry::get_subscriber;
use waitlist::telemetry::init_subscriber;
use wiremock::MockServer;

/// Init the subscriber once for the whole test binary.
///
/// To opt in to verbose logging, use the env var `TEST_LOG`:
///
/// ```sh
///      TEST_LOG=true cargo test [test_name] | bunyan
/// ```
static TRACING: Lazy<()> = Lazy::new(|| {
    // the two sinks are different closure types, hence the match arms
    match std::env::var("TEST_LOG") {
        Ok(_) => {
            let subscriber = get_subscriber("test", "debug", std::io::stdout);
            init_subscriber(subscriber).unwrap();
        }
        Err(_) => {
            let subscriber = get_subscriber("test", "debug", std::io::sink);
            init_subscriber(subscriber).unwrap();
        }
    };
});

pub struct TestApp {
    /// `http://localhost:{port}`
    pub addr: String,
    /// Stands in for Mailchimp/ConvertKit
    pub email_server: MockServer,
}

impl TestApp {
    /// `POST /api/waitlist` with a raw body, as if sent from `ip`
    pub async fn post_waitlist(
        &self,
        body: impl Into<String>,
        ip: &str,
    ) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("{}/api/waitlist", self.addr))
            .header("Content-Type", "application/json")
            .header("X-Forwarded-For", ip)
            .body(body.into())
            .send()
            .await
            .expect("execute request")
    }

    pub async fn post_email(
        &self,
        email: &str,
        ip: &str,
    ) -> reqwest::Response {
        let body = serde_json::json!({ "email": email, "source": "hero" });
        self.post_waitlist(body.to_string(), ip).await
    }
}

/// Parse a response body as json, panicking with the raw text if it isn't
pub async fn json_body(resp: reqwest::Response) -> Value {
    let text = resp.text().await.unwrap();
    serde_json::from_str(&text).unwrap_or_else(|_| panic!("not json: {text}"))
}

/// Spawn the server with the Mailchimp adapter pointed at a mock server
pub async fn spawn_app() -> TestApp { spawn_app_with(EmailServiceKind::Mailchimp, 10_000).await }

pub async fn spawn_app_with(
    provider: EmailServiceKind,
    timeout_milliseconds: u64,
) -> TestApp {
    Lazy::force(&TRACING);

    let email_server = MockServer::start().await;

    let cfg = {
        let mut cfg = get_configuration().unwrap();
        // port 0: the OS picks a free port, retrieved below via `get_port`
        cfg.application.port = 0;
        cfg.email_service.provider = provider;
        cfg.email_service.base_url = Some(email_server.uri());
        cfg.email_service.timeout_milliseconds = timeout_milliseconds;
        cfg
    };

    let app = Application::build(cfg).await.unwrap();
    let port = app.get_port();
    let addr = format!("http://localhost:{port}");
    tokio::spawn(app.run_until_stopped());

    TestApp {
        addr,
        email_server,
    }
}
