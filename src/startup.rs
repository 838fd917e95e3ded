use std::net::TcpListener;

use actix_web::dev::Server;
use actix_web::web;
use actix_web::App;
use actix_web::HttpServer;
use tracing_actix_web::TracingLogger;

use crate::configuration::Settings;
use crate::email_service::EmailService;
use crate::rate_limit::RateLimiter;
use crate::routes::health_check;
use crate::routes::join_waitlist;
use crate::routes::method_not_allowed;

/// Wrapper for actix's `Server` with access to the bound port. Not to be
/// confused with actix's `App`!
pub struct Application {
    /// Left private; use `get_port` to access
    port: u16,
    server: Server,
}

impl Application {
    /// Bind the listener and build the email service and rate limiter from
    /// `cfg`. Fails (and the server never starts) if the email service is
    /// misconfigured.
    pub async fn build(cfg: Settings) -> Result<Self, anyhow::Error> {
        let addr = format!("{}:{}", cfg.application.host, cfg.application.port);
        let listener = TcpListener::bind(addr)?;

        // port 0 lets the OS pick; record what it picked
        let port = listener.local_addr()?.port();

        let email_service = EmailService::from_settings(&cfg.email_service)?;
        tracing::info!(
            provider = email_service.name(),
            "email service configured"
        );
        let rate_limiter = RateLimiter::from_settings(&cfg.rate_limit);

        let server = run(listener, email_service, rate_limiter)?;

        Ok(Self { port, server })
    }

    pub fn get_port(&self) -> u16 { self.port }

    /// Because this consumes `self`, this should be the final function call (or
    /// passed to `tokio::spawn`)
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> { self.server.await }
}

/// The server is not responsible for binding to an address, it only listens to
/// an already bound address.
///
/// Declares all API endpoints.
pub fn run(
    listener: TcpListener,
    email_service: EmailService,
    rate_limiter: RateLimiter,
) -> Result<Server, anyhow::Error> {
    // `Data` is an `Arc`; every worker gets a clone pointing at the same email
    // service (and its connection pool) and the same rate limit map. the map
    // must be shared, otherwise each worker would allow 5 requests per client
    let email_service = web::Data::new(email_service);
    let rate_limiter = web::Data::new(rate_limiter);

    // the closure is run once per worker (one per core)
    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::resource("/api/waitlist")
                    .route(web::post().to(join_waitlist))
                    // GET, PUT, DELETE etc get a json 405 rather than actix's
                    // empty one
                    .default_service(web::to(method_not_allowed)),
            )
            .app_data(email_service.clone())
            .app_data(rate_limiter.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
