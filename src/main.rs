use std::io;
use std::sync::Arc;

use dotenvy::dotenv;
use food_orders::application::{OrderPlatform, Ports};
use food_orders::build_server;
use food_orders::config::AppConfig;
use food_orders::domain::ports::MailSender;
use food_orders::infrastructure::mail_relay::MailRelayClient;
use food_orders::infrastructure::memory::{MemoryMailer, MemoryStore};
use food_orders::infrastructure::postgres_ports;
use food_orders::{create_pool, run_migrations};

fn startup_error(e: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e.to_string())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(startup_error)?;

    let mailer: Arc<dyn MailSender> = match &config.mail_relay_url {
        Some(url) => {
            let client = MailRelayClient::new(url, config.mail_relay_timeout).map_err(startup_error)?;
            log::info!("Mail relay at {} is {:?}", url, client.initialize().await);
            Arc::new(client)
        }
        None => {
            log::warn!("MAIL_RELAY_URL not set, emails are captured in memory");
            Arc::new(MemoryMailer::new())
        }
    };

    let ports = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url, config.db_pool_size).map_err(startup_error)?;
            run_migrations(&pool).map_err(startup_error)?;
            postgres_ports(pool, config.feed_poll_interval, mailer)
        }
        None => {
            log::warn!("DATABASE_URL not set, using the in-memory store");
            Ports::in_memory(Arc::new(MemoryStore::new()), mailer)
        }
    };

    let platform = Arc::new(OrderPlatform::start(ports, config.platform_settings()));
    let watches = platform
        .watch_suppliers(config.watch_suppliers.as_deref())
        .await
        .map_err(startup_error)?;
    log::info!("Watching {} supplier(s)", watches.len());

    log::info!("Starting server at http://{}:{}", config.host, config.port);
    let result = build_server(platform, &config.host, config.port)?.await;

    drop(watches);
    result
}
