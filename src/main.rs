use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;

use adserve_backend::adapters::{PostgresCatalog, RedisKv};
use adserve_backend::config::settings::Settings;
use adserve_backend::middleware::{Metrics, PathLogger, RateLimit};
use adserve_backend::ports::{CatalogPort, KvPort};
use adserve_backend::routes::{ads_limited_scope, ads_unlimited_scope, health_scope};
use adserve_backend::utils::clock::{Clock, SystemClock};
use adserve_backend::utils::random::{SuffixGen, ThreadRngSuffix};

const REDIS_HEALTH_PROBE_INTERVAL: Duration = Duration::from_secs(5);
const PG_HEALTH_PROBE_INTERVAL: Duration = Duration::from_secs(5);

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_logging();
    log::info!("starting ad-serving backend…");

    let settings = Settings::new().unwrap_or_else(|e| {
        eprintln!("failed to load settings: {e}");
        std::process::exit(1);
    });

    let port = settings.server_port;

    let pg_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.database_url)
        .await
        .unwrap_or_else(|e| {
            eprintln!("failed to connect to postgres: {e}");
            std::process::exit(1);
        });

    let redis_kv = RedisKv::connect(&settings.redis_url)
        .await
        .unwrap_or_else(|e| {
            eprintln!("failed to connect to redis: {e}");
            std::process::exit(1);
        });
    redis_kv.spawn_health_probe(REDIS_HEALTH_PROBE_INTERVAL);

    let postgres_catalog = PostgresCatalog::new(pg_pool);
    postgres_catalog.spawn_health_probe(PG_HEALTH_PROBE_INTERVAL);
    let catalog: Arc<dyn CatalogPort> = Arc::new(postgres_catalog);
    let kv: Arc<dyn KvPort> = Arc::new(redis_kv);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let suffix_gen: Arc<dyn SuffixGen> = Arc::new(ThreadRngSuffix);
    let settings = Arc::new(settings);

    let rate_limit = RateLimit::new(kv.clone(), clock.clone(), suffix_gen.clone(), settings.clone());

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(PathLogger)
            .wrap(Metrics)
            .app_data(web::Data::new(catalog.clone()))
            .app_data(web::Data::new(kv.clone()))
            .app_data(web::Data::new(clock.clone()))
            .app_data(web::Data::new(suffix_gen.clone()))
            .app_data(web::Data::new((*settings).clone()))
            .service(health_scope())
            .service(ads_limited_scope(rate_limit.clone()))
            .service(ads_unlimited_scope())
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
