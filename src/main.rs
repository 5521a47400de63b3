use dotenv::dotenv;
use tracing_subscriber::EnvFilter;

use gaganyatra::config::AppConfig;
use gaganyatra::db::Store;

#[rocket::main]
async fn main() -> Result<(), rocket::Error> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env();
    let store = Store::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");
    store.migrate().await.expect("Failed to run migrations");

    gaganyatra::build_rocket(store, config).launch().await?;
    Ok(())
}
