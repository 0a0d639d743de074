//! Mutuals - mutual-follow exchange engine

use clap::Parser;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mutuals::{
    config::{Args, Command},
    db::MongoClient,
    graph::{GithubGraphClient, GraphClientConfig},
    logging::ActivityLogger,
    member::{Amount, Credential},
    store::MongoMemberStore,
    Exchange, ExchangeError,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("mutuals={},info", log_level).into()),
        )
        .with(args.log_json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!args.log_json).then(|| tracing_subscriber::fmt::layer()))
        .init();

    if let Err(e) = args.validate() {
        error!("{}", ExchangeError::Config(e));
        std::process::exit(1);
    }

    info!("Host: {}", args.host_id);
    info!("MongoDB: {} / {}", args.mongodb_uri, args.mongodb_db);
    info!("Graph API: {}", args.graph.graph_api_url);

    let mongo = MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await?;
    let store = Arc::new(MongoMemberStore::new(&mongo).await?);
    info!("Member store ready in database '{}'", mongo.db_name());

    let graph = Arc::new(GithubGraphClient::new(GraphClientConfig {
        base_url: args.graph.graph_api_url.clone(),
        user_agent: args.graph.graph_user_agent.clone(),
        timeout_ms: args.graph.request_timeout_ms,
    })?);

    let mut exchange = Exchange::new(store, graph, args.engine_config());

    if let Some(path) = args.activity_log.clone() {
        let logger = ActivityLogger::new(args.host_id.to_string());
        logger.init_file(path).await?;
        exchange = exchange.with_activity_logger(logger);
    }

    match args.command {
        Command::Summary { identity } => print_json(&exchange.summarize(&identity).await?)?,
        Command::Acquire {
            identity,
            amount,
            all,
            entitled,
        } => {
            let result = if entitled {
                exchange.acquire_entitled(&identity).await?
            } else {
                let amount = match (amount, all) {
                    (Some(n), _) => Amount::Limited(n),
                    (None, true) => Amount::All,
                    (None, false) => {
                        error!("acquire needs an amount: pass --amount N, --all or --entitled");
                        std::process::exit(2);
                    }
                };
                exchange.acquire(&identity, amount).await?
            };
            print_json(&result)?
        }
        Command::Release { identity } => print_json(&exchange.release_all(&identity).await?)?,
        Command::Register { token, referred_by } => {
            let registration = exchange
                .register(Credential::new(token), referred_by.as_deref())
                .await?;
            print_json(&registration)?
        }
        Command::Validate { identity } => {
            let valid = exchange.validate(&identity).await?;
            print_json(&serde_json::json!({ "identity": identity, "valid": valid }))?
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
