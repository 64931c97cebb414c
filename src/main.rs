use clap::Parser;
use rankings_processor::{
    args::Args,
    database::db::DbClient,
    engine::orchestrator::Orchestrator,
    messaging::{RabbitMqConfig, RabbitMqPublisher}
};
use tracing::{error, info, warn};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_tracing(&args.log_level);

    let client = DbClient::connect(args.connection_string.as_str())
        .await
        .expect("Expected valid database connection");

    let publisher = if args.no_publish {
        None
    } else {
        connect_publisher().await
    };

    let mut orchestrator = Orchestrator::new(client, publisher);
    orchestrator.start().await.expect("Failed to load working set");

    let outcome = run(&mut orchestrator, &args).await;

    orchestrator.stop().await;

    if let Err(e) = outcome {
        error!("Processing failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(
    orchestrator: &mut Orchestrator,
    args: &Args
) -> Result<(), rankings_processor::engine::orchestrator::OrchestratorError> {
    if let Some(tournament_id) = args.tournament_id {
        info!("Reprocessing tournament {}", tournament_id);
        return orchestrator.reprocess_tournament(tournament_id).await;
    }

    if args.decay_only {
        orchestrator.run_decay_sweep().await?;
        return Ok(());
    }

    if args.recalculate_only {
        orchestrator.run_full_recalculation().await?;
        return Ok(());
    }

    orchestrator.run_tournament_sweep().await?;
    Ok(())
}

fn init_tracing(log_level: &str) {
    let indicatif_layer = IndicatifLayer::new();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stderr_writer()))
        .with(indicatif_layer)
        .init();
}

async fn connect_publisher() -> Option<RabbitMqPublisher> {
    let config = match RabbitMqConfig::from_env() {
        Ok(config) => config,
        Err(_) => {
            warn!("RabbitMQ credentials not configured, event publishing disabled");
            return None;
        }
    };

    match RabbitMqPublisher::connect_from_config(&config).await {
        Ok(publisher) => Some(publisher),
        Err(e) => {
            warn!("Could not connect to RabbitMQ, event publishing disabled: {}", e);
            None
        }
    }
}
