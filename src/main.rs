use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use churn_pipeline::config::PipelineConfig;
use churn_pipeline::logging;
use churn_pipeline::runner::{SystemRunner, ToolRunner};
use churn_pipeline::stages::{
    FeatureStoreStage, IngestionStage, ModelBuildingStage, PipelineStage, PreparationStage,
    RawStorageStage, TransformationStage, ValidationStage, VersioningStage,
};

#[derive(Parser)]
#[command(name = "churn_pipeline")]
#[command(about = "End-to-end data management pipeline for employee churn prediction")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the pipeline configuration file
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the external dataset into the raw landing area
    Ingest,
    /// Partition landed raw files by source and capture date
    StoreRaw,
    /// Validate the newest raw file and write the data quality report
    Validate,
    /// Clean the newest raw file into the canonical processed table
    Prepare,
    /// Re-encode the cleaned table and load the feature database
    Transform,
    /// Maintain the feature metadata registry
    FeatureStore,
    /// Snapshot raw/processed data into version control and tag a release
    Version,
    /// Train, select, and serialize the churn classifier
    Train,
    /// Run every stage of the pipeline in order
    Run,
}

fn stage_chain(runner: Arc<dyn ToolRunner>) -> Vec<Box<dyn PipelineStage>> {
    vec![
        Box::new(IngestionStage::new(runner.clone())),
        Box::new(RawStorageStage),
        Box::new(ValidationStage),
        Box::new(PreparationStage),
        Box::new(TransformationStage),
        Box::new(FeatureStoreStage),
        Box::new(VersioningStage::new(runner)),
        Box::new(ModelBuildingStage),
    ]
}

fn run_stage(stage: &dyn PipelineStage, config: &PipelineConfig) -> anyhow::Result<()> {
    let span = tracing::info_span!("stage", name = stage.stage_name());
    let _enter = span.enter();

    info!("Starting stage");
    match stage.execute(config) {
        Ok(result) => {
            info!("Stage finished: {}", result.message);
            println!("✅ {}: {}", stage.stage_name(), result.message);
            if result.failed_count > 0 {
                println!("⚠️  {} item(s) failed in this stage", result.failed_count);
            }
            Ok(())
        }
        Err(e) => {
            error!("Stage failed: {}", e);
            println!("❌ {}: {}", stage.stage_name(), e);
            Err(e)
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Load environment variables (Kaggle credentials live here)
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config = PipelineConfig::load_from(&cli.config)?;

    // Initialize logging
    logging::init_logging(&config.logs_root);
    let runner: Arc<dyn ToolRunner> = Arc::new(SystemRunner);

    match cli.command {
        Commands::Ingest => {
            println!("📥 Running ingestion...");
            run_stage(&IngestionStage::new(runner), &config)?;
        }
        Commands::StoreRaw => {
            println!("🗂️  Running raw data storage...");
            run_stage(&RawStorageStage, &config)?;
        }
        Commands::Validate => {
            println!("🛡️ Running data validation...");
            run_stage(&ValidationStage, &config)?;
        }
        Commands::Prepare => {
            println!("🧹 Running data preparation...");
            run_stage(&PreparationStage, &config)?;
        }
        Commands::Transform => {
            println!("⚙️  Running data transformation...");
            run_stage(&TransformationStage, &config)?;
        }
        Commands::FeatureStore => {
            println!("📚 Running feature store maintenance...");
            run_stage(&FeatureStoreStage, &config)?;
        }
        Commands::Version => {
            println!("🏷️  Running data versioning...");
            run_stage(&VersioningStage::new(runner), &config)?;
        }
        Commands::Train => {
            println!("🤖 Running model building...");
            run_stage(&ModelBuildingStage, &config)?;
        }
        Commands::Run => {
            let run_id = Uuid::new_v4();
            println!("🚀 Running full pipeline (run {run_id})...");
            info!("Pipeline run {} started", run_id);

            for stage in stage_chain(runner) {
                run_stage(stage.as_ref(), &config)?;
            }

            info!("Pipeline run {} completed", run_id);
            println!("✅ Full pipeline completed successfully!");
        }
    }
    Ok(())
}
