use clap::{Parser, Subcommand};
use retail_bronze::config::{Config, DEFAULT_CONFIG_PATH};
use retail_bronze::extract::CsvSourceReader;
use retail_bronze::store::{FsTableStore, TableStore};
use retail_bronze::{logging, metrics, BronzePipeline};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "retail-bronze")]
#[command(about = "Load the raw retail extract into the bronze tables")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the job configuration
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace products, sales and return_reasons from the configured extract
    Run,
    /// Show the published snapshot of each bronze table
    Describe,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    logging::init_logging(&config.log_dir);
    if let Some(addr) = config.metrics_addr {
        metrics::init_metrics(addr);
    }

    let store: Arc<dyn TableStore> = Arc::new(FsTableStore::new(&config.warehouse_dir));
    let pipeline = BronzePipeline::new(config, Arc::new(CsvSourceReader::new()), store.clone());

    match cli.command {
        Commands::Run => match pipeline.run().await {
            Ok(report) => {
                println!("{}", report.confirmation());
                for receipt in &report.receipts {
                    println!(
                        "   {} → version {} ({} rows)",
                        receipt.table, receipt.version, receipt.rows_written
                    );
                }
            }
            Err(e) => {
                error!("Bronze run failed: {}", e);
                return Err(e.into());
            }
        },
        Commands::Describe => {
            for table in pipeline.tables() {
                match store.scan(&table).await? {
                    Some(snapshot) => {
                        info!("Described {}", table);
                        println!(
                            "{}: version {}, {} rows, partitioned by {} [{}]",
                            table,
                            snapshot.version,
                            snapshot.rows.len(),
                            snapshot.partition_column,
                            snapshot.partitions.join(", ")
                        );
                    }
                    None => println!("{}: not written yet", table),
                }
            }
        }
    }

    Ok(())
}
