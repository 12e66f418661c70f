use crate::commands::{
    run_build_index, run_bulk, run_predict, run_wage_compare, BuildIndexArgs, BulkArgs,
    PredictArgs, WageCompareArgs,
};
use crate::server;
use clap::{Args, Parser, Subcommand};
use lca_predictor::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "LCA Approval Predictor",
    about = "Score labor condition applications and compare offered wages from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Score a single application read from a JSON file
    Predict(PredictArgs),
    /// Wage benchmark lookups and index maintenance
    Wage {
        #[command(subcommand)]
        command: WageCommand,
    },
    /// Score every row of a CSV upload and write a results file
    Bulk(BulkArgs),
}

#[derive(Subcommand, Debug)]
enum WageCommand {
    /// Compare an offered wage against the benchmark for an occupation and state
    Compare(WageCompareArgs),
    /// Aggregate a raw disclosure CSV into the benchmark index
    BuildIndex(BuildIndexArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Predict(args) => run_predict(args),
        Command::Wage {
            command: WageCommand::Compare(args),
        } => run_wage_compare(args),
        Command::Wage {
            command: WageCommand::BuildIndex(args),
        } => run_build_index(args),
        Command::Bulk(args) => run_bulk(args),
    }
}
