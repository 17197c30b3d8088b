use std::error::Error;
use std::io::Write;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use log::{error, info};

use flowlens::configuration::ConfigOverrides;
use flowlens::explorer::FlowExplorer;
use flowlens::export::{export, ExportFormat};
use flowlens::filtering::{narrow, AggregateFilterParams, LogFilterParams, TimeRange};
use flowlens::store;
use flowlens::table::{parse_columns, AggregateColumn, LogColumn, Tabular};
use flowlens::web_interface::WebServer;

#[derive(Parser, Debug)]
#[command(name = "flowlens")]
#[command(version)]
#[command(about = "Explore firewall flow logs held in a search store")]
struct Cli {
    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP API
    Serve {
        /// Port to listen on, overriding [web] port
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
        port: Option<u16>,
    },
    /// Print one summary row per source address
    Aggregate {
        /// Window start (RFC 3339, YYYY-MM-DDTHH:MM or YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,
        /// Window end, inclusive
        #[arg(long)]
        end: Option<String>,
        #[command(flatten)]
        filters: AggregateFilterParams,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Print every record of one source address
    Source {
        ip: String,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Scan a bounded number of records and filter them
    Scan {
        /// Records to fetch; defaults to [retrieval] default_scan_records
        #[arg(long)]
        max: Option<usize>,
        #[command(flatten)]
        filters: LogFilterParams,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// csv or ndjson
    #[arg(long, default_value = "csv")]
    format: ExportFormat,
    /// Comma-separated column names
    #[arg(long)]
    columns: Option<String>,
}

fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut config = cli.overrides.resolve()?;
    if let Command::Serve { port: Some(port) } = &cli.command {
        config.web.port = *port;
    }

    let store = store::from_config(&config.store)?;
    let explorer = Arc::new(FlowExplorer::new(store, &config)?);

    match cli.command {
        Command::Serve { .. } => {
            let addr = config.bind_addr()?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(WebServer::new(explorer).start(addr))?;
        }
        Command::Aggregate {
            start,
            end,
            filters,
            output,
        } => {
            let range = TimeRange::from_bounds(start.as_deref(), end.as_deref())?;
            let filter = filters.to_filter()?;
            let columns = parse_columns(output.columns.as_deref(), &AggregateColumn::all())?;
            let rows = narrow(explorer.aggregates(range.as_ref()).into_result()?, &filter);
            info!("{} sources", rows.len());
            print_table(output.format, &rows, &columns)?;
        }
        Command::Source { ip, output } => {
            let columns = parse_columns(output.columns.as_deref(), &LogColumn::DEFAULT)?;
            let records = explorer.source_logs(&ip).into_result()?;
            info!("{} records from {}", records.len(), ip);
            print_table(output.format, &records, &columns)?;
        }
        Command::Scan { max, filters, output } => {
            let spec = filters.to_spec()?;
            let columns = parse_columns(output.columns.as_deref(), &LogColumn::DEFAULT)?;
            let scanned = explorer.scan(max).into_result()?;
            let total = scanned.len();
            let records = narrow(scanned, &spec);
            info!("{} of {} scanned records match", records.len(), total);
            print_table(output.format, &records, &columns)?;
        }
    }
    Ok(())
}

fn print_table<R: Tabular>(format: ExportFormat, rows: &[R], columns: &[R::Column]) -> Result<(), Box<dyn Error>> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    export(format, &mut out, rows, columns)?;
    out.flush()?;
    Ok(())
}
