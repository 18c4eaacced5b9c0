mod aggregator;
mod cli;
mod db;
mod error;
mod fmt;
mod models;
mod platforms;
mod reports;
mod settings;
mod store;
mod workbook;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ReportCommands};

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("MARKETBOOK_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> error::Result<()> {
    let tenant = cli.tenant.as_deref();
    match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir, cli.tenant.clone()),
        Commands::Import {
            files,
            assign,
            store,
            account,
            platform,
            dry_run,
        } => cli::import::run(
            cli::import::ImportArgs {
                files,
                assign,
                store,
                account,
                platform,
                dry_run,
            },
            tenant,
        ),
        Commands::Report { command } => {
            let tenant = settings::resolve_tenant(tenant)?;
            match command {
                ReportCommands::Total { from_date, to_date } => cli::report::total(&tenant, &from_date, &to_date),
                ReportCommands::Stores {
                    from_date,
                    to_date,
                    stores,
                } => cli::report::stores(&tenant, &from_date, &to_date, &stores),
                ReportCommands::Monthly { month, compare } => {
                    cli::report::monthly(&tenant, &month, compare.as_deref())
                }
                ReportCommands::Daily { date } => cli::report::daily(&tenant, date.as_deref()),
                ReportCommands::Today { date } => cli::report::today_vs_last_month(&tenant, date.as_deref()),
                ReportCommands::Quarterly { year, quarter } => cli::report::quarterly(&tenant, year, quarter),
                ReportCommands::Yearly { year } => cli::report::yearly(&tenant, year),
                ReportCommands::Income { store, desc } => cli::report::income(&tenant, store.as_deref(), desc),
                ReportCommands::Range => cli::report::range(&tenant),
            }
        }
        Commands::Export {
            output,
            store,
            from_date,
            to_date,
        } => cli::export::run(
            cli::export::ExportArgs {
                output,
                store,
                from_date,
                to_date,
            },
            &settings::resolve_tenant(tenant)?,
        ),
        Commands::Status => cli::status::run(tenant),
        Commands::History { limit } => cli::history::run(&settings::resolve_tenant(tenant)?, limit),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
