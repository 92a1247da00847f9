//! Command-line front end for the catalog data-access layer.
//!
//! # Responsibility
//! - Load config, start logging and open the catalog.
//! - Map each subcommand onto exactly one manager operation.
//! - Print results as JSON lines on stdout.
//!
//! Every invocation gets a freshly generated trace id, echoed in logs and
//! in error messages.

use anyhow::{Context, Result};
use catalog_core::manager::{
    AddBuildingQuery, AddCategoryQuery, AddCompanyQuery, GetBuildingsQuery, GetCategoriesQuery,
    GetCompaniesQuery, NewBuilding, NewCategory, NewCompany,
};
use catalog_core::{init_logging, Catalog, Config, Deadline, QueryOutcome, TraceId};
use clap::{Args, Parser, Subcommand};
use log::info;
use serde::Serialize;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "catalog", version, about = "Buildings, companies and categories store")]
struct Cli {
    /// TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Per-command timeout in seconds. 0 disables the timeout.
    #[arg(long, global = true, default_value_t = 30)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a building.
    AddBuilding {
        #[arg(long)]
        address: String,
    },
    /// List buildings.
    Buildings {
        #[arg(long)]
        id: Option<Uuid>,
        /// Case-sensitive substring of the address.
        #[arg(long)]
        address: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Create a category from a dot path such as `food.cafe`.
    AddCategory {
        #[arg(long)]
        name: String,
    },
    /// List categories.
    Categories {
        #[arg(long)]
        id: Option<Uuid>,
        /// Exact path.
        #[arg(long)]
        name: Option<String>,
        /// Path whose subtree (inclusive) to list.
        #[arg(long)]
        under: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Create a company referencing existing categories.
    AddCompany {
        #[arg(long)]
        name: String,
        #[arg(long = "phone")]
        phone_numbers: Vec<String>,
        #[arg(long = "category", required = true)]
        categories: Vec<String>,
    },
    /// List companies.
    Companies {
        #[arg(long)]
        id: Option<Uuid>,
        /// Category path; matches companies in its subtree.
        #[arg(long)]
        category: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Insert configured seed categories when none exist.
    Seed,
}

#[derive(Debug, Args)]
struct PageArgs {
    /// Lower creation bound, unix seconds.
    #[arg(long = "from", allow_negative_numbers = true)]
    from_date: Option<i64>,
    /// Upper creation bound, unix seconds.
    #[arg(long = "to", allow_negative_numbers = true)]
    to_date: Option<i64>,
    /// Page size. Zero, negative or missing means the maximum.
    #[arg(long, allow_negative_numbers = true)]
    limit: Option<i64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("load config `{}`", path.display()))?,
        None => Config::default(),
    };
    init_logging(&config.logger).context("init logging")?;

    let deadline = if cli.timeout == 0 {
        Deadline::none()
    } else {
        Deadline::after(Duration::from_secs(cli.timeout))
    };

    let catalog = Catalog::open(&config).context("open catalog")?;
    let result = run(&catalog, &deadline, cli.command);
    let stopped = catalog
        .stop(&Deadline::after(Duration::from_secs(5)))
        .context("stop catalog");
    result?;
    stopped
}

fn run(catalog: &Catalog, deadline: &Deadline, command: Command) -> Result<()> {
    let trace_id = TraceId::generate();
    info!("event=cli_command module=cli status=start trace_id={trace_id} command={command:?}");

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match command {
        Command::AddBuilding { address } => {
            let query = AddBuildingQuery {
                trace_id,
                payload: NewBuilding { address },
            };
            let building = catalog.buildings().add(deadline, query)?;
            emit(&mut out, &building)?;
        }
        Command::Buildings { id, address, page } => {
            let query = GetBuildingsQuery {
                id,
                address,
                from_date: page.from_date,
                to_date: page.to_date,
                limit: page.limit,
                ..GetBuildingsQuery::new(trace_id)
            };
            let outcome = catalog
                .buildings()
                .get(deadline, &query, |building| emit(&mut out, &building))?;
            report(&outcome);
        }
        Command::AddCategory { name } => {
            let query = AddCategoryQuery {
                trace_id,
                payload: NewCategory { name },
            };
            let category = catalog.categories().add(deadline, query)?;
            emit(&mut out, &category)?;
        }
        Command::Categories {
            id,
            name,
            under,
            page,
        } => {
            let query = GetCategoriesQuery {
                id,
                name,
                under,
                from_date: page.from_date,
                to_date: page.to_date,
                limit: page.limit,
                ..GetCategoriesQuery::new(trace_id)
            };
            let outcome = catalog
                .categories()
                .get(deadline, &query, |category| emit(&mut out, &category))?;
            report(&outcome);
        }
        Command::AddCompany {
            name,
            phone_numbers,
            categories,
        } => {
            let query = AddCompanyQuery {
                trace_id,
                payload: NewCompany {
                    name,
                    phone_numbers,
                    categories,
                },
            };
            let company = catalog.companies().add(deadline, query)?;
            emit(&mut out, &company)?;
        }
        Command::Companies { id, category, page } => {
            let query = GetCompaniesQuery {
                id,
                category,
                from_date: page.from_date,
                to_date: page.to_date,
                limit: page.limit,
                ..GetCompaniesQuery::new(trace_id)
            };
            let outcome = catalog
                .companies()
                .get(deadline, &query, |company| emit(&mut out, &company))?;
            report(&outcome);
        }
        Command::Seed => {
            let inserted = catalog.seed_if_empty(deadline)?;
            emit(&mut out, &serde_json::json!({ "inserted": inserted }))?;
        }
    }

    out.flush()?;
    Ok(())
}

fn emit<T: Serialize>(out: &mut impl Write, item: &T) -> io::Result<()> {
    serde_json::to_writer(&mut *out, item)?;
    out.write_all(b"\n")
}

fn report(outcome: &QueryOutcome) {
    if outcome.has_more {
        eprintln!(
            "warning: output truncated after {} rows; narrow the filters or page by date",
            outcome.delivered
        );
    }
}
