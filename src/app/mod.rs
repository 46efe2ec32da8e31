mod controller;
mod reconcile;
mod report;


use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate, Utc};

use crate::catalog::{CatalogFetcher, TvMazeClient};
use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::store;

use self::controller::{CycleReport, Mutation, RowStatus, TrackerController};
use self::report::{plain_text, render_report, truncate};

pub fn run(cli: Cli) -> Result<()> {
    let config = Config::from_cli(&cli)?;
    let client = TvMazeClient::new(&config.api_base, config.timeouts);
    let controller = TrackerController::new(config.store_path.clone(), client, config.concurrency);

    let today = local_today();
    match cli.command {
        Some(Command::Init) => run_init(&config)?,
        Some(Command::Search { name }) => run_search(controller.fetcher(), &name)?,
        Some(Command::Watch { show_id, episode }) => run_mutation(
            &controller,
            Mutation::UpdateWatched {
                show_id,
                episode_code: episode,
            },
            today,
        )?,
        Some(Command::Next { show_id }) => run_next(&controller, show_id, today)?,
        Some(Command::Add { show_id }) => {
            run_mutation(&controller, Mutation::AddShow { show_id }, today)?
        }
        Some(Command::Delete { show_id }) => {
            run_mutation(&controller, Mutation::DeleteShow { show_id }, today)?
        }
        Some(Command::List) | None => run_list(&controller, today)?,
    }

    Ok(())
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

fn run_init(config: &Config) -> Result<()> {
    store::init(&config.store_path)
        .with_context(|| format!("failed to initialise {}", config.store_path.display()))?;
    println!("Created {}", config.store_path.display());
    println!("Add a show with `showtrack add <TVMID>` (find IDs with `showtrack search <name>`).");
    Ok(())
}

fn run_search(fetcher: &impl CatalogFetcher, name: &str) -> Result<()> {
    let show = fetcher
        .search(name)
        .with_context(|| format!("catalog search for {name:?} failed"))?;
    println!("{:<8} {:<40} {:<12}", "ID", "NAME", "STATUS");
    println!("{:<8} {:<40} {:<12}", show.id, show.name, show.status);
    Ok(())
}

fn run_list<F: CatalogFetcher>(controller: &TrackerController<F>, today: NaiveDate) -> Result<()> {
    let report = controller.run_cycle(None, today, Utc::now())?;
    print_report(&report);
    Ok(())
}

fn run_mutation<F: CatalogFetcher>(
    controller: &TrackerController<F>,
    mutation: Mutation,
    today: NaiveDate,
) -> Result<()> {
    let report = controller
        .run_cycle(Some(&mutation), today, Utc::now())
        .context("store not modified")?;
    match &mutation {
        Mutation::UpdateWatched {
            show_id,
            episode_code,
        } => println!("Updated show {show_id}: last watched {episode_code}"),
        Mutation::AddShow { show_id } => println!("Added show {show_id}"),
        // Deletion always fails in run_cycle.
        Mutation::DeleteShow { .. } => {}
    }
    if let Some(backup) = &report.backup {
        println!("Previous version saved as {}", backup.display());
    }
    println!();
    print_report(&report);
    Ok(())
}

fn run_next<F: CatalogFetcher>(
    controller: &TrackerController<F>,
    show_id: u32,
    today: NaiveDate,
) -> Result<()> {
    let row = controller.reconcile_show(show_id, today)?;
    let episode_code = match row.status {
        RowStatus::Done => bail!("show {show_id} is marked DONE"),
        RowStatus::Unavailable { error } => {
            return Err(error).with_context(|| format!("cannot resolve next episode of {show_id}"));
        }
        RowStatus::Reconciled { catalog, result } => match result.next_episode_code {
            Some(code) => {
                if let Some(episode) = catalog.episode_by_code(&code) {
                    println!("{} {code}: {}", catalog.name, episode.title);
                    let summary = plain_text(&episode.summary);
                    if !summary.is_empty() {
                        println!("  {}", truncate(&summary, 200));
                    }
                }
                code
            }
            None => bail!("show {show_id} has no aired episode after {}", row.record.last_watched),
        },
    };
    run_mutation(
        controller,
        Mutation::UpdateWatched {
            show_id,
            episode_code,
        },
        today,
    )
}

fn print_report(report: &CycleReport) {
    if report.rows.is_empty() {
        println!("No tracked shows yet. Run `showtrack add <TVMID>` first.");
        return;
    }
    print!("{}", render_report(report));
}
