// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result, anyhow, bail};
use config::Config;
use happenings_app::{
    Alert, CalendarExporter, CalendarGate, CatalogEvent, CatalogSession, CatalogSource,
    CatalogState, EventId, Filter, Permission,
};
use happenings_calendar::{CalendarStore, ExportService, PermissionGate};
use happenings_catalog::{Client, DemoCatalog};
use runtime::{CliRuntime, SharedCatalog};
use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `happenings --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;

    let _log_guard = logging::init(&config.log_dir()?, config.log_level(), options.headless())
        .context("initialize logging -- set [log].dir to a writable directory")?;
    info!(
        config = %options.config_path.display(),
        demo = options.demo,
        "starting happenings"
    );

    let platform = config.calendar_platform()?;
    let store = open_calendar(&config, options.demo)?;

    let catalog: SharedCatalog = if options.demo {
        Arc::new(DemoCatalog::new())
    } else {
        let client = build_client(&config, &options.config_path)?;
        if options.check_only {
            client
                .ping()
                .with_context(|| format!("check catalog at {}", client.rest_root()))?;
        }
        Arc::new(client)
    };

    if options.check_only {
        if PermissionGate::new(&store).ensure_authorized() == Permission::Denied {
            warn!("calendar access is denied; exports will fail");
        }
        return Ok(());
    }

    if options.headless() {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let mut session = CatalogSession::new(
            catalog.as_ref(),
            PermissionGate::new(&store),
            ExportService::new(&store, platform),
        );
        return run_headless(&mut session, &options, &mut out);
    }

    let mut state = CatalogState::with_filter(options.filter);
    let mut runtime = CliRuntime::new(catalog, &store, platform);
    happenings_tui::run_app(&mut state, &mut runtime)
}

fn open_calendar(config: &Config, demo: bool) -> Result<CalendarStore> {
    let store = if demo {
        CalendarStore::open_memory()?
    } else {
        let db_path = config.calendar_db_path()?;
        CalendarStore::open(&db_path).with_context(|| {
            format!(
                "open calendar {} -- if this path is wrong, set [calendar].db_path or HAPPENINGS_CALENDAR_PATH",
                db_path.display()
            )
        })?
    };
    let store = store.with_access(config.allow_calendar_access());
    store.bootstrap()?;
    Ok(store)
}

fn build_client(config: &Config, config_path: &Path) -> Result<Client> {
    let base_url = config.catalog_base_url().ok_or_else(|| {
        anyhow!(
            "[catalog].base_url is not set in {}; add it or run with --demo",
            config_path.display()
        )
    })?;
    let api_key = config.catalog_api_key().ok_or_else(|| {
        anyhow!(
            "no catalog API key; set [catalog].api_key in {} or HAPPENINGS_API_KEY",
            config_path.display()
        )
    })?;
    Client::new(
        base_url,
        &api_key,
        config.catalog_table(),
        config.catalog_timeout()?,
    )
    .with_context(|| {
        format!(
            "invalid [catalog] config in {}; fix base_url/table/timeout values",
            config_path.display()
        )
    })
}

/// Mounts the session without the terminal, then lists the catalog or exports one event.
/// A failed catalog query lists as empty, the same as in the terminal view.
fn run_headless<S, G, E, W>(
    session: &mut CatalogSession<S, G, E>,
    options: &CliOptions,
    out: &mut W,
) -> Result<()>
where
    S: CatalogSource,
    G: CalendarGate,
    E: CalendarExporter,
    W: Write,
{
    session.mount();
    if options.filter != session.state().filter {
        session.select_filter(options.filter);
    }
    if session.state().current_alert() == Some(&Alert::CalendarPermissionDenied) {
        writeln!(out, "warning: {}", Alert::CalendarPermissionDenied.title())?;
    }

    let Some(event_id) = &options.export_id else {
        write_listing(session.state(), out)?;
        return Ok(());
    };

    let events = session.export(event_id);
    if session.state().is_saved(event_id) {
        writeln!(out, "{event_id}: {}", session.state().calendar_label(event_id))?;
        return Ok(());
    }
    for event in events {
        if let CatalogEvent::AlertRaised(alert @ Alert::ExportFailed { .. }) = event {
            bail!("{}: {}", alert.title(), alert.body());
        }
    }
    bail!(
        "event {event_id} is not in the {} catalog; run `happenings --list` to see event ids",
        options.filter.label()
    )
}

fn write_listing<W: Write>(state: &CatalogState, out: &mut W) -> Result<()> {
    if state.events.is_empty() {
        writeln!(out, "no {} events", state.filter.label())?;
        return Ok(());
    }
    for event in &state.events {
        writeln!(
            out,
            "{}\t{} {}\t{}\t{}\t{}",
            event.id,
            event.category.glyph(),
            event.category.as_str(),
            event.start_date.as_str(),
            event.name,
            event.location,
        )?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    demo: bool,
    check_only: bool,
    list: bool,
    filter: Filter,
    export_id: Option<EventId>,
    show_help: bool,
}

impl CliOptions {
    fn headless(&self) -> bool {
        self.list || self.check_only || self.export_id.is_some()
    }
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_example: false,
        demo: false,
        check_only: false,
        list: false,
        filter: Filter::All,
        export_id: None,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--list" => {
                options.list = true;
            }
            "--filter" => {
                let value = iter.next().ok_or_else(filter_choices_error)?;
                options.filter = Filter::parse(value.as_ref()).ok_or_else(filter_choices_error)?;
            }
            "--export" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--export requires an event id"))?;
                let value = value.as_ref().trim();
                if value.is_empty() {
                    bail!("--export requires an event id");
                }
                options.export_id = Some(EventId::from(value));
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    if options.list && options.export_id.is_some() {
        bail!("--list and --export cannot be combined");
    }

    Ok(options)
}

fn filter_choices_error() -> anyhow::Error {
    let choices: Vec<&str> = Filter::ALL.iter().map(|filter| filter.label()).collect();
    anyhow!("--filter requires one of: {}", choices.join(", "))
}

fn print_help() {
    println!("happenings");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --demo                   Use the built-in demo catalog and an in-memory calendar");
    println!("  --check                  Validate config, calendar and catalog reachability");
    println!("  --list                   Print the catalog and exit");
    println!("  --filter <name>          Start on All, Food, Music, Sports or Gaming");
    println!("  --export <event-id>      Save one event to the calendar and exit");
    println!("  --help                   Show this help");
}
