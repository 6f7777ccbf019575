use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use vert_unit::engine::monitor::STATUS_ATTR;
use vert_unit::engine::VertEngine;
use vert_unit::net::fetch::HttpScriptLoader;
use vert_unit::net::loader::{ScriptLoader, ScriptRequest, StaticScriptLoader};
use vert_unit::page::Page;
use vert_unit::{VertError, VertOptions};

/// How the simulated primary network behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Outcome {
    Filled,
    Unfilled,
    Silent,
    LoadError,
}

#[derive(Parser)]
#[command(author, version, about = "Attach ad placements on an HTML page and report how each settles")]
struct Cli {
    /// HTML page to host the placements
    page: PathBuf,
    /// URL the page is served from
    #[arg(long, default_value = "http://localhost:4000/")]
    url: String,
    /// What the primary network reports for every slot
    #[arg(long, value_enum, default_value_t = Outcome::Unfilled)]
    outcome: Outcome,
    /// Fetch the network script over HTTP instead of simulating it
    #[arg(long)]
    fetch: bool,
}

/// Either the real HTTP loader or a scripted one.
enum SimLoader {
    Http(HttpScriptLoader),
    Static(StaticScriptLoader),
}

impl ScriptLoader for SimLoader {
    fn load(&mut self, request: &ScriptRequest) -> Result<(), VertError> {
        match self {
            SimLoader::Http(l) => l.load(request),
            SimLoader::Static(l) => l.load(request),
        }
    }
}

fn run(args: Cli) -> Result<(), String> {
    let html = std::fs::read_to_string(&args.page)
        .map_err(|e| format!("cannot read {}: {}", args.page.display(), e))?;
    let mut page = Page::from_html(&html, &args.url).map_err(|e| e.to_string())?;

    let loader = if args.fetch {
        SimLoader::Http(HttpScriptLoader::new().map_err(|e| e.to_string())?)
    } else if args.outcome == Outcome::LoadError {
        SimLoader::Static(StaticScriptLoader::failing("simulated load error"))
    } else {
        SimLoader::Static(StaticScriptLoader::succeeding())
    };

    let mut engine = VertEngine::new(VertOptions::from_env(), loader);
    for result in engine.attach_all(&mut page) {
        if let Err(e) = result {
            eprintln!("skipped placement: {}", e);
        }
    }

    // The network answers a little after the first poll would have run.
    engine.advance(&mut page, 50);
    let marker = match args.outcome {
        Outcome::Filled => Some("filled"),
        Outcome::Unfilled => Some("unfilled"),
        Outcome::Silent | Outcome::LoadError => None,
    };
    if let Some(marker) = marker {
        for p in engine.placements() {
            if let Some(ins) = page.document.query_tag_class(p.node, "ins", "adsbygoogle") {
                page.document.set_attribute(ins, STATUS_ATTR, marker);
            }
        }
    }
    engine.run_until_idle(&mut page);

    println!(
        "{} placement(s) at t={}ms{}",
        engine.placements().len(),
        page.timers.now_ms(),
        if engine.all_settled() { "" } else { " (some unsettled)" }
    );
    for p in engine.placements() {
        println!(
            "  {:<16} {:<11} {:<17} polls={:<3} frame={}",
            p.id,
            p.config.unit_type,
            p.state,
            p.polls,
            p.frame_url.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("vert-sim: {}", e);
            ExitCode::FAILURE
        }
    }
}
