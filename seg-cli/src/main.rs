//! `seg`: talk to a narrative organism from the terminal.

mod commands;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use seg_core::config::{LibraryBackend, ProviderKind, SegConfig};
use seg_core::library::{KeyValueStore, MemoryKv, PersonaLibrary, SqliteKv};
use seg_core::persistence::{export_file_name, load_state, save_state};
use seg_core::persona::PersonaGenerator;
use seg_core::{
    MemoryId, MemorySource, Persona, RandomSource, SeededRandom, SegState, Session,
    TextGenerator, Timestamp,
};
use seg_llm::LlmClient;

use commands::{Command, HELP};

/// Talk to a persona that remembers, forgets and dreams.
#[derive(Debug, Parser)]
#[command(name = "seg", version, about)]
struct Args {
    /// Configuration file (TOML).
    #[arg(short, long, env = "SEG_CONFIG")]
    config: Option<PathBuf>,

    /// Start from an exported state instead of a fresh persona.
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Archetype for a freshly generated persona.
    #[arg(short, long)]
    archetype: Option<String>,

    /// Context handed to the persona generator.
    #[arg(long)]
    context: Option<String>,

    /// Seed for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,

    /// Ignore any configured text generator.
    #[arg(long)]
    offline: bool,

    /// Emit logs as JSON.
    #[arg(long)]
    log_json: bool,
}

type Library = PersonaLibrary<Box<dyn KeyValueStore>>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SegConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => SegConfig::default(),
    };
    init_tracing(&config.general.log_level, args.log_json);

    let generator = (!args.offline && config.llm.provider != ProviderKind::None)
        .then(|| LlmClient::from_config(&config.llm));
    if let Some(client) = &generator {
        if !client.test_connection().await {
            warn!(provider = client.name(), "Text generator not answering; replies will use templates");
        }
    }
    let generator_ref = generator.as_ref().map(|c| c as &dyn TextGenerator);

    let mut rng = match args.seed {
        Some(seed) => SeededRandom::seeded(seed),
        None => SeededRandom::from_entropy(),
    };
    let mut library = open_library(&config)?;

    let state = match &args.state {
        Some(path) => load_state(path).with_context(|| format!("importing {}", path.display()))?,
        None => {
            let persona = initial_persona(&mut library, generator_ref, &args, &mut rng).await?;
            SegState::new(persona, Timestamp::wall_clock(), &mut rng)
                .with_settings((&config.reply).into())
        }
    };
    let session_seed = args.seed.map_or_else(SeededRandom::from_entropy, |s| {
        SeededRandom::seeded(s.wrapping_add(1))
    });
    let session = Session::with_config(state, &config, Box::new(session_seed));

    greet(&session);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match commands::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(usage) => {
                println!("{usage}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        if let Err(e) = run(command, &session, &mut library, generator_ref, &config, &mut rng).await {
            println!("error: {e:#}");
        }
    }
    info!("Session ended");
    Ok(())
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn open_library(config: &SegConfig) -> Result<Library> {
    let store: Box<dyn KeyValueStore> = match config.library.backend {
        LibraryBackend::Memory => Box::new(MemoryKv::new()),
        LibraryBackend::Sqlite => {
            let path = Path::new(&config.library.path);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            Box::new(SqliteKv::open(path).context("opening persona library")?)
        }
    };
    Ok(PersonaLibrary::open(store)?)
}

async fn initial_persona(
    library: &mut Library,
    generator: Option<&dyn TextGenerator>,
    args: &Args,
    rng: &mut SeededRandom,
) -> Result<Persona> {
    if args.archetype.is_none() {
        if let Some(entry) = library.default_persona()? {
            info!(id = %entry.id, "Loaded default persona from library");
            return Ok(entry.persona);
        }
        if generator.is_none() {
            return Ok(Persona::fallback(rng));
        }
    }
    Ok(PersonaGenerator::generate(
        generator,
        args.archetype.as_deref(),
        args.context.as_deref(),
        rng,
    )
    .await)
}

fn greet(session: &Session) {
    let state = session.snapshot();
    let p = &state.persona;
    println!("{}, {} ({}), {}", p.name, p.age, p.profession, p.location);
    println!("{}", p.summary());
    println!("{} memories. Type /help for commands.\n", state.memories.len());
}

async fn run(
    command: Command,
    session: &Session,
    library: &mut Library,
    generator: Option<&dyn TextGenerator>,
    config: &SegConfig,
    rng: &mut SeededRandom,
) -> Result<()> {
    match command {
        Command::Say(text) => {
            if let Some(reply) = session.respond(&text, generator).await? {
                let name = session.with_state(|s| s.persona.name.clone());
                println!("{name}: {}\n", reply.text);
            }
        }
        Command::Tick(days) => {
            let days = days.unwrap_or_else(|| 1.0 + rng.index(30) as f64);
            session.tick_days(days);
            let mood = session.with_state(|s| s.persona.mood.clone());
            println!(
                "{days} days pass. Mood: {} (valence {:.2}, arousal {:.2})",
                mood.display_label(),
                mood.valence,
                mood.arousal
            );
        }
        Command::Dream(intensity) => {
            let outcome = session.dream(intensity)?;
            match outcome.narration {
                Some(line) => println!("{line}"),
                None => println!("(dreamt {})", outcome.id),
            }
        }
        Command::Memories(query) => {
            let state = session.snapshot();
            let memories = match &query {
                Some(q) => state.memories.search(q),
                None => state.memories.sorted_by_salience(),
            };
            for m in memories {
                let pin = if m.immutable { "*" } else { " " };
                println!("{pin} {:<14} {:.2} [{}] {}", m.id, m.salience, m.source, m.text);
            }
        }
        Command::Add(text) => match session.with_state(|s| s.add_memory(&text, MemorySource::User)) {
            Some(id) => println!("added {id}"),
            None => println!("nothing to add"),
        },
        Command::Prune(id) => {
            let id = MemoryId::from(id.as_str());
            if session.with_state(|s| s.prune(&id)) {
                println!("pruned {id}");
            } else {
                println!("{id} not pruned (unknown or a core anchor)");
            }
        }
        Command::Pin(id) => {
            let id = MemoryId::from(id.as_str());
            if session.with_state(|s| s.set_immutable(&id, true)) {
                println!("{id} is now a core anchor");
            } else {
                println!("no memory {id}");
            }
        }
        Command::Export => {
            let state = session.snapshot();
            let path = Path::new(&config.general.export_dir)
                .join(export_file_name(&state, chrono::Utc::now()));
            save_state(&state, &path)?;
            println!("exported to {}", path.display());
        }
        Command::Import(path) => {
            let state = load_state(Path::new(&path))
                .with_context(|| format!("importing {path}; current state kept"))?;
            session.replace(state)?;
            greet(session);
        }
        Command::Persona(archetype) => {
            let persona =
                PersonaGenerator::generate(generator, archetype.as_deref(), None, rng).await;
            session.with_state_and_rng(|s, r| s.regenerate_persona(persona, r));
            greet(session);
        }
        Command::Save(name) => {
            let persona = session.with_state(|s| s.persona.clone());
            let id = library.save_persona(&persona, name.as_deref(), None, &[])?;
            let removed = library.cleanup(config.library.max_entries, config.library.min_rating)?;
            println!("saved as {id}");
            if removed > 0 {
                println!("library trimmed by {removed}");
            }
        }
        Command::Library(query) => {
            let entries = match &query {
                Some(q) => library.search_personas(q),
                None => library.all_personas(),
            };
            if entries.is_empty() {
                println!("library is empty");
            }
            for e in entries {
                let stars = e.rating.map_or_else(String::new, |r| "*".repeat(usize::from(r)));
                let default = if e.is_default { " (default)" } else { "" };
                println!(
                    "{}  {} [{}] used {}x {stars}{default}",
                    e.id, e.name, e.persona.archetype, e.use_count
                );
            }
        }
        Command::Load(id) => match library.load_persona(&id)? {
            Some(entry) => {
                session.with_state_and_rng(|s, r| s.regenerate_persona(entry.persona, r));
                greet(session);
            }
            None => println!("no saved persona {id}"),
        },
        Command::Rate(id, stars) => {
            if library.rate_persona(&id, stars)? {
                println!("rated {id} {stars}/5");
            } else {
                println!("rating must be 1-5 for a saved persona");
            }
        }
        Command::Default(id) => {
            if library.set_default(&id)? {
                println!("{id} will load on startup");
            } else {
                println!("no saved persona {id}");
            }
        }
        Command::Stats => {
            let stats = library.stats();
            println!("{} personas, average rating {:.1}", stats.total, stats.average_rating);
            for (archetype, count) in &stats.archetype_counts {
                println!("  {archetype}: {count}");
            }
            if let Some(most) = stats.most_used {
                println!("most used: {} ({}x)", most.name, most.use_count);
            }
        }
        Command::Whoami => {
            let state = session.snapshot();
            let p = &state.persona;
            println!("{} ({}), {}", p.name, p.archetype, p.summary());
            println!(
                "mood: {} (valence {:.2}, arousal {:.2})",
                p.mood.display_label(),
                p.mood.valence,
                p.mood.arousal
            );
            for (sense, anchor) in p.sensory_anchors.pairs() {
                println!("  {sense}: {anchor}");
            }
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
    Ok(())
}
