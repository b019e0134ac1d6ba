use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tileclip::{
    codec, ActorId, ApplyReport, Attachment, AttachmentKind, Cell, CellStore, ClipConfig,
    ClipError, ClipStore, Clipboard, FixtureRegistry, FixtureState, ItemStack, MemoryWorld, Point,
    Rect, Snapshot, UndoLog,
};

#[derive(Parser)]
#[command(name = "tileclip", about = "Inspect and exercise tile region clips")]
struct Cli {
    /// JSON config file; defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode a .clip file and print a summary
    Inspect {
        file: PathBuf,
        /// Print origin, footprint and attachments as JSON
        #[arg(long)]
        json: bool,
    },
    /// List stored clip names
    Clips,
    /// List an actor's persisted undo stack, newest last
    UndoLog {
        actor: u64,
    },
    /// Copy, paste and undo a region of an in-memory world
    Demo {
        /// Also store the copied region under this clip name
        #[arg(long)]
        save_as: Option<String>,
    },
}

fn describe(snapshot: &Snapshot) -> String {
    let mut kinds = Vec::new();
    for kind in AttachmentKind::ORDER {
        let count = snapshot.attachments().of_kind(kind).len();
        if count > 0 {
            kinds.push(format!("{kind}: {count}"));
        }
    }
    let footprint = snapshot
        .footprint()
        .map(|rect| rect.to_string())
        .unwrap_or_else(|| format!("empty at {}", snapshot.origin()));
    if kinds.is_empty() {
        footprint
    } else {
        format!("{footprint} [{}]", kinds.join(", "))
    }
}

#[derive(Serialize)]
struct ClipSummary<'a> {
    origin: Point,
    width: u32,
    height: u32,
    footprint: Option<Rect>,
    attachments: Vec<&'a Attachment>,
}

impl<'a> ClipSummary<'a> {
    fn of(snapshot: &'a Snapshot) -> Self {
        Self {
            origin: snapshot.origin(),
            width: snapshot.width(),
            height: snapshot.height(),
            footprint: snapshot.footprint(),
            attachments: snapshot.attachments().iter().collect(),
        }
    }
}

fn report_json(report: &ApplyReport) -> Result<String, ClipError> {
    serde_json::to_string(report).map_err(|error| ClipError::Io(error.into()))
}

fn demo_world() -> MemoryWorld {
    let mut world = MemoryWorld::new(256, 64);
    for x in 0..16 {
        world.write_cell(Point::new(x, 12), Cell::solid(1));
    }
    if let Some(id) = world.build_fixture(AttachmentKind::Container, Point::new(2, 10)) {
        if let Some(FixtureState::Container { slots }) = world.state_mut(id) {
            slots[3] = ItemStack::new(29, 1, 0);
        }
    }
    if let Some(id) = world.build_fixture(AttachmentKind::Sign, Point::new(6, 10)) {
        if let Some(FixtureState::Sign { text }) = world.state_mut(id) {
            *text = "built by tileclip".to_string();
        }
    }
    world
}

fn run_demo(config: ClipConfig, save_as: Option<String>) -> Result<(), ClipError> {
    let host = Arc::new(Mutex::new(demo_world()));
    let undo = UndoLog::in_memory(config.undo_depth);
    let clipboard = Clipboard::with_undo_log(Arc::clone(&host), config, undo);
    let actor = ActorId(1);
    let source = Rect::from_corners(Point::new(0, 0), Point::new(15, 15));

    let copied = match save_as.as_deref() {
        Some(name) => clipboard.copy_to_clip(actor, source, name)?,
        None => clipboard.copy(actor, source)?,
    };
    println!("copied {}", describe(&copied));

    let report = clipboard.paste(actor, copied, Point::new(100, 0))?.wait()?;
    println!("pasted at (100, 0): {}", report_json(&report)?);

    let report = clipboard.undo(actor)?.wait()?;
    println!("undone: {}", report_json(&report)?);

    let world = host.lock().expect("host lock poisoned");
    println!(
        "containers left: {:?}",
        world.fixtures_of_kind(AttachmentKind::Container)
    );
    Ok(())
}

fn run(cli: Cli) -> Result<(), ClipError> {
    let config = match &cli.config {
        Some(path) => ClipConfig::load(path)?,
        None => ClipConfig::with_defaults(),
    };
    info!("data directory {}", config.data_dir.display());

    match cli.command {
        Command::Inspect { file, json } => {
            let bytes = std::fs::read(&file)?;
            let snapshot = codec::decode(&bytes)?;
            if json {
                let summary = serde_json::to_string_pretty(&ClipSummary::of(&snapshot))
                    .map_err(|error| ClipError::Io(error.into()))?;
                println!("{summary}");
            } else {
                println!("{}: {}", file.display(), describe(&snapshot));
            }
        }
        Command::Clips => {
            let store = ClipStore::new(config.clips_dir(), config.clip_name_max_len);
            for name in store.list()? {
                println!("{name}");
            }
        }
        Command::UndoLog { actor } => {
            let mut log = UndoLog::open(config.undo_dir(), config.undo_depth);
            let actor = ActorId(actor);
            for (index, entry) in log.entries(actor)?.iter().enumerate() {
                println!("{index}: {}", describe(entry));
            }
            println!("{} redo entries", log.redo_len(actor)?);
        }
        Command::Demo { save_as } => run_demo(config, save_as)?,
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}
