use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use simkit_common::{BUILD_NUMBER, LevelDef, ObjectId, WorldConfig};
use simkit_kernel::{Role, World};
use simkit_net::{ObserverId, ReplicationClient, ReplicationServer};
use simkit_persist::SaveStore;
use simkit_render::{DebugTextRenderer, present};
use simkit_tools::WorldInspector;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "simkit", about = "Run, save, restore and replicate simkit levels")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct SimArgs {
    /// Level file (YAML)
    level: PathBuf,
    /// Number of ticks to simulate
    #[arg(short, long, default_value = "100")]
    ticks: u64,
    /// Seed for the simulation random stream
    #[arg(short, long, default_value = "42")]
    seed: u64,
    /// Milliseconds per tick
    #[arg(long, default_value = "16")]
    msec: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version, build number and registered classes
    Info,
    /// Load a level and run it
    Run {
        #[command(flatten)]
        sim: SimArgs,
        /// Save store directory to write the final state into
        #[arg(long)]
        save: Option<PathBuf>,
        /// Slot name inside the save store
        #[arg(long, default_value = "auto")]
        slot: String,
        /// Print every frame's visual updates
        #[arg(long)]
        render: bool,
    },
    /// Restore a saved slot and keep running it
    Restore {
        /// Save store directory
        store: PathBuf,
        #[arg(long, default_value = "auto")]
        slot: String,
        #[arg(short, long, default_value = "100")]
        ticks: u64,
    },
    /// Run a level while streaming it to an in-process observer
    Replicate {
        #[command(flatten)]
        sim: SimArgs,
        /// Drop every Nth packet before it reaches the observer
        #[arg(long)]
        drop_every: Option<u64>,
    },
    /// Run a level, then print the inspector's view of it
    Inspect {
        #[command(flatten)]
        sim: SimArgs,
        /// Only show this object id
        #[arg(long)]
        object: Option<u64>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Commands::Info => {
            println!("simkit v{} (build {BUILD_NUMBER})", env!("CARGO_PKG_VERSION"));
            let classes = simkit_behaviors::class_registry();
            println!("classes ({}):", classes.len());
            for name in classes.class_names() {
                println!("  {name}");
            }
        }
        Commands::Run {
            sim,
            save,
            slot,
            render,
        } => {
            let mut world = load(&sim)?;
            let mut renderer = DebugTextRenderer::new();
            for _ in 0..sim.ticks {
                world.run_frame();
                let frame = present(&mut world, &mut renderer);
                if render {
                    print!("{frame}");
                }
            }
            println!("{}", WorldInspector::summary(&world));
            if let Some(dir) = save {
                let archive = world.save().context("encoding world")?;
                let mut store = SaveStore::open(&dir).with_context(|| format!("opening {}", dir.display()))?;
                store.write_slot(&slot, world.tick(), &archive)?;
                println!("saved slot '{slot}' ({} bytes) to {}", archive.len(), dir.display());
            }
        }
        Commands::Restore { store, slot, ticks } => {
            let store = SaveStore::open(&store).with_context(|| format!("opening {}", store.display()))?;
            store.verify_integrity()?;
            let bytes = store.read_slot(&slot)?;
            let mut world = World::restore(&bytes, simkit_behaviors::class_registry())?;
            println!("restored: {}", WorldInspector::summary(&world));
            world.run_frames(ticks);
            println!("after {ticks} ticks: {}", WorldInspector::summary(&world));
        }
        Commands::Replicate { sim, drop_every } => replicate(&sim, drop_every)?,
        Commands::Inspect { sim, object } => {
            let mut world = load(&sim)?;
            world.run_frames(sim.ticks);
            println!("{}", WorldInspector::summary(&world));
            let ids = match object {
                Some(raw) => vec![ObjectId(raw)],
                None => WorldInspector::list_objects(&world),
            };
            for id in ids {
                match WorldInspector::inspect_object(&world, id) {
                    Some(info) => println!("  {info}"),
                    None => println!("  {id}: no such object"),
                }
            }
        }
    }

    Ok(())
}

fn load(sim: &SimArgs) -> anyhow::Result<World> {
    let level = read_level(&sim.level)?;
    let config = WorldConfig {
        msec_per_tick: sim.msec,
        seed: sim.seed,
        ..WorldConfig::default()
    };
    let mut world = World::new(config, simkit_behaviors::class_registry());
    world.load_level(&level).context("spawning level")?;
    Ok(world)
}

fn read_level(path: &Path) -> anyhow::Result<LevelDef> {
    LevelDef::load(path).with_context(|| format!("reading level {}", path.display()))
}

fn replicate(sim: &SimArgs, drop_every: Option<u64>) -> anyhow::Result<()> {
    let mut authority = load(sim)?;
    let mut observer = World::restore(&authority.save()?, simkit_behaviors::class_registry())?;
    observer.set_role(Role::Observer);

    let peer = ObserverId(1);
    let mut server = ReplicationServer::new();
    server.add_observer(peer);
    let mut client = ReplicationClient::new(authority.field_sets());

    let (mut sent, mut dropped, mut applied, mut bytes) = (0u64, 0u64, 0usize, 0usize);
    for tick in 1..=sim.ticks {
        authority.run_frame();
        let Some(packet) = server.build_packet(peer, &authority.replication_frame())? else {
            continue;
        };
        sent += 1;
        if drop_every.is_some_and(|n| n > 0 && tick % n == 0) {
            dropped += 1;
            tracing::debug!(seq = packet.seq, "dropped packet");
            continue;
        }
        bytes += packet.bytes.len();
        let received = client.read_packet(&packet.bytes)?;
        let changed: Vec<_> = received.updates.into_iter().filter(|u| u.changed).collect();
        applied += observer.apply_updates(&changed);
        server.ack(peer, received.seq);
    }

    let mut renderer = DebugTextRenderer::new();
    print!("{}", present(&mut observer, &mut renderer));
    println!(
        "packets: sent={sent} dropped={dropped} bytes={bytes} applied_updates={applied} baselines={}",
        server.acked_count(peer)
    );
    Ok(())
}
