use mapbuffer::map::{Submap, SubmapCoord, SUBMAP_EDGE_LENGTH};
use mapbuffer::{fill_box, open_world, stored_submaps, Config};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

const GRASS: u16 = 1;
const DIRT: u16 = 2;
const ROCK: u16 = 3;
const TREE: u16 = 1;

#[derive(Parser)]
#[command(name = "mapbuffer", about = "Inspect and populate mapbuffer worlds")]
struct Cli {
    /// RON config file (default configuration when absent)
    #[arg(long, short)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the number of stored regions and submaps
    Stats,
    /// Print every stored region with its submaps
    List,
    /// Generate every missing submap in a box and save the world
    Fill {
        /// Minimum corner in submaps (X Y Z)
        #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_hyphen_values = true)]
        min: Vec<i32>,
        /// Maximum corner in submaps, inclusive (X Y Z)
        #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_hyphen_values = true)]
        max: Vec<i32>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::read_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => Config::default(),
    };

    let mut world = open_world(&config)
        .with_context(|| format!("failed to open world in {}", config.world_dir.display()))?;

    match cli.command {
        Command::Stats => {
            let stored = stored_submaps(world.store())?;
            let num_submaps: usize = stored.values().map(Vec::len).sum();
            println!("world:    {}", config.world_name);
            println!("regions:  {}", stored.len());
            println!("submaps:  {}", num_submaps);
            println!("region size: {}", world.region_size());
        }
        Command::List => {
            for (region, coords) in stored_submaps(world.store())? {
                println!("region ({}, {}, {}): {} submaps", region.x, region.y, region.z, coords.len());
                for c in coords {
                    println!("    ({}, {}, {})", c.x, c.y, c.z);
                }
            }
        }
        Command::Fill { min, max } => {
            let min = corner(&min)?;
            let max = corner(&max)?;
            if min.x > max.x || min.y > max.y || min.z > max.z {
                bail!("min {:?} is not below max {:?}", min, max);
            }

            let generated = fill_box(&mut world, min, max, generate_submap)?;
            let report = world.save(true)?;
            world.store().flush()?;
            println!(
                "generated {} submaps, wrote {} regions ({} submaps)",
                generated, report.regions_written, report.submaps_written
            );
        }
    }

    Ok(())
}

fn corner(values: &[i32]) -> anyhow::Result<SubmapCoord> {
    match *values {
        [x, y, z] => Ok(SubmapCoord::new(x, y, z)),
        _ => bail!("expected 3 coordinates, got {}", values.len()),
    }
}

/// Grass above ground, dirt and rock below, and a tree in the middle of every other submap.
fn generate_submap(coord: SubmapCoord) -> Submap {
    let floor = match coord.z {
        z if z > 0 => return Submap::default(),
        0 => GRASS,
        -1 => DIRT,
        _ => ROCK,
    };
    let mut submap = Submap::filled(floor);
    if floor == GRASS && (coord.x + coord.y).rem_euclid(2) == 0 {
        let center = SUBMAP_EDGE_LENGTH as u32 / 2;
        submap.set_furniture([center, center], TREE);
    }

    submap
}
