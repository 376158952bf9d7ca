//! Shoal - CLI Entry Point
//!
//! Runs the demo scene on top of the flocking core.

use clap::{Parser, Subcommand};
use shoal::{benchmark, Config, Scene, SceneConfig};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "shoal")]
#[command(version)]
#[command(about = "Parallel boids flocking with obstacle repulsion and predators")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the demo scene
    Run {
        /// Configuration file (YAML)
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Number of ticks to simulate
        #[arg(short, long, default_value = "3600")]
        steps: u64,

        /// Seconds per tick
        #[arg(long, default_value = "0.016666668")]
        dt: f32,

        /// Fish to spawn
        #[arg(short, long, default_value = "300")]
        fish: usize,

        /// Predators to spawn
        #[arg(short, long, default_value = "2")]
        predators: usize,

        /// Obstacles to place
        #[arg(long, default_value = "4")]
        obstacles: usize,

        /// Output directory for stats
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,

        /// Quiet mode (minimal output)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Run performance benchmark
    Benchmark {
        /// Number of ticks
        #[arg(short, long, default_value = "600")]
        steps: u64,

        /// Agent count
        #[arg(short, long, default_value = "500")]
        agents: usize,
    },

    /// Generate default configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            steps,
            dt,
            fish,
            predators,
            obstacles,
            output,
            seed,
            quiet,
        } => {
            let scene_config = SceneConfig {
                fish_count: fish,
                predator_count: predators,
                obstacle_count: obstacles,
                ..SceneConfig::default()
            };
            run_simulation(config, scene_config, steps, dt, output, seed, quiet)
        }

        Commands::Benchmark { steps, agents } => run_benchmark(steps, agents),

        Commands::Init { output } => generate_config(output),
    }
}

fn run_simulation(
    config_path: PathBuf,
    scene_config: SceneConfig,
    steps: u64,
    dt: f32,
    output: PathBuf,
    seed: Option<u64>,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Load or create config
    let config = if config_path.exists() {
        println!("Loading config from: {:?}", config_path);
        Config::from_file(&config_path)?
    } else {
        println!("Using default configuration");
        Config::default()
    };

    std::fs::create_dir_all(&output)?;

    let seed = seed.unwrap_or_else(rand::random);
    println!("Using seed: {}", seed);
    let stats_interval = config.logging.stats_interval;
    let mut scene = Scene::new(config, scene_config, seed);

    println!("Starting simulation");
    println!("  Agents: {}", scene.world.agent_count());
    println!("  Obstacles: {}", scene.obstacles().len());
    println!("  Ticks: {} at {:.4}s", steps, dt);
    println!();

    let start = Instant::now();

    scene.run_with_callback(steps, dt, |scene| {
        if !quiet && scene.world.time % stats_interval == 0 {
            println!("{}", scene.world.stats.summary());
        }
    });

    let elapsed = start.elapsed();
    let ticks_per_sec = scene.world.time as f64 / elapsed.as_secs_f64();

    println!();
    println!("=== Simulation Complete ===");
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Ticks: {}", scene.world.time);
    println!("Speed: {:.1} ticks/s", ticks_per_sec);
    println!("{}", scene.world.stats.summary());

    let stats_path = output.join("stats_final.json");
    scene.world.stats.save_json(&stats_path)?;
    println!("Final stats: {:?}", stats_path);

    let history_path = output.join("stats_history.json");
    scene.world.stats_history.save(&history_path)?;
    println!("Stats history: {:?}", history_path);

    Ok(())
}

fn run_benchmark(steps: u64, agents: usize) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Shoal Benchmark ===");
    println!("Ticks: {}", steps);
    println!("Agents: {}", agents);
    println!();

    let result = benchmark(steps, agents);
    println!("{}", result);

    Ok(())
}

fn generate_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    config.save(&output)?;
    println!("Configuration saved to: {:?}", output);
    Ok(())
}
