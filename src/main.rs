use anyhow::Result;
use clap::{Parser, Subcommand};
use pareto_ch::{Contractor, Graph};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "pareto-ch")]
#[command(about = "Multi-criteria contraction hierarchy preprocessor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Contract a graph into a hierarchy
    Contract {
        /// Input graph file
        input: PathBuf,
        /// Output hierarchy file
        output: PathBuf,
        /// Stop when at most this percentage of nodes is uncontracted
        #[arg(long, default_value = "1.0")]
        rest: f64,
        /// Worker threads (defaults to the hardware parallelism)
        #[arg(long)]
        threads: Option<usize>,
        /// Print per-worker contraction statistics
        #[arg(long)]
        stats: bool,
    },
    /// Print node, edge and level statistics of a graph file
    Info {
        /// Graph file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Contract {
            input,
            output,
            rest,
            threads,
            stats,
        } => {
            println!("loading graph: {}", input.display());
            let (mut registry, graph) = Graph::load(&input)?;
            println!(
                "loaded {} nodes, {} edges",
                graph.node_count(),
                graph.edge_count()
            );

            let start = Instant::now();
            let mut contractor = match threads {
                Some(n) => Contractor::with_threads(stats, n),
                None => Contractor::new(stats),
            };
            let hierarchy = contractor.contract_completely(&mut registry, &graph, rest)?;
            println!(
                "contraction finished in {:.2}s ({} levels)",
                start.elapsed().as_secs_f64(),
                contractor.level()
            );

            hierarchy.save(&registry, &output)?;
            println!("hierarchy written to {}", output.display());
        }
        Commands::Info { input } => {
            let (registry, graph) = Graph::load(&input)?;
            let shortcuts = registry
                .all_ids()
                .filter(|&id| registry.edge(id).is_shortcut())
                .count();
            println!("nodes: {}", graph.node_count());
            println!("edges: {} ({} shortcuts)", graph.edge_count(), shortcuts);

            let mut levels: BTreeMap<u32, usize> = BTreeMap::new();
            for node in graph.nodes() {
                *levels.entry(node.level).or_default() += 1;
            }
            println!("levels:");
            for (level, count) in levels {
                println!("  {level}: {count} nodes");
            }
        }
    }

    Ok(())
}
