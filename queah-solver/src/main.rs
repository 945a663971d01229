//! Queah solver driver.
//!
//! Builds the complete reachable-position graph, assigns game-theoretic
//! values by retrograde analysis, and writes the compact value table the
//! runtime engine plays from.

mod graph;
mod solver;
mod stats;

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use queah_core::{Evaluator, GamePosition, MAX_VALUE};
use tracing::info;

use crate::graph::Graph;

#[derive(Parser)]
#[command(about = "Solve Queah and write the value table")]
struct Args {
    /// Output path for the value table.
    #[arg(long, default_value = "queah.dat")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();
    let args = Args::parse();

    info!("building reachable positions");
    let mut graph = Graph::build(GamePosition::START);
    info!(nodes = graph.len(), "graph complete");

    let terminals = graph.nodes().filter(|node| node.is_terminal()).count();
    info!(terminals, "terminal positions found");

    let stats = solver::solve(&mut graph);
    info!(
        passes = stats.passes(),
        resolved = stats.resolved(),
        draws = stats.draws(),
        elapsed_secs = stats.elapsed_secs(),
        "solve complete"
    );
    solver::verify(&graph).context("solved graph failed verification")?;

    let table = Evaluator::new(&graph.position_values());
    table
        .save(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!(rows = table.len(), path = %args.output.display(), "value table saved");

    // Re-read the file to confirm it round-trips.
    let root = graph
        .find(GamePosition::START)
        .context("start position missing from graph")?;
    let reloaded = Evaluator::load(&args.output).context("re-reading saved table")?;
    if reloaded.len() != table.len() || reloaded.evaluate(root.position()) != root.value() {
        bail!("saved value table does not match the solved graph");
    }

    let value = table.evaluate(GamePosition::START);
    if value == 0 {
        info!("perfect play is a draw");
    } else {
        let winner = if value > 0 { "white" } else { "black" };
        let moves = (MAX_VALUE as i32 - value.unsigned_abs() as i32 + 1) / 2;
        info!("{winner} wins in {moves} moves with perfect play");
    }
    Ok(())
}
