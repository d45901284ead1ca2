//! graphfuse - CLI for fusing operator graphs

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use graphfuse::{apply_all, rules, FrameworkGraph, FusionConfig, Graph, RuleOutcome};
use std::path::Path;
use std::process;
use tracing::info;

use cli::{Cli, Command};

fn main() {
    let cli = Cli::parse();

    cli.init_logging();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command.clone() {
        Command::Apply { rule, input, output } => apply_rule(&cli, &rule, &input, output.as_deref()),
        Command::Optimize {
            input,
            output,
            max_passes,
        } => optimize(&cli, &input, output.as_deref(), max_passes),
        Command::Rules => list_rules(),
        Command::Info { input } => show_info(&input),
        Command::Dot { input } => {
            let graph = load_graph(&input)?;
            print!("{}", graph.to_dot());
            Ok(())
        }
        Command::Import { input, output } => import(&cli, &input, output.as_deref()),
    }
}

/// Load the config named on the command line, else ./graphfuse.toml, else defaults
fn load_config(cli: &Cli) -> Result<FusionConfig> {
    if let Some(ref path) = cli.config {
        return FusionConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()));
    }
    Ok(FusionConfig::find_and_load()
        .context("Failed to load graphfuse.toml")?
        .unwrap_or_default())
}

fn load_graph(path: &Path) -> Result<Graph> {
    if !path.exists() {
        anyhow::bail!("Input file not found: {}", path.display());
    }
    Graph::load(path).with_context(|| format!("Failed to load graph from {}", path.display()))
}

/// Write the graph document to `output`, or stdout
fn write_graph(graph: &Graph, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => graph
            .save(path)
            .with_context(|| format!("Failed to write output to {}", path.display())),
        None => {
            println!("{}", graph.to_json().context("Failed to serialize graph")?);
            Ok(())
        }
    }
}

fn apply_rule(cli: &Cli, rule: &str, input: &Path, output: Option<&Path>) -> Result<()> {
    let mut graph = load_graph(input)?;
    let before = graph.statistics();

    let outcome = rules::apply(rule, &mut graph).with_context(|| format!("Rule {} failed", rule))?;
    info!("{} on '{}': {:?}", rule, graph.name(), outcome);

    if !cli.quiet {
        match outcome {
            RuleOutcome::NoMatch => eprintln!("{}: no match", rule),
            RuleOutcome::AlreadySatisfied => eprintln!("{}: already satisfied, graph unchanged", rule),
            RuleOutcome::Fused(n) => eprintln!("{}: fused {} sub-graph(s)", rule, n),
        }
        if cli.stats {
            eprint!("Before:\n{}After:\n{}", before, graph.statistics());
        }
    }

    write_graph(&graph, output)
}

fn optimize(cli: &Cli, input: &Path, output: Option<&Path>, max_passes: Option<usize>) -> Result<()> {
    let mut config = load_config(cli)?;
    config.max_passes = max_passes.or(config.max_passes);
    if cli.verbose > 0 {
        config.verbose = Some(true);
    }

    let mut graph = load_graph(input)?;
    let stats = apply_all(&mut graph, &config).context("Optimization failed")?;

    if !cli.quiet {
        eprintln!(
            "Optimized '{}': {} → {} nodes in {} iteration(s)",
            graph.name(),
            stats.initial_nodes,
            stats.final_nodes,
            stats.iterations
        );
        if cli.stats {
            eprint!("{}", stats);
        }
    }

    write_graph(&graph, output)
}

fn list_rules() -> Result<()> {
    let registry = rules::global().context("Failed to build rule registry")?;
    for rule in registry.iter() {
        let guards = rule.entries().iter().filter(|e| e.is_guard()).count();
        let rewrites = rule.entries().len() - guards;
        if guards > 0 {
            println!("{} ({} rewrite(s), {} guard(s))", rule.name(), rewrites, guards);
        } else {
            println!("{} ({} rewrite(s))", rule.name(), rewrites);
        }
    }
    Ok(())
}

fn show_info(input: &Path) -> Result<()> {
    let graph = load_graph(input)?;
    println!("Graph: {}", graph.name());
    print!("{}", graph.statistics());
    Ok(())
}

fn import(cli: &Cli, input: &Path, output: Option<&Path>) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    let contents = std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let source = FrameworkGraph::from_json(&contents)
        .with_context(|| format!("Failed to parse framework graph {}", input.display()))?;

    let graph = graphfuse::import_graph(&source).with_context(|| format!("Failed to import {}", input.display()))?;
    if !cli.quiet {
        eprintln!("Imported '{}' with {} node(s)", graph.name(), graph.len());
    }

    write_graph(&graph, output)
}

