use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use neuromorpho_core::client::NeuroMorphoClient;
use neuromorpho_core::swc::{load_swc, save_swc};
use neuromorpho_core::{ClientConfig, LoadOptions, ParentPolicy, Scale, TypePolicy};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "neuromorpho", version, about = "Inspect, transform and fetch SWC neuron morphologies")]
struct Cli {
    #[command(flatten)]
    load: LoadArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct LoadArgs {
    /// Keep records whose parent is missing, as roots
    #[arg(long, global = true)]
    drop_dangling: bool,

    /// Reject SWC type codes outside 0..=7
    #[arg(long, global = true)]
    strict_types: bool,
}

impl LoadArgs {
    fn options(&self) -> LoadOptions {
        LoadOptions {
            parent_policy: if self.drop_dangling { ParentPolicy::Drop } else { ParentPolicy::Reject },
            type_policy: if self.strict_types { TypePolicy::Strict } else { TypePolicy::Lenient },
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Print counts, roots, branch points and total cable length
    Inspect {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Collapse unbranched chains and write the result
    Smooth { input: PathBuf, output: PathBuf },
    /// Apply rotate, then scale, then translate
    Transform {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, value_parser = parse_vec3, allow_hyphen_values = true)]
        translate: Option<[f64; 3]>,
        #[arg(long, allow_hyphen_values = true)]
        scale: Option<String>,
        /// Radians about X, Y, Z
        #[arg(long, value_parser = parse_vec3, allow_hyphen_values = true)]
        rotate: Option<[f64; 3]>,
    },
    /// Search NeuroMorpho.org with key=value filters
    Search {
        filters: Vec<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Download one neuron's SWC into the cache
    Fetch {
        archive: String,
        name: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn parse_vec3(s: &str) -> Result<[f64; 3], String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f64>().map_err(|e| format!("{}: {}", p, e)))
        .collect::<Result<Vec<_>, _>>()?;
    parts
        .try_into()
        .map_err(|v: Vec<f64>| format!("expected 3 comma-separated values, got {}", v.len()))
}

fn parse_scale(s: &str) -> Result<Scale> {
    if s.contains(',') {
        let v = parse_vec3(s).map_err(anyhow::Error::msg)?;
        Ok(Scale::PerAxis(v))
    } else {
        Ok(Scale::Uniform(s.trim().parse().with_context(|| format!("invalid scale {}", s))?))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let options = cli.load.options();

    match cli.command {
        Command::Inspect { file, json } => {
            let m = load_swc(&file, &options).with_context(|| format!("Failed to load {:?}", file))?;
            let summary = serde_json::json!({
                "nodes": m.len(),
                "edges": m.edge_count(),
                "roots": m.roots(),
                "leaves": m.leaves().len(),
                "branch_points": m.get_branch_points(),
                "total_length": m.get_total_length(),
            });
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("nodes:         {}", m.len());
                println!("edges:         {}", m.edge_count());
                println!("roots:         {:?}", m.roots());
                println!("leaves:        {}", m.leaves().len());
                println!("branch points: {:?}", m.get_branch_points());
                println!("total length:  {:.4}", m.get_total_length());
            }
        }
        Command::Smooth { input, output } => {
            let m = load_swc(&input, &options).with_context(|| format!("Failed to load {:?}", input))?;
            let smoothed = m.smoothed();
            save_swc(&output, &smoothed).with_context(|| format!("Failed to write {:?}", output))?;
            println!("{} -> {} nodes", m.len(), smoothed.len());
        }
        Command::Transform { input, output, translate, scale, rotate } => {
            let mut m = load_swc(&input, &options).with_context(|| format!("Failed to load {:?}", input))?;
            if let Some(angles) = rotate {
                m.rotate(angles)?;
            }
            if let Some(scale) = scale {
                m.scale(parse_scale(&scale)?)?;
            }
            if let Some(offset) = translate {
                m.translate(offset)?;
            }
            save_swc(&output, &m).with_context(|| format!("Failed to write {:?}", output))?;
        }
        Command::Search { filters, limit } => {
            let mut query = BTreeMap::new();
            for filter in filters {
                let Some((key, value)) = filter.split_once('=') else {
                    bail!("Filter must be key=value: {}", filter);
                };
                query.insert(key.to_string(), value.to_string());
            }
            let client = NeuroMorphoClient::new(ClientConfig::from_env());
            for neuron in client.search(&query, limit).await? {
                println!("{}\t{}", neuron.archive, neuron.neuron_name);
            }
        }
        Command::Fetch { archive, name, out } => {
            let client = NeuroMorphoClient::new(ClientConfig::from_env());
            let m = client.download_morphology(&archive, &name, &options).await?;
            let path = out.unwrap_or_else(|| client.cache_path(&archive, &name));
            if path != client.cache_path(&archive, &name) {
                save_swc(&path, &m).with_context(|| format!("Failed to write {:?}", path))?;
            }
            println!("{}: {} nodes, {} branch points -> {}", name, m.len(), m.get_branch_points().len(), path.display());
        }
    }

    Ok(())
}
