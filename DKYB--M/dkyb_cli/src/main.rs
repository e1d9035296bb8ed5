use std::{
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dkyb_ensemble::{
    data::{self, DataPoint},
    EnsembleConfig, EnsembleError, EnsembleRegistry, ModelKind,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Parser, Debug)]
#[command(name = "dkyb", version, about = "Model ensemble coordinator")]
struct Cli {
    /// Optional TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Builds one ensemble, trains it on synthetic or file data and reports its scores.
    Demo(DemoArgs),
    /// Replays a JSON script of registry operations.
    Replay {
        /// Script file: a JSON array of operations.
        #[arg(long)]
        script: PathBuf,
    },
}

#[derive(Parser, Debug)]
struct DemoArgs {
    /// Nominal capacity; defaults to the configured one.
    #[arg(long)]
    capacity: Option<usize>,
    /// Models to add.
    #[arg(long, default_value_t = 2)]
    models: usize,
    /// Synthetic training samples.
    #[arg(long, default_value_t = 64)]
    samples: usize,
    /// Feature width of synthetic samples.
    #[arg(long, default_value_t = 3)]
    features: usize,
    /// JSON dataset to train on instead of synthetic samples; its width wins over `--features`.
    #[arg(long)]
    data: Option<PathBuf>,
    /// Model family (constant, mean, linear); defaults to the configured one.
    #[arg(long)]
    model: Option<ModelKind>,
}

/// One scripted registry call.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ScriptOp {
    Create {
        capacity: Option<usize>,
        model: Option<ModelKind>,
        #[serde(default = "default_feature_dim")]
        feature_dim: usize,
    },
    AddModel {
        id: String,
    },
    AddData {
        id: String,
        data: Vec<DataPoint>,
    },
    Predict {
        id: String,
        features: Vec<f32>,
    },
    Evaluate {
        id: String,
        data: Vec<DataPoint>,
    },
}

const fn default_feature_dim() -> usize {
    3
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let registry = build_registry(&config)?;
    match cli.command {
        Commands::Demo(args) => {
            let report = run_demo(&registry, &config, &args)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Replay { script } => {
            let raw = fs::read_to_string(&script)
                .with_context(|| format!("reading script {}", script.display()))?;
            let ops: Vec<ScriptOp> = serde_json::from_str(&raw)
                .with_context(|| format!("parsing script {}", script.display()))?;
            for line in replay(&registry, &config, ops)? {
                println!("{line}");
            }
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<EnsembleConfig> {
    match path {
        Some(path) => EnsembleConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(EnsembleConfig::default()),
    }
}

fn build_registry(config: &EnsembleConfig) -> Result<EnsembleRegistry> {
    let telemetry = config.telemetry("dkyb")?;
    Ok(EnsembleRegistry::with_prefix(config.id_prefix.clone()).with_telemetry(telemetry))
}

fn capacity_or_default(config: &EnsembleConfig, requested: Option<usize>) -> Result<NonZeroUsize> {
    match requested {
        Some(value) => NonZeroUsize::new(value).context("capacity must be greater than zero"),
        None => Ok(config.capacity()?),
    }
}

fn run_demo(registry: &EnsembleRegistry, config: &EnsembleConfig, args: &DemoArgs) -> Result<Value> {
    let capacity = capacity_or_default(config, args.capacity)?;
    let kind = args.model.unwrap_or(config.model);
    let (samples, width) = match &args.data {
        Some(path) => {
            let samples = data::load_json(path)?;
            let width = match data::feature_dim(&samples) {
                0 => args.features,
                width => width,
            };
            (samples, width)
        }
        None => (data::synthetic(args.samples, args.features), args.features),
    };
    let id = registry.create_controller(capacity, kind.factory(width));
    for _ in 0..args.models {
        registry.add_model(&id)?;
    }
    registry.add_data(&id, &samples)?;
    let query = samples
        .first()
        .map(|point| point.features.clone())
        .unwrap_or_else(|| vec![0.0; width]);
    Ok(json!({
        "id": id,
        "model": kind,
        "features": width,
        "samples": samples.len(),
        "summary": registry.describe(&id)?,
        "predictions": registry.predict(&id, &query)?,
        "evaluations": registry.evaluate(&id, &samples)?,
    }))
}

fn replay(
    registry: &EnsembleRegistry,
    config: &EnsembleConfig,
    ops: Vec<ScriptOp>,
) -> Result<Vec<Value>> {
    let mut lines = Vec::with_capacity(ops.len());
    for (step, op) in ops.into_iter().enumerate() {
        let outcome = match op {
            ScriptOp::Create {
                capacity,
                model,
                feature_dim,
            } => {
                let capacity = capacity_or_default(config, capacity)?;
                let kind = model.unwrap_or(config.model);
                let id = registry.create_controller(capacity, kind.factory(feature_dim));
                Ok(json!({ "op": "create", "id": id }))
            }
            ScriptOp::AddModel { id } => registry
                .add_model(&id)
                .map(|slot| json!({ "op": "add_model", "id": id, "slot": slot })),
            ScriptOp::AddData { id, data } => registry
                .add_data(&id, &data)
                .map(|()| json!({ "op": "add_data", "id": id, "samples": data.len() })),
            ScriptOp::Predict { id, features } => registry
                .predict(&id, &features)
                .map(|scores| json!({ "op": "predict", "id": id, "scores": scores })),
            ScriptOp::Evaluate { id, data } => registry
                .evaluate(&id, &data)
                .map(|scores| json!({ "op": "evaluate", "id": id, "scores": scores })),
        };
        lines.push(match outcome {
            Ok(value) => value,
            Err(err) => error_line(step, &err),
        });
    }
    Ok(lines)
}

fn error_line(step: usize, err: &EnsembleError) -> Value {
    match err {
        EnsembleError::UnknownController(id) => json!({
            "step": step,
            "error": "unknown_controller",
            "id": id,
            "message": err.to_string(),
        }),
        EnsembleError::Model(inner) => json!({
            "step": step,
            "error": "model",
            "message": format!("{inner:#}"),
        }),
    }
}
