//! FloodSight command-line interface: train a model, run a one-off
//! prediction, or start an interactive prediction session.

use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use log::{error, info};

use floodsight::features::{label, parse_value};
use floodsight::{
    train_pipeline, ArtifactPaths, FeatureVector, InferenceContext, PipelineConfig, Result, Session, FEATURE_COLS,
};

#[derive(Parser, Debug)]
#[command(name = "floodsight")]
#[command(about = "Rainfall and flood-risk prediction", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a model from a CSV dataset and write the artifacts
    Train(TrainArgs),
    /// Predict once and print the result
    Predict(PredictArgs),
    /// Prompt for readings and predict repeatedly
    Interactive(InteractiveArgs),
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// CSV file with the 14 feature columns plus rainfall_mm and flood_risk_pct
    #[arg(short, long)]
    data: PathBuf,

    /// Directory for flood_model.json, scaler_x.json and scaler_y.json
    #[arg(short, long, default_value = "saved_model")]
    artifacts: PathBuf,

    /// JSON pipeline configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum number of epochs
    #[arg(long)]
    epochs: Option<usize>,

    #[arg(long)]
    batch_size: Option<usize>,

    /// Seed for weights, shuffling and the validation split
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct PredictArgs {
    #[arg(short, long, default_value = "saved_model")]
    artifacts: PathBuf,

    /// Use the built-in sample reading instead of prompting
    #[arg(long)]
    sample: bool,
}

#[derive(Args, Debug)]
struct InteractiveArgs {
    #[arg(short, long, default_value = "saved_model")]
    artifacts: PathBuf,

    /// Where the history chart is redrawn after each run
    /// [default: <artifacts>/prediction_chart.svg]
    #[arg(long)]
    chart: Option<PathBuf>,

    /// Do not draw the history chart
    #[arg(long, conflicts_with = "chart")]
    no_chart: bool,
}

const DEFAULT_CHART_FILE: &str = "prediction_chart.svg";

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Train(args) => run_train(args),
        Command::Predict(args) => run_predict(args),
        Command::Interactive(args) => run_interactive(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(epochs) = args.epochs {
        config.training.epochs = epochs;
    }
    if let Some(batch_size) = args.batch_size {
        config.training.batch_size = batch_size;
    }
    if let Some(seed) = args.seed {
        config.network.seed = seed;
        config.training.seed = seed;
        config.split_seed = seed;
    }

    let report = train_pipeline(&args.data, &args.artifacts, &config)?;

    println!("Epochs run:      {}", report.epochs_run);
    if let Some(best) = report.best_epoch {
        println!("Best epoch:      {}", best + 1);
    }
    if let Some(loss) = report.best_validation_loss {
        println!("Best val loss:   {:.6}", loss);
    }
    if let Some(metrics) = &report.final_metrics {
        println!(
            "Final train MAE: rainfall {:.4}, flood risk {:.4} (scaled)",
            metrics.train.rainfall_mae, metrics.train.flood_mae
        );
    }
    println!("Model:           {}", report.artifacts.model.display());
    println!("Input scaler:    {}", report.artifacts.scaler_x.display());
    println!("Output scaler:   {}", report.artifacts.scaler_y.display());
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    let context = InferenceContext::load(&ArtifactPaths::in_dir(&args.artifacts))?;

    let input = if args.sample {
        FeatureVector::sample().to_map()
    } else {
        let stdin = io::stdin();
        match read_features(&mut stdin.lock(), &mut io::stdout())? {
            Some(features) => features.to_map(),
            None => return Ok(()),
        }
    };

    let prediction = context.predict(&input)?;
    println!("Predicted Rainfall (mm): {:.2}", prediction.rainfall_mm);
    println!("Predicted Flood Risk (%): {:.2}", prediction.flood_risk_pct);
    Ok(())
}

fn run_interactive(args: InteractiveArgs) -> Result<()> {
    let context = InferenceContext::load(&ArtifactPaths::in_dir(&args.artifacts))?;
    let mut session = Session::new(context);
    if let Some(chart) = chart_path(&args) {
        session = session.with_chart(chart);
    }
    info!("Session ready; enter readings, blank for 0.0, q to quit");

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut stdout = io::stdout();
    loop {
        let input = match read_features(&mut reader, &mut stdout)? {
            Some(features) => features.to_map(),
            None => break,
        };

        match session.submit(&input) {
            Ok(outcome) => {
                println!();
                println!("Rainfall (mm):  {:.2}", outcome.prediction.rainfall_mm);
                println!("Flood Risk (%): {:.2}", outcome.prediction.flood_risk_pct);
                println!("{}", outcome.risk.message());
                println!();
                print!("{}", session.history());
                if let Some(chart) = outcome.chart {
                    println!("Chart: {}", chart.display());
                }
                println!();
            }
            Err(_) => {
                if let Some(message) = session.last_error() {
                    println!("{}", message);
                }
            }
        }
    }

    println!("Session ended after {} runs", session.history().len());
    Ok(())
}

fn chart_path(args: &InteractiveArgs) -> Option<PathBuf> {
    if args.no_chart {
        return None;
    }
    Some(args.chart.clone().unwrap_or_else(|| args.artifacts.join(DEFAULT_CHART_FILE)))
}

/// Feature order for prompting: left column first, then right column
fn prompt_order() -> impl Iterator<Item = &'static str> {
    let left = FEATURE_COLS.iter().step_by(2);
    let right = FEATURE_COLS.iter().skip(1).step_by(2);
    left.chain(right).copied()
}

/// Prompt for every feature. Returns `None` when the user quits or input ends.
///
/// A blank answer means 0.0; an answer that is not a number is reported and
/// asked again.
fn read_features<R: BufRead, W: Write>(reader: &mut R, out: &mut W) -> Result<Option<FeatureVector>> {
    let mut answers: HashMap<String, String> = HashMap::new();
    for name in prompt_order() {
        loop {
            write!(out, "{} [0.0]: ", label(name))?;
            out.flush()?;

            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let answer = line.trim();
            if answer.eq_ignore_ascii_case("q") {
                return Ok(None);
            }
            let answer = if answer.is_empty() { "0.0" } else { answer };
            match parse_value(name, answer) {
                Ok(_) => {
                    answers.insert(name.to_string(), answer.to_string());
                    break;
                }
                Err(e) => writeln!(out, "{}, try again", e)?,
            }
        }
    }
    FeatureVector::parse_map(&answers).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn answers(lines: &[&str]) -> Cursor<Vec<u8>> {
        Cursor::new(lines.join("\n").into_bytes())
    }

    #[test]
    fn test_prompt_order_covers_both_columns() {
        let order: Vec<&str> = prompt_order().collect();
        assert_eq!(order.len(), FEATURE_COLS.len());
        assert_eq!(&order[..2], &["temperature_c", "upstream_flow"]);
        assert_eq!(order[7], "humidity_pct");
    }

    #[test]
    fn test_read_features_blank_is_zero_and_bad_input_reprompts() {
        // First answer is rejected, then every prompt gets "2.5" except one blank
        let mut lines = vec!["soggy"];
        lines.extend(std::iter::repeat("2.5").take(FEATURE_COLS.len() - 1));
        lines.push("");
        let mut out = Vec::new();

        let features = read_features(&mut answers(&lines), &mut out).unwrap().unwrap();

        let last_prompted = prompt_order().last().unwrap();
        assert_eq!(features.get(last_prompted), Some(0.0));
        assert_eq!(features.get("temperature_c"), Some(2.5));
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("invalid feature 'temperature_c'"));
    }

    #[test]
    fn test_read_features_quit_and_end_of_input() {
        let mut out = Vec::new();
        assert!(read_features(&mut answers(&["1", "q"]), &mut out).unwrap().is_none());
        assert!(read_features(&mut answers(&["1", "2"]), &mut out).unwrap().is_none());
    }

    #[test]
    fn test_chart_defaults_into_artifact_dir() {
        let args = InteractiveArgs {
            artifacts: PathBuf::from("saved_model"),
            chart: None,
            no_chart: false,
        };
        assert_eq!(chart_path(&args), Some(PathBuf::from("saved_model").join(DEFAULT_CHART_FILE)));

        let args = InteractiveArgs {
            chart: Some(PathBuf::from("out/live.svg")),
            ..args
        };
        assert_eq!(chart_path(&args), Some(PathBuf::from("out/live.svg")));

        let args = InteractiveArgs { no_chart: true, ..args };
        assert_eq!(chart_path(&args), None);
    }
}
