//! ChurnForge: customer churn prediction with a random forest classifier
//!
//! This is the main entrypoint that orchestrates training (load, clean,
//! encode, fit, evaluate, persist) and single-record prediction.

use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use churnforge::cli::{BundleArgs, Command, PredictArgs, TrainArgs};
use churnforge::{clean_dataset, encode_features, load_artifacts, load_dataset, trainer, Args};
use tracing::Level;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    match &args.command {
        Command::Train(train_args) => run_training(&args, train_args),
        Command::Predict(predict_args) => run_prediction(&args, predict_args),
        Command::Features(bundle_args) => run_features(bundle_args),
    }
}

/// Run the full training pipeline and persist the artifact bundle
fn run_training(args: &Args, train_args: &TrainArgs) -> Result<()> {
    println!("=== Churn Model Training ===\n");

    let config = train_args.to_config();
    let paths = train_args.bundle.paths();
    let start_time = Instant::now();

    // Step 1: Load data
    if args.verbose {
        println!("Step 1: Loading data");
        println!("  Input file: {}", config.input.display());
    }
    let df = load_dataset(&config.input, &config.dataset)?;
    println!("✓ Data loaded: {} rows, {} columns", df.height(), df.width());

    // Step 2: Clean target, identifier and numeric columns
    if args.verbose {
        println!("\nStep 2: Cleaning target column '{}'", config.dataset.target);
    }
    let (df, cleaning) = clean_dataset(df, &config.dataset)?;
    println!("✓ Data cleaned: {} rows retained", cleaning.rows_retained);
    println!("  Dropped (unrecognized target): {}", cleaning.rows_unrecognized_target);
    println!("  Dropped (missing values): {}", cleaning.rows_with_missing_values);

    // Step 3: One-hot encode categorical columns
    if args.verbose {
        println!("\nStep 3: Encoding categorical variables");
    }
    let encoded = encode_features(&df, &config.dataset.target)?;
    println!(
        "✓ Features encoded: {} rows x {} features",
        encoded.n_rows(),
        encoded.n_features()
    );

    // Step 4: Split, scale, fit and evaluate
    if args.verbose {
        println!("\nStep 4: Training random forest");
        println!("  Trees: {}", config.n_trees);
        println!("  Test ratio: {}", config.test_ratio);
        println!("  Seed: {}", config.seed);
    }
    let model_start = Instant::now();
    let outcome = trainer::fit_encoded(encoded, cleaning, &config)?;
    println!(
        "✓ Model trained on {} rows, evaluated on {} rows",
        outcome.split.train.len(),
        outcome.split.test.len()
    );
    if args.verbose {
        println!("  Fitting time: {:.2}s", model_start.elapsed().as_secs_f64());
    }

    println!("\n=== Model Evaluation ===");
    println!("{}", outcome.report);
    println!("Accuracy: {:.4}", outcome.report.accuracy);

    println!("\n=== Top Features ===");
    for (name, importance) in outcome.top_features(10) {
        println!("{:<40} {:.4}", name, importance);
    }

    // Step 5: Persist artifacts
    outcome.bundle.save(&paths)?;

    println!("\n=== Training Complete ===");
    println!("Total processing time: {:.2}s", start_time.elapsed().as_secs_f64());
    println!("Model saved to: {}", paths.model.display());
    println!("Scaler saved to: {}", paths.scaler.display());
    println!("Feature list saved to: {}", paths.features.display());

    Ok(())
}

/// Score one customer with a saved bundle
fn run_prediction(args: &Args, predict_args: &PredictArgs) -> Result<()> {
    println!("=== Prediction Mode ===");

    let values = predict_args.parse_feature_values()?;
    let start_time = Instant::now();

    let paths = predict_args.bundle.paths();
    if args.verbose {
        println!("\nLoading artifacts from: {}", predict_args.bundle.artifacts_dir.display());
    }
    let bundle = load_artifacts(&paths)?;

    let provided = bundle.provided_features(&values);
    let missing = bundle.feature_names.len() - provided;
    if args.verbose {
        println!("Model expects {} features, {} provided", bundle.feature_names.len(), provided);
        if values.len() > provided {
            println!("Ignored {} unknown feature(s)", values.len() - provided);
        }
    }

    let prediction = bundle.predict(&values, predict_args.policy())?;

    println!(
        "\n✓ Prediction: {}",
        if prediction.is_churn() { "Churn" } else { "No Churn" }
    );
    println!("  Churn probability: {:.2} %", prediction.probability * 100.0);
    if missing > 0 {
        println!("  Features defaulted to 0: {}", missing);
    }
    println!("  Processing time: {:.2}s", start_time.elapsed().as_secs_f64());

    Ok(())
}

/// Print the features the bundle was trained on
fn run_features(bundle_args: &BundleArgs) -> Result<()> {
    let bundle = load_artifacts(&bundle_args.paths())?;

    println!("=== Model Features ({}) ===", bundle.feature_names.len());
    for (index, name) in bundle.feature_names.iter().enumerate() {
        println!("{:>3}. {}", index + 1, name);
    }

    Ok(())
}
