//! Command-line interface definitions and argument parsing

use std::collections::HashMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{
    ArtifactPaths, DatasetConfig, TrainConfig, DEFAULT_ID_COLUMN, DEFAULT_NEGATIVE_LABEL,
    DEFAULT_NUMERIC_COLUMN, DEFAULT_POSITIVE_LABEL, DEFAULT_SEED, DEFAULT_TARGET,
    DEFAULT_TEST_RATIO, DEFAULT_TREES,
};
use crate::predictor::MissingFeaturePolicy;

/// Customer churn prediction CLI using a random forest classifier
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Train on a labeled CSV and write the artifact bundle
    Train(TrainArgs),
    /// Score one customer with a saved artifact bundle
    Predict(PredictArgs),
    /// List the features a saved artifact bundle expects, in order
    Features(BundleArgs),
}

/// Location of the artifact bundle
#[derive(clap::Args, Debug, Clone)]
pub struct BundleArgs {
    /// Directory holding churn_model.json, churn_scaler.json and churn_features.json
    #[arg(short, long, default_value = ".")]
    pub artifacts_dir: PathBuf,
}

impl BundleArgs {
    pub fn paths(&self) -> ArtifactPaths {
        ArtifactPaths::in_dir(&self.artifacts_dir)
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct TrainArgs {
    /// Path to the labeled CSV file
    #[arg(short, long, default_value = "WA_Fn-UseC_-Telco-Customer-Churn.csv")]
    pub input: PathBuf,

    #[command(flatten)]
    pub bundle: BundleArgs,

    /// Target column holding the churn label
    #[arg(long, default_value = DEFAULT_TARGET)]
    pub target: String,

    /// Target value meaning churn
    #[arg(long, default_value = DEFAULT_POSITIVE_LABEL)]
    pub positive_label: String,

    /// Target value meaning no churn
    #[arg(long, default_value = DEFAULT_NEGATIVE_LABEL)]
    pub negative_label: String,

    /// Identifier column dropped before training
    #[arg(long, default_value = DEFAULT_ID_COLUMN)]
    pub id_column: String,

    /// Keep every column instead of dropping the identifier column
    #[arg(long)]
    pub no_id_column: bool,

    /// Text column coerced to a number; blank cells drop the row
    #[arg(long, default_value = DEFAULT_NUMERIC_COLUMN)]
    pub numeric_column: String,

    /// Skip the numeric coercion step
    #[arg(long)]
    pub no_numeric_column: bool,

    /// Fraction of each class held out for evaluation
    #[arg(long, default_value_t = DEFAULT_TEST_RATIO)]
    pub test_ratio: f64,

    /// Number of trees in the forest
    #[arg(short = 'n', long, default_value_t = DEFAULT_TREES)]
    pub trees: usize,

    /// Seed for the split and the forest
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Maximum tree depth (unbounded when omitted)
    #[arg(long)]
    pub max_depth: Option<usize>,
}

impl TrainArgs {
    pub fn to_config(&self) -> TrainConfig {
        TrainConfig {
            dataset: DatasetConfig {
                target: self.target.clone(),
                positive_label: self.positive_label.clone(),
                negative_label: self.negative_label.clone(),
                id_column: (!self.no_id_column).then(|| self.id_column.clone()),
                numeric_column: (!self.no_numeric_column).then(|| self.numeric_column.clone()),
            },
            test_ratio: self.test_ratio,
            seed: self.seed,
            n_trees: self.trees,
            max_depth: self.max_depth,
            ..TrainConfig::new(&self.input)
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct PredictArgs {
    #[command(flatten)]
    pub bundle: BundleArgs,

    /// One feature value as NAME=VALUE; repeat for more features
    #[arg(short, long = "set", value_name = "NAME=VALUE")]
    pub set: Vec<String>,

    /// Feature values as a comma-separated list
    /// Example: --values "tenure=12,MonthlyCharges=70.5"
    #[arg(long)]
    pub values: Option<String>,

    /// Fail instead of treating features absent from the input as 0
    #[arg(long)]
    pub strict: bool,
}

impl PredictArgs {
    pub fn policy(&self) -> MissingFeaturePolicy {
        if self.strict {
            MissingFeaturePolicy::Reject
        } else {
            MissingFeaturePolicy::Zero
        }
    }

    /// Collect feature values from `--set` and `--values`; later entries win
    pub fn parse_feature_values(&self) -> crate::Result<HashMap<String, f64>> {
        let listed = self
            .values
            .iter()
            .flat_map(|values| values.split(','))
            .filter(|pair| !pair.trim().is_empty());

        self.set
            .iter()
            .map(String::as_str)
            .chain(listed)
            .map(parse_pair)
            .collect()
    }
}

fn parse_pair(pair: &str) -> crate::Result<(String, f64)> {
    let (name, value) = pair
        .rsplit_once('=')
        .ok_or_else(|| anyhow::anyhow!("Feature values must be in format 'name=value': {pair}"))?;

    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("Missing feature name in: {pair}");
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid value for {name}: {value}"))?;

    Ok((name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn predict_args(set: &[&str], values: Option<&str>) -> PredictArgs {
        PredictArgs {
            bundle: BundleArgs {
                artifacts_dir: PathBuf::from("."),
            },
            set: set.iter().map(|s| s.to_string()).collect(),
            values: values.map(str::to_string),
            strict: false,
        }
    }

    #[test]
    fn test_parse_feature_values() {
        let args = predict_args(&["tenure=12", "Contract_One year = 1"], Some("MonthlyCharges=70.5, TotalCharges=846"));
        let values = args.parse_feature_values().unwrap();

        assert_eq!(values.len(), 4);
        assert_eq!(values["tenure"], 12.0);
        assert_eq!(values["Contract_One year"], 1.0);
        assert_eq!(values["MonthlyCharges"], 70.5);
        assert_eq!(values["TotalCharges"], 846.0);

        let args = predict_args(&[], None);
        assert!(args.parse_feature_values().unwrap().is_empty());

        let args = predict_args(&["invalid"], None);
        assert!(args.parse_feature_values().is_err());

        let args = predict_args(&["tenure=twelve"], None);
        assert!(args.parse_feature_values().is_err());
    }

    #[test]
    fn test_train_defaults() {
        let args = Args::try_parse_from(["churnforge", "train"]).unwrap();
        let Command::Train(train) = args.command else {
            panic!("expected train command");
        };
        let config = train.to_config();

        assert_eq!(config, TrainConfig::new("WA_Fn-UseC_-Telco-Customer-Churn.csv"));
        assert_eq!(train.bundle.paths(), ArtifactPaths::default());
    }

    #[test]
    fn test_train_overrides() {
        let args = Args::try_parse_from([
            "churnforge",
            "train",
            "--input",
            "customers.csv",
            "--no-id-column",
            "--trees",
            "10",
            "--max-depth",
            "6",
            "-v",
        ])
        .unwrap();
        assert!(args.verbose);
        let Command::Train(train) = args.command else {
            panic!("expected train command");
        };
        let config = train.to_config();

        assert_eq!(config.input, PathBuf::from("customers.csv"));
        assert_eq!(config.dataset.id_column, None);
        assert_eq!(config.dataset.numeric_column.as_deref(), Some("TotalCharges"));
        assert_eq!(config.n_trees, 10);
        assert_eq!(config.max_depth, Some(6));
    }

    #[test]
    fn test_strict_selects_reject_policy() {
        let args = Args::try_parse_from(["churnforge", "predict", "--strict", "-s", "tenure=3"]).unwrap();
        let Command::Predict(predict) = args.command else {
            panic!("expected predict command");
        };

        assert_eq!(predict.policy(), MissingFeaturePolicy::Reject);
        assert_eq!(predict.set, vec!["tenure=3"]);
    }
}
