//! End-to-end flow: JSON run records through preprocessing, a dataset-level
//! split, model fitting and evaluation.

use ndarray::{array, Array1, Array2};
use pipeline_dna::config::{DnaConfig, LoaderConfig, ModelConfig, ModelKind};
use pipeline_dna::data::{split_by_group, Instance, Preprocessor, RecordSchema, DATASET_KEY};
use pipeline_dna::engine::{Activation, DagExecutor, LinearUnit, ReductionPolicy, UnitRegistry};
use pipeline_dna::metrics::{rmse, spearman_correlation};
use pipeline_dna::model::{build_model, DagRegressor, PerformanceModel};
use pipeline_dna::pipeline::{Pipeline, Step};
use serde_json::{json, Value};

fn run_records() -> Vec<Value> {
    let pipelines = [
        json!({
            "id": "impute-svc",
            "steps": [
                {"name": "imputer", "inputs": ["inputs.0"]},
                {"name": "svc", "inputs": ["steps.0.produce"]}
            ]
        }),
        json!({
            "id": "impute-scale-svc",
            "steps": [
                {"name": "imputer", "inputs": ["inputs.0"]},
                {"name": "scaler", "inputs": [0]},
                {"name": "svc", "inputs": [0, 1]}
            ]
        }),
        json!({
            "id": "scale-knn",
            "steps": [
                {"name": "scaler", "inputs": ["inputs.0"]},
                {"name": "knn", "inputs": [0]}
            ]
        }),
    ];

    let mut records = Vec::new();
    for dataset in 0..6 {
        for (p, pipeline) in pipelines.iter().enumerate() {
            let d = dataset as f64;
            records.push(json!({
                "dataset_id": format!("ds{}", dataset),
                "metafeatures": {
                    "n_rows": 100.0 * (d + 1.0),
                    "n_cols": 4.0 + d,
                    "constant": 1.0,
                    "sometimes_missing": if p == 1 { Value::Null } else { json!(d) }
                },
                "test_f1_macro": 0.5 + 0.05 * p as f64 + 0.01 * d,
                "pipeline": pipeline,
                "source": "unit-test"
            }));
        }
    }
    records
}

fn config() -> DnaConfig {
    DnaConfig::default()
        .with_loader(LoaderConfig::default().with_batch_size(4).with_seed(11))
        .with_model(ModelConfig::default().with_hidden_width(8).with_seed(3))
}

fn prepare() -> (Vec<Instance>, Vec<Instance>) {
    let (train_json, test_json) = split_by_group(&run_records(), DATASET_KEY, 2, 19).unwrap();
    let schema = RecordSchema::default();
    let train_records = schema.parse_all(&train_json).unwrap();
    let test_records = schema.parse_all(&test_json).unwrap();

    let mut preprocessor = Preprocessor::new();
    let train = preprocessor.fit_transform(&train_records).unwrap();
    let test = preprocessor.transform(&test_records).unwrap();
    (train, test)
}

#[test]
fn test_split_keeps_datasets_apart() {
    let (train, test) = prepare();
    assert_eq!(train.len(), 12);
    assert_eq!(test.len(), 6);
    for instance in &test {
        assert!(
            train.iter().all(|t| t.dataset_id() != instance.dataset_id()),
            "dataset {} appears on both sides",
            instance.dataset_id()
        );
    }
}

#[test]
fn test_preprocessing_drops_incomplete_and_constant_columns() {
    let records = RecordSchema::default().parse_all(&run_records()).unwrap();
    let mut preprocessor = Preprocessor::new();
    let instances = preprocessor.fit_transform(&records).unwrap();

    assert_eq!(preprocessor.feature_names().unwrap(), ["n_cols", "n_rows"]);
    assert!(instances.iter().all(|i| i.feature_width() == 2));
    assert_eq!(
        instances[0].attributes().get("source"),
        Some(&json!("unit-test"))
    );
}

#[test]
fn test_dag_regressor_fit_and_predict() {
    let (train, test) = prepare();
    let mut model = DagRegressor::new(&config()).unwrap();
    let summary = model.fit(&train).unwrap();

    assert_eq!(summary.instances, 12);
    assert_eq!(summary.groups, 3);
    // imputer, scaler, svc, knn
    assert_eq!(summary.primitives, 4);
    assert!(summary.train_rmse.is_finite());

    let predictions = model.predict(&test).unwrap();
    assert_eq!(predictions.len(), test.len());
    assert!(predictions.iter().all(|p| p.is_finite()));

    let targets: Vec<f64> = test.iter().map(Instance::target).collect();
    assert!(rmse(&predictions, &targets).unwrap().is_finite());
    let correlation = spearman_correlation(&predictions, &targets).unwrap_or(0.0);
    assert!((-1.0..=1.0).contains(&correlation));

    let mut again = DagRegressor::new(&config()).unwrap();
    again.fit(&train).unwrap();
    assert_eq!(again.predict(&test).unwrap(), predictions);
}

#[test]
fn test_prediction_order_follows_input_order() {
    let (train, test) = prepare();
    let mut model = DagRegressor::new(&config()).unwrap();
    model.fit(&train).unwrap();

    let forward = model.predict(&test).unwrap();
    let reversed: Vec<Instance> = test.iter().rev().cloned().collect();
    let mut backward = model.predict(&reversed).unwrap();
    backward.reverse();
    for (a, b) in forward.iter().zip(&backward) {
        assert!((a - b).abs() < 1e-12, "{} != {}", a, b);
    }
}

#[test]
fn test_model_kind_selects_regressor() {
    let (train, test) = prepare();
    let mut flat_config = config();
    flat_config.model = flat_config.model.with_kind(ModelKind::Flat);

    let mut flat = build_model(&flat_config).unwrap();
    let mut dag = build_model(&config()).unwrap();
    assert_eq!(flat.name(), "FlatRegressor");
    assert_eq!(dag.name(), "DagRegressor");

    flat.fit(&train).unwrap();
    dag.fit(&train).unwrap();
    let ranked = dag.predict_rank(&test).unwrap();
    let mut ranks: Vec<usize> = ranked.iter().map(|r| r.rank).collect();
    ranks.sort_unstable();
    assert_eq!(ranks, (0..test.len()).collect::<Vec<_>>());
    assert_eq!(flat.predict(&test).unwrap().len(), test.len());
}

#[test]
fn test_config_round_trips_through_yaml() {
    let yaml = "loader:\n  batch_size: 4\n  seed: 11\nmodel:\n  reduction: mean\n  hidden_width: 8\n";
    let parsed = DnaConfig::from_yaml_str(yaml).unwrap();
    assert_eq!(parsed.loader.batch_size, 4);
    assert_eq!(parsed.model.reduction, ReductionPolicy::Mean);
    assert_eq!(DnaConfig::from_yaml_str(&parsed.to_yaml().unwrap()).unwrap(), parsed);
}

#[test]
fn test_chain_composes_units_in_order() {
    // x -> f -> g with f(x) = 2x + 1 and g(y) = -y, identity activation.
    let pipeline = Pipeline::new("chain", vec![Step::external("f"), Step::from_steps("g", &[0])]);
    let mut registry = UnitRegistry::new();
    registry.register(
        "f",
        Box::new(LinearUnit::from_parts("f", array![[2.0]], Array1::from(vec![1.0])).unwrap()),
    );
    registry.register(
        "g",
        Box::new(LinearUnit::from_parts("g", array![[-1.0]], Array1::zeros(1)).unwrap()),
    );

    let executor = DagExecutor::new(ReductionPolicy::Max, Activation::Identity);
    let input: Array2<f64> = array![[0.0], [1.0], [-2.5]];
    let output = executor.evaluate(&registry, &pipeline, input.view()).unwrap();
    assert_eq!(output, array![[-1.0], [-3.0], [4.0]]);
}
