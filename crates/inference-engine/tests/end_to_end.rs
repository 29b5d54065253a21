use dataset::{Dataset, RawValue, TableNormalizer};
use feature_engine::{FallbackReason, TaskKind};
use inference_engine::{InferenceEngine, InferenceError};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use training_engine::{
    EngineConfig, ModelArtifact, ModelKind, ModelParameters, ModelPreference, PredictedValue,
    TrainingOutcome, TrainingPipeline, TrainingRequest,
};

fn pipeline() -> TrainingPipeline {
    TrainingPipeline::new(EngineConfig {
        n_estimators: 30,
        ..EngineConfig::default()
    })
}

/// 100 students, 50 of whom drop out; low attendance drives dropout
fn student_rows(with_leak: bool) -> Dataset {
    let rows: Vec<Vec<String>> = (0..100)
        .map(|i| {
            let dropout = i % 2;
            let age = 18 + (i * 7) % 8;
            let gender = if (i / 2) % 2 == 0 { "Male" } else { "Female" };
            let attendance = if dropout == 1 {
                50.0 + ((i * 13) % 25) as f64 + 0.5
            } else {
                72.0 + ((i * 11) % 25) as f64 + 0.25
            };
            let mut row = vec![
                age.to_string(),
                gender.to_string(),
                format!("{:.2}", attendance),
            ];
            if with_leak {
                row.push(dropout.to_string());
            }
            row.push(dropout.to_string());
            row
        })
        .collect();

    let headers: Vec<&str> = if with_leak {
        vec!["Age", "Gender", "Attendance", "Dropout_Flag", "Dropout"]
    } else {
        vec!["Age", "Gender", "Attendance", "Dropout"]
    };
    TableNormalizer::new().normalize(headers, rows)
}

fn dropout_outcome() -> &'static TrainingOutcome {
    static OUTCOME: OnceLock<TrainingOutcome> = OnceLock::new();
    OUTCOME.get_or_init(|| {
        pipeline()
            .run(student_rows(false), &TrainingRequest::default())
            .expect("training succeeds")
    })
}

fn row(pairs: &[(&str, RawValue)]) -> BTreeMap<String, RawValue> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn assert_binary_prediction(artifact: &ModelArtifact, input: &BTreeMap<String, RawValue>) {
    let result = InferenceEngine::new().predict(artifact, input).unwrap();
    let prediction = result.prediction;
    assert!(
        matches!(prediction.value, PredictedValue::Number(v) if v == 0.0 || v == 1.0),
        "unexpected value {:?}",
        prediction.value
    );
    let confidence = prediction.confidence.unwrap();
    assert!((0.0..=1.0).contains(&confidence));
}

#[test]
fn test_dropout_scenario() {
    let outcome = dropout_outcome();
    let artifact = &outcome.artifact;

    assert_eq!(artifact.task, TaskKind::BinaryClassification);
    assert_eq!(artifact.model_kind, ModelKind::LogisticRegression);
    assert_eq!(artifact.feature_order, vec!["Age", "Gender", "Attendance"]);
    assert_eq!(artifact.encoders.len(), 1);
    assert!(artifact.encoders["Gender"].is_categorical());
    assert!(artifact.is_binary);
    assert_eq!(artifact.rows_used, 100);

    let score = artifact.validation_score.unwrap();
    assert!((0.0..=1.0).contains(&score));

    let counts = outcome.summary.label_counts.as_ref().unwrap();
    assert_eq!(counts["0"], 50);
    assert_eq!(counts["1"], 50);
    assert_eq!(outcome.summary.label_ratio.as_ref().unwrap()["1"], 0.5);

    let input = row(&[
        ("Age", 20.0.into()),
        ("Gender", "Female".into()),
        ("Attendance", 95.0.into()),
    ]);
    assert_binary_prediction(artifact, &input);

    let result = InferenceEngine::new().predict(artifact, &input).unwrap();
    assert!(result.prediction.fallbacks.is_empty());
    assert_eq!(result.prediction.value, PredictedValue::Number(0.0));
    assert_eq!(result.prediction.target_name, "Dropout");
}

#[test]
fn test_cv_score_is_decoupled_from_refit() {
    let outcome = dropout_outcome();
    let summary = &outcome.summary;

    let defined: Vec<f64> = summary.fold_scores.iter().flatten().copied().collect();
    assert!(!defined.is_empty());
    let mean = defined.iter().sum::<f64>() / defined.len() as f64;
    assert!((summary.validation_score.unwrap() - mean).abs() < 1e-12);

    let coefficients = match &outcome.artifact.parameters {
        ModelParameters::Linear { coefficients, .. } => coefficients.clone(),
        other => panic!("expected linear parameters, got {:?}", other),
    };
    assert_eq!(outcome.artifact.rows_used, 100);
    for fold in &summary.folds {
        assert!(fold.train_rows < 100);
        assert_eq!(fold.train_rows + fold.test_rows, 100);
        assert_ne!(fold.coefficients.as_ref(), Some(&coefficients));
    }
}

#[test]
fn test_leaking_column_is_excluded_from_artifact() {
    let outcome = pipeline()
        .run(student_rows(true), &TrainingRequest::default())
        .unwrap();
    assert_eq!(outcome.summary.dropped_features, vec!["Dropout_Flag"]);
    assert!(!outcome
        .artifact
        .feature_order
        .contains(&"Dropout_Flag".to_string()));
    assert_eq!(outcome.artifact.feature_order.len(), 3);

    // The dropped column is ignored as an extra column at prediction time
    let input = row(&[
        ("Age", 19.0.into()),
        ("Gender", "Male".into()),
        ("Attendance", 60.0.into()),
        ("Dropout_Flag", 1.0.into()),
    ]);
    let result = InferenceEngine::new().predict(&outcome.artifact, &input).unwrap();
    assert!(result.prediction.fallbacks.is_empty());
}

#[test]
fn test_regression_round_trip_at_mean() {
    let rows: Vec<Vec<String>> = (0..80)
        .map(|i| {
            let hours = (i % 10) as f64;
            let sleep = 5.0 + (i % 4) as f64;
            let noise = ((i * 37) % 7) as f64 - 3.0;
            let score = (8.0 * hours + 2.0 * sleep + noise).clamp(0.0, 100.0);
            vec![hours.to_string(), sleep.to_string(), score.to_string()]
        })
        .collect();
    let dataset = TableNormalizer::new().normalize(["Hours", "Sleep", "Score"], rows.clone());

    let outcome = pipeline().run(dataset, &TrainingRequest::default()).unwrap();
    assert_eq!(outcome.artifact.task, TaskKind::Regression);
    assert_eq!(outcome.artifact.model_kind, ModelKind::LinearRegression);

    let column_mean = |j: usize| -> f64 {
        rows.iter().map(|r| r[j].parse::<f64>().unwrap()).sum::<f64>() / rows.len() as f64
    };
    let scores: Vec<f64> = rows.iter().map(|r| r[2].parse().unwrap()).collect();
    let (lo, hi) = scores
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), s| (lo.min(*s), hi.max(*s)));

    let input = row(&[("Hours", column_mean(0).into()), ("Sleep", column_mean(1).into())]);
    let result = InferenceEngine::new().predict(&outcome.artifact, &input).unwrap();
    match result.prediction.value {
        PredictedValue::Number(v) => {
            assert!(v >= lo - 1e-6 && v <= hi + 1e-6, "{} outside [{}, {}]", v, lo, hi);
            let mean_score = scores.iter().sum::<f64>() / scores.len() as f64;
            assert!((v - mean_score).abs() < 1e-6);
        }
        other => panic!("expected a number, got {:?}", other),
    }
    assert!(result.prediction.confidence.is_none());
}

#[test]
fn test_forest_predicts_original_labels() {
    let rows: Vec<Vec<String>> = (0..90)
        .map(|i| {
            let band = i % 3;
            let score = band as f64 * 30.0 + (i % 10) as f64;
            let label = ["Fail", "Pass", "Merit"][band];
            vec![score.to_string(), (i % 5).to_string(), label.to_string()]
        })
        .collect();
    let dataset = TableNormalizer::new().normalize(["Score", "Club", "Result"], rows);

    let outcome = pipeline().run(dataset, &TrainingRequest::default()).unwrap();
    let artifact = &outcome.artifact;
    assert_eq!(artifact.model_kind, ModelKind::RandomForest);
    assert_eq!(
        artifact.target_classes,
        Some(vec!["Fail".to_string(), "Merit".to_string(), "Pass".to_string()])
    );

    let input = row(&[("Score", 65.0.into()), ("Club", 2.0.into())]);
    let prediction = InferenceEngine::new().predict(artifact, &input).unwrap().prediction;
    assert_eq!(prediction.value, PredictedValue::Label("Merit".to_string()));
    let confidence = prediction.confidence.unwrap();
    assert!(confidence > 1.0 / 3.0 && confidence <= 1.0);
}

#[test]
fn test_rf_request_on_binary_target() {
    let request = TrainingRequest {
        model: ModelPreference::RandomForest,
        ..TrainingRequest::default()
    };
    let outcome = pipeline().run(student_rows(false), &request).unwrap();
    assert_eq!(outcome.artifact.model_kind, ModelKind::RandomForest);
    assert!(outcome.summary.folds.iter().all(|f| f.coefficients.is_none()));

    let input = row(&[
        ("Age", 20.0.into()),
        ("Gender", "Female".into()),
        ("Attendance", 95.0.into()),
    ]);
    assert_binary_prediction(&outcome.artifact, &input);
}

#[test]
fn test_corrupt_ensemble_blob() {
    let mut artifact = dropout_outcome().artifact.clone();
    artifact.model_kind = ModelKind::RandomForest;
    artifact.parameters = ModelParameters::Ensemble { blob: vec![9, 9, 9] };
    let err = InferenceEngine::new()
        .predict(&artifact, &BTreeMap::new())
        .unwrap_err();
    assert!(matches!(err, InferenceError::CorruptArtifact(_)));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_unseen_category_maps_to_zero(gender in "[a-z]{3,12}", age in proptest::option::of(0.0f64..100.0)) {
        let artifact = &dropout_outcome().artifact;
        let mut input = row(&[("Gender", gender.as_str().into()), ("Attendance", "n/a".into())]);
        if let Some(age) = age {
            input.insert("Age".to_string(), age.into());
        }

        let prediction = InferenceEngine::new().predict(artifact, &input).unwrap().prediction;
        prop_assert_eq!(prediction.input_vector["Gender"], 0.0);
        prop_assert_eq!(prediction.input_vector["Attendance"], 0.0);
        let has_unseen_gender_fallback = prediction.fallbacks.iter().any(|f| f.column == "Gender"
            && matches!(f.reason, FallbackReason::UnseenCategory { .. }));
        prop_assert!(has_unseen_gender_fallback);
        let confidence = prediction.confidence.unwrap();
        prop_assert!((0.0..=1.0).contains(&confidence));
    }
}
