//! End-to-end tests on a synthetic census-like dataset

use census_logit::data::{class_proportions, Column};
use census_logit::utils::{Config, ModelConfig};
use census_logit::Pipeline;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fmt::Write as _;
use std::path::Path;

const NAMES: &str = "\
| Synthetic census metadata

>50K, <=50K.

age: continuous.
workclass: Private, Self-emp, Gov.
fnlwgt: continuous.
education: Bachelors, HS-grad, Masters.
education-num: continuous.
marital-status: Married-civ-spouse, Never-married, Divorced.
occupation: Tech-support, Sales, Craft-repair.
relationship: Husband, Wife, Unmarried.
race: White, Black, Other.
sex: Female, Male.
capital-gain: continuous.
capital-loss: continuous.
hours-per-week: continuous.
native-country: United-States, Other.
";

struct Generated {
    rows: usize,
    with_missing: usize,
    over_sentinel: usize,
}

fn pick<'a>(rng: &mut ChaCha8Rng, options: &[&'a str]) -> &'a str {
    options[rng.gen_range(0..options.len())]
}

/// Write a seeded census-like data file with a logistic outcome
fn write_data(path: &Path, rows: usize, seed: u64) -> Generated {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut out = String::from("|1x3 Synthetic records\n");
    let mut with_missing = 0;
    let mut over_sentinel = 0;

    for i in 0..rows {
        let age: i32 = rng.gen_range(17..=80);
        let education_num: i32 = rng.gen_range(5..=16);
        let hours: i32 = rng.gen_range(10..=70);
        let male = rng.gen_bool(0.6);
        let married = rng.gen_bool(0.45);
        let mut gain: i32 = if rng.gen_bool(0.08) {
            rng.gen_range(1000..20000)
        } else {
            0
        };

        let score = -7.5
            + 0.04 * age as f64
            + 0.3 * education_num as f64
            + 0.7 * male as i32 as f64
            + 1.2 * married as i32 as f64
            + 0.03 * hours as f64
            + 0.0002 * gain as f64;
        let p = 1.0 / (1.0 + (-score).exp());
        let rich = rng.gen::<f64>() < p;

        let mut workclass = pick(&mut rng, &["Private", "Self-emp", "Gov"]);
        let mut occupation = pick(&mut rng, &["Tech-support", "Sales", "Craft-repair"]);
        let missing = i % 29 == 3 || i % 31 == 5;
        if i % 29 == 3 {
            workclass = "?";
        }
        if i % 31 == 5 {
            occupation = "?";
        }
        if missing {
            with_missing += 1;
        } else if i % 97 == 11 {
            gain = 99999;
            over_sentinel += 1;
        }

        let marital = if married {
            "Married-civ-spouse"
        } else {
            pick(&mut rng, &["Never-married", "Divorced"])
        };
        let label = match (rich, i % 5 == 0) {
            (true, false) => ">50K",
            (true, true) => ">50K.",
            (false, false) => "<=50K",
            (false, true) => "<=50K.",
        };

        writeln!(
            out,
            "{}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}",
            age,
            workclass,
            rng.gen_range(20000..400000),
            pick(&mut rng, &["Bachelors", "HS-grad", "Masters"]),
            education_num,
            marital,
            occupation,
            pick(&mut rng, &["Husband", "Wife", "Unmarried"]),
            pick(&mut rng, &["White", "Black", "Other"]),
            if male { "Male" } else { "Female" },
            gain,
            if rng.gen_bool(0.05) { 1500 } else { 0 },
            hours,
            pick(&mut rng, &["United-States", "Other"]),
            label
        )
        .unwrap();
        if i % 50 == 49 {
            out.push('\n');
        }
    }

    std::fs::write(path, out).unwrap();
    Generated {
        rows,
        with_missing,
        over_sentinel,
    }
}

fn setup(dir: &Path, rows: usize) -> (Config, Generated) {
    let names_path = dir.join("adult.names");
    let data_path = dir.join("adult.data");
    std::fs::write(&names_path, NAMES).unwrap();
    let generated = write_data(&data_path, rows, 2024);

    let mut config = Config::default();
    config.data.names_path = names_path;
    config.data.data_path = data_path;
    config.cv.folds = 5;
    (config, generated)
}

#[test]
fn test_cleaned_outcome_has_two_levels_without_missing() {
    let dir = tempfile::tempdir().unwrap();
    let (config, generated) = setup(dir.path(), 600);
    let pipeline = Pipeline::new(config);

    let prepared = pipeline.prepare(pipeline.load().unwrap()).unwrap();
    let report = &prepared.cleaning;

    assert_eq!(report.rows_loaded, generated.rows);
    assert_eq!(report.rows_with_missing, generated.with_missing);
    assert_eq!(report.rows_over_sentinel, generated.over_sentinel);
    assert_eq!(
        report.rows_remaining,
        generated.rows - generated.with_missing - generated.over_sentinel
    );
    assert_eq!(report.outcome_levels, vec!["X_50K", "X__50K"]);

    let income: &Column = prepared.frame.column("income").unwrap();
    assert_eq!(income.levels().unwrap().len(), 2);
    assert_eq!(income.n_missing(), 0);

    for dropped in ["fnlwgt", "education", "relationship", "capital_loss", "native_country"] {
        assert!(!prepared.frame.contains(dropped));
    }
    assert!(prepared.frame.contains("education_num"));
    assert!(prepared.frame.missing_counts().iter().all(|(_, n)| *n == 0));
}

#[test]
fn test_split_preserves_class_proportions() {
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = setup(dir.path(), 600);
    let pipeline = Pipeline::new(config);
    let prepared = pipeline.prepare(pipeline.load().unwrap()).unwrap();

    let overall = class_proportions(&prepared.frame, "income").unwrap();
    let train = class_proportions(&prepared.train, "income").unwrap();
    let test = class_proportions(&prepared.test, "income").unwrap();

    for ((o, tr), te) in overall.iter().zip(&train).zip(&test) {
        assert_eq!(o.0, tr.0);
        assert!((o.1 - tr.1).abs() < 0.01, "train share {} vs {}", tr.1, o.1);
        assert!((o.1 - te.1).abs() < 0.02, "test share {} vs {}", te.1, o.1);
    }
}

#[test]
fn test_partitions_are_disjoint_and_cover() {
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = setup(dir.path(), 600);
    let pipeline = Pipeline::new(config);
    let prepared = pipeline.prepare(pipeline.load().unwrap()).unwrap();

    let n = prepared.frame.n_rows();
    let mut seen = vec![0usize; n];
    for &i in prepared
        .split
        .train_indices
        .iter()
        .chain(&prepared.split.test_indices)
    {
        seen[i] += 1;
    }
    assert!(seen.iter().all(|&c| c == 1));
    assert_eq!(prepared.train.n_rows() + prepared.test.n_rows(), n);

    let expected_train = (n as f64 * 0.8) as usize;
    assert!(prepared.train.n_rows().abs_diff(expected_train) <= 2);
}

#[test]
fn test_same_seed_same_split() {
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = setup(dir.path(), 600);

    let first = Pipeline::new(config.clone());
    let a = first.prepare(first.load().unwrap()).unwrap();
    let b = first.prepare(first.load().unwrap()).unwrap();
    assert_eq!(a.split, b.split);

    let mut reseeded = config;
    reseeded.split.seed += 1;
    let other = Pipeline::new(reseeded);
    let c = other.prepare(other.load().unwrap()).unwrap();
    assert_ne!(a.split, c.split);
}

#[test]
fn test_full_run_with_default_models() {
    let dir = tempfile::tempdir().unwrap();
    let (mut config, _) = setup(dir.path(), 800);
    let roc_dir = dir.path().join("roc");
    config.report.roc_csv_dir = Some(roc_dir.clone());

    let report = Pipeline::new(config).run().unwrap();

    assert_eq!(report.models.len(), 2);
    let small = &report.models[0];
    let large = &report.models[1];
    assert_eq!(small.name, "small");
    assert!(large.fit.coefficients.len() > small.fit.coefficients.len());
    assert!(large
        .fit
        .coefficients
        .iter()
        .any(|c| c.name == "sexMale:hours_per_week"));
    assert!(large.fit.coefficients.iter().any(|c| c.name == "I(age^2)"));

    for model in &report.models {
        assert!(model.fit.converged);
        assert_eq!(model.cv.folds.len(), 5);
        assert!(model.cv.roc.mean > 0.6, "cv roc {}", model.cv.roc.mean);
        assert!(model.test_roc.auc > 0.6, "test auc {}", model.test_roc.auc);
        assert_eq!(
            model.test_metrics.confusion_matrix.total(),
            report.split.n_test
        );
        assert!(roc_dir.join(format!("roc_{}.csv", model.name)).exists());
    }

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["models"].as_array().unwrap().len(), 2);
    assert!(report.render().contains("Model Comparison"));
}

#[test]
fn test_custom_formula_and_bad_formula() {
    let dir = tempfile::tempdir().unwrap();
    let (mut config, _) = setup(dir.path(), 400);
    config.models = vec![ModelConfig {
        name: "age_only".to_string(),
        formula: "income ~ age + I(age^2)".to_string(),
    }];
    let report = Pipeline::new(config.clone()).run().unwrap();
    assert_eq!(report.models[0].fit.coefficients.len(), 3);

    config.models[0].formula = "income ~ age + height".to_string();
    assert!(Pipeline::new(config).run().is_err());
}
