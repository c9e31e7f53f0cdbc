//! End-to-end validation runs against DataFusion-backed sources.

use arrow::array::{Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema};
use arrow::record_batch::RecordBatch;
use drift_guard::checks::CheckKind;
use drift_guard::prelude::*;
use drift_guard::schema::FieldRule;
use drift_guard::sources::DataFusionAdapter;
use std::fs::File;
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;

fn user_schema(strict: bool) -> SchemaDefinition {
    SchemaDefinition::builder()
        .rule(FieldRule::new("user_id").typed(FieldType::Integer).required())
        .rule(
            FieldRule::new("user_tier")
                .typed(FieldType::String)
                .allowed_values(["FREE", "PREMIUM"]),
        )
        .strict_mode(strict)
        .build()
        .unwrap()
}

fn users_batch(extra_column: bool) -> RecordBatch {
    let mut fields = vec![
        Field::new("user_id", DataType::Int64, false),
        Field::new("user_tier", DataType::Utf8, true),
    ];
    if extra_column {
        fields.push(Field::new("marketing_consent", DataType::Utf8, true));
    }
    let schema = Arc::new(ArrowSchema::new(fields));

    let mut columns: Vec<Arc<dyn arrow::array::Array>> = vec![
        Arc::new(Int64Array::from(vec![1, 2, 3])),
        Arc::new(StringArray::from(vec![
            Some("FREE"),
            Some("PREMIUM"),
            Some("PREMIUM_PLUS"),
        ])),
    ];
    if extra_column {
        columns.push(Arc::new(StringArray::from(vec![
            Some("yes"),
            Some("no"),
            Some("yes"),
        ])));
    }
    RecordBatch::try_new(schema, columns).unwrap()
}

fn clean_users_batch() -> RecordBatch {
    let schema = Arc::new(ArrowSchema::new(vec![
        Field::new("user_id", DataType::Int64, false),
        Field::new("user_tier", DataType::Utf8, true),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![1, 2])),
            Arc::new(StringArray::from(vec![Some("FREE"), Some("PREMIUM")])),
        ],
    )
    .unwrap()
}

#[tokio::test]
async fn scenario_a_enum_violation_fails_the_field() {
    let adapter = DataFusionAdapter::from_batches(vec![users_batch(false)]).unwrap();
    let report = Validator::new()
        .run(&user_schema(false), &adapter)
        .await
        .unwrap();

    let tier = &report.fields["user_tier"];
    assert_eq!(tier.status, CheckStatus::Fail);

    let enum_check = tier
        .checks
        .iter()
        .find(|c| c.rule == CheckKind::Enum)
        .expect("enum check present");
    assert_eq!(enum_check.status, CheckStatus::Fail);
    assert!(enum_check.violations >= 1);

    assert_eq!(report.status, CheckStatus::Fail);
    assert_eq!(report.exit_code(), EXIT_DRIFT);
}

#[tokio::test]
async fn scenario_b_strict_mode_reports_extra_columns() {
    let adapter = DataFusionAdapter::from_batches(vec![users_batch(true)]).unwrap();
    let report = Validator::new()
        .run(&user_schema(true), &adapter)
        .await
        .unwrap();

    assert_eq!(report.schema_extras, vec!["marketing_consent".to_string()]);
    assert_eq!(report.status, CheckStatus::Fail);
}

#[tokio::test]
async fn scenario_d_missing_column_skips_dependents() {
    let schema = SchemaDefinition::builder()
        .rule(FieldRule::new("user_id").typed(FieldType::Integer).required())
        .rule(
            FieldRule::new("signup_score")
                .typed(FieldType::Float)
                .required(),
        )
        .build()
        .unwrap();

    let adapter = DataFusionAdapter::from_batches(vec![clean_users_batch()]).unwrap();
    let report = Validator::new().run(&schema, &adapter).await.unwrap();

    let missing = &report.fields["signup_score"];
    assert_eq!(missing.status, CheckStatus::Fail);
    for check in &missing.checks {
        match check.rule {
            CheckKind::Exists => assert_eq!(check.status, CheckStatus::Fail),
            CheckKind::Type | CheckKind::NotNull => {
                assert_eq!(check.status, CheckStatus::Skipped)
            }
            other => panic!("unexpected check {other}"),
        }
    }

    // The present field is unaffected.
    assert_eq!(report.fields["user_id"].status, CheckStatus::Pass);
}

#[tokio::test]
async fn clean_source_passes_with_exit_zero() {
    let adapter = DataFusionAdapter::from_batches(vec![clean_users_batch()]).unwrap();
    let outcome = Validator::new().run(&user_schema(true), &adapter).await;
    let report = outcome.as_ref().unwrap();

    assert_eq!(report.status, CheckStatus::Pass);
    assert!(report.schema_extras.is_empty());
    assert_eq!(report.summary.failed, 0);
    assert_eq!(report.summary.skipped, 0);
    assert_eq!(exit_code(&outcome), EXIT_PASS);
}

#[tokio::test]
async fn non_strict_mode_never_populates_extras() {
    let adapter = DataFusionAdapter::from_batches(vec![users_batch(true)]).unwrap();
    let schema = SchemaDefinition::builder()
        .rule(FieldRule::new("user_id").typed(FieldType::Integer).required())
        .build()
        .unwrap();
    let report = Validator::new().run(&schema, &adapter).await.unwrap();

    assert!(report.schema_extras.is_empty());
    assert_eq!(report.status, CheckStatus::Pass);
}

#[tokio::test]
async fn repeated_runs_yield_byte_identical_reports() {
    let schema = user_schema(true);
    let validator = Validator::new();

    let first = {
        let adapter = DataFusionAdapter::from_batches(vec![users_batch(true)]).unwrap();
        validator.run(&schema, &adapter).await.unwrap()
    };
    let second = {
        let adapter = DataFusionAdapter::from_batches(vec![users_batch(true)]).unwrap();
        validator.run(&schema, &adapter).await.unwrap()
    };

    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

#[tokio::test]
async fn range_and_pattern_checks_push_down() {
    let schema = SchemaDefinition::builder()
        .rule(
            FieldRule::new("age")
                .typed(FieldType::Integer)
                .min(0.0)
                .max(120.0),
        )
        .rule(
            FieldRule::new("email")
                .typed(FieldType::String)
                .pattern("^[^@]+@[^@]+$"),
        )
        .build()
        .unwrap();

    let arrow_schema = Arc::new(ArrowSchema::new(vec![
        Field::new("age", DataType::Int64, true),
        Field::new("email", DataType::Utf8, true),
    ]));
    let batch = RecordBatch::try_new(
        arrow_schema,
        vec![
            Arc::new(Int64Array::from(vec![Some(30), Some(150), None])),
            Arc::new(StringArray::from(vec![
                Some("a@example.com"),
                Some("not-an-email"),
                None,
            ])),
        ],
    )
    .unwrap();

    let adapter = DataFusionAdapter::from_batches(vec![batch]).unwrap();
    let report = Validator::new().run(&schema, &adapter).await.unwrap();

    let range = report.fields["age"]
        .checks
        .iter()
        .find(|c| c.rule == CheckKind::Range)
        .unwrap();
    assert_eq!(range.status, CheckStatus::Fail);
    assert_eq!(range.violations, 1);

    let regex = report.fields["email"]
        .checks
        .iter()
        .find(|c| c.rule == CheckKind::Regex)
        .unwrap();
    assert_eq!(regex.status, CheckStatus::Fail);
    assert_eq!(regex.violations, 1);
}

#[tokio::test]
async fn declared_type_mismatch_fails_type_and_skips_constraints() {
    // user_tier arrives as integers; the schema expects strings.
    let arrow_schema = Arc::new(ArrowSchema::new(vec![
        Field::new("user_id", DataType::Int64, false),
        Field::new("user_tier", DataType::Int64, true),
    ]));
    let batch = RecordBatch::try_new(
        arrow_schema,
        vec![
            Arc::new(Int64Array::from(vec![1, 2])),
            Arc::new(Int64Array::from(vec![0, 1])),
        ],
    )
    .unwrap();

    let adapter = DataFusionAdapter::from_batches(vec![batch]).unwrap();
    let report = Validator::new()
        .run(&user_schema(false), &adapter)
        .await
        .unwrap();

    let tier = &report.fields["user_tier"];
    let type_check = tier.checks.iter().find(|c| c.rule == CheckKind::Type).unwrap();
    assert_eq!(type_check.status, CheckStatus::Fail);

    let enum_check = tier.checks.iter().find(|c| c.rule == CheckKind::Enum).unwrap();
    assert_eq!(enum_check.status, CheckStatus::Skipped);
}

#[tokio::test]
async fn csv_file_source_end_to_end() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("users.csv");
    let mut file = File::create(&path).unwrap();
    writeln!(file, "user_id,user_tier").unwrap();
    writeln!(file, "1,FREE").unwrap();
    writeln!(file, "2,PREMIUM").unwrap();
    file.flush().unwrap();

    let adapter = DataFusionAdapter::from_csv(path.to_str().unwrap())
        .await
        .unwrap();
    let outcome = Validator::new().run(&user_schema(true), &adapter).await;

    assert_eq!(exit_code(&outcome), EXIT_PASS);
    assert!(outcome.unwrap().is_pass());
}

#[tokio::test]
async fn case_insensitive_matching_resolves_exists() {
    let schema = SchemaDefinition::builder()
        .rule(FieldRule::new("USER_ID"))
        .case_insensitive(true)
        .strict_mode(true)
        .build()
        .unwrap();

    let arrow_schema = Arc::new(ArrowSchema::new(vec![Field::new(
        "user_id",
        DataType::Int64,
        false,
    )]));
    let batch = RecordBatch::try_new(
        arrow_schema,
        vec![Arc::new(Int64Array::from(vec![1]))],
    )
    .unwrap();

    let adapter = DataFusionAdapter::from_batches(vec![batch]).unwrap();
    let report = Validator::new().run(&schema, &adapter).await.unwrap();

    assert_eq!(report.status, CheckStatus::Pass);
    assert!(report.schema_extras.is_empty());
}

#[tokio::test]
async fn report_json_matches_contract_shape() {
    let adapter = DataFusionAdapter::from_batches(vec![users_batch(true)]).unwrap();
    let report = Validator::new()
        .run(&user_schema(true), &adapter)
        .await
        .unwrap();

    let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(value["status"], "fail");
    assert!(value["summary"]["total_checks"].as_u64().unwrap() > 0);
    assert_eq!(value["schema_extras"][0], "marketing_consent");
    let first_field = value["fields"].as_object().unwrap().keys().next().unwrap();
    assert_eq!(first_field, "user_id");
    assert_eq!(value["fields"]["user_tier"]["checks"][0]["rule"], "exists");
}
