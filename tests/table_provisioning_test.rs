mod common;

use common::{item, resolved_config, FakeDynamoDb};
use run_dynamodb_local::domain::model::fixture_data_from_json;
use run_dynamodb_local::{FixtureData, LocalDbError, LocalDbOps, LocalTableBuilder};
use serde_json::json;

fn builder() -> LocalTableBuilder {
    LocalTableBuilder::from_resolved_config("serverless.yml", &resolved_config().to_string())
        .unwrap()
}

fn fixtures() -> FixtureData {
    fixture_data_from_json(
        &json!({
            "Users": [
                {"id": "u1", "name": "Ann", "age": 41, "admin": true},
                {"id": "u2", "name": "Bob", "tags": ["a", "b"], "address": {"city": "Oslo"}}
            ],
            "Orders": [
                {"customerId": "u1", "orderId": "o1", "total": 12.5}
            ]
        })
        .to_string(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_recreate_creates_missing_tables_in_config_order() {
    let db = FakeDynamoDb::local();

    builder().recreate_through(&db).await.unwrap();

    assert_eq!(db.calls(), vec!["list", "create:Users", "create:Orders"]);
    assert_eq!(db.table_names(), vec!["Orders", "Users"]);
}

#[tokio::test]
async fn test_recreate_drops_existing_tables_only_when_configured() {
    let db = FakeDynamoDb::local()
        .with_table("Users", &["id"], vec![item(json!({"id": "stale"}))])
        .with_table("Audit", &["id"], vec![item(json!({"id": "kept"}))]);

    builder().recreate_through(&db).await.unwrap();

    assert_eq!(
        db.calls(),
        vec!["list", "delete:Users", "create:Users", "create:Orders"]
    );
    assert!(db.items("Users").is_empty());
    assert_eq!(db.items("Audit").len(), 1);
}

#[tokio::test]
async fn test_recreate_refuses_remote_endpoint() {
    let db = FakeDynamoDb::new(Some("https://dynamodb.us-east-1.amazonaws.com"));

    let result = builder().recreate_through(&db).await;

    assert!(matches!(result, Err(LocalDbError::NotLocalEndpoint { .. })));
    assert!(db.calls().is_empty());
}

#[tokio::test]
async fn test_recreate_refuses_default_endpoint() {
    let db = FakeDynamoDb::new(None);

    let result = builder().recreate_through(&db).await;

    assert!(matches!(result, Err(LocalDbError::NotLocalEndpoint { .. })));
    assert!(db.calls().is_empty());
}

#[tokio::test]
async fn test_failed_create_stops_remaining_tables() {
    let db = FakeDynamoDb::local().failing_create_of("Users");

    let result = builder().recreate_through(&db).await;

    assert!(result.is_err());
    assert_eq!(db.calls(), vec!["list", "create:Users"]);
    assert!(db.table_names().is_empty());
}

#[tokio::test]
async fn test_fresh_test_tables_loads_fixtures() {
    let db = FakeDynamoDb::local();
    let ops = LocalDbOps::from_builder(builder());

    ops.fresh_test_tables(&db, Some(&fixtures())).await.unwrap();

    let users = db.items("Users");
    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["name"], json!("Ann"));
    assert_eq!(users[1]["address"], json!({"city": "Oslo"}));
    assert_eq!(db.items("Orders")[0]["total"], json!(12.5));
}

#[tokio::test]
async fn test_fresh_test_tables_without_fixtures_leaves_tables_empty() {
    let db = FakeDynamoDb::local();
    let ops = LocalDbOps::from_builder(builder());

    ops.fresh_test_tables(&db, None).await.unwrap();

    assert_eq!(db.table_names(), vec!["Orders", "Users"]);
    assert!(db.items("Users").is_empty());
    assert!(db.items("Orders").is_empty());
}

#[tokio::test]
async fn test_fresh_test_tables_is_repeatable() {
    let db = FakeDynamoDb::local();
    let ops = LocalDbOps::from_builder(builder());

    ops.fresh_test_tables(&db, Some(&fixtures())).await.unwrap();
    ops.fresh_test_tables(&db, Some(&fixtures())).await.unwrap();

    assert_eq!(db.items("Users").len(), 2);
    assert_eq!(db.items("Orders").len(), 1);
    assert_eq!(
        db.calls(),
        vec![
            "list",
            "create:Users",
            "create:Orders",
            "list",
            "delete:Users",
            "create:Users",
            "delete:Orders",
            "create:Orders"
        ]
    );
}

#[tokio::test]
async fn test_fixture_for_unknown_table_fails() {
    let db = FakeDynamoDb::local();
    let ops = LocalDbOps::from_builder(builder());
    let fixtures = fixture_data_from_json(r#"{"Ghosts": [{"id": "g1"}]}"#).unwrap();

    let result = ops.fresh_test_tables(&db, Some(&fixtures)).await;

    assert!(matches!(result, Err(LocalDbError::DynamoDbError(_))));
}

#[cfg(unix)]
mod serverless_tool {
    use super::common::{resolved_config, write_script, FakeDynamoDb};
    use run_dynamodb_local::{LocalDbError, LocalDbOps, LocalTableBuilder, ServerlessCli};
    use tempfile::TempDir;

    /// A project directory with a serverless.yml and a fake `serverless`
    /// that prints the resolved config when called the expected way.
    fn project() -> (TempDir, ServerlessCli) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("serverless.yml"), "service: shop\n").unwrap();
        std::fs::write(dir.path().join("resolved.json"), resolved_config().to_string()).unwrap();

        let script = write_script(
            dir.path(),
            "fake-serverless",
            r#"[ "$1 $2 $3 $4" = "print --format=json --config serverless.yml" ] || exit 9
[ -f serverless.yml ] || exit 8
echo run >> calls.log
cat resolved.json"#,
        );
        (dir, ServerlessCli::new(script))
    }

    fn invocations(dir: &TempDir) -> usize {
        std::fs::read_to_string(dir.path().join("calls.log"))
            .map(|log| log.lines().count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_builder_reads_tables_from_serverless_print() {
        let (dir, cli) = project();

        let builder = LocalTableBuilder::with_cli(dir.path().join("serverless.yml"), &cli)
            .await
            .unwrap();

        let names: Vec<&str> = builder.tables().map(|t| t.name()).collect();
        assert_eq!(names, vec!["Users", "Orders"]);
        assert_eq!(invocations(&dir), 1);
    }

    #[tokio::test]
    async fn test_failing_tool_reports_exit_code_and_stderr() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("serverless.yml"), "service: shop\n").unwrap();
        let cli = ServerlessCli::new(write_script(
            dir.path(),
            "fake-serverless",
            "echo 'Serverless Error: bad config' >&2\nexit 2",
        ));

        match LocalTableBuilder::with_cli(dir.path().join("serverless.yml"), &cli).await {
            Err(LocalDbError::ToolFailed { code, stderr, .. }) => {
                assert_eq!(code, Some(2));
                assert_eq!(stderr, "Serverless Error: bad config");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_json_output_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("serverless.yml"), "service: shop\n").unwrap();
        let cli = ServerlessCli::new(write_script(dir.path(), "fake-serverless", "echo not json"));

        let result = LocalTableBuilder::with_cli(dir.path().join("serverless.yml"), &cli).await;
        assert!(matches!(result, Err(LocalDbError::SerializationError(_))));
    }

    #[tokio::test]
    async fn test_ops_resolve_config_once() {
        let (dir, cli) = project();
        let db = FakeDynamoDb::local();
        let ops = LocalDbOps::new(dir.path().join("serverless.yml")).with_cli(cli);
        assert_eq!(invocations(&dir), 0);

        ops.fresh_test_tables(&db, None).await.unwrap();
        ops.fresh_test_tables(&db, None).await.unwrap();

        assert_eq!(invocations(&dir), 1);
        assert_eq!(db.table_names(), vec!["Orders", "Users"]);
    }
}
