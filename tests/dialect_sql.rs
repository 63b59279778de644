//! Cross-dialect SQL generation properties.

use longjrm::record;
use longjrm::sql::build::{Merge, Select};
use longjrm::sql::condition::Condition;
use longjrm::sql::dialect::{Dialect, SqlDialect};
use longjrm::sql::placeholder::{self, Params, PlaceholderStyle};
use longjrm::value::Value;

const ALL_DIALECTS: [Dialect; 8] = [
    Dialect::Postgres,
    Dialect::MySql,
    Dialect::Sqlite,
    Dialect::Oracle,
    Dialect::Db2,
    Dialect::SqlServer,
    Dialect::Spark,
    Dialect::Generic,
];

fn marker_count(sql: &str) -> usize {
    placeholder::scan(sql).len()
}

#[test]
fn bind_count_matches_marker_count_everywhere() {
    let condition = Condition::new()
        .eq("id", 1)
        .op("age", ">", 18)
        .op("age", "<=", 65)
        .op("tag", "IN", vec!["a", "b", "c"])
        .op("email", "LIKE", "%@x.com");

    for dialect in ALL_DIALECTS {
        let (sql, binds) = Select::from("users")
            .filter(condition.clone())
            .limit(Some(10))
            .to_sql(dialect)
            .unwrap();
        assert_eq!(
            marker_count(&sql),
            binds.len(),
            "marker/bind mismatch on {dialect}: {sql}"
        );

        // And after normalization to the driver's native style.
        let native = dialect.placeholder_style();
        let (native_sql, params) =
            placeholder::normalize(&sql, Params::Positional(binds), native).unwrap();
        assert_eq!(
            marker_count(&native_sql),
            params.len(),
            "post-normalization mismatch on {dialect}: {native_sql}"
        );
    }
}

#[test]
fn merge_binds_match_markers_everywhere() {
    for dialect in ALL_DIALECTS {
        let (sql, binds) = Merge::into("t")
            .record(record! { "id" => 1, "a" => "x", "b" => 2 })
            .keys(["id"])
            .to_sql(dialect)
            .unwrap();
        assert_eq!(
            marker_count(&sql),
            binds.len(),
            "merge mismatch on {dialect}: {sql}"
        );
    }
}

#[test]
fn keyword_values_never_bind() {
    for dialect in ALL_DIALECTS {
        let (sql, binds) = Merge::into("t")
            .record(record! { "id" => 1, "ts" => "`CURRENT_TIMESTAMP`" })
            .keys(["id"])
            .to_sql(dialect)
            .unwrap();
        assert!(sql.contains("CURRENT_TIMESTAMP"), "{dialect}: {sql}");
        assert_eq!(binds, vec![Value::Int(1)], "{dialect}");
    }
}

#[test]
fn normalization_is_a_fixed_point() {
    let cases = [
        ("SELECT * FROM t WHERE a = ? AND b = ?", PlaceholderStyle::Qmark),
        ("SELECT * FROM t WHERE a = $1 AND b = $2", PlaceholderStyle::NumberedDollar),
        ("SELECT * FROM t WHERE a = :1 AND b = :2", PlaceholderStyle::NumberedColon),
        ("SELECT * FROM t WHERE a = %s AND b = %s", PlaceholderStyle::Format),
    ];
    for (sql, style) in cases {
        let params = Params::Positional(vec![Value::Int(1), Value::Int(2)]);
        let (out, out_params) = placeholder::normalize(sql, params.clone(), style).unwrap();
        assert_eq!(out, sql, "{style:?} should be stable");
        assert_eq!(out_params, params);
    }
}

#[test]
fn upsert_shape_per_family() {
    let stmt = || {
        Merge::into("t")
            .record(record! { "id" => 1, "n" => "x" })
            .keys(["id"])
    };

    let (sql, _) = stmt().to_sql(Dialect::Postgres).unwrap();
    assert!(sql.contains("ON CONFLICT"), "{sql}");
    let (sql, _) = stmt().to_sql(Dialect::Sqlite).unwrap();
    assert!(sql.contains("ON CONFLICT"), "{sql}");
    let (sql, _) = stmt().to_sql(Dialect::MySql).unwrap();
    assert!(sql.contains("ON DUPLICATE KEY UPDATE"), "{sql}");
    for dialect in [Dialect::Oracle, Dialect::Db2, Dialect::SqlServer, Dialect::Spark, Dialect::Generic] {
        let (sql, _) = stmt().to_sql(dialect).unwrap();
        assert!(sql.starts_with("MERGE INTO"), "{dialect}: {sql}");
    }
}

#[test]
fn select_limit_spelled_per_backend() {
    let stmt = || Select::from("t").limit(Some(7));
    let (sql, _) = stmt().to_sql(Dialect::Postgres).unwrap();
    assert!(sql.ends_with("LIMIT 7"), "{sql}");
    let (sql, _) = stmt().to_sql(Dialect::Db2).unwrap();
    assert!(sql.ends_with("FETCH FIRST 7 ROWS ONLY"), "{sql}");
    let (sql, _) = stmt().to_sql(Dialect::SqlServer).unwrap();
    assert!(sql.starts_with("SELECT TOP 7"), "{sql}");
}

#[test]
fn quoted_literals_survive_normalization() {
    let sql = "SELECT 'it''s 100% fine', \"col?name\" FROM t WHERE x = ?";
    let (out, params) = placeholder::normalize(
        sql,
        Params::Positional(vec![Value::Int(1)]),
        PlaceholderStyle::NumberedDollar,
    )
    .unwrap();
    assert_eq!(out, "SELECT 'it''s 100% fine', \"col?name\" FROM t WHERE x = $1");
    assert_eq!(params.len(), 1);
}
