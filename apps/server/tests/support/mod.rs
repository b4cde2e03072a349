//! Shared harness for Postgres-backed tests.
//!
//! Each test gets its own schema on the database named by
//! `TEST_DATABASE_URL`. When the variable is not set the tests skip,
//! so the pure unit suite stays runnable without infrastructure.

// Not every test binary uses every helper.
#![allow(dead_code)]

use anyhow::Context as _;
use futures::FutureExt as _;
use serde_json::{json, Value as JsonValue};
use sqlx::{postgres::PgPoolOptions, Connection as _, PgConnection, PgPool};
use url::Url;
use uuid::Uuid;
use vesta::models::Parameters;

pub struct TestDb {
    pub pool: PgPool,
    pub database_url: String,
    schema: String,
    admin_database_url: String,
}

impl TestDb {
    /// Returns `None` when `TEST_DATABASE_URL` is not set.
    pub async fn new() -> anyhow::Result<Option<Self>> {
        let Ok(admin_database_url) = std::env::var("TEST_DATABASE_URL") else {
            return Ok(None);
        };

        let schema = format!("test_{}", Uuid::new_v4().simple());
        let mut admin_conn = PgConnection::connect(&admin_database_url)
            .await
            .context("connect admin db for schema create")?;
        sqlx::query(&format!(r#"CREATE SCHEMA "{}""#, schema))
            .execute(&mut admin_conn)
            .await
            .context("create test schema")?;

        let database_url = with_search_path(&admin_database_url, &schema)?;
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .context("connect test pool")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("run migrations")?;

        Ok(Some(Self {
            pool,
            database_url,
            schema,
            admin_database_url,
        }))
    }

    pub async fn cleanup(self) -> anyhow::Result<()> {
        self.pool.close().await;

        let mut admin_conn = PgConnection::connect(&self.admin_database_url)
            .await
            .context("connect admin db for schema drop")?;
        sqlx::query(&format!(r#"DROP SCHEMA "{}" CASCADE"#, self.schema))
            .execute(&mut admin_conn)
            .await
            .context("drop test schema")?;

        Ok(())
    }
}

pub async fn with_test_db<F>(f: F) -> anyhow::Result<()>
where
    F: for<'a> FnOnce(
        &'a TestDb,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + 'a>,
    >,
{
    let Some(db) = TestDb::new().await? else {
        eprintln!("TEST_DATABASE_URL not set; skipping database test");
        return Ok(());
    };

    let result = std::panic::AssertUnwindSafe(f(&db)).catch_unwind().await;
    let cleanup_result = db.cleanup().await;

    if let Err(e) = cleanup_result {
        eprintln!("test schema cleanup failed: {e:?}");
    }

    match result {
        Ok(r) => r,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

fn with_search_path(database_url: &str, schema: &str) -> anyhow::Result<String> {
    let mut url = Url::parse(database_url).context("parse database URL")?;
    url.query_pairs_mut()
        .append_pair("options", &format!("-c search_path={}", schema));
    Ok(url.to_string())
}

// ===== Fixtures =====

pub fn code_system_resource(url: &str) -> JsonValue {
    json!({
        "resourceType": "CodeSystem",
        "url": url,
        "status": "active",
        "content": "not-present"
    })
}

pub async fn insert_code_system(pool: &PgPool, resource: &JsonValue) -> anyhow::Result<String> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO resources (id, resource_type, resource, url) VALUES ($1, 'CodeSystem', $2, $3)",
    )
    .bind(&id)
    .bind(resource)
    .bind(resource.get("url").and_then(|v| v.as_str()))
    .execute(pool)
    .await
    .context("insert CodeSystem fixture")?;
    Ok(id)
}

/// Build a $import Parameters payload from plain tuples.
pub fn import_params(
    system: &str,
    concepts: &[(&str, Option<&str>)],
    properties: &[(&str, &str, &str)],
) -> Parameters {
    let payload = import_params_json(system, concepts, properties);
    Parameters::from_slice(payload.to_string().as_bytes()).expect("build Parameters fixture")
}

pub fn import_params_json(
    system: &str,
    concepts: &[(&str, Option<&str>)],
    properties: &[(&str, &str, &str)],
) -> JsonValue {
    let mut parameter = vec![json!({ "name": "system", "valueUri": system })];

    for (code, display) in concepts {
        let mut coding = json!({ "code": code });
        if let Some(display) = display {
            coding["display"] = json!(display);
        }
        parameter.push(json!({ "name": "concept", "valueCoding": coding }));
    }

    for (code, property, value) in properties {
        parameter.push(json!({
            "name": "property",
            "part": [
                { "name": "code", "valueCode": code },
                { "name": "property", "valueCode": property },
                { "name": "value", "valueString": value }
            ]
        }));
    }

    json!({ "resourceType": "Parameters", "parameter": parameter })
}

// ===== Row inspection =====

pub async fn coding_id(pool: &PgPool, system: &str, code: &str) -> anyhow::Result<Option<i64>> {
    sqlx::query_scalar("SELECT id FROM codings WHERE system = $1 AND code = $2")
        .bind(system)
        .bind(code)
        .fetch_optional(pool)
        .await
        .context("query coding id")
}

pub async fn coding_display(
    pool: &PgPool,
    system: &str,
    code: &str,
) -> anyhow::Result<Option<String>> {
    sqlx::query_scalar("SELECT display FROM codings WHERE system = $1 AND code = $2")
        .bind(system)
        .bind(code)
        .fetch_one(pool)
        .await
        .context("query coding display")
}

pub async fn count_codings(pool: &PgPool, system: &str) -> anyhow::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM codings WHERE system = $1")
        .bind(system)
        .fetch_one(pool)
        .await
        .context("count codings")
}

pub async fn count_coding_properties(pool: &PgPool, system: &str) -> anyhow::Result<i64> {
    sqlx::query_scalar(
        "SELECT COUNT(*)
         FROM coding_properties cp
         JOIN codings c ON c.id = cp.coding
         WHERE c.system = $1",
    )
    .bind(system)
    .fetch_one(pool)
    .await
    .context("count coding properties")
}

#[derive(Debug)]
pub struct PropertyDefinitionRow {
    pub id: i64,
    pub property_type: String,
    pub uri: Option<String>,
}

pub async fn property_definitions(
    pool: &PgPool,
    system: &str,
    code: &str,
) -> anyhow::Result<Vec<PropertyDefinitionRow>> {
    let rows: Vec<(i64, String, Option<String>)> = sqlx::query_as(
        "SELECT id, type, uri FROM codesystem_properties WHERE system = $1 AND code = $2",
    )
    .bind(system)
    .bind(code)
    .fetch_all(pool)
    .await
    .context("query property definitions")?;

    Ok(rows
        .into_iter()
        .map(|(id, property_type, uri)| PropertyDefinitionRow {
            id,
            property_type,
            uri,
        })
        .collect())
}

#[derive(Debug)]
pub struct CodingPropertyRow {
    pub property: i64,
    pub value: String,
    pub target: Option<i64>,
}

pub async fn coding_property_rows(
    pool: &PgPool,
    coding: i64,
) -> anyhow::Result<Vec<CodingPropertyRow>> {
    let rows: Vec<(i64, String, Option<i64>)> = sqlx::query_as(
        "SELECT property, value, target FROM coding_properties WHERE coding = $1 ORDER BY value",
    )
    .bind(coding)
    .fetch_all(pool)
    .await
    .context("query coding property rows")?;

    Ok(rows
        .into_iter()
        .map(|(property, value, target)| CodingPropertyRow {
            property,
            value,
            target,
        })
        .collect())
}
