//! Terminology repository - database access for the import engine
//!
//! CodeSystem resources are read from the resource store; everything else
//! runs against the extracted terminology tables. All statements touched by
//! an import take the open transaction so a batch sees its own writes.

use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::{
    db::sql::InsertBuilder,
    models::code_system::PropertyDefinition,
    Error, Result,
};

/// Column bindings for one coding_properties row, already flattened from the
/// attribute/relationship split.
#[derive(Debug)]
pub struct CodingPropertyRow {
    pub coding: i64,
    pub property: i64,
    pub value: String,
    pub target: Option<i64>,
}

#[derive(Clone)]
pub struct TerminologyRepository {
    pool: PgPool,
}

impl TerminologyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(Error::Database)
    }

    /// Liveness probe for the health endpoint.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    /// All current CodeSystem resources matching a canonical URL, as
    /// `(id, resource)` pairs. The caller decides how to treat zero or
    /// multiple matches.
    pub async fn find_code_systems_by_url(&self, url: &str) -> Result<Vec<(String, JsonValue)>> {
        let rows = sqlx::query(
            "SELECT id, resource
             FROM resources
             WHERE resource_type = 'CodeSystem'
               AND is_current = TRUE
               AND deleted = FALSE
               AND (url = $1 OR (url IS NULL AND resource->>'url' = $1))",
        )
        .bind(url)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| (r.get("id"), r.get("resource")))
            .collect())
    }

    /// Upsert one concept row. Re-importing an existing `(system, code)`
    /// refreshes the display.
    pub async fn upsert_coding(
        tx: &mut Transaction<'_, Postgres>,
        system: &str,
        code: &str,
        display: Option<&str>,
    ) -> Result<()> {
        let sql = InsertBuilder::new("codings")
            .columns(&["system", "code", "display"])
            .merge_on_conflict(&["system", "code"])
            .build();

        sqlx::query(&sql)
            .bind(system)
            .bind(code)
            .bind(display)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        Ok(())
    }

    /// Row id of a concept, resolved against the transaction's view (rows
    /// written earlier in the same import are visible).
    pub async fn find_coding_id(
        tx: &mut Transaction<'_, Postgres>,
        system: &str,
        code: &str,
    ) -> Result<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM codings WHERE system = $1 AND code = $2",
        )
        .bind(system)
        .bind(code)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }

    pub async fn find_property_id(
        tx: &mut Transaction<'_, Postgres>,
        system: &str,
        code: &str,
    ) -> Result<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM codesystem_properties WHERE system = $1 AND code = $2",
        )
        .bind(system)
        .bind(code)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }

    /// Insert a property definition, returning its generated id. Returns
    /// `None` when a concurrent importer already created the row; the caller
    /// re-reads under the same transaction.
    pub async fn insert_property_definition(
        tx: &mut Transaction<'_, Postgres>,
        system: &str,
        definition: &PropertyDefinition,
    ) -> Result<Option<i64>> {
        let sql = InsertBuilder::new("codesystem_properties")
            .columns(&["system", "code", "type", "uri", "description"])
            .ignore_on_conflict()
            .return_column("id")
            .build();

        let row = sqlx::query(&sql)
            .bind(system)
            .bind(&definition.code)
            .bind(&definition.property_type)
            .bind(definition.uri.as_deref())
            .bind(definition.description.as_deref())
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(|r| r.get("id")))
    }

    /// Insert one property value. Duplicates of `(coding, property, value)`
    /// are dropped silently, making re-imports no-ops.
    pub async fn insert_coding_property(
        tx: &mut Transaction<'_, Postgres>,
        row: &CodingPropertyRow,
    ) -> Result<()> {
        let sql = InsertBuilder::new("coding_properties")
            .columns(&["coding", "property", "value", "target"])
            .ignore_on_conflict()
            .build();

        sqlx::query(&sql)
            .bind(row.coding)
            .bind(row.property)
            .bind(&row.value)
            .bind(row.target)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        Ok(())
    }
}
