//! Parameterized INSERT statement builder
//!
//! The terminology tables use two distinct conflict policies: concept rows
//! are merged (re-importing refreshes the display), while property rows are
//! ignored (re-importing is a no-op). This builder renders those policies as
//! Postgres `ON CONFLICT` clauses over `$n` placeholders; values are always
//! bound by the caller, never written into the SQL text.

/// What to do when an INSERT hits a unique constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
enum OnConflict {
    /// Let the constraint violation surface as an error.
    Error,
    /// `ON CONFLICT DO NOTHING` - discard the row silently.
    Ignore,
    /// `ON CONFLICT (keys) DO UPDATE` - update all non-key columns.
    Merge(&'static [&'static str]),
}

/// Builds one INSERT statement. Methods return the updated builder; `build`
/// is the single consumption point producing the SQL text.
#[derive(Debug, Clone)]
pub struct InsertBuilder {
    table: &'static str,
    columns: Vec<&'static str>,
    on_conflict: OnConflict,
    returning: Option<&'static str>,
}

impl InsertBuilder {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            columns: Vec::new(),
            on_conflict: OnConflict::Error,
            returning: None,
        }
    }

    pub fn columns(mut self, columns: &[&'static str]) -> Self {
        self.columns.extend_from_slice(columns);
        self
    }

    /// On a unique-key collision over `keys`, update every non-key column to
    /// the incoming value.
    pub fn merge_on_conflict(mut self, keys: &'static [&'static str]) -> Self {
        self.on_conflict = OnConflict::Merge(keys);
        self
    }

    /// On any unique-constraint violation, discard the row silently.
    pub fn ignore_on_conflict(mut self) -> Self {
        self.on_conflict = OnConflict::Ignore;
        self
    }

    /// Have the INSERT emit the given column of the inserted row. Combined
    /// with `ignore_on_conflict`, a conflicting insert returns no row.
    pub fn return_column(mut self, column: &'static str) -> Self {
        self.returning = Some(column);
        self
    }

    pub fn build(self) -> String {
        let placeholders: Vec<String> = (1..=self.columns.len()).map(|i| format!("${i}")).collect();

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            self.columns.join(", "),
            placeholders.join(", ")
        );

        match self.on_conflict {
            OnConflict::Error => {}
            OnConflict::Ignore => sql.push_str(" ON CONFLICT DO NOTHING"),
            OnConflict::Merge(keys) => {
                let updates: Vec<String> = self
                    .columns
                    .iter()
                    .filter(|column| !keys.contains(column))
                    .map(|column| format!("{column} = EXCLUDED.{column}"))
                    .collect();

                if updates.is_empty() {
                    sql.push_str(" ON CONFLICT DO NOTHING");
                } else {
                    sql.push_str(&format!(
                        " ON CONFLICT ({}) DO UPDATE SET {}",
                        keys.join(", "),
                        updates.join(", ")
                    ));
                }
            }
        }

        if let Some(column) = self.returning {
            sql.push_str(&format!(" RETURNING {column}"));
        }

        sql
    }
}
