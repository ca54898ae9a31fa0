// Catalog queries used by the migrator and provisioner to decide what already exists.

use sqlx::{FromRow, PgExecutor};

use super::manager::DatabaseError;

/// A unique index on a table, with the constraint that owns it (if any)
#[derive(Debug, Clone, FromRow)]
pub struct UniqueIndex {
    pub index_name: String,
    pub constraint_name: Option<String>,
    pub columns: Vec<String>,
}

impl UniqueIndex {
    pub fn covers_exactly(&self, columns: &[&str]) -> bool {
        self.columns.len() == columns.len() && self.columns.iter().zip(columns).all(|(a, b)| a == b)
    }
}

pub async fn table_exists<'e>(executor: impl PgExecutor<'e>, table: &str) -> Result<bool, DatabaseError> {
    let (exists,): (bool,) = sqlx::query_as(
        "SELECT EXISTS (
            SELECT 1 FROM information_schema.tables
            WHERE table_schema = current_schema() AND table_name = $1
        )",
    )
    .bind(table)
    .fetch_one(executor)
    .await?;
    Ok(exists)
}

pub async fn column_exists<'e>(
    executor: impl PgExecutor<'e>,
    table: &str,
    column: &str,
) -> Result<bool, DatabaseError> {
    Ok(column_type(executor, table, column).await?.is_some())
}

/// `information_schema` data type of a column, lowercased
pub async fn column_type<'e>(
    executor: impl PgExecutor<'e>,
    table: &str,
    column: &str,
) -> Result<Option<String>, DatabaseError> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT data_type::text FROM information_schema.columns
         WHERE table_schema = current_schema() AND table_name = $1 AND column_name = $2",
    )
    .bind(table)
    .bind(column)
    .fetch_optional(executor)
    .await?;
    Ok(row.map(|(t,)| t.to_lowercase()))
}

/// Non-primary unique indexes of `table`, columns in key order
pub async fn unique_indexes<'e>(
    executor: impl PgExecutor<'e>,
    table: &str,
) -> Result<Vec<UniqueIndex>, DatabaseError> {
    let rows = sqlx::query_as::<_, UniqueIndex>(
        r#"
        SELECT
            i.relname::text AS index_name,
            con.conname::text AS constraint_name,
            array_agg(a.attname::text ORDER BY k.ord) AS columns
        FROM pg_index ix
        JOIN pg_class t ON t.oid = ix.indrelid
        JOIN pg_class i ON i.oid = ix.indexrelid
        JOIN pg_namespace n ON n.oid = t.relnamespace
        LEFT JOIN pg_constraint con ON con.conindid = ix.indexrelid AND con.conrelid = t.oid
        CROSS JOIN LATERAL unnest(ix.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord)
        JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
        WHERE n.nspname = current_schema()
          AND t.relname = $1
          AND ix.indisunique
          AND NOT ix.indisprimary
        GROUP BY i.relname, con.conname
        ORDER BY i.relname
        "#,
    )
    .bind(table)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

pub async fn index_exists<'e>(executor: impl PgExecutor<'e>, index: &str) -> Result<bool, DatabaseError> {
    let (exists,): (bool,) = sqlx::query_as(
        "SELECT EXISTS (
            SELECT 1 FROM pg_indexes WHERE schemaname = current_schema() AND indexname = $1
        )",
    )
    .bind(index)
    .fetch_one(executor)
    .await?;
    Ok(exists)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_cover_is_order_sensitive() {
        let idx = UniqueIndex {
            index_name: "uniq_agents_company_agent".into(),
            constraint_name: None,
            columns: vec!["company_id".into(), "agent_number".into()],
        };
        assert!(idx.covers_exactly(&["company_id", "agent_number"]));
        assert!(!idx.covers_exactly(&["agent_number", "company_id"]));
        assert!(!idx.covers_exactly(&["agent_number"]));
    }
}
