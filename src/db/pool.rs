use bytes::BytesMut;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::types::{IsNull, ToSql, Type};
use tokio_postgres::NoTls;

use super::error::DbError;
use super::types::{DbOperation, DbValue, WhereClause};

pub struct DbPool {
    pool: Pool,
}

impl DbPool {
    pub async fn new(database_url: &str) -> Result<Self, DbError> {
        let config = database_url
            .parse::<tokio_postgres::Config>()
            .map_err(|e| DbError::InvalidConnectionString(e.to_string()))?;

        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let manager = Manager::from_config(config, NoTls, manager_config);

        let pool = Pool::builder(manager)
            .max_size(8)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(DbError::BuildError)?;

        let _conn = pool.get().await?;
        tracing::info!("Database connection pool created");

        Ok(Self { pool })
    }

    pub fn inner(&self) -> &Pool {
        &self.pool
    }

    /// Runs every operation in one transaction; nothing is committed unless all succeed.
    pub async fn execute_transaction(&self, operations: Vec<DbOperation>) -> Result<(), DbError> {
        if operations.is_empty() {
            return Ok(());
        }

        let mut client = self.pool.get().await?;
        let transaction = client.transaction().await?;

        for op in operations {
            let (sql, params) = build_operation_sql(op);
            let params_refs: Vec<&(dyn ToSql + Sync)> =
                params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

            if let Err(e) = transaction.execute(&sql, &params_refs[..]).await {
                let db_err: DbError = e.into();
                tracing::error!("SQL execution failed\n  SQL: {}\n  Error: {}", sql, db_err);
                return Err(db_err);
            }
        }

        transaction.commit().await?;
        Ok(())
    }

    pub async fn run_migrations(&self) -> Result<(), DbError> {
        super::migrations::run(&self.pool).await
    }

    pub async fn query(
        &self,
        query: &str,
        params: &[DbValue],
    ) -> Result<Vec<tokio_postgres::Row>, DbError> {
        let params = convert_values_to_params(params);
        let params_refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        let client = self.pool.get().await?;
        Ok(client.query(query, &params_refs[..]).await?)
    }
}

#[derive(Debug)]
enum SqlParam {
    Null,
    Int64(i64),
    Float64(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl ToSql for SqlParam {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            SqlParam::Null => Ok(IsNull::Yes),
            SqlParam::Int64(v) => v.to_sql(ty, out),
            SqlParam::Float64(v) => v.to_sql(ty, out),
            SqlParam::Text(v) => v.to_sql(ty, out),
            SqlParam::Bytes(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        <i64 as ToSql>::accepts(ty)
            || <f64 as ToSql>::accepts(ty)
            || <String as ToSql>::accepts(ty)
            || <Vec<u8> as ToSql>::accepts(ty)
    }

    tokio_postgres::types::to_sql_checked!();
}

fn convert_db_value(value: &DbValue) -> SqlParam {
    match value {
        DbValue::Null => SqlParam::Null,
        DbValue::Int64(v) => SqlParam::Int64(*v),
        DbValue::Text(v) => SqlParam::Text(v.clone()),
        DbValue::Address(v) => SqlParam::Bytes(v.to_vec()),
        DbValue::Bytes32(v) => SqlParam::Bytes(v.to_vec()),
        DbValue::Numeric(v) => SqlParam::Text(v.clone()),
        DbValue::Timestamp(v) => SqlParam::Float64(*v as f64),
    }
}

fn convert_values_to_params(values: &[DbValue]) -> Vec<SqlParam> {
    values.iter().map(convert_db_value).collect()
}

fn build_operation_sql(op: DbOperation) -> (String, Vec<SqlParam>) {
    match op {
        DbOperation::Upsert {
            table,
            columns,
            values,
            conflict_columns,
            update_columns,
        } => build_upsert_sql(&table, &columns, &values, &conflict_columns, &update_columns),
        DbOperation::Delete { table, where_clause } => build_delete_sql(&table, &where_clause),
        DbOperation::RawSql { query, params } => (query, convert_values_to_params(&params)),
    }
}

/// Placeholder for a value at the given parameter index.
/// - Timestamp → `to_timestamp($N)`
/// - Numeric → `$N::text::numeric` (sent as text, cast by PostgreSQL)
fn placeholder_for(value: &DbValue, param_idx: usize) -> String {
    match value {
        DbValue::Timestamp(_) => format!("to_timestamp(${})", param_idx),
        DbValue::Numeric(_) => format!("${}::text::numeric", param_idx),
        _ => format!("${}", param_idx),
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name)
}

fn quote_cols(columns: &[String]) -> String {
    columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
}

fn build_upsert_sql(
    table: &str,
    columns: &[String],
    values: &[DbValue],
    conflict_columns: &[String],
    update_columns: &[String],
) -> (String, Vec<SqlParam>) {
    let placeholders = values
        .iter()
        .enumerate()
        .map(|(i, v)| placeholder_for(v, i + 1))
        .collect::<Vec<_>>()
        .join(", ");

    let conflict = if update_columns.is_empty() {
        "DO NOTHING".to_string()
    } else {
        let updates = update_columns
            .iter()
            .map(|c| format!("{} = EXCLUDED.{}", quote_ident(c), quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("DO UPDATE SET {}", updates)
    };

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) {}",
        table,
        quote_cols(columns),
        placeholders,
        quote_cols(conflict_columns),
        conflict
    );
    (sql, convert_values_to_params(values))
}

fn build_delete_sql(table: &str, where_clause: &WhereClause) -> (String, Vec<SqlParam>) {
    let conditions: Vec<&(String, DbValue)> = match where_clause {
        WhereClause::Eq(col, val) => {
            return build_delete_sql(table, &WhereClause::And(vec![(col.clone(), val.clone())]))
        }
        WhereClause::And(conditions) => conditions.iter().collect(),
    };

    let mut params = Vec::with_capacity(conditions.len());
    let where_str = conditions
        .iter()
        .enumerate()
        .map(|(i, (col, val))| {
            params.push(convert_db_value(val));
            format!("{} = {}", quote_ident(col), placeholder_for(val, i + 1))
        })
        .collect::<Vec<_>>()
        .join(" AND ");

    (format!("DELETE FROM {} WHERE {}", table, where_str), params)
}
