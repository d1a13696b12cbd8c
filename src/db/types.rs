use alloy::primitives::{Address, B256, U256};

/// A value bound to a statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Null,
    /// Signed 64-bit integer (BIGINT)
    Int64(i64),
    Text(String),
    /// Ethereum address (20 bytes, stored as BYTEA)
    Address([u8; 20]),
    /// 32-byte hash (stored as BYTEA)
    Bytes32([u8; 32]),
    /// uint256 sent as a decimal string and cast to NUMERIC
    Numeric(String),
    /// Unix seconds, stored as TIMESTAMPTZ
    Timestamp(i64),
}

impl DbValue {
    /// Block numbers, auction ids and chain ids are all stored as BIGINT.
    pub fn id(value: u64) -> Self {
        DbValue::Int64(value as i64)
    }

    pub fn address(value: &Address) -> Self {
        DbValue::Address(value.0 .0)
    }

    pub fn hash(value: &B256) -> Self {
        DbValue::Bytes32(value.0)
    }

    pub fn numeric(value: &U256) -> Self {
        DbValue::Numeric(value.to_string())
    }

    pub fn timestamp(unix_secs: u64) -> Self {
        DbValue::Timestamp(unix_secs as i64)
    }

    pub fn optional_text(value: &Option<String>) -> Self {
        match value {
            Some(v) => DbValue::Text(v.clone()),
            None => DbValue::Null,
        }
    }
}

/// Statement executed inside a [`DbPool::execute_transaction`](super::DbPool::execute_transaction) batch.
#[derive(Debug, Clone)]
pub enum DbOperation {
    /// INSERT ... ON CONFLICT. With no `update_columns` this is insert-or-ignore.
    Upsert {
        table: String,
        columns: Vec<String>,
        values: Vec<DbValue>,
        conflict_columns: Vec<String>,
        update_columns: Vec<String>,
    },
    Delete {
        table: String,
        where_clause: WhereClause,
    },
    /// Raw SQL for statements the builders can't express.
    RawSql { query: String, params: Vec<DbValue> },
}

#[derive(Debug, Clone)]
pub enum WhereClause {
    /// column = value
    Eq(String, DbValue),
    /// column1 = value1 AND column2 = value2 AND ...
    And(Vec<(String, DbValue)>),
}
