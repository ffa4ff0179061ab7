//! ドキュメント検索条件
//!
//! `Filter` はストア内で評価される述語。SQLiteの `json_extract` に変換され、
//! フィールドパスも値もすべてバインドパラメータとして渡す。

use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite};

/// ドキュメントに対する述語
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Filter {
    /// 全件一致
    #[default]
    All,
    /// フィールド == 値（`null` は欠損フィールドにも一致）
    Eq(String, Value),
    /// フィールド != 値（欠損フィールドにも一致）
    Ne(String, Value),
    /// フィールド > 値
    Gt(String, Value),
    /// フィールド >= 値
    Gte(String, Value),
    /// フィールド < 値
    Lt(String, Value),
    /// フィールド <= 値
    Lte(String, Value),
    /// フィールドが存在する（値が `null` でも可）
    Exists(String),
    /// すべて一致（空なら全件）
    And(Vec<Filter>),
    /// いずれか一致（空なら0件）
    Or(Vec<Filter>),
    /// 否定
    Not(Box<Filter>),
}

impl Filter {
    /// `field == value`
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    /// `field != value`
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ne(field.into(), value.into())
    }

    /// `field > value`
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gt(field.into(), value.into())
    }

    /// `field >= value`
    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gte(field.into(), value.into())
    }

    /// `field < value`
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lt(field.into(), value.into())
    }

    /// `field <= value`
    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lte(field.into(), value.into())
    }

    /// フィールドの存在
    pub fn exists(field: impl Into<String>) -> Self {
        Self::Exists(field.into())
    }

    /// 2条件のAND。既存のAndにはフラットに追加する
    pub fn and(self, other: Filter) -> Self {
        match self {
            Self::All => other,
            Self::And(mut filters) => {
                filters.push(other);
                Self::And(filters)
            }
            filter => Self::And(vec![filter, other]),
        }
    }

    /// 2条件のOR
    pub fn or(self, other: Filter) -> Self {
        match self {
            Self::Or(mut filters) => {
                filters.push(other);
                Self::Or(filters)
            }
            filter => Self::Or(vec![filter, other]),
        }
    }

    /// 否定
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// WHERE句の断片を `builder` に書き出す
    pub(crate) fn push_sql(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            Self::All => {
                builder.push("1 = 1");
            }
            Self::Eq(field, Value::Null) => {
                push_extract(builder, field);
                builder.push(" IS NULL");
            }
            Self::Eq(field, value) => push_comparison(builder, field, "=", value),
            Self::Ne(field, Value::Null) => {
                push_extract(builder, field);
                builder.push(" IS NOT NULL");
            }
            Self::Ne(field, value) => {
                builder.push("(");
                push_extract(builder, field);
                builder.push(" IS NULL OR ");
                push_comparison(builder, field, "<>", value);
                builder.push(")");
            }
            Self::Gt(field, value) => push_comparison(builder, field, ">", value),
            Self::Gte(field, value) => push_comparison(builder, field, ">=", value),
            Self::Lt(field, value) => push_comparison(builder, field, "<", value),
            Self::Lte(field, value) => push_comparison(builder, field, "<=", value),
            Self::Exists(field) => {
                builder.push("json_type(body, ");
                builder.push_bind(json_path(field));
                builder.push(") IS NOT NULL");
            }
            Self::And(filters) => push_group(builder, filters, " AND ", "1 = 1"),
            Self::Or(filters) => push_group(builder, filters, " OR ", "1 = 0"),
            Self::Not(inner) => {
                builder.push("NOT (");
                inner.push_sql(builder);
                builder.push(")");
            }
        }
    }
}

/// `Uri` や `RequestHeaders.content-type` をJSONパスに変換する
fn json_path(field: &str) -> String {
    let mut path = String::from("$");
    for segment in field.split('.') {
        path.push_str(".\"");
        path.push_str(&segment.replace('"', "\\\""));
        path.push('"');
    }
    path
}

fn push_extract(builder: &mut QueryBuilder<'_, Sqlite>, field: &str) {
    builder.push("json_extract(body, ");
    builder.push_bind(json_path(field));
    builder.push(")");
}

fn push_comparison(builder: &mut QueryBuilder<'_, Sqlite>, field: &str, op: &str, value: &Value) {
    push_extract(builder, field);
    builder.push(" ");
    builder.push(op);
    builder.push(" ");
    push_value(builder, value);
}

// json_extract はJSONの型に応じたSQL値を返すため、同じ型でバインドする
fn push_value(builder: &mut QueryBuilder<'_, Sqlite>, value: &Value) {
    match value {
        Value::Null => {
            builder.push("NULL");
        }
        Value::Bool(b) => {
            builder.push_bind(i64::from(*b));
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                builder.push_bind(i);
            } else {
                builder.push_bind(n.as_f64().unwrap_or_default());
            }
        }
        Value::String(s) => {
            builder.push_bind(s.clone());
        }
        Value::Array(_) | Value::Object(_) => {
            builder.push("json(");
            builder.push_bind(value.to_string());
            builder.push(")");
        }
    }
}

fn push_group(
    builder: &mut QueryBuilder<'_, Sqlite>,
    filters: &[Filter],
    separator: &str,
    empty: &str,
) {
    if filters.is_empty() {
        builder.push(empty);
        return;
    }
    builder.push("(");
    for (i, filter) in filters.iter().enumerate() {
        if i > 0 {
            builder.push(separator);
        }
        filter.push_sql(builder);
    }
    builder.push(")");
}
