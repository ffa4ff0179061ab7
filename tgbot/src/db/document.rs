//! ドキュメントストア（SQLite）
//!
//! 1つの `documents` テーブルに全コレクションのJSONドキュメントを保持する。
//! コレクション単位の操作は `Collection` 経由で行う。各操作は単一のSQL文であり、
//! 複数ドキュメントにまたがるトランザクションは持たない。

use crate::common::error::{BotError, BotResult};
use crate::common::time::format_utc;
use crate::db::filter::Filter;
use chrono::Utc;
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

/// ドキュメントストア
///
/// `SqlitePool` は内部で同期されているため、クローンしてプロセス全体で共有する。
#[derive(Clone, Debug)]
pub struct DocumentStore {
    pool: SqlitePool,
}

impl DocumentStore {
    /// 新しいストアを作成
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 名前付きコレクションを取得（スキーマ作成は不要）
    pub fn collection(&self, name: impl Into<String>) -> Collection {
        Collection {
            pool: self.pool.clone(),
            name: name.into(),
        }
    }

    /// 内部の接続プール
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// IDと本文（JSON）の組
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// ドキュメントID
    pub id: Uuid,
    /// JSON本文
    pub body: Value,
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: String,
    body: String,
}

impl TryFrom<DocumentRow> for StoredDocument {
    type Error = BotError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| BotError::Database(format!("Corrupt document id {}: {}", row.id, e)))?;
        let body = serde_json::from_str(&row.body)
            .map_err(|e| BotError::Database(format!("Corrupt document body {}: {}", row.id, e)))?;
        Ok(Self { id, body })
    }
}

/// 1つの論理コレクション
#[derive(Clone, Debug)]
pub struct Collection {
    pool: SqlitePool,
    name: String,
}

impl Collection {
    /// コレクション名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 条件に一致するドキュメントを挿入順で取得
    pub async fn find(&self, filter: &Filter, limit: Option<usize>) -> BotResult<Vec<StoredDocument>> {
        self.fetch(filter, "ASC", limit).await
    }

    /// 条件に一致するドキュメントを新しい順に最大 `limit` 件取得
    pub async fn find_latest(&self, filter: &Filter, limit: usize) -> BotResult<Vec<StoredDocument>> {
        self.fetch(filter, "DESC", Some(limit)).await
    }

    async fn fetch(
        &self,
        filter: &Filter,
        direction: &str,
        limit: Option<usize>,
    ) -> BotResult<Vec<StoredDocument>> {
        let mut builder = self.select(filter);
        builder.push(" ORDER BY seq ");
        builder.push(direction);
        if let Some(limit) = limit {
            builder.push(" LIMIT ");
            builder.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows: Vec<DocumentRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| BotError::Database(format!("Failed to find documents: {}", e)))?;

        rows.into_iter().map(StoredDocument::try_from).collect()
    }

    /// 条件に一致する最初のドキュメント
    pub async fn find_one(&self, filter: &Filter) -> BotResult<Option<StoredDocument>> {
        Ok(self.find(filter, Some(1)).await?.into_iter().next())
    }

    /// IDで取得
    pub async fn find_by_id(&self, id: Uuid) -> BotResult<Option<StoredDocument>> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, body FROM documents WHERE collection = ? AND id = ? LIMIT 1",
        )
        .bind(&self.name)
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| BotError::Database(format!("Failed to load document: {}", e)))?;

        row.map(StoredDocument::try_from).transpose()
    }

    /// ドキュメントを1件追加
    pub async fn insert(&self, id: Uuid, body: &Value) -> BotResult<()> {
        sqlx::query("INSERT INTO documents (collection, id, body, created_at) VALUES (?, ?, ?, ?)")
            .bind(&self.name)
            .bind(id.to_string())
            .bind(body.to_string())
            .bind(format_utc(&Utc::now()))
            .execute(&self.pool)
            .await
            .map_err(|e| BotError::Database(format!("Failed to insert document: {}", e)))?;

        Ok(())
    }

    /// 本文を丸ごと置き換える。対象が無ければ `false`
    pub async fn replace(&self, id: Uuid, body: &Value) -> BotResult<bool> {
        let result = sqlx::query("UPDATE documents SET body = ? WHERE collection = ? AND id = ?")
            .bind(body.to_string())
            .bind(&self.name)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| BotError::Database(format!("Failed to replace document: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    /// IDで1件削除。対象が無ければ `false`
    pub async fn delete_one(&self, id: Uuid) -> BotResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(&self.name)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| BotError::Database(format!("Failed to delete document: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    /// 条件に一致するドキュメントをすべて削除し、削除件数を返す
    pub async fn delete_many(&self, filter: &Filter) -> BotResult<u64> {
        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM documents WHERE collection = ");
        builder.push_bind(self.name.clone());
        builder.push(" AND ");
        filter.push_sql(&mut builder);

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| BotError::Database(format!("Failed to delete documents: {}", e)))?;

        Ok(result.rows_affected())
    }

    /// 条件に一致する件数
    pub async fn count(&self, filter: &Filter) -> BotResult<u64> {
        let mut builder =
            QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM documents WHERE collection = ");
        builder.push_bind(self.name.clone());
        builder.push(" AND ");
        filter.push_sql(&mut builder);

        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| BotError::Database(format!("Failed to count documents: {}", e)))?;

        Ok(count.max(0) as u64)
    }

    fn select(&self, filter: &Filter) -> QueryBuilder<'static, Sqlite> {
        let mut builder =
            QueryBuilder::<Sqlite>::new("SELECT id, body FROM documents WHERE collection = ");
        builder.push_bind(self.name.clone());
        builder.push(" AND ");
        filter.push_sql(&mut builder);
        builder
    }
}
