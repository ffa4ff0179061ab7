//! データベースアクセス層
//!
//! SQLiteベースのドキュメントストアと汎用Repository

/// データベースマイグレーション
pub mod migrations;

/// ドキュメントストア（レコードストア）
pub mod document;

/// 検索条件
pub mod filter;

/// 汎用Repository trait と実装
pub mod repository;

/// HTTP監査ログのコレクション
pub mod http_logs;

#[cfg(test)]
pub(crate) mod test_utils {
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    /// テスト用のインメモリSQLiteプールを作成し、マイグレーションを実行する
    pub async fn test_db_pool() -> SqlitePool {
        // 接続ごとに別DBにならないよう1接続に固定する
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test database");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");
        pool
    }
}
