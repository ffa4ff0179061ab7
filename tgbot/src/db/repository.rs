//! 汎用Repository
//!
//! 1コレクションに対する型付きCRUD。レコード型ごとに `Document` を実装し、
//! 同じ `DocumentRepository<T>` をコレクション名違いで使い回す。

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use uuid::Uuid;

use crate::common::error::{BotError, BotResult};
use crate::db::document::{Collection, DocumentStore, StoredDocument};
use crate::db::filter::Filter;

/// コレクションに保存できるレコード
///
/// IDはドキュメント本文には含めず、ストアが管理する。
/// 実装側はIDフィールドに `#[serde(skip)]` を付けること。
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// ストアが割り当てたID（未保存なら `None`）
    fn id(&self) -> Option<Uuid>;
    /// IDを設定
    fn set_id(&mut self, id: Uuid);
}

/// 1コレクションに対するCRUD操作のRepository trait
///
/// 各操作は単一のストア操作であり、楽観ロックやバージョン検査は行わない。
#[async_trait]
pub trait Repository<T: Document>: Send + Sync {
    /// 全件取得（順序保証なし）
    async fn get_all(&self) -> BotResult<Vec<T>>;
    /// 条件に一致する最初の1件。無ければ `None`
    async fn get(&self, filter: &Filter) -> BotResult<Option<T>>;
    /// IDで取得。無ければ `None`
    async fn get_by_id(&self, id: Uuid) -> BotResult<Option<T>>;
    /// 1件追加し、割り当てたIDを返す
    async fn insert(&self, entity: &T) -> BotResult<Uuid>;
    /// 丸ごと置換。対象が無ければ何もせず `false`
    async fn update(&self, id: Uuid, entity: &T) -> BotResult<bool>;
    /// IDで削除。対象が無ければ何もせず `false`
    async fn delete(&self, id: Uuid) -> BotResult<bool>;
    /// 条件に一致するものをすべて削除し、件数を返す
    async fn delete_many(&self, filter: &Filter) -> BotResult<u64>;
    /// 条件に一致するものを挿入順で取得
    async fn find(&self, filter: &Filter, limit: Option<usize>) -> BotResult<Vec<T>>;
    /// 条件に一致するものを新しい順に最大 `limit` 件取得
    async fn find_latest(&self, filter: &Filter, limit: usize) -> BotResult<Vec<T>>;
    /// 条件に一致する件数
    async fn count(&self, filter: &Filter) -> BotResult<u64>;
}

/// `DocumentStore` 上の `Repository` 実装
pub struct DocumentRepository<T> {
    collection: Collection,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for DocumentRepository<T> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Document> DocumentRepository<T> {
    /// `collection_name` に束縛したRepositoryを作成
    pub fn new(store: &DocumentStore, collection_name: impl Into<String>) -> Self {
        Self {
            collection: store.collection(collection_name),
            _marker: PhantomData,
        }
    }

    /// 束縛先のコレクション名
    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }

    fn to_body(entity: &T) -> BotResult<serde_json::Value> {
        let body = serde_json::to_value(entity)?;
        if !body.is_object() {
            return Err(BotError::Internal(
                "Document must serialize to a JSON object".to_string(),
            ));
        }
        Ok(body)
    }

    fn from_stored(stored: StoredDocument) -> BotResult<T> {
        let mut entity: T = serde_json::from_value(stored.body).map_err(|e| {
            BotError::Database(format!("Corrupt document {}: {}", stored.id, e))
        })?;
        entity.set_id(stored.id);
        Ok(entity)
    }
}

#[async_trait]
impl<T: Document> Repository<T> for DocumentRepository<T> {
    async fn get_all(&self) -> BotResult<Vec<T>> {
        self.find(&Filter::All, None).await
    }

    async fn get(&self, filter: &Filter) -> BotResult<Option<T>> {
        self.collection
            .find_one(filter)
            .await?
            .map(Self::from_stored)
            .transpose()
    }

    async fn get_by_id(&self, id: Uuid) -> BotResult<Option<T>> {
        self.collection
            .find_by_id(id)
            .await?
            .map(Self::from_stored)
            .transpose()
    }

    async fn insert(&self, entity: &T) -> BotResult<Uuid> {
        let body = Self::to_body(entity)?;
        // 呼び出し側が持つIDは使わず、常に新しいIDを割り当てる
        let id = Uuid::new_v4();
        self.collection.insert(id, &body).await?;
        Ok(id)
    }

    async fn update(&self, id: Uuid, entity: &T) -> BotResult<bool> {
        let body = Self::to_body(entity)?;
        self.collection.replace(id, &body).await
    }

    async fn delete(&self, id: Uuid) -> BotResult<bool> {
        self.collection.delete_one(id).await
    }

    async fn delete_many(&self, filter: &Filter) -> BotResult<u64> {
        self.collection.delete_many(filter).await
    }

    async fn find(&self, filter: &Filter, limit: Option<usize>) -> BotResult<Vec<T>> {
        self.collection
            .find(filter, limit)
            .await?
            .into_iter()
            .map(Self::from_stored)
            .collect()
    }

    async fn find_latest(&self, filter: &Filter, limit: usize) -> BotResult<Vec<T>> {
        self.collection
            .find_latest(filter, limit)
            .await?
            .into_iter()
            .map(Self::from_stored)
            .collect()
    }

    async fn count(&self, filter: &Filter) -> BotResult<u64> {
        self.collection.count(filter).await
    }
}
