//! バックエンドAPIの抽象化
//!
//! 各機能モジュールはこのトレイト越しにサーバーと通信する。
//! 本番では [`ApiClient`] を、テストではインメモリの実装を使用する。

use crate::features::preview::models::{GenerateResponse, PreviewPayload};
use crate::features::receipts::models::{
    ReceiptPatch, ReceiptUpdateResponse, UploadFile, UploadResponse,
};
use crate::features::trips::models::{Trip, TripDraft};
use crate::shared::api_client::ApiClient;
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::multipart;

/// 出張経費バックエンド
#[async_trait]
pub trait ExpenseBackend: Send + Sync {
    /// 出張一覧を取得（GET /trips/）
    async fn list_trips(&self) -> AppResult<Vec<Trip>>;

    /// 領収書を含む出張を取得（GET /trips/{id}）
    async fn get_trip(&self, trip_id: i64) -> AppResult<Trip>;

    /// 出張を作成（POST /trips/）
    async fn create_trip(&self, draft: &TripDraft) -> AppResult<Trip>;

    /// 出張を更新（PUT /trips/{id}）
    async fn update_trip(&self, trip_id: i64, draft: &TripDraft) -> AppResult<Trip>;

    /// 出張を削除（DELETE /trips/{id}）。領収書と生成書類はサーバー側で削除される
    async fn delete_trip(&self, trip_id: i64) -> AppResult<()>;

    /// 領収書ファイルをアップロード（POST /receipts/trip/{id}/upload）
    async fn upload_receipt(
        &self,
        trip_id: i64,
        file: &UploadFile,
        category: &str,
    ) -> AppResult<UploadResponse>;

    /// 領収書を更新（PUT /receipts/{id}）
    async fn update_receipt(
        &self,
        receipt_id: i64,
        patch: &ReceiptPatch,
    ) -> AppResult<ReceiptUpdateResponse>;

    /// 領収書を削除（DELETE /receipts/{id}）
    async fn delete_receipt(&self, receipt_id: i64) -> AppResult<()>;

    /// 精算プレビューを取得（GET /trips/{id}/preview）
    async fn get_preview(&self, trip_id: i64) -> AppResult<PreviewPayload>;

    /// 書類生成を依頼（POST /trips/{id}/generate）
    async fn generate_documents(&self, trip_id: i64) -> AppResult<GenerateResponse>;

    /// 生成書類一式をダウンロード（GET /trips/{id}/download）
    async fn download_package(&self, trip_id: i64) -> AppResult<Vec<u8>>;
}

#[async_trait]
impl ExpenseBackend for ApiClient {
    async fn list_trips(&self) -> AppResult<Vec<Trip>> {
        self.get("/trips/").await
    }

    async fn get_trip(&self, trip_id: i64) -> AppResult<Trip> {
        self.get(&format!("/trips/{trip_id}")).await
    }

    async fn create_trip(&self, draft: &TripDraft) -> AppResult<Trip> {
        self.post("/trips/", Some(draft)).await
    }

    async fn update_trip(&self, trip_id: i64, draft: &TripDraft) -> AppResult<Trip> {
        self.put(&format!("/trips/{trip_id}"), draft).await
    }

    async fn delete_trip(&self, trip_id: i64) -> AppResult<()> {
        self.delete(&format!("/trips/{trip_id}")).await
    }

    async fn upload_receipt(
        &self,
        trip_id: i64,
        file: &UploadFile,
        category: &str,
    ) -> AppResult<UploadResponse> {
        let part = multipart::Part::bytes(file.data.clone())
            .file_name(file.file_name.clone())
            .mime_str(file.content_type())
            .map_err(|e| AppError::validation(format!("MIMEタイプ設定エラー: {e}")))?;

        let form = multipart::Form::new()
            .part("file", part)
            .text("category", category.to_string());

        self.post_multipart(&format!("/receipts/trip/{trip_id}/upload"), form)
            .await
    }

    async fn update_receipt(
        &self,
        receipt_id: i64,
        patch: &ReceiptPatch,
    ) -> AppResult<ReceiptUpdateResponse> {
        self.put(&format!("/receipts/{receipt_id}"), patch).await
    }

    async fn delete_receipt(&self, receipt_id: i64) -> AppResult<()> {
        self.delete(&format!("/receipts/{receipt_id}")).await
    }

    async fn get_preview(&self, trip_id: i64) -> AppResult<PreviewPayload> {
        self.get(&format!("/trips/{trip_id}/preview")).await
    }

    async fn generate_documents(&self, trip_id: i64) -> AppResult<GenerateResponse> {
        self.post::<serde_json::Value, _>(&format!("/trips/{trip_id}/generate"), None)
            .await
    }

    async fn download_package(&self, trip_id: i64) -> AppResult<Vec<u8>> {
        self.get_bytes(&format!("/trips/{trip_id}/download")).await
    }
}
