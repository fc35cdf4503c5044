//! 出張レコードの操作

use super::models::{Trip, TripDraft};
use crate::features::receipts::reconciliation::ReceiptListViewModel;
use crate::shared::backend::ExpenseBackend;
use crate::shared::errors::AppResult;
use log::{info, warn};
use std::sync::Arc;

/// 出張サービス
///
/// 作成・更新は送信前に入力を検証する。
pub struct TripService {
    backend: Arc<dyn ExpenseBackend>,
    receipts: Arc<ReceiptListViewModel>,
}

impl TripService {
    pub fn new(backend: Arc<dyn ExpenseBackend>, receipts: Arc<ReceiptListViewModel>) -> Self {
        Self { backend, receipts }
    }

    /// 出張一覧（開始日の新しい順）
    pub async fn list(&self) -> AppResult<Vec<Trip>> {
        let mut trips = self.backend.list_trips().await?;
        trips.sort_by(|a, b| b.date_from.cmp(&a.date_from).then(b.id.cmp(&a.id)));
        Ok(trips)
    }

    pub async fn get(&self, trip_id: i64) -> AppResult<Trip> {
        self.backend.get_trip(trip_id).await
    }

    pub async fn create(&self, draft: &TripDraft) -> AppResult<Trip> {
        draft.validate()?;
        let trip = self.backend.create_trip(draft).await?;
        info!("出張を作成しました: id={}, {}", trip.id, trip.label());
        Ok(trip)
    }

    pub async fn update(&self, trip_id: i64, draft: &TripDraft) -> AppResult<Trip> {
        draft.validate()?;
        let trip = self.backend.update_trip(trip_id, draft).await?;
        info!("出張を更新しました: id={trip_id}");
        Ok(trip)
    }

    /// 出張を削除し、更新後の一覧を返す
    ///
    /// 開いている出張を削除した場合は領収書一覧も閉じる
    pub async fn delete(&self, trip_id: i64) -> AppResult<Vec<Trip>> {
        self.backend.delete_trip(trip_id).await.map_err(|e| {
            warn!("出張の削除に失敗しました: id={trip_id}, error={e}");
            e
        })?;
        info!("出張を削除しました: id={trip_id}");

        if self.receipts.active_trip().await == Some(trip_id) {
            self.receipts.close().await;
        }

        self.list().await
    }
}
