//! 書類生成の可否判定と生成済み書類の保存

use super::aggregator::{PreviewAggregator, RenderedPreview};
use super::models::GenerateResponse;
use crate::shared::backend::ExpenseBackend;
use crate::shared::errors::{AppError, AppResult};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// プレビューの判定に従って書類生成を呼び出す
pub struct GenerationGate {
    backend: Arc<dyn ExpenseBackend>,
}

impl GenerationGate {
    pub fn new(backend: Arc<dyn ExpenseBackend>) -> Self {
        Self { backend }
    }

    /// 最新のプレビューを取得して整形する
    pub async fn preview(&self, trip_id: i64) -> AppResult<RenderedPreview> {
        let payload = self.backend.get_preview(trip_id).await?;
        Ok(PreviewAggregator::render(&payload))
    }

    /// 生成が許可されている場合のみ書類生成を依頼する
    ///
    /// # エラー
    /// サーバーが生成不可と判定した場合は `GenerationBlocked`（生成APIは呼ばない）
    pub async fn generate(&self, trip_id: i64) -> AppResult<GenerateResponse> {
        let rendered = self.preview(trip_id).await?;

        if !rendered.can_generate {
            let mut errors = rendered.errors();
            if errors.is_empty() {
                errors.push("サーバーが書類生成を許可していません".to_string());
            }
            warn!("書類生成を中止しました: trip_id={trip_id}, errors={errors:?}");
            return Err(AppError::GenerationBlocked(errors));
        }

        let response = self.backend.generate_documents(trip_id).await?;
        info!("書類を生成しました: trip_id={trip_id}, message={}", response.message);
        Ok(response)
    }

    /// 生成済み書類一式（zip）を保存する
    ///
    /// # 戻り値
    /// 保存したファイルのパス
    pub async fn download_package(&self, trip_id: i64, dest_dir: &Path) -> AppResult<PathBuf> {
        let bytes = self.backend.download_package(trip_id).await?;
        if bytes.is_empty() {
            return Err(AppError::Server {
                status: 200,
                message: "ダウンロードした書類が空です".to_string(),
            });
        }

        tokio::fs::create_dir_all(dest_dir).await?;
        let path = dest_dir.join(package_file_name(trip_id));
        tokio::fs::write(&path, &bytes).await?;

        info!(
            "書類一式を保存しました: trip_id={trip_id}, path={}, size={} bytes",
            path.display(),
            bytes.len()
        );
        Ok(path)
    }
}

pub fn package_file_name(trip_id: i64) -> String {
    format!("trip_{trip_id}_documents.zip")
}
