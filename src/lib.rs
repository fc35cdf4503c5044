// 機能モジュール構造
pub mod features;
pub mod shared;

use features::preview::GenerationGate;
use features::receipts::{ReceiptListViewModel, UploadTaskRunner};
use features::trips::TripService;
use log::info;
use shared::api_client::ApiClient;
use shared::backend::ExpenseBackend;
use shared::config::initialize_application;
use shared::errors::AppResult;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// アプリケーション状態（バックエンドと各機能のサービスを保持）
///
/// グローバル変数は使わず、画面層はこのコンテキストを経由して各機能にアクセスする。
pub struct AppContext {
    backend: Arc<dyn ExpenseBackend>,
    receipts: Arc<ReceiptListViewModel>,
    trips: TripService,
    generation: GenerationGate,
    download_dir: PathBuf,
}

impl AppContext {
    /// 任意のバックエンドからコンテキストを構築する
    pub fn new(backend: Arc<dyn ExpenseBackend>, download_dir: PathBuf) -> Self {
        let receipts = Arc::new(ReceiptListViewModel::new(backend.clone()));
        let trips = TripService::new(backend.clone(), receipts.clone());
        let generation = GenerationGate::new(backend.clone());

        Self {
            backend,
            receipts,
            trips,
            generation,
            download_dir,
        }
    }

    /// 環境変数と.envファイルからコンテキストを構築する
    ///
    /// ログシステムの初期化もここで行う
    pub fn from_env() -> AppResult<Self> {
        let init = initialize_application()?;
        let client = ApiClient::new(init.api_config)?;
        info!("APIクライアントを初期化しました: {}", client.config().base_url);
        Ok(Self::new(Arc::new(client), init.download_dir))
    }

    pub fn backend(&self) -> Arc<dyn ExpenseBackend> {
        self.backend.clone()
    }

    /// 領収書一覧ビューモデル
    pub fn receipts(&self) -> Arc<ReceiptListViewModel> {
        self.receipts.clone()
    }

    pub fn trips(&self) -> &TripService {
        &self.trips
    }

    pub fn generation(&self) -> &GenerationGate {
        &self.generation
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// 一括アップロードの実行器を作成する（進捗通知や中止トークンは呼び出し側で設定）
    pub fn upload_runner(&self) -> UploadTaskRunner {
        UploadTaskRunner::new(self.backend.clone(), self.receipts.clone())
    }

    /// 生成済み書類を既定の保存先にダウンロードする
    pub async fn download_documents(&self, trip_id: i64) -> AppResult<PathBuf> {
        self.generation
            .download_package(trip_id, &self.download_dir)
            .await
    }
}
