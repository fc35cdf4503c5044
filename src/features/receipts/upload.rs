//! 領収書の一括アップロード
//!
//! 選択されたファイルを1件ずつ順番にアップロードする。各ファイルの結果は独立しており、
//! 失敗しても残りのファイルの処理は続行する。ファイル i の通信と成功後の一覧再取得が
//! 完了するまで、ファイル i+1 の通信は開始しない。自動リトライは行わない。

use super::models::{Receipt, ReceiptWarning, UploadFile};
use super::reconciliation::ReceiptListViewModel;
use crate::features::categories::{resolve_selection, CategoryKey};
use crate::shared::backend::ExpenseBackend;
use crate::shared::errors::{AppError, AppResult};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

/// 失敗の種類
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    /// サーバーが同一内容のファイルとして拒否した（HTTP 409）
    Duplicate,
    /// その他のHTTPエラー
    Server { status: u16 },
    /// 応答なし
    Transport,
    /// 送信前の事前チェックで除外した
    Rejected,
    /// 上記以外（リクエストの組み立てや応答の解釈に失敗した）
    Unexpected,
}

/// ファイル単位の結果
#[derive(Debug, Clone, Serialize)]
pub enum UploadOutcome {
    Succeeded {
        file_name: String,
        receipt: Receipt,
        warnings: Vec<ReceiptWarning>,
    },
    Failed {
        file_name: String,
        reason: String,
        kind: FailureKind,
    },
}

impl UploadOutcome {
    pub fn file_name(&self) -> &str {
        match self {
            UploadOutcome::Succeeded { file_name, .. } | UploadOutcome::Failed { file_name, .. } => {
                file_name
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Succeeded { .. })
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            UploadOutcome::Failed {
                kind: FailureKind::Duplicate,
                ..
            }
        )
    }
}

/// 一括アップロード全体の結果区分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SummaryKind {
    /// 1件も試行していない
    Empty,
    AllSucceeded,
    AllFailed,
    Mixed,
}

/// 一括アップロードの集計（結果から導出し、保存はしない）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successes: usize,
    pub failures: usize,
    /// キャンセルにより試行しなかった件数
    pub skipped: usize,
    pub kind: SummaryKind,
}

impl BatchSummary {
    pub fn from_outcomes(total: usize, outcomes: &[UploadOutcome]) -> Self {
        let successes = outcomes.iter().filter(|o| o.is_success()).count();
        let failures = outcomes.len() - successes;
        let kind = match (successes, failures) {
            (0, 0) => SummaryKind::Empty,
            (_, 0) => SummaryKind::AllSucceeded,
            (0, _) => SummaryKind::AllFailed,
            _ => SummaryKind::Mixed,
        };

        Self {
            total,
            successes,
            failures,
            skipped: total - outcomes.len(),
            kind,
        }
    }

    /// ユーザー向けの集計メッセージ
    pub fn message(&self) -> String {
        let base = match self.kind {
            SummaryKind::Empty => "アップロードしたファイルはありません".to_string(),
            SummaryKind::AllSucceeded => {
                format!("{}件のファイルをすべてアップロードしました", self.successes)
            }
            SummaryKind::AllFailed => {
                format!("{}件のファイルのアップロードにすべて失敗しました", self.failures)
            }
            SummaryKind::Mixed => format!(
                "アップロード完了: 成功 {}件 / 失敗 {}件",
                self.successes, self.failures
            ),
        };

        if self.skipped > 0 {
            format!("{base}（中止により{}件未処理）", self.skipped)
        } else {
            base
        }
    }
}

/// 進捗通知
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// ファイルの送信開始直前（indexは1始まり）
    Progress {
        index: usize,
        total: usize,
        file_name: String,
    },
    /// 成功したファイルのデータ品質警告
    Warning {
        file_name: String,
        warning: ReceiptWarning,
        advisory: String,
    },
    /// ファイル単位の結果確定
    FileFinished { index: usize, outcome: UploadOutcome },
    /// 一覧の再取得に失敗した（アップロード結果には影響しない）
    RefreshFailed { message: String },
    /// 全ファイルの処理完了
    Finished(BatchSummary),
}

/// 一括アップロードの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// 次に処理するファイルの位置（0始まり）
    Ready { next: usize },
    Uploading { index: usize },
    Refreshing { index: usize },
    Cancelled { at: usize },
    Completed,
}

/// 一括アップロードの状態機械
///
/// 状態遷移:
/// `Ready -> Uploading -> (成功) Refreshing -> Ready` / `(失敗) Ready`、
/// 最後に `Completed`、途中で中止された場合は `Cancelled`
#[derive(Debug)]
pub struct UploadBatch {
    trip_id: i64,
    category: CategoryKey,
    total: usize,
    state: BatchState,
    outcomes: Vec<UploadOutcome>,
}

impl UploadBatch {
    pub fn new(trip_id: i64, category: CategoryKey, total: usize) -> Self {
        Self {
            trip_id,
            category,
            total,
            state: BatchState::Ready { next: 0 },
            outcomes: Vec::with_capacity(total),
        }
    }

    pub fn trip_id(&self) -> i64 {
        self.trip_id
    }

    pub fn category(&self) -> &CategoryKey {
        &self.category
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn outcomes(&self) -> &[UploadOutcome] {
        &self.outcomes
    }

    /// 未処理のファイルがあるか
    pub fn has_remaining(&self) -> bool {
        matches!(self.state, BatchState::Ready { next } if next < self.total)
    }

    /// 次のファイルの処理を開始する
    ///
    /// 前のファイルが確定していない場合や全件処理済みの場合はNone
    pub fn start_next(&mut self) -> Option<usize> {
        match self.state {
            BatchState::Ready { next } if next < self.total => {
                self.state = BatchState::Uploading { index: next };
                Some(next)
            }
            _ => None,
        }
    }

    /// 処理中ファイルの結果を記録する
    pub fn record(&mut self, outcome: UploadOutcome) -> AppResult<()> {
        let BatchState::Uploading { index } = self.state else {
            return Err(AppError::validation(format!(
                "アップロード中ではない状態で結果を記録しようとしました: {:?}",
                self.state
            )));
        };

        self.state = if outcome.is_success() {
            BatchState::Refreshing { index }
        } else {
            BatchState::Ready { next: index + 1 }
        };
        self.outcomes.push(outcome);
        Ok(())
    }

    /// 成功後の一覧再取得が終わった
    pub fn refreshed(&mut self) {
        if let BatchState::Refreshing { index } = self.state {
            self.state = BatchState::Ready { next: index + 1 };
        }
    }

    /// 残りのファイルを処理せずに中止する
    pub fn cancel(&mut self) {
        if let BatchState::Ready { next } = self.state {
            self.state = BatchState::Cancelled { at: next };
        }
    }

    /// 全件処理済みとして完了する
    pub fn complete(&mut self) {
        if let BatchState::Ready { next } = self.state {
            if next >= self.total {
                self.state = BatchState::Completed;
            }
        }
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary::from_outcomes(self.total, &self.outcomes)
    }

    fn into_result(self, final_refresh_error: Option<String>) -> BatchResult {
        let summary = self.summary();
        BatchResult {
            trip_id: self.trip_id,
            category: self.category.as_str().to_string(),
            state: self.state,
            outcomes: self.outcomes,
            summary,
            final_refresh_error,
        }
    }
}

/// 一括アップロードの結果
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub trip_id: i64,
    pub category: String,
    pub state: BatchState,
    pub outcomes: Vec<UploadOutcome>,
    pub summary: BatchSummary,
    /// 最終の一覧再取得に失敗した場合の通知
    pub final_refresh_error: Option<String>,
}

impl BatchResult {
    fn empty(trip_id: i64, category: String) -> Self {
        Self {
            trip_id,
            category,
            state: BatchState::Completed,
            outcomes: Vec::new(),
            summary: BatchSummary::from_outcomes(0, &[]),
            final_refresh_error: None,
        }
    }

    pub fn duplicates(&self) -> impl Iterator<Item = &UploadOutcome> {
        self.outcomes.iter().filter(|o| o.is_duplicate())
    }
}

/// 一括アップロードの実行
pub struct UploadTaskRunner {
    backend: Arc<dyn ExpenseBackend>,
    receipts: Arc<ReceiptListViewModel>,
    events: Option<UnboundedSender<UploadEvent>>,
    cancellation: CancellationToken,
}

impl UploadTaskRunner {
    pub fn new(backend: Arc<dyn ExpenseBackend>, receipts: Arc<ReceiptListViewModel>) -> Self {
        Self {
            backend,
            receipts,
            events: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// 進捗通知の送信先を設定
    pub fn with_events(mut self, events: UnboundedSender<UploadEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// 中止用トークンを設定
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    fn emit(&self, event: UploadEvent) {
        if let Some(events) = &self.events {
            if events.send(event).is_err() {
                debug!("進捗通知の受信側が閉じられています");
            }
        }
    }

    /// ファイルを順番にアップロードする
    ///
    /// # 引数
    /// * `trip_id` - 開いている出張のID
    /// * `files` - 選択順のファイル
    /// * `selected_category` - 選択されたカテゴリー（`custom` ならカスタム入力を使用）
    /// * `custom_category` - カスタム入力欄の値
    ///
    /// # エラー
    /// 出張が開かれていない場合は `NoActiveTrip`、カテゴリーが不正な場合は `Validation`。
    /// いずれも通信は一切行わない。個々のファイルの失敗はエラーではなく結果に含まれる。
    pub async fn run_batch(
        &self,
        trip_id: i64,
        files: Vec<UploadFile>,
        selected_category: &str,
        custom_category: Option<&str>,
    ) -> AppResult<BatchResult> {
        if self.receipts.active_trip().await != Some(trip_id) {
            warn!("開かれていない出張へのアップロードを拒否しました: trip_id={trip_id}");
            return Err(AppError::NoActiveTrip(Some(trip_id)));
        }

        let category = resolve_selection(selected_category, custom_category)?;

        if files.is_empty() {
            debug!("アップロード対象のファイルがありません: trip_id={trip_id}");
            return Ok(BatchResult::empty(trip_id, category.as_str().to_string()));
        }

        let _guard = self.receipts.lock_mutations().await;

        // ロック待ちの間に出張が閉じられた、または切り替えられた場合
        if self.receipts.active_trip().await != Some(trip_id) {
            warn!("ロック取得までに出張が切り替わったためアップロードを中止しました: trip_id={trip_id}");
            return Err(AppError::NoActiveTrip(Some(trip_id)));
        }

        let started = Instant::now();
        info!(
            "一括アップロード開始: trip_id={trip_id}, files={}, category={category}",
            files.len()
        );

        let mut batch = UploadBatch::new(trip_id, category, files.len());

        loop {
            if self.cancellation.is_cancelled() && batch.has_remaining() {
                warn!("一括アップロードが中止されました: trip_id={trip_id}");
                batch.cancel();
                break;
            }

            let Some(index) = batch.start_next() else {
                break;
            };
            let file = &files[index];

            self.emit(UploadEvent::Progress {
                index: index + 1,
                total: batch.total(),
                file_name: file.file_name.clone(),
            });

            let outcome = self.attempt(trip_id, file, batch.category()).await;
            let succeeded = outcome.is_success();

            if let UploadOutcome::Succeeded {
                file_name,
                warnings,
                ..
            } = &outcome
            {
                for warning in warnings {
                    self.emit(UploadEvent::Warning {
                        file_name: file_name.clone(),
                        warning: warning.clone(),
                        advisory: warning.advisory(),
                    });
                }
            }

            self.emit(UploadEvent::FileFinished {
                index: index + 1,
                outcome: outcome.clone(),
            });
            batch.record(outcome.clone())?;

            if succeeded {
                if let UploadOutcome::Succeeded { receipt, .. } = &outcome {
                    self.refresh(trip_id, Some(receipt)).await;
                }
                batch.refreshed();
            }
        }

        batch.complete();
        let summary = batch.summary();
        info!(
            "一括アップロード終了: trip_id={trip_id}, 成功={}, 失敗={}, 未処理={}, duration={:?}",
            summary.successes,
            summary.failures,
            summary.skipped,
            started.elapsed()
        );
        self.emit(UploadEvent::Finished(summary));

        let final_refresh_error = self.refresh(trip_id, None).await;
        Ok(batch.into_result(final_refresh_error))
    }

    /// 1ファイルのアップロードを試行し、結果を分類する
    async fn attempt(&self, trip_id: i64, file: &UploadFile, category: &CategoryKey) -> UploadOutcome {
        let file_name = file.file_name.clone();

        if let Err(reason) = file.check_uploadable() {
            warn!("事前チェックで除外しました: file={file_name}, reason={reason}");
            return UploadOutcome::Failed {
                file_name,
                reason,
                kind: FailureKind::Rejected,
            };
        }

        match self
            .backend
            .upload_receipt(trip_id, file, category.as_str())
            .await
        {
            Ok(response) => {
                let receipt = response.into_receipt(trip_id);
                info!(
                    "アップロード成功: file={file_name}, receipt_id={}, warnings={}",
                    receipt.id,
                    receipt.warnings.len()
                );
                UploadOutcome::Succeeded {
                    file_name,
                    warnings: receipt.warnings.clone(),
                    receipt,
                }
            }
            Err(AppError::Duplicate(message)) => {
                warn!("重複ファイルとして拒否されました: file={file_name}");
                UploadOutcome::Failed {
                    file_name,
                    reason: message,
                    kind: FailureKind::Duplicate,
                }
            }
            Err(AppError::Server { status, message }) => {
                warn!("アップロード失敗: file={file_name}, status={status}, message={message}");
                UploadOutcome::Failed {
                    file_name,
                    reason: message,
                    kind: FailureKind::Server { status },
                }
            }
            Err(error @ AppError::Transport(_)) => {
                warn!("アップロード通信失敗: file={file_name}, error={error}");
                UploadOutcome::Failed {
                    file_name,
                    reason: error.user_message().to_string(),
                    kind: FailureKind::Transport,
                }
            }
            Err(other) => {
                warn!("アップロード失敗: file={file_name}, error={other}");
                UploadOutcome::Failed {
                    file_name,
                    reason: other.user_message().to_string(),
                    kind: FailureKind::Unexpected,
                }
            }
        }
    }

    /// 一覧を再取得する。失敗しても一覧は直前の状態のまま残る
    async fn refresh(&self, trip_id: i64, uploaded: Option<&Receipt>) -> Option<String> {
        match self.receipts.load(trip_id).await {
            Ok(_) => {
                if let Some(receipt) = uploaded {
                    self.receipts.attach_warnings(receipt).await;
                }
                None
            }
            Err(e) => {
                let message = e.user_message().to_string();
                warn!("アップロード後の一覧再取得に失敗しました: trip_id={trip_id}, error={e}");
                self.emit(UploadEvent::RefreshFailed {
                    message: message.clone(),
                });
                Some(message)
            }
        }
    }
}
