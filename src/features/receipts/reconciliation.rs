//! 領収書一覧の照合ビューモデル
//!
//! 出張ごとの領収書一覧を保持し、サーバー応答で丸ごと置き換える。
//! 更新・削除は必ずサーバーとの往復で確定させ、成功後に一覧を再取得する。
//! 失敗時は直前の一覧をそのまま残す。

use super::models::{Receipt, ReceiptPatch};
use crate::features::categories::{normalize, resolve_selection, CategoryKey};
use crate::shared::backend::ExpenseBackend;
use crate::shared::errors::{AppError, AppResult};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};

/// 金額入力から取り除く記号（空白、通貨表記）
static AMOUNT_NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s|₽|руб\.?|р\.").expect("金額ノイズの正規表現が不正です")
});

/// 数値として受け付ける金額の形式
static AMOUNT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d+(?:\.\d+)?$").expect("金額の正規表現が不正です"));

const DATE_FORMATS: &[&str] = &["%d.%m.%Y", "%Y-%m-%d"];
const DATETIME_FORMATS: &[&str] = &[
    "%d.%m.%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

/// 削除前の確認（UI側のダイアログなど）
pub trait DeleteConfirmation: Send + Sync {
    fn confirm(&self, receipt: &Receipt) -> bool;
}

impl<F> DeleteConfirmation for F
where
    F: Fn(&Receipt) -> bool + Send + Sync,
{
    fn confirm(&self, receipt: &Receipt) -> bool {
        self(receipt)
    }
}

/// インライン編集の入力値（画面のテキストそのまま）
#[derive(Debug, Clone, Default)]
pub struct QuickEdit {
    pub category: String,
    pub custom_category: Option<String>,
    pub amount: String,
    /// 空の場合は日付を変更しない
    pub receipt_date: String,
}

impl QuickEdit {
    /// 入力を検証して更新内容に変換する（ネットワーク送信前）
    pub fn to_patch(&self) -> AppResult<ReceiptPatch> {
        let category = resolve_selection(&self.category, self.custom_category.as_deref())?;
        let amount = parse_amount(&self.amount)?;
        let receipt_date = parse_receipt_date(&self.receipt_date)?;

        Ok(ReceiptPatch {
            category: Some(category.as_str().to_string()),
            amount: Some(amount),
            receipt_date,
            org_name: None,
        })
    }
}

/// 金額の入力文字列を数値に変換する
///
/// 空白・通貨表記を除去し、小数点のカンマを許容する
pub fn parse_amount(input: &str) -> AppResult<f64> {
    let cleaned = AMOUNT_NOISE.replace_all(input, "").replace(',', ".");

    if cleaned.is_empty() {
        return Err(AppError::validation("金額を入力してください"));
    }

    if !AMOUNT_PATTERN.is_match(&cleaned) {
        return Err(AppError::validation(format!(
            "金額は数値で入力してください: {input}"
        )));
    }

    cleaned
        .parse::<f64>()
        .map_err(|_| AppError::validation(format!("金額は数値で入力してください: {input}")))
}

/// 日付の入力文字列を変換する（空ならNone）
pub fn parse_receipt_date(input: &str) -> AppResult<Option<NaiveDateTime>> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }

    for format in DATETIME_FORMATS {
        if let Ok(value) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(Some(value));
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(input, format) {
            return Ok(date.and_hms_opt(0, 0, 0));
        }
    }

    Err(AppError::validation(format!(
        "日付の形式が正しくありません（例: 31.12.2024）: {input}"
    )))
}

/// 一覧の絞り込み条件
#[derive(Debug, Clone, Default)]
pub struct ReceiptFilter {
    pub category: Option<CategoryKey>,
    pub missing_amount_only: bool,
    pub with_warnings_only: bool,
}

impl ReceiptFilter {
    pub fn matches(&self, receipt: &Receipt) -> bool {
        if let Some(category) = &self.category {
            if normalize(&receipt.category) != *category {
                return false;
            }
        }
        if self.missing_amount_only && !receipt.is_missing_amount() {
            return false;
        }
        if self.with_warnings_only && receipt.warnings.is_empty() {
            return false;
        }
        true
    }
}

#[derive(Debug, Default)]
struct ListState {
    active_trip: Option<i64>,
    /// 出張の切り替えごとに増える世代番号
    epoch: u64,
    receipts: Vec<Receipt>,
    loaded_at: Option<DateTime<Local>>,
    /// 直近の読み込み失敗の通知（次の成功で消える）
    load_notice: Option<String>,
}

/// 領収書一覧ビューモデル
pub struct ReceiptListViewModel {
    backend: Arc<dyn ExpenseBackend>,
    state: RwLock<ListState>,
    /// 出張単位の変更操作（一括アップロード・編集・削除）と出張の切り替えを直列化する
    mutation_lock: Mutex<()>,
}

impl ReceiptListViewModel {
    pub fn new(backend: Arc<dyn ExpenseBackend>) -> Self {
        Self {
            backend,
            state: RwLock::new(ListState::default()),
            mutation_lock: Mutex::new(()),
        }
    }

    /// 変更操作用のロックを取得する
    pub async fn lock_mutations(&self) -> MutexGuard<'_, ()> {
        self.mutation_lock.lock().await
    }

    /// 現在開いている出張ID
    pub async fn active_trip(&self) -> Option<i64> {
        self.state.read().await.active_trip
    }

    /// 出張を開いて一覧を読み込む
    ///
    /// 実行中の変更操作の完了を待ってから切り替える。
    /// 読み込みに失敗した場合は以前の出張と一覧を維持する
    pub async fn open(&self, trip_id: i64) -> AppResult<usize> {
        let _guard = self.lock_mutations().await;
        info!("出張を開きます: trip_id={trip_id}");
        let receipts = self.fetch(trip_id).await?;

        let mut state = self.state.write().await;
        state.epoch += 1;
        state.active_trip = Some(trip_id);
        state.receipts.clear();
        Ok(Self::replace(&mut state, trip_id, receipts))
    }

    /// 開いている出張を閉じる
    pub async fn close(&self) {
        let _guard = self.lock_mutations().await;
        let mut state = self.state.write().await;
        debug!("出張を閉じます: trip_id={:?}", state.active_trip);
        let epoch = state.epoch + 1;
        *state = ListState {
            epoch,
            ..ListState::default()
        };
    }

    /// サーバーから一覧を丸ごと読み込む
    ///
    /// 読み込み中に別の出張が開かれた、または閉じられた場合は結果を破棄する
    ///
    /// # エラー
    /// 開いている出張と異なる場合は `NoActiveTrip`、通信失敗は `Load`（一覧は維持）
    pub async fn load(&self, trip_id: i64) -> AppResult<usize> {
        let epoch = {
            let state = self.state.read().await;
            if state.active_trip != Some(trip_id) {
                return Err(AppError::NoActiveTrip(Some(trip_id)));
            }
            state.epoch
        };

        let fetched = self.fetch(trip_id).await;

        let mut state = self.state.write().await;
        if state.epoch != epoch || state.active_trip != Some(trip_id) {
            debug!(
                "読み込み中に出張が切り替わったため結果を破棄しました: trip_id={trip_id}, active={:?}",
                state.active_trip
            );
            return Err(AppError::NoActiveTrip(Some(trip_id)));
        }

        match fetched {
            Ok(receipts) => Ok(Self::replace(&mut state, trip_id, receipts)),
            Err(e) => {
                state.load_notice = Some(e.user_message().to_string());
                Err(e)
            }
        }
    }

    /// 開いている出張の一覧を再読み込み
    pub async fn refresh(&self) -> AppResult<usize> {
        let trip_id = self
            .active_trip()
            .await
            .ok_or(AppError::NoActiveTrip(None))?;
        self.load(trip_id).await
    }

    async fn fetch(&self, trip_id: i64) -> AppResult<Vec<Receipt>> {
        let trip = self.backend.get_trip(trip_id).await.map_err(|e| {
            warn!("領収書一覧の読み込みに失敗しました: trip_id={trip_id}, error={e}");
            AppError::Load(e.details())
        })?;

        Ok(trip
            .receipts
            .into_iter()
            .map(|mut receipt| {
                receipt.trip_id = trip_id;
                receipt
            })
            .collect())
    }

    fn replace(state: &mut ListState, trip_id: i64, mut receipts: Vec<Receipt>) -> usize {
        // アップロード直後の警告は出張取得APIに含まれないため引き継ぐ
        for receipt in receipts.iter_mut() {
            if receipt.warnings.is_empty() {
                if let Some(previous) = state.receipts.iter().find(|r| r.id == receipt.id) {
                    receipt.warnings = previous.warnings.clone();
                }
            }
        }

        let count = receipts.len();
        state.receipts = receipts;
        state.loaded_at = Some(Local::now());
        state.load_notice = None;
        debug!("領収書一覧を更新しました: trip_id={trip_id}, count={count}");
        count
    }

    /// アップロード応答の警告を一覧の該当領収書に反映する
    pub async fn attach_warnings(&self, receipt: &Receipt) {
        let mut state = self.state.write().await;
        if let Some(existing) = state.receipts.iter_mut().find(|r| r.id == receipt.id) {
            existing.warnings = receipt.warnings.clone();
        }
    }

    /// 直近の読み込み失敗の通知
    pub async fn load_notice(&self) -> Option<String> {
        self.state.read().await.load_notice.clone()
    }

    /// 最終読み込み日時
    pub async fn loaded_at(&self) -> Option<DateTime<Local>> {
        self.state.read().await.loaded_at
    }

    /// サーバー順のままの一覧
    pub async fn snapshot(&self) -> Vec<Receipt> {
        self.state.read().await.receipts.clone()
    }

    /// 表示順（ID降順、新しい順）の一覧
    pub async fn ordered(&self) -> Vec<Receipt> {
        let mut receipts = self.snapshot().await;
        receipts.sort_by(|a, b| b.id.cmp(&a.id));
        receipts
    }

    /// 絞り込んだ一覧（表示順）
    pub async fn filtered(&self, filter: &ReceiptFilter) -> Vec<Receipt> {
        self.ordered()
            .await
            .into_iter()
            .filter(|receipt| filter.matches(receipt))
            .collect()
    }

    /// データ品質の警告が付いた領収書（表示順）
    pub async fn receipts_with_warnings(&self) -> Vec<Receipt> {
        self.filtered(&ReceiptFilter {
            with_warnings_only: true,
            ..ReceiptFilter::default()
        })
        .await
    }

    async fn find(&self, receipt_id: i64) -> AppResult<Receipt> {
        self.state
            .read()
            .await
            .receipts
            .iter()
            .find(|r| r.id == receipt_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("領収書(id={receipt_id})")))
    }

    /// 編集内容をサーバーに送信し、成功したら一覧を再取得する
    pub async fn apply_edit(&self, receipt_id: i64, patch: &ReceiptPatch) -> AppResult<()> {
        if patch.is_empty() {
            return Err(AppError::validation("変更内容がありません"));
        }

        let _guard = self.lock_mutations().await;
        let receipt = self.find(receipt_id).await?;

        info!(
            "領収書を更新します: receipt_id={receipt_id}, trip_id={}",
            receipt.trip_id
        );
        self.backend.update_receipt(receipt_id, patch).await?;
        info!("領収書の更新に成功しました: receipt_id={receipt_id}");

        self.refresh_after_mutation(receipt.trip_id).await;
        Ok(())
    }

    /// インライン編集（金額・日付・カテゴリーの直接入力）
    ///
    /// 入力エラーはネットワーク送信前にバリデーションエラーとして返す
    pub async fn quick_edit(&self, receipt_id: i64, input: &QuickEdit) -> AppResult<()> {
        let patch = input.to_patch()?;
        self.apply_edit(receipt_id, &patch).await
    }

    /// 確認の上で領収書を削除する
    ///
    /// # 戻り値
    /// 削除した場合はtrue、確認で取り消された場合はfalse
    pub async fn remove(
        &self,
        receipt_id: i64,
        confirmation: &dyn DeleteConfirmation,
    ) -> AppResult<bool> {
        let receipt = self.find(receipt_id).await?;

        if !confirmation.confirm(&receipt) {
            debug!("領収書の削除が取り消されました: receipt_id={receipt_id}");
            return Ok(false);
        }

        let _guard = self.lock_mutations().await;
        self.backend.delete_receipt(receipt_id).await.map_err(|e| {
            warn!("領収書の削除に失敗しました: receipt_id={receipt_id}, error={e}");
            e
        })?;
        info!("領収書を削除しました: receipt_id={receipt_id}");

        self.refresh_after_mutation(receipt.trip_id).await;
        Ok(true)
    }

    /// 変更成功後の再取得（失敗しても変更自体は確定している）
    async fn refresh_after_mutation(&self, trip_id: i64) {
        if let Err(e) = self.load(trip_id).await {
            warn!("変更後の一覧再取得に失敗しました: trip_id={trip_id}, error={e}");
        }
    }
}
