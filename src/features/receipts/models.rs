// 領収書機能のデータモデル

use crate::shared::errors::{AppError, AppResult};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// アップロード可能な最大ファイルサイズ（サーバー側の制限と同じ25MB）
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// アップロード可能な拡張子
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png"];

/// 出張に紐づく領収書
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: i64,
    /// 所属する出張ID（出張取得APIの応答には含まれないため読み込み時に設定する）
    #[serde(default)]
    pub trip_id: i64,
    pub category: String,
    pub amount: Option<f64>,
    pub receipt_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub org_name: Option<String>,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub has_qr: bool,
    #[serde(default)]
    pub warnings: Vec<ReceiptWarning>,
}

impl Receipt {
    /// 金額が未入力かどうか
    pub fn is_missing_amount(&self) -> bool {
        self.amount.is_none()
    }
}

/// OCR抽出時のデータ品質警告
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReceiptWarning {
    /// 金額が許容範囲外（0〜200000）のため破棄された
    AmountOutOfRange,
    /// 金額を数値として解釈できなかった
    AmountInvalid,
    /// 金額を検出できなかった
    AmountMissing,
    /// 未知の警告タグ
    Unknown(String),
}

impl ReceiptWarning {
    /// サーバーが返すタグ文字列
    pub fn tag(&self) -> &str {
        match self {
            ReceiptWarning::AmountOutOfRange => "amount_out_of_range",
            ReceiptWarning::AmountInvalid => "amount_invalid",
            ReceiptWarning::AmountMissing => "amount_missing",
            ReceiptWarning::Unknown(tag) => tag,
        }
    }

    /// ユーザーに表示する注意文
    pub fn advisory(&self) -> String {
        match self {
            ReceiptWarning::AmountOutOfRange => {
                "認識された金額が範囲外（0〜200000）のため破棄されました。金額を手入力してください"
                    .to_string()
            }
            ReceiptWarning::AmountInvalid => {
                "金額を正しく読み取れませんでした。金額を確認してください".to_string()
            }
            ReceiptWarning::AmountMissing => {
                "金額が検出されませんでした。金額を手入力してください".to_string()
            }
            ReceiptWarning::Unknown(tag) => format!("データ品質の警告: {tag}"),
        }
    }
}

impl From<String> for ReceiptWarning {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "amount_out_of_range" => ReceiptWarning::AmountOutOfRange,
            "amount_invalid" => ReceiptWarning::AmountInvalid,
            "amount_missing" => ReceiptWarning::AmountMissing,
            _ => ReceiptWarning::Unknown(tag),
        }
    }
}

impl From<ReceiptWarning> for String {
    fn from(warning: ReceiptWarning) -> Self {
        warning.tag().to_string()
    }
}

/// アップロードAPIの応答
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub id: i64,
    pub file_name: String,
    pub category: String,
    pub amount: Option<f64>,
    pub receipt_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub has_qr: bool,
    #[serde(default)]
    pub qr_data: Option<serde_json::Value>,
    #[serde(default)]
    pub warnings: Vec<ReceiptWarning>,
}

impl UploadResponse {
    /// 応答を出張IDに紐づいた領収書に変換
    pub fn into_receipt(self, trip_id: i64) -> Receipt {
        Receipt {
            id: self.id,
            trip_id,
            category: self.category,
            amount: self.amount,
            receipt_date: self.receipt_date,
            org_name: None,
            file_name: self.file_name,
            has_qr: self.has_qr,
            warnings: self.warnings,
        }
    }
}

/// 領収書更新用DTO（PUT /receipts/{id}）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiptPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_date: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_name: Option<String>,
}

impl ReceiptPatch {
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.amount.is_none()
            && self.receipt_date.is_none()
            && self.org_name.is_none()
    }
}

/// 領収書更新APIの応答
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptUpdateResponse {
    pub id: i64,
    pub category: String,
    pub amount: Option<f64>,
    pub receipt_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub org_name: Option<String>,
}

/// アップロード対象ファイル
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub data: Vec<u8>,
}

impl UploadFile {
    pub fn new<S: Into<String>>(file_name: S, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            data,
        }
    }

    /// ファイルパスから読み込む
    pub async fn from_path(path: &Path) -> AppResult<Self> {
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                AppError::validation(format!(
                    "ファイル名の取得に失敗しました: {}",
                    path.display()
                ))
            })?
            .to_string();

        let data = tokio::fs::read(path).await?;
        log::debug!("ファイルを読み込みました: {file_name} ({} bytes)", data.len());

        Ok(Self { file_name, data })
    }

    /// 小文字の拡張子
    pub fn extension(&self) -> String {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_lowercase()
    }

    /// ファイル名からContent-Typeを取得
    pub fn content_type(&self) -> &'static str {
        match self.extension().as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "pdf" => "application/pdf",
            _ => "application/octet-stream",
        }
    }

    /// 送信前の事前チェック（サーバーが必ず拒否するファイルは送らない）
    pub fn check_uploadable(&self) -> Result<(), String> {
        if self.data.is_empty() {
            return Err("空のファイルです".to_string());
        }

        let extension = self.extension();
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(format!(
                "対応していないファイル形式です: .{extension}（対応形式: {}）",
                ALLOWED_EXTENSIONS.join(", ")
            ));
        }

        if self.data.len() > MAX_UPLOAD_BYTES {
            return Err(format!(
                "ファイルサイズが制限を超えています: {} bytes (最大: {MAX_UPLOAD_BYTES} bytes)",
                self.data.len()
            ));
        }

        Ok(())
    }
}
