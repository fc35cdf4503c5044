use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// サーバーが計算した精算プレビュー（GET /trips/{id}/preview）
///
/// 金額はすべてサーバー側で計算済みで、クライアントでは再計算しない。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewPayload {
    pub trip_id: i64,
    pub destination: String,
    pub dates: String,
    pub receipts_count: usize,
    #[serde(default)]
    pub expenses_by_category: HashMap<String, f64>,
    pub per_diem_days: i64,
    pub per_diem_total: f64,
    pub per_diem_deduction: f64,
    pub per_diem_to_pay: f64,
    #[serde(default)]
    pub total_receipts_amount: f64,
    pub total_expenses: f64,
    pub advance_rub: f64,
    /// 正: 従業員が返金、負: 会社が追加支払い
    pub to_return: f64,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    pub can_generate: bool,
}

/// 書類生成APIの応答
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub message: String,
    #[serde(default)]
    pub files: serde_json::Value,
}
