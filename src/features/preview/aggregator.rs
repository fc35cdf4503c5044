//! 精算プレビューの表示整形
//!
//! サーバーが計算した金額をそのまま表示用に整形する。金額の再計算や
//! 書類生成可否の再判定は行わない。

use super::models::PreviewPayload;
use crate::features::categories::{normalize, Category, CategoryKey};
use serde::Serialize;

/// 差額の区分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BalanceKind {
    /// 従業員が返金する
    Refund,
    /// 会社が追加で支払う
    Surcharge,
    Even,
}

impl BalanceKind {
    pub fn from_amount(to_return: f64) -> Self {
        if to_return > 0.0 {
            BalanceKind::Refund
        } else if to_return < 0.0 {
            BalanceKind::Surcharge
        } else {
            BalanceKind::Even
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BalanceKind::Refund => "К возврату",
            BalanceKind::Surcharge => "К доплате",
            BalanceKind::Even => "В ноль",
        }
    }
}

/// カテゴリー別の経費行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryLine {
    pub key: String,
    pub label: String,
    pub amount: f64,
    pub formatted: String,
}

/// 差額の表示
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceLine {
    pub kind: BalanceKind,
    pub label: String,
    /// 符号を除いた金額
    pub formatted: String,
}

/// 日当の表示
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerDiemLine {
    pub days: i64,
    pub total: String,
    pub deduction: String,
    pub to_pay: String,
}

/// 表示用に整形したプレビュー
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewDisplay {
    pub destination: String,
    pub dates: String,
    pub receipts_count: usize,
    pub categories: Vec<CategoryLine>,
    pub per_diem: PerDiemLine,
    pub total_receipts: String,
    pub total_expenses: String,
    pub advance: String,
    pub balance: BalanceLine,
    /// エラーがある場合のみ表示する（書類生成を止める）
    pub error_panel: Option<Vec<String>>,
    /// 警告がある場合のみ表示する（書類生成は止めない）
    pub warning_panel: Option<Vec<String>>,
}

/// 整形結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedPreview {
    pub display: PreviewDisplay,
    /// サーバーの判定をそのまま使用する
    pub can_generate: bool,
}

impl RenderedPreview {
    pub fn errors(&self) -> Vec<String> {
        self.display.error_panel.clone().unwrap_or_default()
    }
}

/// プレビュー整形
pub struct PreviewAggregator;

impl PreviewAggregator {
    pub fn render(payload: &PreviewPayload) -> RenderedPreview {
        let balance_kind = BalanceKind::from_amount(payload.to_return);

        let display = PreviewDisplay {
            destination: payload.destination.clone(),
            dates: payload.dates.clone(),
            receipts_count: payload.receipts_count,
            categories: category_lines(payload),
            per_diem: PerDiemLine {
                days: payload.per_diem_days,
                total: format_rub(payload.per_diem_total),
                deduction: format_rub(payload.per_diem_deduction),
                to_pay: format_rub(payload.per_diem_to_pay),
            },
            total_receipts: format_rub(payload.total_receipts_amount),
            total_expenses: format_rub(payload.total_expenses),
            advance: format_rub(payload.advance_rub),
            balance: BalanceLine {
                kind: balance_kind,
                label: balance_kind.label().to_string(),
                formatted: format_rub(payload.to_return.abs()),
            },
            error_panel: non_empty(&payload.errors),
            warning_panel: non_empty(&payload.warnings),
        };

        RenderedPreview {
            display,
            can_generate: payload.can_generate,
        }
    }
}

fn non_empty(messages: &[String]) -> Option<Vec<String>> {
    if messages.is_empty() {
        None
    } else {
        Some(messages.to_vec())
    }
}

/// サーバーの集計行をそのまま1行ずつ並べる（金額は合算しない）
///
/// 並び順は正規カテゴリーの表示順、その後にカスタムカテゴリーの名前順。
/// 同じ位置の行はサーバーのキーで並べる。
fn category_lines(payload: &PreviewPayload) -> Vec<CategoryLine> {
    let custom_position = Category::ALL.len();

    let mut lines: Vec<(usize, CategoryLine)> = payload
        .expenses_by_category
        .iter()
        .map(|(raw, amount)| {
            let (position, label) = match normalize(raw) {
                CategoryKey::Canonical(category) => (
                    Category::ALL
                        .iter()
                        .position(|c| *c == category)
                        .unwrap_or(custom_position),
                    category.display_name().to_string(),
                ),
                CategoryKey::Custom(name) => (custom_position, name),
            };

            let line = CategoryLine {
                key: raw.clone(),
                label,
                amount: *amount,
                formatted: format_rub(*amount),
            };
            (position, line)
        })
        .collect();

    lines.sort_by(|(a_pos, a), (b_pos, b)| {
        a_pos
            .cmp(b_pos)
            .then_with(|| a.label.cmp(&b.label))
            .then_with(|| a.key.cmp(&b.key))
    });
    lines.into_iter().map(|(_, line)| line).collect()
}

/// ルーブル表記（3桁区切り、小数2桁）
pub fn format_rub(amount: f64) -> String {
    if !amount.is_finite() {
        return "-".to_string();
    }

    let kopecks = (amount.abs() * 100.0).round() as u64;
    let rubles = (kopecks / 100).to_string();

    let mut grouped = String::with_capacity(rubles.len() + rubles.len() / 3);
    for (i, digit) in rubles.chars().enumerate() {
        if i > 0 && (rubles.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && kopecks > 0 { "-" } else { "" };
    format!("{sign}{grouped},{:02} ₽", kopecks % 100)
}
