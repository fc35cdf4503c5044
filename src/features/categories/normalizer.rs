//! カテゴリー正規化
//!
//! 画面で選択された正規キー、カスタム入力、インライン編集で入力された表示名を
//! 正規カテゴリーキーに変換する。副作用もI/Oも持たない。

use super::models::{Category, CategoryKey};
use crate::shared::errors::{AppError, AppResult};

/// カスタムカテゴリーを示す選択値
pub const CUSTOM_SENTINEL: &str = "custom";

/// 生の文字列を正規カテゴリーキーに変換する
///
/// 別名テーブルに一致しない文字列は変更せずにカスタムカテゴリーとして返す。
pub fn normalize(raw: &str) -> CategoryKey {
    match Category::from_alias(raw) {
        Some(category) => CategoryKey::Canonical(category),
        None => CategoryKey::Custom(raw.to_string()),
    }
}

/// 選択値とカスタム入力欄からアップロード/編集に使うカテゴリーを決定する
///
/// # 引数
/// * `selected` - 選択されたカテゴリー（`custom` の場合はカスタム入力欄を使用）
/// * `custom_text` - カスタム入力欄の値
///
/// # エラー
/// 選択値が空、または `custom` でカスタム入力欄が空の場合はバリデーションエラー
pub fn resolve_selection(selected: &str, custom_text: Option<&str>) -> AppResult<CategoryKey> {
    let selected = selected.trim();

    if selected.is_empty() {
        return Err(AppError::validation("カテゴリーを選択してください"));
    }

    if selected.eq_ignore_ascii_case(CUSTOM_SENTINEL) {
        let custom = custom_text.map(str::trim).unwrap_or_default();
        if custom.is_empty() {
            return Err(AppError::validation(
                "カスタムカテゴリーを入力してください（custom category required）",
            ));
        }
        return Ok(normalize(custom));
    }

    Ok(normalize(selected))
}
