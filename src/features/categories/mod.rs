/// カテゴリー機能モジュール
///
/// 正規カテゴリーの定義と、自由入力・表示名からの正規化を提供します。
pub mod models;
pub mod normalizer;

pub use models::{Category, CategoryKey, CATEGORY_ALIASES};
pub use normalizer::{normalize, resolve_selection, CUSTOM_SENTINEL};
