use serde::{Deserialize, Serialize};
use std::fmt;

/// 正規カテゴリー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Taxi,
    Fuel,
    Airplane,
    Train,
    Bus,
    Hotel,
    Other,
}

/// 別名テーブル（小文字で比較する）
///
/// `ресторан` / `restaurant` が `Bus` に対応しているのは既存データとの互換のため。
/// 本来は別カテゴリーの可能性があるが、確認が取れるまでこの対応を維持する。
pub const CATEGORY_ALIASES: &[(&str, Category)] = &[
    ("taxi", Category::Taxi),
    ("такси", Category::Taxi),
    ("fuel", Category::Fuel),
    ("топливо", Category::Fuel),
    ("airplane", Category::Airplane),
    ("flight", Category::Airplane),
    ("самолет", Category::Airplane),
    ("train", Category::Train),
    ("поезд", Category::Train),
    ("bus", Category::Bus),
    ("автобус", Category::Bus),
    ("restaurant", Category::Bus),
    ("ресторан", Category::Bus),
    ("hotel", Category::Hotel),
    ("гостиница", Category::Hotel),
    ("other", Category::Other),
    ("представительские", Category::Other),
];

impl Category {
    /// 表示順に並べた全カテゴリー
    pub const ALL: [Category; 7] = [
        Category::Taxi,
        Category::Fuel,
        Category::Airplane,
        Category::Train,
        Category::Bus,
        Category::Hotel,
        Category::Other,
    ];

    /// APIで使用するキー
    pub fn key(self) -> &'static str {
        match self {
            Category::Taxi => "taxi",
            Category::Fuel => "fuel",
            Category::Airplane => "airplane",
            Category::Train => "train",
            Category::Bus => "bus",
            Category::Hotel => "hotel",
            Category::Other => "other",
        }
    }

    /// 書類に記載する表示名
    pub fn display_name(self) -> &'static str {
        match self {
            Category::Taxi => "Такси",
            Category::Fuel => "Топливо",
            Category::Airplane => "Самолет",
            Category::Train => "Поезд",
            Category::Bus => "Автобус",
            Category::Hotel => "Гостиница",
            Category::Other => "Прочее",
        }
    }

    /// このカテゴリーに解決される別名一覧
    pub fn aliases(self) -> Vec<&'static str> {
        CATEGORY_ALIASES
            .iter()
            .filter(|(_, category)| *category == self)
            .map(|(alias, _)| *alias)
            .collect()
    }

    /// 別名からカテゴリーを検索する（前後の空白を除き、大文字小文字を区別しない）
    pub fn from_alias(raw: &str) -> Option<Category> {
        let lower = raw.trim().to_lowercase();
        CATEGORY_ALIASES
            .iter()
            .find(|(alias, _)| *alias == lower)
            .map(|(_, category)| *category)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// 正規化後のカテゴリーキー
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CategoryKey {
    /// 正規カテゴリー
    Canonical(Category),
    /// ユーザー定義カテゴリー（入力文字列そのまま）
    Custom(String),
}

impl CategoryKey {
    /// API送信用の文字列
    pub fn as_str(&self) -> &str {
        match self {
            CategoryKey::Canonical(category) => category.key(),
            CategoryKey::Custom(value) => value,
        }
    }

    /// 表示名（カスタムは入力値そのまま）
    pub fn display_name(&self) -> &str {
        match self {
            CategoryKey::Canonical(category) => category.display_name(),
            CategoryKey::Custom(value) => value,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, CategoryKey::Custom(_))
    }
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
