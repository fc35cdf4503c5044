use crate::features::receipts::models::Receipt;
use crate::shared::errors::{AppError, AppResult};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// 出張データモデル
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: i64,
    pub destination_city: String,
    pub destination_org: String,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    #[serde(default)]
    pub departure_time: Option<NaiveTime>,
    #[serde(default)]
    pub arrival_time: Option<NaiveTime>,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub meals_breakfast_count: u32,
    #[serde(default)]
    pub meals_lunch_count: u32,
    #[serde(default)]
    pub meals_dinner_count: u32,
    #[serde(default)]
    pub advance_rub: f64,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub receipts: Vec<Receipt>,
}

fn default_status() -> String {
    "draft".to_string()
}

impl Trip {
    /// 出張日数（両端を含む）
    pub fn days(&self) -> i64 {
        (self.date_to - self.date_from).num_days() + 1
    }

    /// 一覧表示用のラベル
    pub fn label(&self) -> String {
        format!(
            "{} ({} - {})",
            self.destination_city,
            self.date_from.format("%d.%m.%Y"),
            self.date_to.format("%d.%m.%Y")
        )
    }
}

/// 出張作成・更新用DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripDraft {
    pub destination_city: String,
    pub destination_org: String,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departure_time: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrival_time: Option<NaiveTime>,
    pub purpose: String,
    pub meals_breakfast_count: u32,
    pub meals_lunch_count: u32,
    pub meals_dinner_count: u32,
    pub advance_rub: f64,
}

impl TripDraft {
    /// 送信前の検証
    pub fn validate(&self) -> AppResult<()> {
        if self.destination_city.trim().is_empty() {
            return Err(AppError::validation("出張先の都市を入力してください"));
        }

        if self.destination_org.trim().is_empty() {
            return Err(AppError::validation("出張先の組織を入力してください"));
        }

        if self.purpose.trim().is_empty() {
            return Err(AppError::validation("出張の目的を入力してください"));
        }

        if self.date_from > self.date_to {
            return Err(AppError::validation(format!(
                "開始日は終了日以前である必要があります: {} > {}",
                self.date_from, self.date_to
            )));
        }

        if !self.advance_rub.is_finite() || self.advance_rub < 0.0 {
            return Err(AppError::validation("前払金は0以上である必要があります"));
        }

        Ok(())
    }
}
