//! テスト用のインメモリバックエンド

use crate::features::preview::models::{GenerateResponse, PreviewPayload};
use crate::features::receipts::models::{
    Receipt, ReceiptPatch, ReceiptUpdateResponse, ReceiptWarning, UploadFile, UploadResponse,
};
use crate::features::trips::models::{Trip, TripDraft};
use crate::shared::backend::ExpenseBackend;
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// アップロード時に発生させる失敗
#[derive(Debug, Clone)]
pub enum FakeFailure {
    Duplicate,
    Server(u16, String),
    Transport,
    /// 応答を解釈できなかった
    Malformed,
}

impl FakeFailure {
    fn into_error(self) -> AppError {
        match self {
            FakeFailure::Duplicate => AppError::Duplicate(
                "Похоже, этот документ уже был загружен в эту командировку.".to_string(),
            ),
            FakeFailure::Server(status, message) => AppError::Server { status, message },
            FakeFailure::Transport => AppError::transport("connection refused"),
            FakeFailure::Malformed => match serde_json::from_str::<serde_json::Value>("{") {
                Err(e) => AppError::Json(e),
                Ok(_) => unreachable!(),
            },
        }
    }
}

#[derive(Default)]
struct FakeState {
    trips: BTreeMap<i64, Trip>,
    next_trip_id: i64,
    next_receipt_id: i64,
    calls: Vec<String>,
    upload_failures: HashMap<String, FakeFailure>,
    upload_warnings: HashMap<String, Vec<ReceiptWarning>>,
    upload_delay_ms: u64,
    fail_get_trip: bool,
    fail_mutations: bool,
    preview: Option<PreviewPayload>,
    /// 指定した出張の次回取得を通知まで止める
    get_trip_gate: Option<(i64, Arc<Notify>)>,
}

/// 呼び出し履歴と同時実行数を記録するバックエンド
pub struct FakeBackend {
    state: Mutex<FakeState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// テスト用の領収書
pub fn receipt(id: i64, category: &str, amount: Option<f64>) -> Receipt {
    Receipt {
        id,
        trip_id: 0,
        category: category.to_string(),
        amount,
        receipt_date: None,
        org_name: None,
        file_name: format!("receipt-{id}.jpg"),
        has_qr: false,
        warnings: Vec::new(),
    }
}

/// テスト用の出張
pub fn trip(id: i64, receipts: Vec<Receipt>) -> Trip {
    Trip {
        id,
        destination_city: "Москва".to_string(),
        destination_org: "АО Тест".to_string(),
        date_from: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
        date_to: NaiveDate::from_ymd_opt(2024, 4, 3).unwrap(),
        departure_time: None,
        arrival_time: None,
        purpose: "Совещание".to_string(),
        meals_breakfast_count: 0,
        meals_lunch_count: 0,
        meals_dinner_count: 0,
        advance_rub: 0.0,
        status: "draft".to_string(),
        receipts,
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                next_trip_id: 1,
                next_receipt_id: 100,
                ..FakeState::default()
            }),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_trip(trip_id: i64, receipts: Vec<Receipt>) -> Self {
        let backend = Self::new();
        backend.insert_trip(trip(trip_id, receipts));
        backend
    }

    pub fn insert_trip(&self, trip: Trip) {
        let mut state = self.state.lock().unwrap();
        state.next_trip_id = state.next_trip_id.max(trip.id + 1);
        state.trips.insert(trip.id, trip);
    }

    pub fn fail_get_trip(&self, fail: bool) {
        self.state.lock().unwrap().fail_get_trip = fail;
    }

    pub fn fail_mutations(&self, fail: bool) {
        self.state.lock().unwrap().fail_mutations = fail;
    }

    pub fn fail_upload(&self, file_name: &str, failure: FakeFailure) {
        self.state
            .lock()
            .unwrap()
            .upload_failures
            .insert(file_name.to_string(), failure);
    }

    pub fn upload_warnings(&self, file_name: &str, warnings: Vec<ReceiptWarning>) {
        self.state
            .lock()
            .unwrap()
            .upload_warnings
            .insert(file_name.to_string(), warnings);
    }

    pub fn set_upload_delay_ms(&self, delay_ms: u64) {
        self.state.lock().unwrap().upload_delay_ms = delay_ms;
    }

    /// 次回の `get_trip(trip_id)` を返された通知が来るまで止める
    pub fn pause_get_trip(&self, trip_id: i64) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state.lock().unwrap().get_trip_gate = Some((trip_id, gate.clone()));
        gate
    }

    pub fn set_preview(&self, preview: PreviewPayload) {
        self.state.lock().unwrap().preview = Some(preview);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn receipt_count(&self, trip_id: i64) -> usize {
        self.state
            .lock()
            .unwrap()
            .trips
            .get(&trip_id)
            .map(|t| t.receipts.len())
            .unwrap_or(0)
    }

    pub fn has_trip(&self, trip_id: i64) -> bool {
        self.state.lock().unwrap().trips.contains_key(&trip_id)
    }

    /// 呼び出しを記録し、他のタスクに実行を譲る
    async fn enter(&self, call: String, delay_ms: u64) {
        self.state.lock().unwrap().calls.push(call);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        } else {
            tokio::task::yield_now().await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn missing_trip(trip_id: i64) -> AppError {
        AppError::Server {
            status: 404,
            message: format!("Trip {trip_id} not found"),
        }
    }

    fn mutation_failure() -> AppError {
        AppError::Server {
            status: 500,
            message: "Internal Server Error".to_string(),
        }
    }

    fn trip_from_draft(id: i64, draft: &TripDraft) -> Trip {
        Trip {
            id,
            destination_city: draft.destination_city.clone(),
            destination_org: draft.destination_org.clone(),
            date_from: draft.date_from,
            date_to: draft.date_to,
            departure_time: draft.departure_time,
            arrival_time: draft.arrival_time,
            purpose: draft.purpose.clone(),
            meals_breakfast_count: draft.meals_breakfast_count,
            meals_lunch_count: draft.meals_lunch_count,
            meals_dinner_count: draft.meals_dinner_count,
            advance_rub: draft.advance_rub,
            status: "draft".to_string(),
            receipts: Vec::new(),
        }
    }
}

#[async_trait]
impl ExpenseBackend for FakeBackend {
    async fn list_trips(&self) -> AppResult<Vec<Trip>> {
        self.enter("list_trips".to_string(), 0).await;
        Ok(self.state.lock().unwrap().trips.values().cloned().collect())
    }

    async fn get_trip(&self, trip_id: i64) -> AppResult<Trip> {
        let gate = {
            let mut state = self.state.lock().unwrap();
            let gated = matches!(&state.get_trip_gate, Some((id, _)) if *id == trip_id);
            if gated {
                state.get_trip_gate.take().map(|(_, gate)| gate)
            } else {
                None
            }
        };
        self.enter(format!("get_trip:{trip_id}"), 0).await;
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let state = self.state.lock().unwrap();
        if state.fail_get_trip {
            return Err(AppError::transport("timed out"));
        }
        state
            .trips
            .get(&trip_id)
            .cloned()
            .ok_or_else(|| Self::missing_trip(trip_id))
    }

    async fn create_trip(&self, draft: &TripDraft) -> AppResult<Trip> {
        self.enter("create_trip".to_string(), 0).await;
        let mut state = self.state.lock().unwrap();
        let id = state.next_trip_id;
        state.next_trip_id += 1;
        let trip = Self::trip_from_draft(id, draft);
        state.trips.insert(id, trip.clone());
        Ok(trip)
    }

    async fn update_trip(&self, trip_id: i64, draft: &TripDraft) -> AppResult<Trip> {
        self.enter(format!("update_trip:{trip_id}"), 0).await;
        let mut state = self.state.lock().unwrap();
        let existing = state
            .trips
            .get_mut(&trip_id)
            .ok_or_else(|| Self::missing_trip(trip_id))?;
        let receipts = std::mem::take(&mut existing.receipts);
        *existing = Self::trip_from_draft(trip_id, draft);
        existing.receipts = receipts;
        Ok(existing.clone())
    }

    async fn delete_trip(&self, trip_id: i64) -> AppResult<()> {
        self.enter(format!("delete_trip:{trip_id}"), 0).await;
        let mut state = self.state.lock().unwrap();
        if state.fail_mutations {
            return Err(Self::mutation_failure());
        }
        state
            .trips
            .remove(&trip_id)
            .map(|_| ())
            .ok_or_else(|| Self::missing_trip(trip_id))
    }

    async fn upload_receipt(
        &self,
        trip_id: i64,
        file: &UploadFile,
        category: &str,
    ) -> AppResult<UploadResponse> {
        let delay_ms = self.state.lock().unwrap().upload_delay_ms;
        self.enter(format!("upload:{}", file.file_name), delay_ms)
            .await;

        let mut state = self.state.lock().unwrap();
        if let Some(failure) = state.upload_failures.get(&file.file_name).cloned() {
            return Err(failure.into_error());
        }
        let warnings = state
            .upload_warnings
            .get(&file.file_name)
            .cloned()
            .unwrap_or_default();

        let id = state.next_receipt_id;
        state.next_receipt_id += 1;
        let trip = state
            .trips
            .get_mut(&trip_id)
            .ok_or_else(|| Self::missing_trip(trip_id))?;

        // 出張取得APIは警告を返さないため保存側には持たせない
        let mut stored = receipt(id, category, None);
        stored.file_name = file.file_name.clone();
        trip.receipts.push(stored);

        Ok(UploadResponse {
            id,
            file_name: file.file_name.clone(),
            category: category.to_string(),
            amount: None,
            receipt_date: None,
            has_qr: false,
            qr_data: None,
            warnings,
        })
    }

    async fn update_receipt(
        &self,
        receipt_id: i64,
        patch: &ReceiptPatch,
    ) -> AppResult<ReceiptUpdateResponse> {
        self.enter(format!("update_receipt:{receipt_id}"), 0).await;
        let mut state = self.state.lock().unwrap();
        if state.fail_mutations {
            return Err(Self::mutation_failure());
        }

        let stored = state
            .trips
            .values_mut()
            .flat_map(|t| t.receipts.iter_mut())
            .find(|r| r.id == receipt_id)
            .ok_or_else(|| AppError::Server {
                status: 404,
                message: "Receipt not found".to_string(),
            })?;

        if let Some(category) = &patch.category {
            stored.category = category.clone();
        }
        if let Some(amount) = patch.amount {
            stored.amount = Some(amount);
        }
        if let Some(receipt_date) = patch.receipt_date {
            stored.receipt_date = Some(receipt_date);
        }
        if let Some(org_name) = &patch.org_name {
            stored.org_name = Some(org_name.clone());
        }

        Ok(ReceiptUpdateResponse {
            id: stored.id,
            category: stored.category.clone(),
            amount: stored.amount,
            receipt_date: stored.receipt_date,
            org_name: stored.org_name.clone(),
        })
    }

    async fn delete_receipt(&self, receipt_id: i64) -> AppResult<()> {
        self.enter(format!("delete_receipt:{receipt_id}"), 0).await;
        let mut state = self.state.lock().unwrap();
        if state.fail_mutations {
            return Err(Self::mutation_failure());
        }
        for trip in state.trips.values_mut() {
            if let Some(pos) = trip.receipts.iter().position(|r| r.id == receipt_id) {
                trip.receipts.remove(pos);
                return Ok(());
            }
        }
        Err(AppError::Server {
            status: 404,
            message: "Receipt not found".to_string(),
        })
    }

    async fn get_preview(&self, trip_id: i64) -> AppResult<PreviewPayload> {
        self.enter(format!("get_preview:{trip_id}"), 0).await;
        self.state
            .lock()
            .unwrap()
            .preview
            .clone()
            .ok_or_else(|| Self::missing_trip(trip_id))
    }

    async fn generate_documents(&self, trip_id: i64) -> AppResult<GenerateResponse> {
        self.enter(format!("generate:{trip_id}"), 0).await;
        Ok(GenerateResponse {
            message: "Documents generated successfully".to_string(),
            files: serde_json::json!({"advance_report": format!("trip_{trip_id}_report.xlsx")}),
        })
    }

    async fn download_package(&self, trip_id: i64) -> AppResult<Vec<u8>> {
        self.enter(format!("download:{trip_id}"), 0).await;
        Ok(b"PK\x03\x04fake-zip".to_vec())
    }
}
