// 領収書機能モジュール

pub mod models;
pub mod reconciliation;
pub mod upload;

// 公開インターフェース

// モデル
pub use models::{
    Receipt, ReceiptPatch, ReceiptUpdateResponse, ReceiptWarning, UploadFile, UploadResponse,
    ALLOWED_EXTENSIONS, MAX_UPLOAD_BYTES,
};

// 一覧の照合
pub use reconciliation::{
    parse_amount, parse_receipt_date, DeleteConfirmation, QuickEdit, ReceiptFilter,
    ReceiptListViewModel,
};

// 一括アップロード
pub use upload::{
    BatchResult, BatchState, BatchSummary, FailureKind, SummaryKind, UploadBatch, UploadEvent,
    UploadOutcome, UploadTaskRunner,
};
