// 出張機能モジュール

pub mod models;
pub mod service;

pub use models::{Trip, TripDraft};
pub use service::TripService;
