//! OCR Gateway Library
//!
//! HTTP gateway that extracts text from base64-encoded images through a
//! configurable engine: PaddleOCR line recognition or an Ollama vision model.
//! The server binary is in main.rs; this crate exposes the pieces it wires
//! together so tests and benchmarks can drive them directly.
//!
//! # Modules
//!
//! - `config`: environment-driven configuration
//! - `ocr`: decoding, backends, face heuristic, extraction service
//! - `routes`: axum handlers for `/health`, `/ocr`, `/ocr/batch`, `/models`

pub mod config;
pub mod error;
pub mod ocr;
pub mod routes;
pub mod state;
