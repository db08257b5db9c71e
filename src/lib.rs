pub mod chat;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod doctor;
pub mod embedding;
pub mod error;
pub mod image;
pub mod input;
pub mod lifecycle;
pub mod models;
pub mod openai;
pub mod params;
pub mod profiles;
pub mod replay;
pub mod session_store;
pub mod speech;
pub mod telemetry;
pub mod theme;
pub mod transcribe;
pub mod turn;
