//! Kapricorn: a farming advisor that mediates a tagged conversational
//! protocol between callers and a generative-language backend.

pub mod commands;
pub mod config;
pub mod engine;
pub mod errors;
pub mod llm;
pub mod personalities;
pub mod preprocessing;
pub mod protocol;
pub mod recommendation;
pub mod schedule;
pub mod transcript;
