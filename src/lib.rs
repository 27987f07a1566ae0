//! Video frame extraction service
//!
//! This library provides the core functionality for the frame-extract
//! service: uploaded videos are decoded with ffmpeg, frames are sampled at a
//! fixed interval, resized, optionally sharpened and stripped of their
//! background, and served as previews and as a ZIP archive. Each upload is
//! tracked as a background job whose progress clients poll.

pub mod app_state;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
