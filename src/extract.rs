//! Request extractors whose rejections render the standard error envelope.
//!
//! Axum's stock `Json`/`Query` rejections are plain-text; routing them
//! through `AppError` keeps every failure inside `{success:false, error}`.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::AppError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);
