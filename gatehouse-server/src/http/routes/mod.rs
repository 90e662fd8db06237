//! Route handlers organized by resource

pub mod account;
pub mod business;
pub mod health;

use serde::Serialize;

/// Body of a successful response that carries nothing but a message
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: &'static str,
}

impl MessageResponse {
    pub fn ok(message: &'static str) -> Self {
        Self {
            success: true,
            message,
        }
    }
}
