use serde::{Deserialize, Serialize};

use crate::token::Identity;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    /// Unix millis
    pub exp: i64,
    pub identity: Identity,
}
