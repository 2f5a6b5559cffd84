use std::collections::HashMap;

use serde::Deserialize;

/// Body of `POST /auth`.
///
/// The body must be a JSON object whose values are all strings; anything
/// else (arrays included) is a parse error. A missing `username` is not a
/// parse error: it is treated the same as an unrecognized one.
#[derive(Debug, Deserialize)]
#[serde(from = "HashMap<String, String>")]
pub struct LoginRequest {
    pub username: Option<String>,
}

impl From<HashMap<String, String>> for LoginRequest {
    fn from(mut fields: HashMap<String, String>) -> Self {
        Self {
            username: fields.remove("username"),
        }
    }
}
