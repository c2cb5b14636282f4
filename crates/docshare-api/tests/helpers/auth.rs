use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;

/// Shared secret the test app verifies bearer tokens with.
pub const JWT_SECRET: &str = "test-jwt-secret-that-is-at-least-32-characters";

fn mint(sub: &str, kind: &str) -> String {
    let exp = chrono::Utc::now().timestamp() + 3600;
    encode(
        &Header::new(Algorithm::HS256),
        &json!({ "sub": sub, "type": kind, "exp": exp }),
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("mint token")
}

pub fn citizen_token(sub: &str) -> String {
    mint(sub, "citizen")
}

pub fn admin_token(sub: &str) -> String {
    mint(sub, "admin")
}
