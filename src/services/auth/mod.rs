/*
 * Responsibility
 * - tenant ごとの secret で JWT を発行 (issuer) / 検証 (verifier)
 * - secret の生成 (secret)
 * - 失敗の種類 (AuthError)
 */
pub mod claims;
pub mod error;
pub mod issuer;
pub mod secret;
pub mod verifier;

pub use claims::VerifiedIdentity;
pub use error::AuthError;
pub use issuer::{IssueRequest, IssuedToken, TokenIssuer};
pub use secret::SecretKey;
pub use verifier::TokenVerifier;
