// src/auth.rs
//! OAuth PKCE helpers
//!
//! The platform authorizes the application with a PKCE (S256) code exchange. This module
//! generates the verifier/challenge pair and the request arguments for each step.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use log::trace;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::platform::{AuthorizationArgs, AuthorizationCode, TokenRequest};

/// Scopes requested for the social layer
pub const SOCIAL_SCOPES: &str = "openid sdk.social_layer";

/// Number of random bytes in a code verifier (43 base64url characters)
const VERIFIER_BYTES: usize = 32;

/// PKCE code verifier and its derived challenge
#[derive(Debug, Clone, PartialEq)]
pub struct CodeVerifier {
    verifier: String,
    challenge: String,
}

impl CodeVerifier {
    pub fn generate() -> Self {
        let mut bytes = [0u8; VERIFIER_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_verifier(BASE64URL.encode(bytes))
    }

    pub fn from_verifier(verifier: String) -> Self {
        let challenge = BASE64URL.encode(Sha256::digest(verifier.as_bytes()));
        trace!("Derived PKCE challenge {}", challenge);
        CodeVerifier {
            verifier,
            challenge,
        }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn challenge(&self) -> &str {
        &self.challenge
    }
}

pub fn authorization_args(application_id: u64, verifier: &CodeVerifier) -> AuthorizationArgs {
    AuthorizationArgs {
        client_id: application_id,
        scopes: SOCIAL_SCOPES.to_string(),
        code_challenge: verifier.challenge().to_string(),
        challenge_method: "S256",
    }
}

pub fn token_request(
    application_id: u64,
    code: &AuthorizationCode,
    verifier: &CodeVerifier,
) -> TokenRequest {
    TokenRequest {
        application_id,
        code: code.code.clone(),
        code_verifier: verifier.verifier().to_string(),
        redirect_uri: code.redirect_uri.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_matches_rfc7636_vector() {
        // Appendix B of RFC 7636
        let verifier =
            CodeVerifier::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_string());
        assert_eq!(
            verifier.challenge(),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_generated_verifiers_are_unique_and_url_safe() {
        let a = CodeVerifier::generate();
        let b = CodeVerifier::generate();
        assert_ne!(a.verifier(), b.verifier());
        assert_eq!(a.verifier().len(), 43);
        assert!(a
            .verifier()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_request_arguments() {
        let verifier = CodeVerifier::generate();
        let args = authorization_args(42, &verifier);
        assert_eq!(args.client_id, 42);
        assert_eq!(args.challenge_method, "S256");
        assert_eq!(args.scopes, SOCIAL_SCOPES);

        let code = AuthorizationCode {
            code: "abc".to_string(),
            redirect_uri: "http://127.0.0.1/callback".to_string(),
        };
        let request = token_request(42, &code, &verifier);
        assert_eq!(request.code_verifier, verifier.verifier());
        assert_eq!(request.redirect_uri, code.redirect_uri);
    }
}
