use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::Sha256;
use tracing::debug;

use crate::config::service::SigningConfig;
use crate::error::{RelayError, RelayResult};
use crate::helpers::time::now_i64;
use crate::identity::GuestIdentity;
use crate::token::claims::{TokenHeader, TokenPayload};
use crate::token::SignedToken;

type HmacSha256 = Hmac<Sha256>;

/// Turns identities into HS256-signed compact tokens. Holds no I/O handles.
#[derive(Clone)]
pub struct TokenForger {
    secret: Vec<u8>,
    server_id: String,
    validity_seconds: u64,
}

impl std::fmt::Debug for TokenForger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenForger")
            .field("server_id", &self.server_id)
            .field("validity_seconds", &self.validity_seconds)
            .finish_non_exhaustive()
    }
}

impl TokenForger {
    pub fn new(secret: &str, server_id: &str, validity_seconds: u64) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            server_id: server_id.to_owned(),
            validity_seconds,
        }
    }

    pub fn from_config(cfg: &SigningConfig) -> Self {
        Self::new(&cfg.secret, &cfg.server_id, cfg.validity_seconds)
    }

    pub fn validity_seconds(&self) -> u64 {
        self.validity_seconds
    }

    pub fn forge(&self, identity: &GuestIdentity) -> RelayResult<SignedToken> {
        self.forge_at(identity, now_i64())
    }

    /// Forge with an explicit issue time (unix seconds).
    pub fn forge_at(&self, identity: &GuestIdentity, issued_at: i64) -> RelayResult<SignedToken> {
        let external_uid = identity.external_uid()?;
        let payload = {
            let mut rng = rand::rng();
            TokenPayload::issue(&mut rng, external_uid, issued_at, self.validity_seconds)
        };
        let header = TokenHeader::new(&self.server_id);

        let signing_input = format!("{}.{}", encode_segment(&header)?, encode_segment(&payload)?);
        let signature = URL_SAFE_NO_PAD.encode(self.sign(signing_input.as_bytes())?);

        Ok(SignedToken::new(format!("{signing_input}.{signature}")))
    }

    /// Forge the whole batch, or nothing: the first malformed identity fails the call.
    pub fn forge_all(&self, identities: &[GuestIdentity]) -> RelayResult<Vec<SignedToken>> {
        let issued_at = now_i64();
        let tokens = identities
            .iter()
            .map(|identity| self.forge_at(identity, issued_at))
            .collect::<RelayResult<Vec<_>>>()?;
        debug!("forged {} tokens, exp {}", tokens.len(), issued_at + self.validity_seconds as i64);
        Ok(tokens)
    }

    /// Verify the signature and return header and claims.
    pub fn decode(&self, token: &str) -> RelayResult<(TokenHeader, TokenPayload)> {
        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(RelayError::InvalidToken("expected three segments".to_string()));
        };

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| RelayError::InvalidToken(format!("signature: {e}")))?;
        let mut mac = self.mac()?;
        mac.update(format!("{header}.{payload}").as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| RelayError::InvalidToken("signature mismatch".to_string()))?;

        Ok((decode_segment(header)?, decode_segment(payload)?))
    }

    fn sign(&self, input: &[u8]) -> RelayResult<Vec<u8>> {
        let mut mac = self.mac()?;
        mac.update(input);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    fn mac(&self) -> RelayResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| RelayError::InvalidToken(format!("signing key: {e}")))
    }
}

fn encode_segment<T: Serialize>(value: &T) -> RelayResult<String> {
    serde_json::to_vec(value)
        .map(|json| URL_SAFE_NO_PAD.encode(json))
        .map_err(|e| RelayError::InvalidToken(e.to_string()))
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> RelayResult<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| RelayError::InvalidToken(format!("segment: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| RelayError::InvalidToken(format!("segment json: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forged_token_has_three_segments_and_verifies() {
        let forger = TokenForger::new("secret", "1", 60);
        let token = forger.forge(&GuestIdentity::new("42", "pw")).unwrap();
        assert_eq!(token.token.split('.').count(), 3);
        let (_, payload) = forger.decode(&token.token).unwrap();
        assert_eq!(payload.external_uid, 42);
    }

    #[test]
    fn another_secret_does_not_verify() {
        let token = TokenForger::new("one", "1", 60)
            .forge(&GuestIdentity::new("1", "pw"))
            .unwrap();
        let err = TokenForger::new("two", "1", 60).decode(&token.token).unwrap_err();
        assert!(matches!(err, RelayError::InvalidToken(_)));
    }

    #[test]
    fn garbage_is_rejected() {
        let forger = TokenForger::new("secret", "1", 60);
        assert!(forger.decode("not-a-token").is_err());
        assert!(forger.decode("a.b.c.d").is_err());
    }
}
