//! Validation of a backend's `AuthRequest`.
//!
//! Pure functions only: the handler feeds in the decoded request and the
//! configured secret and sends back whatever status comes out.

use portal_protocol::{AuthRequest, ClientType, PROTOCOL_VERSION};

use crate::HandshakeError;

/// Who a connection belongs to once the handshake succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentity {
    /// The name the backend authenticated with. Servers register under it.
    pub name: String,
    pub client_type: ClientType,
}

/// Checks an `AuthRequest` against the configured secret.
///
/// Checks run in a fixed order: protocol version and name (`InvalidData`),
/// then client type (`UnknownType`), then the secret (`IncorrectSecret`).
pub fn authenticate(
    request: &AuthRequest,
    secret: &str,
) -> Result<PeerIdentity, HandshakeError> {
    if request.protocol != PROTOCOL_VERSION {
        return Err(HandshakeError::InvalidData(format!(
            "protocol version mismatch: expected {PROTOCOL_VERSION}, got {}",
            request.protocol
        )));
    }
    if request.name.is_empty() {
        return Err(HandshakeError::InvalidData("empty name".into()));
    }
    let client_type = ClientType::from_u8(request.client_type)
        .ok_or(HandshakeError::UnknownType(request.client_type))?;
    if !secrets_match(request.secret.as_bytes(), secret.as_bytes()) {
        return Err(HandshakeError::IncorrectSecret);
    }

    Ok(PeerIdentity {
        name: request.name.clone(),
        client_type,
    })
}

/// Compares two secrets without short-circuiting on the first differing byte.
///
/// Only the length leaks; the content is folded with XOR over every byte.
pub fn secrets_match(given: &[u8], expected: &[u8]) -> bool {
    if given.len() != expected.len() {
        return false;
    }
    given
        .iter()
        .zip(expected)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
