//! Shared RSA fixtures for unit tests. Key generation is slow, so each key is
//! generated once per test binary.

use std::sync::OnceLock;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rsa::pkcs1v15::SigningKey;
use rsa::sha2::Sha256;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;

static KEYS: [OnceLock<RsaPrivateKey>; 2] = [OnceLock::new(), OnceLock::new()];

pub(crate) fn test_key(index: usize) -> &'static RsaPrivateKey {
    KEYS[index].get_or_init(|| {
        RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("failed to generate key")
    })
}

pub(crate) fn sign_b64(key: &RsaPrivateKey, payload: &str) -> String {
    let signing_key = SigningKey::<Sha256>::new(key.clone());
    BASE64.encode(signing_key.sign(payload.as_bytes()).to_bytes())
}
