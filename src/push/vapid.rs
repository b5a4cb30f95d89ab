//! VAPID application-server keys.

use base64::{URL_SAFE_NO_PAD, encode_config};
use jwt_simple::prelude::ES256KeyPair;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use std::fmt;

use crate::config;
use crate::types::push::VapidConfig;

/// A freshly generated key pair, both halves base64url without padding.
#[derive(Debug, Clone)]
pub struct VapidCredentials {
    pub private_key: String,
    pub public_key: String,
}

impl fmt::Display for VapidCredentials {
    /// Renders the keys as the environment variables `remind serve` reads.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "REMIND_VAPID_PRIVATE_KEY={}", self.private_key)?;
        write!(f, "REMIND_VAPID_PUBLIC_KEY={}", self.public_key)
    }
}

#[derive(Debug, Clone)]
pub(crate) enum VapidConfigStatus {
    Missing,
    Incomplete,
    Ready(VapidConfig),
}

pub(crate) fn load_vapid_config(config: &config::AppConfig) -> VapidConfigStatus {
    let private_key = non_empty(config.vapid_private_key.as_deref());
    let public_key = non_empty(config.vapid_public_key.as_deref());
    let subject = non_empty(config.vapid_subject.as_deref());

    match (private_key, public_key, subject) {
        (Some(private_key), Some(public_key), Some(subject)) => {
            VapidConfigStatus::Ready(VapidConfig {
                private_key: private_key.to_string(),
                public_key: public_key.to_string(),
                subject: subject.to_string(),
            })
        }
        (None, None, None) => VapidConfigStatus::Missing,
        _ => VapidConfigStatus::Incomplete,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

pub fn generate_vapid_credentials() -> Result<VapidCredentials, web_push::WebPushError> {
    generate_vapid_credentials_with_rng(&mut OsRng)
}

pub(crate) fn generate_vapid_credentials_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> Result<VapidCredentials, web_push::WebPushError> {
    let key_pair = es256_key_pair(rng);
    let private_key = encode_config(key_pair.to_bytes(), URL_SAFE_NO_PAD);
    // Derive the public half the same way the sender will when signing.
    let public_key =
        web_push::VapidSignatureBuilder::from_base64_no_sub(&private_key, URL_SAFE_NO_PAD)?
            .get_public_key();

    Ok(VapidCredentials {
        private_key,
        public_key: encode_config(public_key, URL_SAFE_NO_PAD),
    })
}

/// Draws scalars until one is a valid P-256 secret key.
fn es256_key_pair<R: RngCore + CryptoRng>(rng: &mut R) -> ES256KeyPair {
    let mut secret = [0u8; 32];
    loop {
        rng.fill_bytes(&mut secret);
        if let Ok(key_pair) = ES256KeyPair::from_bytes(&secret) {
            return key_pair;
        }
    }
}
