//! Private JSON Web Keys
//!
//! Application credentials carry their signing key as a JWK. `jsonwebtoken`
//! only accepts DER/PEM encoding keys, so EC keys are re-encoded as PKCS#8 and
//! RSA keys as PKCS#1 before signing.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use jsonwebtoken::{Algorithm, EncodingKey};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SdkError};

/// Private key in JWK form (RFC 7517)
///
/// EC keys use `crv`, `x`, `y`, `d`; RSA keys use `n`, `e`, `d`, `p`, `q`
/// (the CRT parameters are accepted but recomputed).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateKeyJwk {
    pub kty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dq: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
}

// Private components never reach logs.
impl fmt::Debug for PrivateKeyJwk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKeyJwk")
            .field("kty", &self.kty)
            .field("crv", &self.crv)
            .field("kid", &self.kid)
            .field("alg", &self.alg)
            .finish_non_exhaustive()
    }
}

/// Encoding key plus the algorithm it must be used with
#[derive(Clone)]
pub struct SigningKey {
    pub(crate) key: EncodingKey,
    pub(crate) algorithm: Algorithm,
    pub(crate) kid: Option<String>,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("algorithm", &self.algorithm)
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }
}

impl PrivateKeyJwk {
    /// Check that the key carries private material for its type
    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());

        match self.kty.as_str() {
            "EC" => {
                if !present(&self.crv) {
                    return Err("EC key is missing `crv`".to_string());
                }
                for (name, value) in [("x", &self.x), ("y", &self.y), ("d", &self.d)] {
                    if !present(value) {
                        return Err(format!("EC key is missing `{name}`"));
                    }
                }
                Ok(())
            }
            "RSA" => {
                for (name, value) in [
                    ("n", &self.n),
                    ("e", &self.e),
                    ("d", &self.d),
                    ("p", &self.p),
                    ("q", &self.q),
                ] {
                    if !present(value) {
                        return Err(format!("RSA key is missing `{name}`"));
                    }
                }
                Ok(())
            }
            "" => Err("key is missing `kty`".to_string()),
            other => Err(format!("unsupported key type `{other}`")),
        }
    }

    /// Algorithm declared in `alg`, or the conventional one for the key type
    pub fn algorithm(&self) -> Result<Algorithm> {
        if let Some(alg) = self.alg.as_deref().filter(|a| !a.is_empty()) {
            return alg
                .parse::<Algorithm>()
                .map_err(|_| SdkError::Signing(format!("unsupported algorithm `{alg}`")));
        }

        match (self.kty.as_str(), self.crv.as_deref()) {
            ("EC", Some("P-256")) => Ok(Algorithm::ES256),
            ("EC", Some("P-384")) => Ok(Algorithm::ES384),
            ("RSA", _) => Ok(Algorithm::RS256),
            (kty, crv) => Err(SdkError::Signing(format!(
                "cannot infer algorithm for kty={kty} crv={}",
                crv.unwrap_or("-")
            ))),
        }
    }

    /// Convert to a `jsonwebtoken` encoding key, checking the algorithm fits the key
    pub fn to_signing_key(&self) -> Result<SigningKey> {
        self.validate().map_err(SdkError::Signing)?;
        let algorithm = self.algorithm()?;

        let key = match (self.kty.as_str(), algorithm) {
            ("EC", Algorithm::ES256) => self.p256_key()?,
            ("EC", Algorithm::ES384) => self.p384_key()?,
            (
                "RSA",
                Algorithm::RS256
                | Algorithm::RS384
                | Algorithm::RS512
                | Algorithm::PS256
                | Algorithm::PS384
                | Algorithm::PS512,
            ) => self.rsa_key()?,
            (kty, alg) => {
                return Err(SdkError::Signing(format!(
                    "algorithm {alg:?} cannot be used with a {kty} key"
                )))
            }
        };

        Ok(SigningKey {
            key,
            algorithm,
            kid: self.kid.clone().filter(|k| !k.is_empty()),
        })
    }

    fn p256_key(&self) -> Result<EncodingKey> {
        use p256::elliptic_curve::sec1::ToEncodedPoint;
        use p256::pkcs8::EncodePrivateKey;

        self.expect_curve("P-256")?;
        let d = decode_component("d", self.d.as_deref())?;
        let secret = p256::SecretKey::from_slice(&d)
            .map_err(|_| SdkError::Signing("invalid P-256 private scalar".to_string()))?;

        let point = secret.public_key().to_encoded_point(false);
        self.check_public_point(point.x().map(|x| x.as_slice()), point.y().map(|y| y.as_slice()))?;

        let der = secret
            .to_pkcs8_der()
            .map_err(|e| SdkError::Signing(format!("failed to encode P-256 key: {e}")))?;
        Ok(EncodingKey::from_ec_der(der.as_bytes()))
    }

    fn p384_key(&self) -> Result<EncodingKey> {
        use p384::elliptic_curve::sec1::ToEncodedPoint;
        use p384::pkcs8::EncodePrivateKey;

        self.expect_curve("P-384")?;
        let d = decode_component("d", self.d.as_deref())?;
        let secret = p384::SecretKey::from_slice(&d)
            .map_err(|_| SdkError::Signing("invalid P-384 private scalar".to_string()))?;

        let point = secret.public_key().to_encoded_point(false);
        self.check_public_point(point.x().map(|x| x.as_slice()), point.y().map(|y| y.as_slice()))?;

        let der = secret
            .to_pkcs8_der()
            .map_err(|e| SdkError::Signing(format!("failed to encode P-384 key: {e}")))?;
        Ok(EncodingKey::from_ec_der(der.as_bytes()))
    }

    fn rsa_key(&self) -> Result<EncodingKey> {
        use rsa::pkcs1::EncodeRsaPrivateKey;
        use rsa::{BigUint, RsaPrivateKey};

        let int = |name: &str, value: &Option<String>| -> Result<BigUint> {
            Ok(BigUint::from_bytes_be(&decode_component(
                name,
                value.as_deref(),
            )?))
        };

        let key = RsaPrivateKey::from_components(
            int("n", &self.n)?,
            int("e", &self.e)?,
            int("d", &self.d)?,
            vec![int("p", &self.p)?, int("q", &self.q)?],
        )
        .map_err(|e| SdkError::Signing(format!("invalid RSA key: {e}")))?;
        key.validate()
            .map_err(|e| SdkError::Signing(format!("invalid RSA key: {e}")))?;

        let der = key
            .to_pkcs1_der()
            .map_err(|e| SdkError::Signing(format!("failed to encode RSA key: {e}")))?;
        Ok(EncodingKey::from_rsa_der(der.as_bytes()))
    }

    fn expect_curve(&self, expected: &str) -> Result<()> {
        match self.crv.as_deref() {
            Some(crv) if crv == expected => Ok(()),
            other => Err(SdkError::Signing(format!(
                "curve {} does not match algorithm (expected {expected})",
                other.unwrap_or("-")
            ))),
        }
    }

    /// The public coordinates must belong to the private scalar
    fn check_public_point(&self, x: Option<&[u8]>, y: Option<&[u8]>) -> Result<()> {
        let jwk_x = decode_component("x", self.x.as_deref())?;
        let jwk_y = decode_component("y", self.y.as_deref())?;

        if x != Some(jwk_x.as_slice()) || y != Some(jwk_y.as_slice()) {
            return Err(SdkError::Signing(
                "public key does not match private key".to_string(),
            ));
        }
        Ok(())
    }
}

fn decode_component(name: &str, value: Option<&str>) -> Result<Vec<u8>> {
    let value = value.ok_or_else(|| SdkError::Signing(format!("key is missing `{name}`")))?;
    URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| SdkError::Signing(format!("`{name}` is not base64url: {e}")))
}
