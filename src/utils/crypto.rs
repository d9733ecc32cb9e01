//! Login cryptography and the connection stream cipher.
//!
//! - **Key exchange**: a per-session 1024-bit RSA key pair. The public half
//!   is sent as X.509 SubjectPublicKeyInfo DER; the client returns the
//!   shared secret and the verify token encrypted with PKCS#1 v1.5.
//! - **Stream cipher**: AES-128 in CFB8 mode. The shared secret is both the
//!   key and the IV. That IV choice is fixed by the client ecosystem and is
//!   weaker than an independent random IV; keep it only for wire
//!   compatibility.
//! - **Server hash**: SHA-1 over `server_id || secret || public_key_der`,
//!   printed as a signed two's-complement hex integer.

use aes::cipher::{inout::InOutBuf, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use num_bigint::BigInt;
use rand_core::OsRng;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha1::{Digest, Sha1};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{constants, ProtocolError, Result};

/// Length of the negotiated shared secret (AES-128 key and IV).
pub const SHARED_SECRET_LEN: usize = 16;

/// Length of the server-generated verify token.
pub const VERIFY_TOKEN_LEN: usize = 4;

/// Modulus size of the login key pair.
pub const RSA_KEY_BITS: usize = 1024;

type Aes128Cfb8Enc = cfb8::Encryptor<aes::Aes128>;
type Aes128Cfb8Dec = cfb8::Decryptor<aes::Aes128>;

/// The symmetric secret negotiated during login. Wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; SHARED_SECRET_LEN]);

impl SharedSecret {
    /// Accept a decrypted secret, which must be exactly 16 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; SHARED_SECRET_LEN] = bytes
            .try_into()
            .map_err(|_| ProtocolError::CipherFault(constants::ERR_BAD_KEY_MATERIAL.into()))?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_LEN] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

/// RSA key pair generated for a single login.
pub struct LoginKeyPair {
    private: RsaPrivateKey,
    public_der: Vec<u8>,
}

impl LoginKeyPair {
    /// Generate a fresh key pair.
    ///
    /// # Errors
    /// `CipherFault` if key generation or DER encoding fails.
    pub fn generate() -> Result<Self> {
        let private = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
            .map_err(|e| ProtocolError::CipherFault(format!("RSA key generation failed: {e}")))?;
        let public_der = private
            .to_public_key()
            .to_public_key_der()
            .map_err(|e| ProtocolError::CipherFault(format!("RSA key encoding failed: {e}")))?
            .as_bytes()
            .to_vec();
        Ok(Self {
            private,
            public_der,
        })
    }

    /// X.509 SubjectPublicKeyInfo encoding of the public key.
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_der
    }

    /// Decrypt a PKCS#1 v1.5 blob produced by the client.
    ///
    /// # Errors
    /// `HandshakeViolation`: a blob that does not decrypt under our key
    /// means the client never saw the real public key.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.private
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|_| ProtocolError::violation(constants::ERR_RSA_DECRYPT))
    }
}

impl fmt::Debug for LoginKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginKeyPair")
            .field("public_der_len", &self.public_der.len())
            .finish_non_exhaustive()
    }
}

/// Client side of the key exchange: encrypt `data` for a DER public key.
pub fn encrypt_for_public_key(public_der: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let key = RsaPublicKey::from_public_key_der(public_der)
        .map_err(|e| ProtocolError::CipherFault(format!("Invalid public key: {e}")))?;
    key.encrypt(&mut OsRng, Pkcs1v15Encrypt, data)
        .map_err(|e| ProtocolError::CipherFault(format!("RSA encryption failed: {e}")))
}

/// Generate a random verify token.
pub fn generate_verify_token() -> Result<[u8; VERIFY_TOKEN_LEN]> {
    let mut token = [0u8; VERIFY_TOKEN_LEN];
    getrandom::fill(&mut token)
        .map_err(|e| ProtocolError::CipherFault(format!("Random source failed: {e}")))?;
    Ok(token)
}

/// Compute the hash sent to the session service for this login.
pub fn server_hash(server_id: &str, secret: &SharedSecret, public_der: &[u8]) -> String {
    hex_digest(&[server_id.as_bytes(), secret.as_bytes(), public_der])
}

/// SHA-1 of the concatenated parts as a signed hex integer (no padding,
/// leading `-` for negative digests).
fn hex_digest(parts: &[&[u8]]) -> String {
    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    BigInt::from_signed_bytes_be(&digest).to_str_radix(16)
}

/// AES-128-CFB8 state for one connection: an encryptor for outbound bytes
/// and an independent decryptor for inbound bytes, seeded identically.
///
/// Both must see every byte of their direction exactly once and in order.
pub struct StreamCipher {
    encryptor: Aes128Cfb8Enc,
    decryptor: Aes128Cfb8Dec,
}

impl StreamCipher {
    /// # Errors
    /// `CipherFault` if the key material is rejected.
    pub fn new(secret: &SharedSecret) -> Result<Self> {
        let key = secret.as_bytes();
        let encryptor = Aes128Cfb8Enc::new_from_slices(key, key)
            .map_err(|_| ProtocolError::CipherFault(constants::ERR_BAD_KEY_MATERIAL.into()))?;
        let decryptor = Aes128Cfb8Dec::new_from_slices(key, key)
            .map_err(|_| ProtocolError::CipherFault(constants::ERR_BAD_KEY_MATERIAL.into()))?;
        Ok(Self {
            encryptor,
            decryptor,
        })
    }

    /// Encrypt outbound bytes in place.
    pub fn encrypt(&mut self, data: &mut [u8]) {
        let (blocks, _) = InOutBuf::from(data).into_chunks();
        self.encryptor.encrypt_blocks_inout_mut(blocks);
    }

    /// Decrypt inbound bytes in place.
    pub fn decrypt(&mut self, data: &mut [u8]) {
        let (blocks, _) = InOutBuf::from(data).into_chunks();
        self.decryptor.decrypt_blocks_inout_mut(blocks);
    }
}

impl fmt::Debug for StreamCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StreamCipher(AES-128-CFB8)")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_digest_known_vectors() {
        assert_eq!(
            hex_digest(&[b"Notch"]),
            "4ed1f46bbe04bc756bcb17c0c7ce3e4632f06a48"
        );
        assert_eq!(
            hex_digest(&[b"jeb_"]),
            "-7c9d5b0044c130109a5d7b5fb5c317c02b4e28c1"
        );
        assert_eq!(
            hex_digest(&[b"simon"]),
            "88e16a1019277b15d58faf0541e11910eb756f6"
        );
    }

    #[test]
    fn test_hex_digest_concatenates_parts() {
        assert_eq!(hex_digest(&[b"No", b"tch"]), hex_digest(&[b"Notch"]));
    }

    #[test]
    fn test_shared_secret_length_enforced() {
        assert!(SharedSecret::from_slice(&[7u8; 16]).is_ok());
        assert!(matches!(
            SharedSecret::from_slice(&[7u8; 15]),
            Err(ProtocolError::CipherFault(_))
        ));
        assert!(SharedSecret::from_slice(&[7u8; 32]).is_err());
    }

    #[test]
    fn test_stream_cipher_roundtrip_across_chunks() {
        let secret = SharedSecret::from_slice(&[0x42; 16]).unwrap();
        let mut server = StreamCipher::new(&secret).unwrap();
        let mut client = StreamCipher::new(&secret).unwrap();

        let original = b"frame one|frame two|frame three".to_vec();
        let mut wire = original.clone();
        server.encrypt(&mut wire);
        assert_ne!(wire, original);

        // The stream state carries across arbitrary chunk boundaries
        let (a, b) = wire.split_at_mut(7);
        client.decrypt(a);
        client.decrypt(b);
        assert_eq!(wire, original);
    }

    #[test]
    fn test_stream_cipher_directions_are_independent() {
        let secret = SharedSecret::from_slice(&[9; 16]).unwrap();
        let mut cipher = StreamCipher::new(&secret).unwrap();

        let mut outbound = b"hello".to_vec();
        cipher.encrypt(&mut outbound);
        // Inbound state has not advanced, so a peer's first bytes still decrypt
        let mut peer = StreamCipher::new(&secret).unwrap();
        let mut inbound = b"world".to_vec();
        peer.encrypt(&mut inbound);
        cipher.decrypt(&mut inbound);
        assert_eq!(inbound, b"world");
    }

    #[test]
    fn test_rsa_exchange_roundtrip() {
        let keys = LoginKeyPair::generate().unwrap();
        let token = generate_verify_token().unwrap();
        let encrypted = encrypt_for_public_key(keys.public_key_der(), &token).unwrap();
        assert_eq!(keys.decrypt(&encrypted).unwrap(), token);

        assert!(matches!(
            keys.decrypt(&[0u8; 128]),
            Err(ProtocolError::HandshakeViolation(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let secret = SharedSecret::from_slice(&[1; 16]).unwrap();
        assert_eq!(format!("{secret:?}"), "SharedSecret(<redacted>)");
    }
}
