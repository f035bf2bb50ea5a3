//! Security envelopes
//!
//! collectd can sign or encrypt a packet. Both wrap the plain-text parts in
//! one leading part that carries the username.
//!
//! # Signed (part type 0x0200)
//!
//! ```text
//! [0x0200][len = 36 + u][HMAC-SHA256 (32 bytes)][username (u bytes)][payload...]
//! ```
//!
//! The HMAC is keyed with the password and covers `username ‖ payload`.
//! The payload itself stays readable.
//!
//! # Encrypted (part type 0x0210)
//!
//! ```text
//! [0x0210][len = 42 + u + n][u (u16)][username][IV (16 bytes)]
//! [AES-256-OFB( SHA-1(payload) (20 bytes) ‖ payload (n bytes) )]
//! ```
//!
//! The AES key is the SHA-256 digest of the password.

use aes::Aes256;
use bytes::BufMut;
use hmac::{Hmac, Mac};
use ofb::Ofb;
use ofb::cipher::{KeyIvInit, StreamCipher};
use rand::RngCore;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::{PasswordLookup, ProtocolError, Result, part};

type HmacSha256 = Hmac<Sha256>;
type Aes256Ofb = Ofb<Aes256>;

/// Fixed bytes of a signature part: header plus digest
pub(crate) const SIGN_OVERHEAD: usize = 4 + 32;

/// Fixed bytes of an encryption part: header, username length, IV, SHA-1
pub(crate) const ENCRYPT_OVERHEAD: usize = 4 + 2 + 16 + 20;

const DIGEST_SIZE: usize = 32;
const IV_SIZE: usize = 16;
const CHECKSUM_SIZE: usize = 20;

/// Sign `payload`, returning the complete packet
///
/// # Errors
///
/// Returns `Crypto` if the username cannot be framed in a 16-bit part.
pub fn sign_sha256(payload: &[u8], username: &str, password: &str) -> Result<Vec<u8>> {
    let part_len = u16::try_from(SIGN_OVERHEAD + username.len())
        .map_err(|_| ProtocolError::crypto("username too long"))?;

    let mut mac = HmacSha256::new_from_slice(password.as_bytes())
        .map_err(|e| ProtocolError::crypto(e.to_string()))?;
    mac.update(username.as_bytes());
    mac.update(payload);
    let digest = mac.finalize().into_bytes();

    let mut out = Vec::with_capacity(usize::from(part_len) + payload.len());
    out.put_u16(part::SIGN_SHA256);
    out.put_u16(part_len);
    out.put_slice(&digest);
    out.put_slice(username.as_bytes());
    out.put_slice(payload);
    Ok(out)
}

/// Encrypt `payload`, returning the complete packet
///
/// # Errors
///
/// Returns `Crypto` if the packet would exceed the 16-bit part length or
/// the cipher cannot be initialised.
pub fn encrypt_aes256(payload: &[u8], username: &str, password: &str) -> Result<Vec<u8>> {
    let total = ENCRYPT_OVERHEAD + username.len() + payload.len();
    let part_len =
        u16::try_from(total).map_err(|_| ProtocolError::crypto("packet too large to encrypt"))?;
    let user_len = u16::try_from(username.len())
        .map_err(|_| ProtocolError::crypto("username too long"))?;

    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);

    let key = Sha256::digest(password.as_bytes());
    let checksum = Sha1::digest(payload);

    let mut out = Vec::with_capacity(total);
    out.put_u16(part::ENCRYPT_AES256);
    out.put_u16(part_len);
    out.put_u16(user_len);
    out.put_slice(username.as_bytes());
    out.put_slice(&iv);

    let encrypted_start = out.len();
    out.put_slice(&checksum);
    out.put_slice(payload);

    let mut cipher = Aes256Ofb::new_from_slices(&key, &iv)
        .map_err(|e| ProtocolError::crypto(e.to_string()))?;
    cipher.apply_keystream(&mut out[encrypted_start..]);

    Ok(out)
}

/// Verify a signature part against the rest of the packet
///
/// `part` is the signature part without its 4-byte header; `signed` is
/// everything that follows it. Returns the username on success.
///
/// # Errors
///
/// `InvalidPart` for a truncated part, `UnknownUser` when the lookup has no
/// password, `SignatureMismatch` when the HMAC does not match.
pub fn verify_sha256(part: &[u8], signed: &[u8], lookup: &dyn PasswordLookup) -> Result<String> {
    if part.len() < DIGEST_SIZE {
        return Err(ProtocolError::invalid_part(part::SIGN_SHA256, "too short"));
    }
    let (digest, username) = part.split_at(DIGEST_SIZE);
    let username = std::str::from_utf8(username)
        .map_err(|_| ProtocolError::InvalidString(part::SIGN_SHA256))?;

    let password = lookup
        .password(username)
        .ok_or_else(|| ProtocolError::UnknownUser(username.to_string()))?;

    let mut mac = HmacSha256::new_from_slice(password.as_bytes())
        .map_err(|e| ProtocolError::crypto(e.to_string()))?;
    mac.update(username.as_bytes());
    mac.update(signed);
    mac.verify_slice(digest)
        .map_err(|_| ProtocolError::SignatureMismatch(username.to_string()))?;

    Ok(username.to_string())
}

/// Decrypt an encryption part
///
/// `part` is the encryption part without its 4-byte header. Returns the
/// username and the plain-text payload.
///
/// # Errors
///
/// `InvalidPart` for a truncated part, `UnknownUser` when the lookup has no
/// password, `DecryptionFailed` when the SHA-1 checksum does not match.
pub fn decrypt_aes256(part: &[u8], lookup: &dyn PasswordLookup) -> Result<(String, Vec<u8>)> {
    let too_short = || ProtocolError::invalid_part(part::ENCRYPT_AES256, "too short");

    if part.len() < 2 {
        return Err(too_short());
    }
    let user_len = usize::from(u16::from_be_bytes([part[0], part[1]]));
    let rest = &part[2..];
    if rest.len() < user_len + IV_SIZE + CHECKSUM_SIZE {
        return Err(too_short());
    }

    let (username, rest) = rest.split_at(user_len);
    let (iv, encrypted) = rest.split_at(IV_SIZE);
    let username = std::str::from_utf8(username)
        .map_err(|_| ProtocolError::InvalidString(part::ENCRYPT_AES256))?;

    let password = lookup
        .password(username)
        .ok_or_else(|| ProtocolError::UnknownUser(username.to_string()))?;

    let key = Sha256::digest(password.as_bytes());
    let mut plain = encrypted.to_vec();
    let mut cipher = Aes256Ofb::new_from_slices(&key, iv)
        .map_err(|e| ProtocolError::crypto(e.to_string()))?;
    cipher.apply_keystream(&mut plain);

    let payload = plain.split_off(CHECKSUM_SIZE);
    if Sha1::digest(&payload).as_slice() != plain.as_slice() {
        return Err(ProtocolError::DecryptionFailed(username.to_string()));
    }

    Ok((username.to_string(), payload))
}
