//! Signing & hashing (component B): RSA-2048/PKCS1v15-over-SHA256 signatures
//! and streaming MD5 file digests.
//!
//! The crucial contract, easy to get backwards: the message that gets signed
//! and verified is the package's **checksum rendered as a lowercase hex
//! string, treated as ASCII bytes** — never the sixteen raw MD5 bytes. A
//! signer or verifier that hashes the raw digest instead of its hex text will
//! never agree with the other side.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use md5::{Digest as Md5Digest, Md5};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::error::{Error, Result};

const READ_CHUNK: usize = 1024 * 1024;

/// Generate an RSA-2048 keypair, returning `(public_pem, private_pem)`.
///
/// The public key is PKIX/DER inside a `PUBLIC KEY` PEM block; the private
/// key is PKCS#1/DER inside an `RSA PRIVATE KEY` PEM block, matching the two
/// headers the origin's publisher tooling and this crate's own `genkey`
/// subcommand both expect.
pub fn generate_keypair() -> Result<(String, String)> {
    let mut rng = rand::thread_rng();
    let private_key = RsaPrivateKey::new(&mut rng, 2048)
        .map_err(|e| signature_error("<keygen>", format!("key generation failed: {e}")))?;
    let public_key = RsaPublicKey::from(&private_key);

    let private_pem = private_key
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| signature_error("<keygen>", format!("encode private key: {e}")))?
        .to_string();
    let public_pem = public_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| signature_error("<keygen>", format!("encode public key: {e}")))?;
    Ok((public_pem, private_pem))
}

/// Sign `message` (the ASCII bytes of a lowercase-hex MD5 string, in this
/// crate's usage) with the PKCS#1 PEM-encoded private key, returning the raw
/// signature bytes.
pub fn sign(private_pem: &str, message: &[u8]) -> Result<Vec<u8>> {
    let private_key = RsaPrivateKey::from_pkcs1_pem(private_pem)
        .map_err(|e| signature_error("<sign>", format!("decode private key: {e}")))?;
    let hashed = sha256(message);
    private_key
        .sign(Pkcs1v15Sign::new::<Sha256>(), &hashed)
        .map_err(|e| signature_error("<sign>", format!("sign failed: {e}")))
}

/// Verify `signature` over `message` with the PKIX PEM-encoded public key.
/// Returns `Error::Signature` (never panics) on any malformed key, malformed
/// signature, or genuine mismatch.
pub fn verify(public_pem: &str, signature: &[u8], message: &[u8]) -> Result<()> {
    let public_key = RsaPublicKey::from_public_key_pem(public_pem)
        .map_err(|e| signature_error("<verify>", format!("decode public key: {e}")))?;
    let hashed = sha256(message);
    public_key
        .verify(Pkcs1v15Sign::new::<Sha256>(), &hashed, signature)
        .map_err(|e| signature_error("<verify>", format!("verification failed: {e}")))
}

fn sha256(message: &[u8]) -> [u8; 32] {
    use sha2::Digest;
    let mut hasher = Sha256::new();
    hasher.update(message);
    hasher.finalize().into()
}

fn signature_error(package: &str, reason: String) -> Error {
    Error::Signature { package: package.to_string(), reason }
}

/// Stream `path` through MD5 in chunks of at least 1 MiB, returning
/// `(size_bytes, md5_hex_lower)`.
pub fn file_digest(path: &Path) -> Result<(u64, String)> {
    let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; READ_CHUNK];
    let mut total: u64 = 0;
    loop {
        let n = file.read(&mut buf).map_err(|e| Error::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }
    let digest = hasher.finalize();
    Ok((total, hex::encode(digest)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn sign_then_verify_round_trips() {
        let (public_pem, private_pem) = generate_keypair().unwrap();
        let message = b"d41d8cd98f00b204e9800998ecf8427e";
        let signature = sign(&private_pem, message).unwrap();
        verify(&public_pem, &signature, message).unwrap();
    }

    #[test]
    fn verify_rejects_different_message() {
        let (public_pem, private_pem) = generate_keypair().unwrap();
        let signature = sign(&private_pem, b"abc").unwrap();
        assert!(verify(&public_pem, &signature, b"abd").is_err());
    }

    #[test]
    fn verify_rejects_bit_flipped_signature() {
        let (public_pem, private_pem) = generate_keypair().unwrap();
        let mut signature = sign(&private_pem, b"abc").unwrap();
        signature[0] ^= 0x01;
        assert!(verify(&public_pem, &signature, b"abc").is_err());
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let (_pub_a, priv_a) = generate_keypair().unwrap();
        let (pub_b, _priv_b) = generate_keypair().unwrap();
        let signature = sign(&priv_a, b"abc").unwrap();
        assert!(verify(&pub_b, &signature, b"abc").is_err());
    }

    #[test]
    fn file_digest_matches_known_md5() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        let (size, md5_hex) = file_digest(file.path()).unwrap();
        assert_eq!(size, 11);
        assert_eq!(md5_hex, "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn file_digest_streams_multi_megabyte_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let chunk = vec![b'x'; 1024 * 1024];
        for _ in 0..3 {
            file.write_all(&chunk).unwrap();
        }
        let (size, _md5_hex) = file_digest(file.path()).unwrap();
        assert_eq!(size, 3 * 1024 * 1024);
    }
}
