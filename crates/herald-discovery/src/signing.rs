//! Ed25519 signatures in the OpenSSH `SSHSIG` envelope.
//!
//! Signatures produced here verify with `ssh-keygen -Y verify -n file`, and
//! signatures produced by `ssh-keygen -Y sign -n file` verify here.
//!
//! The signed data is
//!
//! ```text
//! "SSHSIG" || string(namespace) || string(reserved) || string(hash_alg) || string(H(message))
//! ```
//!
//! where `string(x)` is a big-endian `u32` length followed by `x`. The armored
//! blob adds a version, the public key, and the signature itself.

use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha512};

use crate::error::SignatureError;

const MAGIC: &[u8] = b"SSHSIG";
const VERSION: u32 = 1;
const NAMESPACE: &str = "file";
const HASH_ALGORITHM: &str = "sha512";
const KEY_TYPE: &str = "ssh-ed25519";

const ARMOR_BEGIN: &str = "-----BEGIN SSH SIGNATURE-----";
const ARMOR_END: &str = "-----END SSH SIGNATURE-----";
const ARMOR_WIDTH: usize = 70;

/// The document signed to authenticate an event query.
///
/// Keys are emitted in lexicographic order with no whitespace:
/// `{"action":"query","domain":"<domain>","timestamp":"<ts>"}`.
pub fn canonical_query_document(domain: &str, timestamp: &str) -> String {
    serde_json::json!({
        "action": "query",
        "domain": domain,
        "timestamp": timestamp,
    })
    .to_string()
}

/// Signs `message` and returns the armored `SSHSIG` text.
pub fn sign(message: &[u8], key: &SigningKey) -> String {
    let signature = key.sign(&signed_data(message));

    let mut blob = Vec::with_capacity(256);
    blob.extend_from_slice(MAGIC);
    blob.extend_from_slice(&VERSION.to_be_bytes());
    put_string(&mut blob, &public_key_blob(&key.verifying_key()));
    put_string(&mut blob, NAMESPACE.as_bytes());
    put_string(&mut blob, b"");
    put_string(&mut blob, HASH_ALGORITHM.as_bytes());

    let mut signature_blob = Vec::with_capacity(83);
    put_string(&mut signature_blob, KEY_TYPE.as_bytes());
    put_string(&mut signature_blob, &signature.to_bytes());
    put_string(&mut blob, &signature_blob);

    armor(&blob)
}

/// Checks an armored `SSHSIG` signature over `message` against `public_key`.
///
/// # Errors
///
/// Returns `SignatureError::Armor`/`Format`/`Key` if the signature cannot be
/// parsed, and `SignatureError::Mismatch` if it was made by another key or
/// over another message.
pub fn verify(message: &[u8], public_key: &VerifyingKey, armored: &str) -> Result<(), SignatureError> {
    let parsed = parse(armored)?;

    if parsed.namespace != NAMESPACE {
        return Err(SignatureError::Format(format!(
            "unexpected namespace {:?}",
            parsed.namespace
        )));
    }
    if parsed.hash_algorithm != HASH_ALGORITHM {
        return Err(SignatureError::Format(format!(
            "unsupported hash algorithm {:?}",
            parsed.hash_algorithm
        )));
    }
    if parsed.public_key != *public_key {
        return Err(SignatureError::Mismatch);
    }

    public_key
        .verify(&signed_data(message), &parsed.signature)
        .map_err(|_| SignatureError::Mismatch)
}

/// Formats `key` as an OpenSSH public key line (`ssh-ed25519 AAAA...`).
pub fn public_key_openssh(key: &VerifyingKey) -> String {
    format!(
        "{KEY_TYPE} {}",
        base64::engine::general_purpose::STANDARD.encode(public_key_blob(key))
    )
}

fn signed_data(message: &[u8]) -> Vec<u8> {
    let digest = Sha512::digest(message);

    let mut data = Vec::with_capacity(MAGIC.len() + 96);
    data.extend_from_slice(MAGIC);
    put_string(&mut data, NAMESPACE.as_bytes());
    put_string(&mut data, b"");
    put_string(&mut data, HASH_ALGORITHM.as_bytes());
    put_string(&mut data, &digest);
    data
}

fn public_key_blob(key: &VerifyingKey) -> Vec<u8> {
    let mut blob = Vec::with_capacity(51);
    put_string(&mut blob, KEY_TYPE.as_bytes());
    put_string(&mut blob, key.as_bytes());
    blob
}

fn put_string(buf: &mut Vec<u8>, bytes: &[u8]) {
    // Every field written here is a constant, a key, or a digest.
    buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    buf.extend_from_slice(bytes);
}

fn armor(blob: &[u8]) -> String {
    let body = base64::engine::general_purpose::STANDARD.encode(blob);

    let mut out = String::with_capacity(body.len() + 80);
    out.push_str(ARMOR_BEGIN);
    out.push('\n');
    // Base64 output is ASCII, so byte chunks are valid UTF-8.
    for line in body.as_bytes().chunks(ARMOR_WIDTH) {
        out.push_str(&String::from_utf8_lossy(line));
        out.push('\n');
    }
    out.push_str(ARMOR_END);
    out.push('\n');
    out
}

struct ParsedSignature {
    public_key: VerifyingKey,
    namespace: String,
    hash_algorithm: String,
    signature: Signature,
}

fn parse(armored: &str) -> Result<ParsedSignature, SignatureError> {
    let body = armored
        .trim()
        .strip_prefix(ARMOR_BEGIN)
        .and_then(|rest| rest.strip_suffix(ARMOR_END))
        .ok_or_else(|| SignatureError::Armor("missing BEGIN/END lines".to_string()))?;
    let body: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let blob = base64::engine::general_purpose::STANDARD
        .decode(body)
        .map_err(|e| SignatureError::Armor(e.to_string()))?;

    let mut reader = Reader::new(&blob);
    if reader.take(MAGIC.len())? != MAGIC {
        return Err(SignatureError::Format("missing SSHSIG magic".to_string()));
    }
    let version = reader.u32()?;
    if version != VERSION {
        return Err(SignatureError::Format(format!("unsupported version {version}")));
    }

    let public_key = parse_public_key(reader.string()?)?;
    let namespace = reader.utf8()?;
    let _reserved = reader.string()?;
    let hash_algorithm = reader.utf8()?;
    let signature = parse_signature(reader.string()?)?;

    Ok(ParsedSignature {
        public_key,
        namespace,
        hash_algorithm,
        signature,
    })
}

fn parse_public_key(blob: &[u8]) -> Result<VerifyingKey, SignatureError> {
    let mut reader = Reader::new(blob);
    let key_type = reader.utf8()?;
    if key_type != KEY_TYPE {
        return Err(SignatureError::Key(format!("unsupported key type {key_type:?}")));
    }
    let bytes: [u8; 32] = reader
        .string()?
        .try_into()
        .map_err(|_| SignatureError::Key("ed25519 public key must be 32 bytes".to_string()))?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| SignatureError::Key(e.to_string()))
}

fn parse_signature(blob: &[u8]) -> Result<Signature, SignatureError> {
    let mut reader = Reader::new(blob);
    let key_type = reader.utf8()?;
    if key_type != KEY_TYPE {
        return Err(SignatureError::Format(format!(
            "unsupported signature type {key_type:?}"
        )));
    }
    let bytes: [u8; 64] = reader
        .string()?
        .try_into()
        .map_err(|_| SignatureError::Format("ed25519 signature must be 64 bytes".to_string()))?;
    Ok(Signature::from_bytes(&bytes))
}

/// Cursor over SSH wire-format data.
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], SignatureError> {
        if self.buf.len() < n {
            return Err(SignatureError::Format("truncated signature blob".to_string()));
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn u32(&mut self) -> Result<u32, SignatureError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn string(&mut self) -> Result<&'a [u8], SignatureError> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    fn utf8(&mut self) -> Result<String, SignatureError> {
        let bytes = self.string()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| SignatureError::Format("field is not UTF-8".to_string()))
    }
}
