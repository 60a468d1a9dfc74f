// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Standard security handler: password protection with RC4 (128-bit, R3) and
// removal of RC4 (R2/R3) or AES-128 (AESV2, R4) protection.
//
// Key derivation follows the algorithms of the PDF reference:
//   Algorithm 2  file key from a password
//   Algorithm 3  /O entry
//   Algorithm 4  /U entry (R2)
//   Algorithm 5  /U entry (R3+)
//   Algorithm 7  user password recovered from the owner password

use aes::Aes128;
use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, KeyIvInit};
use blattwerk_core::error::{BlattwerkError, Result};
use std::collections::{BTreeMap, HashSet};

use lopdf::xref::XrefEntry;
use lopdf::{Dictionary, Document, Object, ObjectId, ObjectStream, Reader, StringFormat, dictionary};
use md5::{Digest, Md5};
use sha2::Sha256;
use tracing::{debug, info, instrument, warn};

use super::document::PdfDocument;

/// Password padding string.
const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Revision written by [`PdfDocument::encrypt`].
const WRITE_REVISION: u32 = 3;
/// File key length in bytes (128-bit).
const WRITE_KEY_LENGTH: usize = 16;
/// Every permission granted.
const ALL_PERMISSIONS: i32 = -4;

// -- Primitives -----------------------------------------------------------------

/// RC4 is symmetric: the same call encrypts and decrypts.
fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut s: [u8; 256] = std::array::from_fn(|i| i as u8);
    let mut j = 0u8;
    for i in 0..256 {
        j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
        s.swap(i, j as usize);
    }

    let (mut i, mut j) = (0u8, 0u8);
    data.iter()
        .map(|byte| {
            i = i.wrapping_add(1);
            j = j.wrapping_add(s[i as usize]);
            s.swap(i as usize, j as usize);
            byte ^ s[s[i as usize].wrapping_add(s[j as usize]) as usize]
        })
        .collect()
}

fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = PADDING;
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PADDING[..32 - len]);
    padded
}

/// XOR every key byte with `round`, for the R3 repeated RC4 passes.
fn xor_key(key: &[u8], round: u8) -> Vec<u8> {
    key.iter().map(|b| b ^ round).collect()
}

/// Parameters of the standard security handler needed to derive keys.
#[derive(Debug, Clone)]
struct Params {
    revision: u32,
    key_length: usize,
    owner: Vec<u8>,
    user: Vec<u8>,
    permissions: i32,
    file_id: Vec<u8>,
    encrypt_metadata: bool,
}

impl Params {
    /// Algorithm 2.
    fn file_key(&self, padded_password: &[u8; 32]) -> Vec<u8> {
        let mut hasher = Md5::new();
        hasher.update(padded_password);
        hasher.update(&self.owner);
        hasher.update(self.permissions.to_le_bytes());
        hasher.update(&self.file_id);
        if self.revision >= 4 && !self.encrypt_metadata {
            hasher.update([0xFF; 4]);
        }
        let mut hash = hasher.finalize().to_vec();
        if self.revision >= 3 {
            for _ in 0..50 {
                hash = Md5::digest(&hash[..self.key_length]).to_vec();
            }
        }
        hash.truncate(self.key_length);
        hash
    }

    /// Algorithms 4 and 5.
    fn user_entry(&self, key: &[u8]) -> Vec<u8> {
        if self.revision < 3 {
            return rc4(key, &PADDING);
        }
        let mut hasher = Md5::new();
        hasher.update(PADDING);
        hasher.update(&self.file_id);
        let mut hash = rc4(key, &hasher.finalize());
        for round in 1..=19u8 {
            hash = rc4(&xor_key(key, round), &hash);
        }
        hash.resize(32, 0);
        hash
    }

    /// RC4 key derived from the owner password (Algorithm 3, steps a-d).
    fn owner_key(&self, owner_password: &[u8]) -> Vec<u8> {
        let mut hash = Md5::digest(pad_password(owner_password)).to_vec();
        if self.revision >= 3 {
            for _ in 0..50 {
                hash = Md5::digest(&hash).to_vec();
            }
        }
        hash.truncate(self.key_length);
        hash
    }

    /// Algorithm 3.
    fn owner_entry(&self, owner_password: &[u8], user_password: &[u8]) -> Vec<u8> {
        let key = self.owner_key(owner_password);
        let mut entry = rc4(&key, &pad_password(user_password));
        if self.revision >= 3 {
            for round in 1..=19u8 {
                entry = rc4(&xor_key(&key, round), &entry);
            }
        }
        entry
    }

    /// File key if `padded` is the user password.
    fn authenticate_user(&self, padded: &[u8; 32]) -> Option<Vec<u8>> {
        let key = self.file_key(padded);
        let expected = self.user_entry(&key);
        let compared = if self.revision >= 3 { 16 } else { 32 };
        let stored = self.user.get(..compared)?;
        (stored == &expected[..compared]).then_some(key)
    }

    /// Algorithm 7: recover the padded user password from the owner password.
    fn authenticate_owner(&self, owner_password: &[u8]) -> Option<Vec<u8>> {
        let key = self.owner_key(owner_password);
        let mut user = self.owner.get(..32)?.to_vec();
        if self.revision >= 3 {
            for round in (0..=19u8).rev() {
                user = rc4(&xor_key(&key, round), &user);
            }
        } else {
            user = rc4(&key, &user);
        }
        let padded: [u8; 32] = user.try_into().ok()?;
        self.authenticate_user(&padded)
    }
}

/// Per-object key: file key extended with the object number and generation.
fn object_key(file_key: &[u8], (number, generation): ObjectId, aes: bool) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(file_key);
    hasher.update(&number.to_le_bytes()[..3]);
    hasher.update(generation.to_le_bytes());
    if aes {
        hasher.update(b"sAlT");
    }
    let mut key = hasher.finalize().to_vec();
    key.truncate((file_key.len() + 5).min(16));
    key
}

/// AES-128-CBC with the IV in the first block and PKCS#7 padding.
fn aes_decrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 16 {
        return Ok(Vec::new());
    }
    let (iv, body) = data.split_at(16);
    if body.is_empty() {
        return Ok(Vec::new());
    }
    if body.len() % 16 != 0 {
        return Err(BlattwerkError::Decryption(format!(
            "AES payload of {} bytes is not block aligned",
            body.len()
        )));
    }

    let mut buffer = body.to_vec();
    let cipher = cbc::Decryptor::<Aes128>::new_from_slices(key, iv)
        .map_err(|err| BlattwerkError::Decryption(format!("bad AES key or IV: {err}")))?;
    let plain = cipher
        .decrypt_padded_mut::<NoPadding>(&mut buffer)
        .map_err(|err| BlattwerkError::Decryption(format!("AES decryption failed: {err}")))?;

    let pad = plain.last().copied().unwrap_or(0) as usize;
    if pad == 0 || pad > 16 || pad > plain.len() {
        return Err(BlattwerkError::Decryption("invalid PKCS#7 padding".into()));
    }
    Ok(plain[..plain.len() - pad].to_vec())
}

// -- Document walking -----------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum Cipher {
    Identity,
    Rc4,
    Aes,
}

impl Cipher {
    fn apply(self, file_key: &[u8], id: ObjectId, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Cipher::Identity => Ok(data.to_vec()),
            Cipher::Rc4 => Ok(rc4(&object_key(file_key, id, false), data)),
            Cipher::Aes => aes_decrypt(&object_key(file_key, id, true), data),
        }
    }
}

/// Apply `cipher` to every string nested in `obj`.
fn crypt_strings(obj: &mut Object, cipher: Cipher, key: &[u8], id: ObjectId) -> Result<()> {
    match obj {
        Object::String(bytes, _) => *bytes = cipher.apply(key, id, bytes)?,
        Object::Array(items) => {
            for item in items {
                crypt_strings(item, cipher, key, id)?;
            }
        }
        Object::Dictionary(dict) => crypt_dict(dict, cipher, key, id)?,
        Object::Stream(stream) => crypt_dict(&mut stream.dict, cipher, key, id)?,
        _ => {}
    }
    Ok(())
}

fn crypt_dict(dict: &mut Dictionary, cipher: Cipher, key: &[u8], id: ObjectId) -> Result<()> {
    for (_, value) in dict.iter_mut() {
        crypt_strings(value, cipher, key, id)?;
    }
    Ok(())
}

fn is_type(dict: &Dictionary, name: &[u8]) -> bool {
    matches!(dict.get(b"Type"), Ok(Object::Name(n)) if n == name)
}

/// Run every string and stream of the document (except the security
/// dictionary and cross-reference streams) through the ciphers.
fn crypt_document(
    doc: &mut Document,
    key: &[u8],
    strings: Cipher,
    streams: Cipher,
    skip: Option<ObjectId>,
    skip_metadata: bool,
) -> Result<()> {
    for (id, obj) in doc.objects.iter_mut() {
        if Some(*id) == skip {
            continue;
        }
        if let Object::Stream(stream) = obj {
            if is_type(&stream.dict, b"XRef") {
                continue;
            }
            if !(skip_metadata && is_type(&stream.dict, b"Metadata")) {
                let content = streams.apply(key, *id, &stream.content)?;
                stream.set_content(content);
            }
        }
        crypt_strings(obj, strings, key, *id)?;
    }
    Ok(())
}

fn first_file_id(doc: &Document) -> Vec<u8> {
    match doc.trailer.get(b"ID") {
        Ok(Object::Array(ids)) => match ids.first() {
            Some(Object::String(bytes, _)) => bytes.clone(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn string_entry(dict: &Dictionary, key: &[u8]) -> Result<Vec<u8>> {
    match dict.get(key) {
        Ok(Object::String(bytes, _)) => Ok(bytes.clone()),
        _ => Err(BlattwerkError::UnsupportedDocument(format!(
            "security handler lacks /{}",
            String::from_utf8_lossy(key)
        ))),
    }
}

/// Cipher selected by a crypt filter name under V4.
fn crypt_filter(encrypt: &Dictionary, entry: &[u8]) -> Cipher {
    let Ok(Object::Name(name)) = encrypt.get(entry) else {
        return Cipher::Identity;
    };
    if name == b"Identity" {
        return Cipher::Identity;
    }
    let method = encrypt
        .get(b"CF")
        .and_then(Object::as_dict)
        .and_then(|filters| filters.get(name))
        .and_then(Object::as_dict)
        .and_then(|filter| filter.get(b"CFM"))
        .and_then(Object::as_name)
        .unwrap_or(b"None".as_slice());
    match method {
        b"AESV2" => Cipher::Aes,
        b"V2" => Cipher::Rc4,
        _ => Cipher::Identity,
    }
}

/// Decrypt every object of `doc` in place and drop the `/Encrypt` entry.
/// `password` may be either the user or the owner password.
#[instrument(skip_all)]
fn decrypt_document(doc: &mut Document, password: &str) -> Result<()> {
    let (encrypt_ref, encrypt) = match doc.trailer.get(b"Encrypt") {
        Ok(Object::Reference(id)) => {
            let dict = doc
                .get_dictionary(*id)
                .map_err(|err| BlattwerkError::UnsupportedDocument(format!("unreadable /Encrypt: {err}")))?;
            (Some(*id), dict.clone())
        }
        Ok(Object::Dictionary(dict)) => (None, dict.clone()),
        _ => return Ok(()),
    };

    let filter = encrypt.get(b"Filter").and_then(Object::as_name).unwrap_or(b"".as_slice());
    if filter != b"Standard" {
        return Err(BlattwerkError::UnsupportedDocument(format!(
            "security handler {} is not supported",
            String::from_utf8_lossy(filter)
        )));
    }

    let int = |key: &[u8]| encrypt.get(key).and_then(Object::as_i64).ok();
    let version = int(b"V").unwrap_or(0);
    let revision = int(b"R").unwrap_or(2) as u32;
    if !(2..=4).contains(&revision) {
        return Err(BlattwerkError::UnsupportedDocument(format!(
            "security revision {revision} is not supported"
        )));
    }
    let key_length = if revision == 2 {
        5
    } else {
        (int(b"Length").unwrap_or(40) as usize / 8).clamp(5, 16)
    };
    let encrypt_metadata = !matches!(encrypt.get(b"EncryptMetadata"), Ok(Object::Boolean(false)));

    let params = Params {
        revision,
        key_length,
        owner: string_entry(&encrypt, b"O")?,
        user: string_entry(&encrypt, b"U")?,
        permissions: int(b"P").unwrap_or(0) as i32,
        file_id: first_file_id(doc),
        encrypt_metadata,
    };

    let password = password.as_bytes();
    let key = params
        .authenticate_user(&pad_password(password))
        .or_else(|| params.authenticate_owner(password))
        .ok_or_else(|| BlattwerkError::Decryption("incorrect password".into()))?;

    let (strings, streams) = if version >= 4 {
        (crypt_filter(&encrypt, b"StrF"), crypt_filter(&encrypt, b"StmF"))
    } else {
        (Cipher::Rc4, Cipher::Rc4)
    };
    debug!(version, revision, ?strings, ?streams, "Security handler unlocked");

    crypt_document(doc, &key, strings, streams, encrypt_ref, !encrypt_metadata)?;

    drop_security_handler(doc);
    expand_object_streams(doc);
    info!("Document decrypted");
    Ok(())
}

fn drop_security_handler(doc: &mut Document) {
    if let Some(Object::Reference(id)) = doc.trailer.remove(b"Encrypt") {
        doc.objects.remove(&id);
    }
    doc.encryption_state = None;
}

/// Re-read every uncompressed object of `data` without decryption. lopdf
/// keeps the objects of a file it could not unlock with the empty password
/// to itself, so they are parsed again through its `Reader`.
fn read_raw_objects(data: &[u8], doc: Document) -> Document {
    let ids: Vec<ObjectId> = doc
        .reference_table
        .entries
        .iter()
        .filter_map(|(number, entry)| match entry {
            XrefEntry::Normal { generation, .. } => Some((*number, *generation)),
            _ => None,
        })
        .collect();

    let reader = Reader {
        buffer: data,
        document: doc,
        encryption_state: None,
        raw_objects: BTreeMap::new(),
    };
    let mut objects = BTreeMap::new();
    for id in ids {
        match reader.get_object(id, &mut HashSet::new()) {
            Ok(object) => {
                objects.insert(id, object);
            }
            Err(err) => warn!(?id, %err, "Unreadable object skipped"),
        }
    }

    let mut doc = reader.document;
    for (id, object) in objects {
        doc.objects.entry(id).or_insert(object);
    }
    debug!(objects = doc.objects.len(), "Encrypted objects read");
    doc
}

/// Unpack decrypted object streams into ordinary objects and drop the
/// containers along with any cross-reference streams.
fn expand_object_streams(doc: &mut Document) {
    let mut unpacked = BTreeMap::new();
    let mut containers = Vec::new();
    for (id, obj) in doc.objects.iter_mut() {
        let Object::Stream(stream) = obj else {
            continue;
        };
        if is_type(&stream.dict, b"XRef") {
            containers.push(*id);
        } else if is_type(&stream.dict, b"ObjStm") {
            match ObjectStream::new(stream) {
                Ok(objects) => unpacked.extend(objects.objects),
                Err(err) => warn!(?id, %err, "Object stream could not be unpacked"),
            }
            containers.push(*id);
        }
    }
    for id in containers {
        doc.objects.remove(&id);
    }
    for (id, object) in unpacked {
        doc.objects.entry(id).or_insert(object);
    }
}

/// Load PDF bytes, unlocking them with `password` (user or owner) when they
/// are encrypted.
pub(crate) fn load_document(data: &[u8], password: &str) -> Result<Document> {
    let mut doc = Document::load_mem(data)
        .map_err(|err| BlattwerkError::PdfError(format!("failed to load PDF: {err}")))?;
    if doc.trailer.get(b"Encrypt").is_err() {
        return Ok(doc);
    }

    // lopdf decrypts on load when the user password is empty.
    if doc.encryption_state.is_some() {
        drop_security_handler(&mut doc);
        debug!("Unlocked with the empty user password");
        return Ok(doc);
    }

    let mut doc = read_raw_objects(data, doc);
    decrypt_document(&mut doc, password)?;
    Ok(doc)
}

/// A fresh 16-byte file identifier.
fn new_file_id() -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(uuid::Uuid::new_v4().as_bytes());
    hasher.update(chrono::Utc::now().to_rfc3339().as_bytes());
    hasher.finalize()[..16].to_vec()
}

impl PdfDocument {
    /// Whether the document still carries an `/Encrypt` entry.
    pub fn is_encrypted(&self) -> bool {
        self.inner().trailer.get(b"Encrypt").is_ok()
    }

    /// Protect the document with `password` (RC4 128-bit, revision 3). The
    /// owner password equals the user password and every permission is
    /// granted. A new file identifier is generated.
    #[instrument(skip_all)]
    pub fn encrypt(&mut self, password: &str) -> Result<()> {
        if self.is_encrypted() {
            return Err(BlattwerkError::Encryption("document is already encrypted".into()));
        }
        if password.is_empty() {
            warn!("Encrypting with an empty password");
        }

        let file_id = new_file_id();
        let mut params = Params {
            revision: WRITE_REVISION,
            key_length: WRITE_KEY_LENGTH,
            owner: Vec::new(),
            user: Vec::new(),
            permissions: ALL_PERMISSIONS,
            file_id: file_id.clone(),
            encrypt_metadata: true,
        };
        let password = password.as_bytes();
        params.owner = params.owner_entry(password, password);
        let key = params.file_key(&pad_password(password));
        params.user = params.user_entry(&key);

        let doc = self.inner_mut();
        crypt_document(doc, &key, Cipher::Rc4, Cipher::Rc4, None, false)?;

        let encrypt_id = doc.add_object(dictionary! {
            "Filter" => "Standard",
            "V" => Object::Integer(2),
            "R" => Object::Integer(WRITE_REVISION as i64),
            "Length" => Object::Integer((WRITE_KEY_LENGTH * 8) as i64),
            "O" => Object::String(params.owner, StringFormat::Hexadecimal),
            "U" => Object::String(params.user, StringFormat::Hexadecimal),
            "P" => Object::Integer(ALL_PERMISSIONS as i64),
        });
        let id = Object::String(file_id, StringFormat::Hexadecimal);
        doc.trailer.set("ID", Object::Array(vec![id.clone(), id]));
        doc.trailer.set("Encrypt", encrypt_id);
        info!("Document encrypted");
        Ok(())
    }
}
