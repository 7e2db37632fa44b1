// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Streaming Authenticated Encryption
//!
//! [`StreamingAead`] wraps byte sinks and sources so that everything written
//! is encrypted and everything read is decrypted and authenticated. Callers
//! never see key material; they get the primitive from a keystore.
//!
//! [`SegmentedAesGcm`] is the built-in implementation, AES-256-GCM over
//! fixed-size segments with a per-stream key derived through HKDF-SHA256.
//!
//! ## Ciphertext Layout
//!
//! ```text
//! header:   [len = 40 : u8][salt : 32][nonce prefix : 7]
//! segments: [ciphertext + tag : 4096] ... [ciphertext + tag : <= 4096]
//! ```
//!
//! - Stream key: `HKDF-SHA256(salt, master key, info = associated data)`
//! - Segment nonce: `nonce prefix || segment index (u32 BE) || last flag`
//! - The last segment is always present, even for an empty plaintext, so
//!   truncating a stream at a segment boundary fails authentication.
//!
//! ## Errors
//!
//! Wrappers speak `std::io`. Authentication and framing failures surface as
//! `io::ErrorKind::InvalidData` carrying a [`CryptoError`].

use std::fmt;
use std::io::{self, Read, Write};

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::hkdf;
use ring::rand::{SecureRandom, SystemRandom};

/// Length of the master key in bytes.
pub const KEY_LEN: usize = 32;

const SALT_LEN: usize = 32;
const NONCE_PREFIX_LEN: usize = 7;
const HEADER_LEN: usize = 1 + SALT_LEN + NONCE_PREFIX_LEN;
const TAG_LEN: usize = 16;

/// Ciphertext bytes per segment, tag included.
pub const SEGMENT_LEN: usize = 4096;
const PLAINTEXT_SEGMENT_LEN: usize = SEGMENT_LEN - TAG_LEN;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("master key must be {KEY_LEN} bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("invalid ciphertext header")]
    InvalidHeader,

    #[error("ciphertext truncated")]
    Truncated,

    #[error("authentication failed for segment {0}")]
    Authentication(u32),

    #[error("too many segments")]
    SegmentOverflow,

    #[error("key derivation failed")]
    KeyDerivation,

    #[error("random generator failure")]
    Random,
}

impl From<CryptoError> for io::Error {
    fn from(e: CryptoError) -> Self {
        let kind = match e {
            CryptoError::KeyDerivation | CryptoError::Random | CryptoError::SegmentOverflow => {
                io::ErrorKind::Other
            }
            _ => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, e)
    }
}

/// Writer whose trailing data is only committed by [`finish`](Self::finish).
pub trait FinishWrite: Write {
    /// Seal the final segment and flush the underlying sink.
    ///
    /// Dropping the writer without calling this leaves an unauthenticated,
    /// unreadable stream behind.
    fn finish(self: Box<Self>) -> io::Result<()>;
}

/// Streaming authenticated-encryption primitive.
pub trait StreamingAead: Send + Sync {
    fn encrypting_writer<'a>(
        &self,
        sink: Box<dyn Write + Send + 'a>,
        associated_data: &[u8],
    ) -> io::Result<Box<dyn FinishWrite + Send + 'a>>;

    fn decrypting_reader<'a>(
        &self,
        source: Box<dyn Read + Send + 'a>,
        associated_data: &[u8],
    ) -> io::Result<Box<dyn Read + Send + 'a>>;
}

/// AES-256-GCM with HKDF-derived stream keys and 4 KiB segments.
pub struct SegmentedAesGcm {
    master_key: [u8; KEY_LEN],
    rng: SystemRandom,
}

impl fmt::Debug for SegmentedAesGcm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentedAesGcm").finish_non_exhaustive()
    }
}

impl SegmentedAesGcm {
    pub fn new(master_key: &[u8]) -> Result<Self, CryptoError> {
        let master_key: [u8; KEY_LEN] = master_key
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength(master_key.len()))?;
        Ok(Self {
            master_key,
            rng: SystemRandom::new(),
        })
    }

    /// Fresh random master key.
    pub fn generate_key() -> Result<[u8; KEY_LEN], CryptoError> {
        let mut key = [0u8; KEY_LEN];
        SystemRandom::new()
            .fill(&mut key)
            .map_err(|_| CryptoError::Random)?;
        Ok(key)
    }

    fn stream_key(&self, salt: &[u8], associated_data: &[u8]) -> Result<LessSafeKey, CryptoError> {
        let prk = hkdf::Salt::new(hkdf::HKDF_SHA256, salt).extract(&self.master_key);
        let info = [associated_data];
        let okm = prk
            .expand(&info, &AES_256_GCM)
            .map_err(|_| CryptoError::KeyDerivation)?;
        Ok(LessSafeKey::new(UnboundKey::from(okm)))
    }
}

impl StreamingAead for SegmentedAesGcm {
    fn encrypting_writer<'a>(
        &self,
        mut sink: Box<dyn Write + Send + 'a>,
        associated_data: &[u8],
    ) -> io::Result<Box<dyn FinishWrite + Send + 'a>> {
        let mut salt = [0u8; SALT_LEN];
        let mut nonce_prefix = [0u8; NONCE_PREFIX_LEN];
        self.rng.fill(&mut salt).map_err(|_| CryptoError::Random)?;
        self.rng
            .fill(&mut nonce_prefix)
            .map_err(|_| CryptoError::Random)?;

        let key = self.stream_key(&salt, associated_data)?;

        sink.write_all(&[HEADER_LEN as u8])?;
        sink.write_all(&salt)?;
        sink.write_all(&nonce_prefix)?;

        Ok(Box::new(EncryptingWriter {
            sink,
            key,
            nonce_prefix,
            segment: 0,
            buffer: Vec::with_capacity(SEGMENT_LEN),
        }))
    }

    fn decrypting_reader<'a>(
        &self,
        mut source: Box<dyn Read + Send + 'a>,
        associated_data: &[u8],
    ) -> io::Result<Box<dyn Read + Send + 'a>> {
        let mut header = [0u8; HEADER_LEN];
        let read = read_full(&mut source, &mut header)?;
        if read < HEADER_LEN || header[0] as usize != HEADER_LEN {
            return Err(CryptoError::InvalidHeader.into());
        }
        let salt = &header[1..1 + SALT_LEN];
        let mut nonce_prefix = [0u8; NONCE_PREFIX_LEN];
        nonce_prefix.copy_from_slice(&header[1 + SALT_LEN..]);

        let key = self.stream_key(salt, associated_data)?;

        Ok(Box::new(DecryptingReader {
            source,
            key,
            nonce_prefix,
            segment: 0,
            pending: Vec::with_capacity(SEGMENT_LEN + 1),
            plaintext: Vec::new(),
            position: 0,
            finished: false,
        }))
    }
}

fn segment_nonce(prefix: &[u8; NONCE_PREFIX_LEN], segment: u32, last: bool) -> Nonce {
    let mut nonce = [0u8; NONCE_LEN];
    nonce[..NONCE_PREFIX_LEN].copy_from_slice(prefix);
    nonce[NONCE_PREFIX_LEN..NONCE_PREFIX_LEN + 4].copy_from_slice(&segment.to_be_bytes());
    nonce[NONCE_LEN - 1] = u8::from(last);
    Nonce::assume_unique_for_key(nonce)
}

/// Reads until `buf` is full or the source is exhausted.
fn read_full(source: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// =============================================================================
// Writer
// =============================================================================

struct EncryptingWriter<'a> {
    sink: Box<dyn Write + Send + 'a>,
    key: LessSafeKey,
    nonce_prefix: [u8; NONCE_PREFIX_LEN],
    segment: u32,
    buffer: Vec<u8>,
}

impl EncryptingWriter<'_> {
    fn seal_segment(&mut self, last: bool) -> io::Result<()> {
        let nonce = segment_nonce(&self.nonce_prefix, self.segment, last);
        self.key
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut self.buffer)
            .map_err(|_| io::Error::other("segment encryption failed"))?;
        self.sink.write_all(&self.buffer)?;
        self.buffer.clear();
        self.segment = self
            .segment
            .checked_add(1)
            .ok_or(CryptoError::SegmentOverflow)?;
        Ok(())
    }
}

impl Write for EncryptingWriter<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut rest = data;
        while !rest.is_empty() {
            // A full buffer is only known not to be last once more data arrives.
            if self.buffer.len() == PLAINTEXT_SEGMENT_LEN {
                self.seal_segment(false)?;
            }
            let take = (PLAINTEXT_SEGMENT_LEN - self.buffer.len()).min(rest.len());
            self.buffer.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

impl FinishWrite for EncryptingWriter<'_> {
    fn finish(mut self: Box<Self>) -> io::Result<()> {
        self.seal_segment(true)?;
        self.sink.flush()
    }
}

// =============================================================================
// Reader
// =============================================================================

struct DecryptingReader<'a> {
    source: Box<dyn Read + Send + 'a>,
    key: LessSafeKey,
    nonce_prefix: [u8; NONCE_PREFIX_LEN],
    segment: u32,
    /// Ciphertext read ahead; one byte past a segment tells whether it is last.
    pending: Vec<u8>,
    plaintext: Vec<u8>,
    position: usize,
    finished: bool,
}

impl DecryptingReader<'_> {
    fn next_segment(&mut self) -> io::Result<()> {
        let have = self.pending.len();
        self.pending.resize(SEGMENT_LEN + 1, 0);
        let read = read_full(&mut self.source, &mut self.pending[have..])?;
        self.pending.truncate(have + read);

        let last = self.pending.len() <= SEGMENT_LEN;
        if self.pending.len() < TAG_LEN {
            return Err(CryptoError::Truncated.into());
        }

        let segment_len = if last { self.pending.len() } else { SEGMENT_LEN };
        let mut segment: Vec<u8> = self.pending.drain(..segment_len).collect();

        let nonce = segment_nonce(&self.nonce_prefix, self.segment, last);
        let plain_len = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut segment)
            .map_err(|_| CryptoError::Authentication(self.segment))?
            .len();
        segment.truncate(plain_len);

        self.plaintext = segment;
        self.position = 0;
        self.finished = last;
        self.segment = self
            .segment
            .checked_add(1)
            .ok_or(CryptoError::SegmentOverflow)?;
        Ok(())
    }
}

impl Read for DecryptingReader<'_> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        while self.position == self.plaintext.len() {
            if self.finished {
                return Ok(0);
            }
            self.next_segment()?;
        }
        let n = (self.plaintext.len() - self.position).min(out.len());
        out[..n].copy_from_slice(&self.plaintext[self.position..self.position + n]);
        self.position += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aead() -> SegmentedAesGcm {
        SegmentedAesGcm::new(&[7u8; KEY_LEN]).unwrap()
    }

    fn encrypt(aead: &SegmentedAesGcm, plaintext: &[u8], ad: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut writer = aead.encrypting_writer(Box::new(&mut out), ad).unwrap();
        // Uneven chunks exercise segment boundaries.
        for chunk in plaintext.chunks(1000) {
            writer.write_all(chunk).unwrap();
        }
        writer.finish().unwrap();
        out
    }

    fn decrypt(aead: &SegmentedAesGcm, ciphertext: &[u8], ad: &[u8]) -> io::Result<Vec<u8>> {
        let mut reader = aead.decrypting_reader(Box::new(ciphertext), ad)?;
        let mut out = Vec::new();
        reader.read_to_end(&mut out)?;
        Ok(out)
    }

    #[test]
    fn round_trips_across_segment_sizes() {
        let aead = aead();
        for len in [
            0,
            1,
            PLAINTEXT_SEGMENT_LEN - 1,
            PLAINTEXT_SEGMENT_LEN,
            PLAINTEXT_SEGMENT_LEN + 1,
            3 * PLAINTEXT_SEGMENT_LEN + 17,
        ] {
            let plaintext: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let ciphertext = encrypt(&aead, &plaintext, b"");
            assert_eq!(decrypt(&aead, &ciphertext, b"").unwrap(), plaintext, "len {len}");
        }
    }

    #[test]
    fn exact_segment_multiple_has_no_trailing_empty_segment() {
        let aead = aead();
        let ciphertext = encrypt(&aead, &vec![1u8; PLAINTEXT_SEGMENT_LEN], b"");
        assert_eq!(ciphertext.len(), HEADER_LEN + SEGMENT_LEN);
    }

    #[test]
    fn same_plaintext_encrypts_differently() {
        let aead = aead();
        assert_ne!(encrypt(&aead, b"secret", b""), encrypt(&aead, b"secret", b""));
    }

    #[test]
    fn flipped_bit_fails_authentication() {
        let aead = aead();
        let mut ciphertext = encrypt(&aead, b"{\"token\":\"abc\"}", b"");
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0x01;
        let err = decrypt(&aead, &ciphertext, b"").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn dropping_final_segment_is_detected() {
        let aead = aead();
        let ciphertext = encrypt(&aead, &vec![9u8; 2 * PLAINTEXT_SEGMENT_LEN + 5], b"");
        let truncated = &ciphertext[..HEADER_LEN + 2 * SEGMENT_LEN];
        assert!(decrypt(&aead, truncated, b"").is_err());
    }

    #[test]
    fn associated_data_and_key_are_bound() {
        let aead = aead();
        let ciphertext = encrypt(&aead, b"payload", b"v1");
        assert!(decrypt(&aead, &ciphertext, b"v2").is_err());

        let other = SegmentedAesGcm::new(&[8u8; KEY_LEN]).unwrap();
        assert!(decrypt(&other, &ciphertext, b"v1").is_err());
    }

    #[test]
    fn garbage_header_is_rejected() {
        let aead = aead();
        assert!(decrypt(&aead, b"", b"").is_err());
        assert!(decrypt(&aead, b"plain json, not ciphertext", b"").is_err());
    }

    #[test]
    fn rejects_wrong_key_length() {
        assert!(matches!(
            SegmentedAesGcm::new(&[0u8; 16]),
            Err(CryptoError::InvalidKeyLength(16))
        ));
    }
}
