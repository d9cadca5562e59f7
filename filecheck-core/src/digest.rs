use crate::algorithm::Algorithm;
use crate::error::{Error, Result};
use sha2::Digest;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

/// Read window used when streaming a file through a hasher.
pub const DEFAULT_CHUNK: usize = 32 * 1024;

/// Running state for one of the supported algorithms.
enum Hasher {
    Md5(md5::Md5),
    Sha1(sha1::Sha1),
    Sha224(sha2::Sha224),
    Sha256(sha2::Sha256),
    Sha384(sha2::Sha384),
    Sha512(sha2::Sha512),
    Blake3(Box<blake3::Hasher>),
}

impl Hasher {
    fn new(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Md5 => Hasher::Md5(md5::Md5::new()),
            Algorithm::Sha1 => Hasher::Sha1(sha1::Sha1::new()),
            Algorithm::Sha224 => Hasher::Sha224(sha2::Sha224::new()),
            Algorithm::Sha256 => Hasher::Sha256(sha2::Sha256::new()),
            Algorithm::Sha384 => Hasher::Sha384(sha2::Sha384::new()),
            Algorithm::Sha512 => Hasher::Sha512(sha2::Sha512::new()),
            Algorithm::Blake3 => Hasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Md5(h) => h.update(data),
            Hasher::Sha1(h) => h.update(data),
            Hasher::Sha224(h) => h.update(data),
            Hasher::Sha256(h) => h.update(data),
            Hasher::Sha384(h) => h.update(data),
            Hasher::Sha512(h) => h.update(data),
            Hasher::Blake3(h) => {
                h.update(data);
            }
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Hasher::Md5(h) => format!("{:x}", h.finalize()),
            Hasher::Sha1(h) => format!("{:x}", h.finalize()),
            Hasher::Sha224(h) => format!("{:x}", h.finalize()),
            Hasher::Sha256(h) => format!("{:x}", h.finalize()),
            Hasher::Sha384(h) => format!("{:x}", h.finalize()),
            Hasher::Sha512(h) => format!("{:x}", h.finalize()),
            Hasher::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }
}

/// Streams file contents through a digest algorithm in fixed-size chunks.
#[derive(Clone, Debug)]
pub struct DigestEngine {
    supported: Vec<Algorithm>,
    chunk_size: usize,
}

impl Default for DigestEngine {
    fn default() -> Self {
        Self::new(&Algorithm::ALL)
    }
}

impl DigestEngine {
    pub fn new(supported: &[Algorithm]) -> Self {
        Self { supported: supported.to_vec(), chunk_size: DEFAULT_CHUNK }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Fails with a configuration error if `algorithm` is not enabled on this engine.
    pub fn ensure_supported(&self, algorithm: Algorithm) -> Result<()> {
        if self.supported.contains(&algorithm) {
            Ok(())
        } else {
            Err(Error::config(format!("algorithm {algorithm} is not enabled")))
        }
    }

    /// Hex digest of the file at `path`.
    pub fn hash(&self, path: &Path, algorithm: Algorithm) -> Result<String> {
        self.ensure_supported(algorithm)?;
        let f = File::open(path).map_err(|e| Error::file_access(path, e))?;
        self.digest_stream(f, algorithm).map_err(|e| Error::file_access(path, e))
    }

    /// Hex digest of everything `reader` yields.
    pub fn hash_reader<R: Read>(&self, reader: R, algorithm: Algorithm) -> Result<String> {
        self.ensure_supported(algorithm)?;
        self.digest_stream(reader, algorithm).map_err(|e| Error::file_access("<reader>", e))
    }

    fn digest_stream<R: Read>(&self, mut reader: R, algorithm: Algorithm) -> std::io::Result<String> {
        let mut hasher = Hasher::new(algorithm);
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buf[..n]);
        }
        Ok(hasher.finalize_hex())
    }
}
