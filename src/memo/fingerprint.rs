use std::fs::File;
use std::io::Read;
use std::path::Path;

/// FNV-1a 64 content hash.
#[derive(Debug, Clone, Copy)]
pub struct Fnv64 {
    hash: u64,
}

impl Default for Fnv64 {
    fn default() -> Self {
        Self::new()
    }
}

impl Fnv64 {
    pub fn new() -> Self {
        Self {
            hash: 0xcbf29ce484222325,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        let mut h = self.hash;
        for &b in data {
            h ^= b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        self.hash = h;
    }

    pub fn finish(&self) -> u64 {
        self.hash
    }
}

pub fn hash_bytes(data: &[u8]) -> u64 {
    let mut hasher = Fnv64::new();
    hasher.update(data);
    hasher.finish()
}

pub fn hash_file(path: &Path) -> std::io::Result<u64> {
    let mut hasher = Fnv64::new();
    feed_file(&mut hasher, path)?;
    Ok(hasher.finish())
}

fn feed_file(hasher: &mut Fnv64, path: &Path) -> std::io::Result<()> {
    let mut file = File::open(path)?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(())
}

/// Memo key built from parameters and file contents.
///
/// Every field is length- or tag-prefixed so that adjacent fields cannot
/// run into each other.
#[derive(Debug, Clone, Default)]
pub struct Fingerprint {
    hasher: Fnv64,
}

impl Fingerprint {
    pub fn new(domain: &str) -> Self {
        let mut fp = Self::default();
        fp.push_str(domain);
        fp
    }

    pub fn push_str(&mut self, s: &str) -> &mut Self {
        self.push_u64(s.len() as u64);
        self.hasher.update(s.as_bytes());
        self
    }

    pub fn push_u64(&mut self, v: u64) -> &mut Self {
        self.hasher.update(&v.to_le_bytes());
        self
    }

    pub fn push_f32(&mut self, v: f32) -> &mut Self {
        self.push_u64(v.to_bits() as u64)
    }

    pub fn push_f64(&mut self, v: f64) -> &mut Self {
        self.push_u64(v.to_bits())
    }

    pub fn push_bool(&mut self, v: bool) -> &mut Self {
        self.hasher.update(&[v as u8]);
        self
    }

    /// Hashes the file's bytes, or a marker when it does not exist.
    pub fn push_file(&mut self, path: &Path) -> std::io::Result<&mut Self> {
        if !path.exists() {
            self.hasher.update(&[0]);
            return Ok(self);
        }
        self.hasher.update(&[1]);
        self.push_u64(hash_file(path)?);
        Ok(self)
    }

    pub fn finish(&self) -> u64 {
        self.hasher.finish()
    }
}
