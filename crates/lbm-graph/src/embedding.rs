//! Deterministic 64-dimensional hashed-token-bag embedding.
//!
//! No learned model: each token contributes 64 pseudo-random-but-deterministic
//! bytes derived from its own SHA-256 hash, folded into per-dimension
//! accumulators and L2-normalized. Same text always embeds to the same
//! vector, on any machine, forever.

use sha2::{Digest, Sha256};

const DIMS: usize = 64;

/// Split `text` into lowercase runs of `[A-Za-z0-9_]`, discarding everything else.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            current.push(c.to_ascii_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Embed `text` into a unit-L2-normalized 64-vector. Empty or punctuation-only
/// text embeds to the zero vector.
pub fn embed(text: &str) -> [f64; DIMS] {
    let mut acc = [0f64; DIMS];
    for token in tokenize(text) {
        let h1 = Sha256::digest(token.as_bytes());
        let h2 = Sha256::digest({
            let mut buf = token.into_bytes();
            buf.push(0u8);
            buf
        });
        let mut bytes = [0u8; DIMS];
        bytes[..32].copy_from_slice(&h1);
        bytes[32..].copy_from_slice(&h2);
        for (i, b) in bytes.iter().enumerate() {
            acc[i] += (*b as f64) / 127.5 - 1.0;
        }
    }
    normalize(acc)
}

fn normalize(mut v: [f64; DIMS]) -> [f64; DIMS] {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    v
}

/// Dot product of two unit vectors, i.e. their cosine similarity.
pub fn cosine(a: &[f64; DIMS], b: &[f64; DIMS]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
