use async_trait::async_trait;

use super::EmbeddingProvider;
use crate::error::Result;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Feature-hashed character trigrams, L2-normalized.
///
/// Case-insensitive and stable across processes, so snapshots written with it
/// stay comparable after a restart. Used offline and in tests.
#[derive(Debug, Clone)]
pub struct HashingProvider {
    name: String,
    dimension: usize,
}

impl HashingProvider {
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension: dimension.max(1),
        }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let normalized = text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let padded: Vec<char> = format!(" {normalized} ").chars().collect();

        let mut vector = vec![0.0_f32; self.dimension];
        for window in padded.windows(3) {
            let bucket = fnv1a(window) % self.dimension as u64;
            vector[bucket as usize] += 1.0;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

fn fnv1a(chars: &[char]) -> u64 {
    let mut hash = FNV_OFFSET;
    let mut buf = [0_u8; 4];
    for c in chars {
        for byte in c.encode_utf8(&mut buf).bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}

#[async_trait]
impl EmbeddingProvider for HashingProvider {
    fn model_name(&self) -> &str {
        &self.name
    }

    async fn dimension(&self) -> Result<usize> {
        Ok(self.dimension)
    }

    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }
}
