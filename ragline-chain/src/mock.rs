//! Deterministic in-process backends for tests and examples.
//!
//! None of these talk to a network. [`HashEmbedder`] produces stable
//! vectors where texts sharing words land close together, which is
//! enough to exercise retrieval end to end without a real embedding
//! model.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use ragline_core::{
    Embedder, GenerateOptions, LanguageModel, RagError, Result, TokenStream,
};

/// A deterministic embedder hashing words into vector buckets.
///
/// Each lowercase alphanumeric token is FNV-1a-hashed to a bucket and
/// counted; the vector is L2-normalized. Texts sharing words produce
/// vectors with positive cosine similarity, and identical texts produce
/// identical vectors.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    /// Create an embedder producing vectors of `dimension`.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

fn fnv1a(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in token.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();
        for token in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let bucket = (fnv1a(token) % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            vector[0] = 1.0;
        } else {
            for value in &mut vector {
                *value /= norm;
            }
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimension
    }
}

/// An embedder that fails its first `failures` calls with
/// `EmbedderUnavailable`, then delegates to a [`HashEmbedder`].
#[derive(Debug)]
pub struct UnreliableEmbedder {
    inner: HashEmbedder,
    remaining: AtomicUsize,
}

impl UnreliableEmbedder {
    /// Create an embedder of `dimension` failing its first `failures`
    /// calls.
    pub fn new(dimension: usize, failures: usize) -> Self {
        Self { inner: HashEmbedder::new(dimension), remaining: AtomicUsize::new(failures) }
    }

    fn try_take_failure(&self) -> Result<()> {
        let injected = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(RagError::EmbedderUnavailable("injected transport failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Embedder for UnreliableEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.try_take_failure()?;
        self.inner.embed(text).await
    }

    async fn embed_many(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.try_take_failure()?;
        self.inner.embed_many(texts).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

/// An embedder that sleeps before every call, for timeout tests.
#[derive(Debug)]
pub struct SlowEmbedder {
    inner: HashEmbedder,
    delay: Duration,
}

impl SlowEmbedder {
    /// Create an embedder of `dimension` that sleeps `delay` per call.
    pub fn new(dimension: usize, delay: Duration) -> Self {
        Self { inner: HashEmbedder::new(dimension), delay }
    }
}

#[async_trait]
impl Embedder for SlowEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        tokio::time::sleep(self.delay).await;
        self.inner.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

/// A model that always returns the same canned reply.
#[derive(Debug, Clone)]
pub struct StaticModel {
    reply: String,
}

impl StaticModel {
    /// Create a model returning `reply` for every prompt.
    pub fn new(reply: impl Into<String>) -> Self {
        Self { reply: reply.into() }
    }
}

#[async_trait]
impl LanguageModel for StaticModel {
    async fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> Result<String> {
        Ok(self.reply.clone())
    }
}

/// A model that echoes the prompt back, so tests can inspect what the
/// chain assembled.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoModel;

#[async_trait]
impl LanguageModel for EchoModel {
    async fn generate(&self, prompt: &str, _options: &GenerateOptions) -> Result<String> {
        Ok(prompt.to_string())
    }
}

/// A model that streams a fixed list of fragments, counting how many
/// were actually pulled.
#[derive(Debug)]
pub struct ScriptedModel {
    fragments: Vec<String>,
    yielded: Arc<AtomicUsize>,
}

impl ScriptedModel {
    /// Create a model streaming `fragments` in order.
    pub fn new(fragments: Vec<String>) -> Self {
        Self { fragments, yielded: Arc::new(AtomicUsize::new(0)) }
    }

    /// How many fragments consumers have pulled so far.
    pub fn yielded(&self) -> usize {
        self.yielded.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> Result<String> {
        Ok(self.fragments.concat())
    }

    async fn generate_stream(
        &self,
        _prompt: &str,
        _options: &GenerateOptions,
    ) -> Result<TokenStream> {
        let fragments = self.fragments.clone();
        let yielded = Arc::clone(&self.yielded);
        Ok(Box::pin(async_stream::stream! {
            for fragment in fragments {
                yielded.fetch_add(1, Ordering::SeqCst);
                yield Ok(fragment);
            }
        }))
    }
}

/// A model that fails its first `failures` calls with `RateLimited`,
/// then answers.
#[derive(Debug)]
pub struct FlakyModel {
    reply: String,
    remaining: AtomicUsize,
}

impl FlakyModel {
    /// Create a model failing its first `failures` calls.
    pub fn new(reply: impl Into<String>, failures: usize) -> Self {
        Self { reply: reply.into(), remaining: AtomicUsize::new(failures) }
    }
}

#[async_trait]
impl LanguageModel for FlakyModel {
    async fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> Result<String> {
        let injected = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(RagError::RateLimited("injected 429".into()));
        }
        Ok(self.reply.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_embedder_is_deterministic_and_normalized() {
        let embedder = HashEmbedder::new(32);
        let a = embedder.embed("the sky is blue").await.unwrap();
        let b = embedder.embed("the sky is blue").await.unwrap();
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn shared_words_score_higher_than_disjoint_words() {
        let embedder = HashEmbedder::new(64);
        let query = embedder.embed("what color is the sky").await.unwrap();
        let related = embedder.embed("the sky is blue").await.unwrap();
        let unrelated = embedder.embed("bananas are yellow").await.unwrap();

        let dot = |a: &[f32], b: &[f32]| -> f32 {
            a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
        };
        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }

    #[tokio::test]
    async fn empty_text_still_produces_a_unit_vector() {
        let embedder = HashEmbedder::new(8);
        let v = embedder.embed("").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn unreliable_embedder_recovers_after_injected_failures() {
        let embedder = UnreliableEmbedder::new(8, 2);
        assert!(embedder.embed("x").await.is_err());
        assert!(embedder.embed("x").await.is_err());
        assert!(embedder.embed("x").await.is_ok());
    }
}
