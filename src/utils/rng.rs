//! Per-thread random number context.
//!
//! Layers never touch a global generator: `random_fill` is handed a
//! [`ThreadContext`] owned by the calling thread, so initialization is
//! reproducible for a fixed seed and parallel workers never share state.

const DEFAULT_STATE: u64 = 0x9e3779b97f4a7c15;

/// Xorshift generator. Not cryptographic.
#[derive(Debug, Clone)]
pub struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    /// Create a new RNG with explicit seed (if zero, use a fixed value).
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { DEFAULT_STATE } else { seed };
        Self { state }
    }

    /// Basic xorshift to generate u32.
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        (x >> 32) as u32
    }

    /// Convert to [0, 1].
    pub fn next_f32(&mut self) -> f32 {
        self.next_u32() as f32 / u32::MAX as f32
    }

    /// Uniform sample in [low, high].
    pub fn gen_range_f32(&mut self, low: f32, high: f32) -> f32 {
        low + (high - low) * self.next_f32()
    }
}

/// splitmix64 finalizer, used to derive well-separated per-thread seeds.
fn mix_seed(mut z: u64) -> u64 {
    z = z.wrapping_add(DEFAULT_STATE);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

/// Random source scoped to one thread of work.
///
/// # Example
///
/// ```
/// use rust_neural_layers::utils::rng::ThreadContext;
///
/// let mut a = ThreadContext::new(7);
/// let mut b = ThreadContext::new(7);
/// assert_eq!(a.uniform(0.5), b.uniform(0.5));
/// ```
#[derive(Debug, Clone)]
pub struct ThreadContext {
    rng: SimpleRng,
    thread_index: usize,
}

impl ThreadContext {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SimpleRng::new(seed),
            thread_index: 0,
        }
    }

    /// Context for worker `thread_index` of a pool seeded with `seed`.
    ///
    /// Each worker gets its own deterministic stream, so a parallel
    /// initialization gives the same result on every run regardless of
    /// scheduling.
    pub fn for_thread(seed: u64, thread_index: usize) -> Self {
        let mixed = mix_seed(seed ^ mix_seed(thread_index as u64 + 1));
        Self {
            rng: SimpleRng::new(mixed),
            thread_index,
        }
    }

    pub fn thread_index(&self) -> usize {
        self.thread_index
    }

    /// Uniform sample in [-limit, limit].
    pub fn uniform(&mut self, limit: f32) -> f32 {
        self.rng.gen_range_f32(-limit, limit)
    }
}
