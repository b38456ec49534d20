//! Round-robin selection over the configured provider API keys.

use rand::Rng;
use tempest_core::WeatherError;

/// A provider API key. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Ordered credentials plus a cursor that always points at one of them.
#[derive(Debug, Clone)]
pub struct CredentialPool {
    credentials: Vec<Credential>,
    cursor: usize,
}

impl CredentialPool {
    /// Pool with a cursor drawn uniformly from the thread RNG, so deployed
    /// instances spread their first requests across keys.
    pub fn new<I>(slots: I) -> Result<Self, WeatherError>
    where
        I: IntoIterator<Item = Option<String>>,
    {
        Self::with_rng(slots, &mut rand::thread_rng())
    }

    pub fn with_rng<I, R>(slots: I, rng: &mut R) -> Result<Self, WeatherError>
    where
        I: IntoIterator<Item = Option<String>>,
        R: Rng + ?Sized,
    {
        let credentials = Self::collect(slots)?;
        let cursor = rng.gen_range(0..credentials.len());
        Ok(Self {
            credentials,
            cursor,
        })
    }

    /// Pool starting at `start` (modulo the number of usable keys).
    pub fn with_start<I>(slots: I, start: usize) -> Result<Self, WeatherError>
    where
        I: IntoIterator<Item = Option<String>>,
    {
        let credentials = Self::collect(slots)?;
        let cursor = start % credentials.len();
        Ok(Self {
            credentials,
            cursor,
        })
    }

    fn collect<I>(slots: I) -> Result<Vec<Credential>, WeatherError>
    where
        I: IntoIterator<Item = Option<String>>,
    {
        let credentials: Vec<Credential> = slots
            .into_iter()
            .flatten()
            .filter(|k| !k.is_empty())
            .map(Credential)
            .collect();

        if credentials.is_empty() {
            return Err(WeatherError::NoCredentials);
        }
        tracing::debug!(count = credentials.len(), "Loaded weather API keys");
        Ok(credentials)
    }

    /// Credential at the cursor; the cursor then moves to the next one.
    pub fn next(&mut self) -> Credential {
        let index = self.cursor;
        self.cursor = (self.cursor + 1) % self.credentials.len();
        tracing::debug!(index, "Using weather API key");
        self.credentials[index].clone()
    }

    /// Index the next call to `next()` will use
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn slots(keys: &[&str]) -> Vec<Option<String>> {
        keys.iter()
            .map(|k| (!k.is_empty()).then(|| k.to_string()))
            .collect()
    }

    #[test]
    fn empty_pool_is_fatal() {
        let err = CredentialPool::new(slots(&["", ""])).unwrap_err();
        assert!(matches!(err, WeatherError::NoCredentials));
        assert!(CredentialPool::with_start(Vec::new(), 0).is_err());
    }

    #[test]
    fn rotates_circularly_from_start() {
        let mut pool = CredentialPool::with_start(slots(&["A", "B", "C"]), 1).unwrap();
        let seen: Vec<String> = (0..5).map(|_| pool.next().expose().to_string()).collect();
        assert_eq!(seen, vec!["B", "C", "A", "B", "C"]);
    }

    #[test]
    fn skips_empty_slots() {
        let mut pool = CredentialPool::with_start(slots(&["A", "", "B", ""]), 0).unwrap();
        assert_eq!(pool.len(), 2);
        let seen: Vec<String> = (0..4).map(|_| pool.next().expose().to_string()).collect();
        assert_eq!(seen, vec!["A", "B", "A", "B"]);
    }

    #[test]
    fn start_is_reduced_modulo_len() {
        let pool = CredentialPool::with_start(slots(&["A", "B"]), 5).unwrap();
        assert_eq!(pool.cursor(), 1);
    }

    #[test]
    fn visits_are_balanced() {
        let mut pool = CredentialPool::with_start(slots(&["A", "B", "C"]), 2).unwrap();
        let k = 10;
        let mut counts = [0usize; 3];
        for _ in 0..k {
            match pool.next().expose() {
                "A" => counts[0] += 1,
                "B" => counts[1] += 1,
                "C" => counts[2] += 1,
                other => panic!("unexpected key {other}"),
            }
        }
        for count in counts {
            assert!(count == k / 3 || count == k / 3 + 1, "counts: {counts:?}");
        }
    }

    #[test]
    fn seeded_start_is_deterministic_and_in_range() {
        let a = CredentialPool::with_rng(slots(&["A", "B"]), &mut StdRng::seed_from_u64(7)).unwrap();
        let b = CredentialPool::with_rng(slots(&["A", "B"]), &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a.cursor(), b.cursor());
        assert!(a.cursor() < 2);
    }

    #[test]
    fn debug_redacts_secret() {
        let pool = CredentialPool::with_start(slots(&["SECRET"]), 0).unwrap();
        let rendered = format!("{pool:?}");
        assert!(!rendered.contains("SECRET"));
    }
}
