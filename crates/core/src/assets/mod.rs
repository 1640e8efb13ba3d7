use std::sync::Arc;

use rand::Rng;

use crate::{Result, ScorpionError};

/// Label of the generated buffer that always sits at index 0.
pub const WHITE_NOISE: &str = "white noise";

/// Immutable, pre-decoded mono sample buffer. Clones share the samples.
#[derive(Debug, Clone)]
pub struct SoundBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl SoundBuffer {
    pub fn new(samples: impl Into<Arc<[f32]>>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(ScorpionError::config("sound buffer sample rate must be > 0"));
        }
        Ok(Self {
            samples: samples.into(),
            sample_rate,
        })
    }

    /// Uniform white noise in `[-1, 1)`.
    pub fn white_noise<R: Rng + ?Sized>(
        rng: &mut R,
        sample_rate: u32,
        seconds: f64,
    ) -> Result<Self> {
        let len = (seconds.max(0.0) * sample_rate as f64).round() as usize;
        let samples: Vec<f32> = (0..len).map(|_| rng.gen::<f32>() * 2.0 - 1.0).collect();
        Self::new(samples, sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Ordered, labelled buffers addressable by index.
///
/// Index 0 is always the generated white-noise buffer; slots added later
/// follow in caller order. A slot can be declared before its samples are
/// loaded, and reads from it fail with [`ScorpionError::MissingBuffer`].
#[derive(Debug, Clone)]
pub struct BufferStore {
    entries: Vec<(String, Option<SoundBuffer>)>,
}

impl BufferStore {
    pub fn new(noise: SoundBuffer) -> Self {
        Self {
            entries: vec![(WHITE_NOISE.to_string(), Some(noise))],
        }
    }

    /// Store seeded with `seconds` of white noise.
    pub fn with_white_noise<R: Rng + ?Sized>(
        rng: &mut R,
        sample_rate: u32,
        seconds: f64,
    ) -> Result<Self> {
        Ok(Self::new(SoundBuffer::white_noise(rng, sample_rate, seconds)?))
    }

    /// Appends a buffer and returns its index.
    pub fn push(&mut self, name: impl Into<String>, buffer: SoundBuffer) -> usize {
        self.entries.push((name.into(), Some(buffer)));
        self.entries.len() - 1
    }

    /// Appends an empty slot for a sound that is not loaded yet.
    pub fn declare(&mut self, name: impl Into<String>) -> usize {
        self.entries.push((name.into(), None));
        self.entries.len() - 1
    }

    /// Fills the declared slot labelled `name`.
    pub fn load(&mut self, name: &str, buffer: SoundBuffer) -> Result<usize> {
        let index = self
            .index_of(name)
            .ok_or_else(|| ScorpionError::config(format!("no sound slot named `{name}`")))?;
        self.entries[index].1 = Some(buffer);
        Ok(index)
    }

    pub fn get(&self, index: usize) -> Result<&SoundBuffer> {
        self.entries
            .get(index)
            .and_then(|(_, buffer)| buffer.as_ref())
            .ok_or(ScorpionError::MissingBuffer {
                index,
                available: self.loaded(),
            })
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(label, _)| label == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(label, _)| label.as_str())
    }

    /// Number of slots holding samples.
    pub fn loaded(&self) -> usize {
        self.entries.iter().filter(|(_, buffer)| buffer.is_some()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn store() -> BufferStore {
        let mut rng = StdRng::seed_from_u64(7);
        BufferStore::with_white_noise(&mut rng, 1_000, 2.0).unwrap()
    }

    #[test]
    fn white_noise_is_bounded_and_sized() {
        let store = store();
        let noise = store.get(0).unwrap();

        assert_eq!(noise.len(), 2_000);
        assert!((noise.duration_seconds() - 2.0).abs() < 1e-12);
        assert!(noise.samples().iter().all(|s| (-1.0..1.0).contains(s)));
        assert!(noise.samples().iter().any(|s| *s != 0.0));
    }

    #[test]
    fn keeps_caller_order_after_noise() {
        let mut store = store();
        let tuba = SoundBuffer::new(vec![0.0; 10], 1_000).unwrap();
        let organ = SoundBuffer::new(vec![0.0; 20], 1_000).unwrap();

        assert_eq!(store.push("tuba", tuba), 1);
        assert_eq!(store.push("organ", organ), 2);
        assert_eq!(store.index_of(WHITE_NOISE), Some(0));
        assert_eq!(store.index_of("organ"), Some(2));
        assert_eq!(store.index_of("bagpipes"), None);
        assert_eq!(
            store.names().collect::<Vec<_>>(),
            vec![WHITE_NOISE, "tuba", "organ"]
        );
    }

    #[test]
    fn errors_on_missing_index() {
        let err = store().get(4).unwrap_err();
        assert!(matches!(
            err,
            ScorpionError::MissingBuffer {
                index: 4,
                available: 1
            }
        ));
    }

    #[test]
    fn declared_slots_stay_missing_until_loaded() {
        let mut store = store();
        assert_eq!(store.declare("monks"), 1);
        assert_eq!(store.declare("tuba"), 2);
        assert!(matches!(
            store.get(2),
            Err(ScorpionError::MissingBuffer {
                index: 2,
                available: 1
            })
        ));

        let tuba = SoundBuffer::new(vec![0.5; 10], 1_000).unwrap();
        assert_eq!(store.load("tuba", tuba).unwrap(), 2);
        assert_eq!(store.get(2).unwrap().len(), 10);
        assert!(store.get(1).is_err());
        assert_eq!(store.loaded(), 2);

        let err = store
            .load("kazoo", SoundBuffer::new(vec![0.0; 4], 1_000).unwrap())
            .unwrap_err();
        assert!(matches!(err, ScorpionError::Configuration(_)));
    }

    #[test]
    fn rejects_zero_sample_rate() {
        assert!(SoundBuffer::new(vec![0.0; 4], 0).is_err());
    }
}
