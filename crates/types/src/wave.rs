/// `MODE` a wave profile runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveMode {
    Train,
    Run,
}

/// `SAMPLER` a wave profile requests for its dataloader nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampler {
    Sequential,
    Random,
}

/// A `WIKIMYEI <path> { ... }` entry inside a wave profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveWikimyei {
    pub path: String,
    pub train: bool,
    pub profile_id: String,
}

/// A `SOURCE <path> { ... }` entry inside a wave profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveSource {
    pub path: String,
    pub symbol: String,
    pub from: String,
    pub to: String,
}

/// One `WAVE <name> { ... }` block, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveProfile {
    pub name: String,
    pub mode: WaveMode,
    pub sampler: Sampler,
    pub epochs: u64,
    pub batch_size: u64,
    pub max_batches_per_epoch: Option<u64>,
    pub wikimyeis: Vec<WaveWikimyei>,
    pub sources: Vec<WaveSource>,
}

impl WaveProfile {
    /// Invariants I5/I6: a `run` wave forbids `TRAIN=true`; a `train` wave
    /// requires at least one.
    pub fn validate(&self) -> Result<(), String> {
        let any_train = self.wikimyeis.iter().any(|w| w.train);
        match self.mode {
            WaveMode::Run if any_train => {
                Err("run forbids WIKIMYEI TRAIN=true".to_string())
            }
            WaveMode::Train if !any_train => {
                Err("train requires at least one WIKIMYEI TRAIN=true".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// A decoded `WIKIMYEI` component spec referenced from a contract, as
/// distinct from the per-wave `WaveWikimyei` binding above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikimyeiSpec {
    pub path: String,
    pub profile_id: String,
}

/// `(id, i, episode, batch, span…)` describing the position within a wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveCursor {
    pub id: u64,
    pub i: u64,
    pub episode: u64,
    pub batch: u64,
    pub span_begin_ms: Option<i64>,
    pub span_end_ms: Option<i64>,
    pub max_batches_per_epoch: Option<u64>,
}

impl WaveCursor {
    pub fn new(id: u64, max_batches_per_epoch: Option<u64>) -> Self {
        WaveCursor {
            id,
            i: 0,
            episode: 0,
            batch: 0,
            span_begin_ms: None,
            span_end_ms: None,
            max_batches_per_epoch,
        }
    }

    pub fn has_time_span(&self) -> bool {
        self.span_begin_ms.is_some() && self.span_end_ms.is_some()
    }

    /// Advances on every emission the source produces.
    pub fn advance_emission(&mut self) {
        self.i += 1;
    }

    /// Advances per emitted payload within an episode.
    pub fn advance_batch(&mut self) {
        self.batch += 1;
    }

    /// Advances when the source reports episode completion.
    pub fn advance_episode(&mut self) {
        self.episode += 1;
        self.batch = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wikimyei(train: bool) -> WaveWikimyei {
        WaveWikimyei {
            path: "w".into(),
            train,
            profile_id: "p".into(),
        }
    }

    #[test]
    fn run_forbids_training() {
        let profile = WaveProfile {
            name: "p".into(),
            mode: WaveMode::Run,
            sampler: Sampler::Sequential,
            epochs: 1,
            batch_size: 1,
            max_batches_per_epoch: None,
            wikimyeis: vec![wikimyei(true)],
            sources: vec![],
        };
        assert!(profile.validate().is_err());
    }

    #[test]
    fn train_requires_a_trainable_wikimyei() {
        let profile = WaveProfile {
            name: "p".into(),
            mode: WaveMode::Train,
            sampler: Sampler::Sequential,
            epochs: 1,
            batch_size: 1,
            max_batches_per_epoch: None,
            wikimyeis: vec![wikimyei(false)],
            sources: vec![],
        };
        assert!(profile.validate().is_err());
    }

    #[test]
    fn cursor_advances_row_major() {
        let mut cursor = WaveCursor::new(0, Some(3));
        let mut episodes = vec![];
        let mut batches = vec![];
        for _ in 0..2 {
            for _ in 0..3 {
                episodes.push(cursor.episode);
                batches.push(cursor.batch);
                cursor.advance_emission();
                cursor.advance_batch();
            }
            cursor.advance_episode();
        }
        assert_eq!(episodes, vec![0, 0, 0, 1, 1, 1]);
        assert_eq!(batches, vec![0, 1, 2, 0, 1, 2]);
    }
}
