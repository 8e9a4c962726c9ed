//! Dataset backing store (§4.7, "Dataset backing store"): a per-channel
//! source CSV plus two memory-mapped companion binaries (`<stem>.bin` raw,
//! `<stem>.normW<window>.bin` rolling-normalized), keyed by a unix-ms column.

use crate::fingerprint::fingerprint_file;
use memmap2::Mmap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tsiemene_types::TsiemeneError;

fn manifest_path(bin_path: &Path) -> PathBuf {
    let mut name = bin_path.as_os_str().to_os_string();
    name.push(".manifest");
    PathBuf::from(name)
}

fn read_manifest(path: &Path) -> Option<String> {
    std::fs::read_to_string(path).ok()
}

fn write_manifest(path: &Path, csv_hash: &str) -> Result<(), TsiemeneError> {
    std::fs::write(path, csv_hash).map_err(TsiemeneError::Io)
}

fn io_err(path: &Path, source: std::io::Error) -> TsiemeneError {
    TsiemeneError::DataUnavailable(format!("{path:?}: {source}"))
}

fn read_csv(path: &Path) -> Result<(Vec<i64>, Vec<f32>, usize), TsiemeneError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| io_err(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    let header_count = reader
        .headers()
        .map_err(|e| io_err(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?
        .len();
    if header_count < 2 {
        return Err(TsiemeneError::DataUnavailable(format!(
            "{path:?}: expected a key column plus at least one feature column"
        )));
    }
    let feature_dim = header_count - 1;

    let mut keys = Vec::new();
    let mut features = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| io_err(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        let key: i64 = record
            .get(0)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| TsiemeneError::DataUnavailable(format!("{path:?}: malformed key column")))?;
        keys.push(key);
        for i in 0..feature_dim {
            let value: f32 = record
                .get(i + 1)
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| TsiemeneError::DataUnavailable(format!("{path:?}: malformed feature column {i}")))?;
            features.push(value);
        }
    }
    Ok((keys, features, feature_dim))
}

fn write_f32_bin(path: &Path, values: &[f32]) -> Result<(), TsiemeneError> {
    let mut file = File::create(path).map_err(TsiemeneError::Io)?;
    let mut buf = Vec::with_capacity(values.len() * 4);
    for v in values {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    file.write_all(&buf).map_err(TsiemeneError::Io)
}

fn mmap_file(path: &Path) -> Result<Mmap, TsiemeneError> {
    let file = File::open(path).map_err(TsiemeneError::Io)?;
    unsafe { Mmap::map(&file).map_err(TsiemeneError::Io) }
}

fn read_row(mmap: &Mmap, row: usize, dim: usize) -> Vec<f32> {
    let start = row * dim * 4;
    let mut out = Vec::with_capacity(dim);
    for i in 0..dim {
        let bytes: [u8; 4] = mmap[start + i * 4..start + i * 4 + 4].try_into().unwrap();
        out.push(f32::from_le_bytes(bytes));
    }
    out
}

/// Rolling-normalizes `raw` (row-major `[n, dim]`) over a window of
/// `norm_window` preceding rows (expanding for the first `norm_window`
/// rows, per §4.7).
fn rolling_normalize(raw: &[f32], n: usize, dim: usize, norm_window: usize) -> Vec<f32> {
    let mut out = vec![0f32; raw.len()];
    for row in 0..n {
        let window_start = row.saturating_sub(norm_window.saturating_sub(1));
        let window_len = (row - window_start + 1) as f32;
        for d in 0..dim {
            let mut sum = 0f32;
            for r in window_start..=row {
                sum += raw[r * dim + d];
            }
            let mean = sum / window_len;
            let mut var = 0f32;
            for r in window_start..=row {
                let diff = raw[r * dim + d] - mean;
                var += diff * diff;
            }
            let std = (var / window_len).sqrt().max(1e-6);
            out[row * dim + d] = (raw[row * dim + d] - mean) / std;
        }
    }
    out
}

/// A single channel's memory-mapped, key-indexed sample stream.
pub struct Channel {
    pub feature_dim: usize,
    pub norm_window: usize,
    pub bootstrap_deltas: usize,
    keys: Vec<i64>,
    raw: Mmap,
    normalized: Mmap,
}

impl Channel {
    /// Loads (building the `.bin`/`.normW<window>.bin` companions if
    /// missing, stale, or `force_rebuild` is set) a channel from `csv_path`.
    pub fn load(
        csv_path: &Path,
        norm_window: usize,
        bootstrap_deltas: usize,
        force_rebuild: bool,
    ) -> Result<Self, TsiemeneError> {
        let stem = csv_path.with_extension("");
        let bin_path = stem.with_extension("bin");
        let norm_path = PathBuf::from(format!(
            "{}.normW{norm_window}.bin",
            stem.to_string_lossy()
        ));
        let manifest = manifest_path(&bin_path);

        let csv_fingerprint = fingerprint_file(csv_path)?;
        let stale = force_rebuild
            || !bin_path.exists()
            || !norm_path.exists()
            || read_manifest(&manifest).as_deref() != Some(csv_fingerprint.sha256_hex.as_str());

        let (keys, feature_dim) = if stale {
            let (keys, raw, feature_dim) = read_csv(csv_path)?;
            write_f32_bin(&bin_path, &raw)?;
            let normalized = rolling_normalize(&raw, keys.len(), feature_dim, norm_window);
            write_f32_bin(&norm_path, &normalized)?;
            write_manifest(&manifest, &csv_fingerprint.sha256_hex)?;
            (keys, feature_dim)
        } else {
            let (keys, _raw, feature_dim) = read_csv(csv_path)?;
            (keys, feature_dim)
        };

        Ok(Channel {
            feature_dim,
            norm_window,
            bootstrap_deltas,
            keys,
            raw: mmap_file(&bin_path)?,
            normalized: mmap_file(&norm_path)?,
        })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn key(&self, row: usize) -> i64 {
        self.keys[row]
    }

    pub fn raw_row(&self, row: usize) -> Vec<f32> {
        read_row(&self.raw, row, self.feature_dim)
    }

    pub fn normalized_row(&self, row: usize) -> Vec<f32> {
        read_row(&self.normalized, row, self.feature_dim)
    }

    pub fn is_bootstrapping(&self, row: usize) -> bool {
        row < self.bootstrap_deltas
    }

    /// Binary-searches the inclusive millisecond range `[from_ms, to_ms]`,
    /// returning `(begin_idx, count)`. Assumes keys are sorted ascending.
    pub fn compute_index_range_by_keys(&self, from_ms: i64, to_ms: i64) -> (usize, usize) {
        let begin = self.keys.partition_point(|&k| k < from_ms);
        let end = self.keys.partition_point(|&k| k <= to_ms);
        (begin, end.saturating_sub(begin))
    }
}

/// A dataset of channels sharing a common row index (one sample spans all
/// channels at the same row). Channels must agree on row count; this is a
/// deliberate simplifying alignment assumption for this crate (recorded in
/// the grounding ledger), not a requirement of the teacher's dataset
/// internals, which this crate treats as out of scope.
pub struct Dataset {
    pub channels: Vec<Channel>,
}

impl Dataset {
    pub fn new(channels: Vec<Channel>) -> Result<Self, TsiemeneError> {
        if channels.is_empty() {
            return Err(TsiemeneError::DataUnavailable(
                "dataset has no channels".to_string(),
            ));
        }
        let len = channels[0].len();
        if channels.iter().any(|c| c.len() != len) {
            return Err(TsiemeneError::DataUnavailable(
                "channels disagree on row count".to_string(),
            ));
        }
        Ok(Dataset { channels })
    }

    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels[0].is_empty()
    }

    pub fn compute_index_range_by_keys(&self, from_ms: i64, to_ms: i64) -> (usize, usize) {
        self.channels[0].compute_index_range_by_keys(from_ms, to_ms)
    }

    /// Packs the half-open row range `[begin, begin+count)` into a
    /// `[B, C, T, D+1]` tensor, gathering a trailing window ending at each
    /// sampled row. See [`Dataset::pack_indices`] for the general form.
    pub fn pack(&self, begin: usize, count: usize, window: usize) -> ndarray::ArrayD<f32> {
        let indices: Vec<usize> = (begin..begin + count).collect();
        self.pack_indices(&indices, window)
    }

    /// Packs an arbitrary (not necessarily contiguous) list of sampled rows
    /// into a `[B, C, T, D+1]` tensor (last slot is the validity mask),
    /// gathering a trailing window of `window` rows ending at each sampled
    /// row, left-padding with zeros and `mask=0` where history is
    /// unavailable. Used for both sequential (contiguous) and random
    /// (shuffled) sampling.
    pub fn pack_indices(&self, rows: &[usize], window: usize) -> ndarray::ArrayD<f32> {
        let channel_count = self.channels.len();
        let feature_dim = self.channels[0].feature_dim;
        let count = rows.len();
        let mut data = vec![0f32; count * channel_count * window * (feature_dim + 1)];

        for (b, &row) in rows.iter().enumerate() {
            for (c, channel) in self.channels.iter().enumerate() {
                for t in 0..window {
                    let offset = row as isize - (window as isize - 1 - t as isize);
                    let base = ((b * channel_count + c) * window + t) * (feature_dim + 1);
                    if offset >= 0 && (offset as usize) < channel.len() {
                        let features = channel.normalized_row(offset as usize);
                        data[base..base + feature_dim].copy_from_slice(&features);
                        data[base + feature_dim] = 1.0;
                    }
                }
            }
        }

        ndarray::ArrayD::from_shape_vec(vec![count, channel_count, window, feature_dim + 1], data)
            .expect("shape matches buffer length by construction")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_csv(dir: &tempfile::TempDir, name: &str, rows: &[(i64, f32)]) -> PathBuf {
        let path = dir.path().join(name);
        let mut text = String::from("key,f0\n");
        for (k, v) in rows {
            text.push_str(&format!("{k},{v}\n"));
        }
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn loads_and_mmaps_companions() {
        let dir = tempfile::tempdir().unwrap();
        let rows: Vec<(i64, f32)> = (0..10).map(|i| (i * 1000, i as f32)).collect();
        let csv_path = write_csv(&dir, "chan.csv", &rows);
        let channel = Channel::load(&csv_path, 4, 2, false).unwrap();
        assert_eq!(channel.len(), 10);
        assert_eq!(channel.raw_row(5), vec![5.0]);
        assert!(dir.path().join("chan.bin").exists());
        assert!(dir.path().join("chan.normW4.bin").exists());
    }

    #[test]
    fn reload_without_force_reuses_companions() {
        let dir = tempfile::tempdir().unwrap();
        let rows: Vec<(i64, f32)> = (0..5).map(|i| (i * 1000, i as f32)).collect();
        let csv_path = write_csv(&dir, "chan.csv", &rows);
        Channel::load(&csv_path, 4, 2, false).unwrap();
        let bin_path = dir.path().join("chan.bin");
        let first_mtime = std::fs::metadata(&bin_path).unwrap().modified().unwrap();
        Channel::load(&csv_path, 4, 2, false).unwrap();
        let second_mtime = std::fs::metadata(&bin_path).unwrap().modified().unwrap();
        assert_eq!(first_mtime, second_mtime);
    }

    #[test]
    fn range_lookup_is_inclusive_both_ends() {
        let dir = tempfile::tempdir().unwrap();
        let rows: Vec<(i64, f32)> = (0..10).map(|i| (i * 1000, i as f32)).collect();
        let csv_path = write_csv(&dir, "chan.csv", &rows);
        let channel = Channel::load(&csv_path, 4, 2, false).unwrap();
        let (begin, count) = channel.compute_index_range_by_keys(2000, 5000);
        assert_eq!((begin, count), (2, 4));
    }

    #[test]
    fn pack_left_pads_missing_history_with_zero_mask() {
        let dir = tempfile::tempdir().unwrap();
        let rows: Vec<(i64, f32)> = (0..10).map(|i| (i * 1000, i as f32)).collect();
        let csv_path = write_csv(&dir, "chan.csv", &rows);
        let channel = Channel::load(&csv_path, 4, 2, false).unwrap();
        let dataset = Dataset::new(vec![channel]).unwrap();
        let packed = dataset.pack(0, 1, 3);
        assert_eq!(packed.shape(), &[1, 1, 3, 2]);
        assert_eq!(packed[[0, 0, 0, 1]], 0.0);
        assert_eq!(packed[[0, 0, 1, 1]], 0.0);
        assert_eq!(packed[[0, 0, 2, 1]], 1.0);
    }
}
