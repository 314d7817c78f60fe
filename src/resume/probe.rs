//! Inspection of existing per-seed output.
//!
//! A seed's output is the trajectory `traj/<basename>.out.<seed>` and the
//! state vector `<trajectory>.sv`. Either may have been compressed to
//! `<file>.bz2` after a run finished. The final time of a trajectory is the
//! first column of its last line that is not a `#` comment.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::layout::EnsembleLayout;

/// Bytes read from the end of a trajectory to find its last data line.
const TAIL_BYTES: u64 = 64 * 1024;

/// Extension of compressed artifacts.
pub const COMPRESSED_EXT: &str = "bz2";

/// What exists on disk for one seed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SeedArtifacts {
    /// Uncompressed trajectory present
    pub trajectory: bool,
    /// Uncompressed state vector present
    pub statevector: bool,
    /// A `.bz2` trajectory or state vector present
    pub compressed: bool,
    /// Final time of the uncompressed trajectory, or why it is unknown.
    ///
    /// `None` when there is no uncompressed trajectory.
    pub final_time: Option<Result<f64, String>>,
}

impl SeedArtifacts {
    /// Nothing at all, compressed or not.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        !self.trajectory && !self.statevector && !self.compressed
    }

    /// Both uncompressed files present.
    #[must_use]
    pub const fn has_pair(&self) -> bool {
        self.trajectory && self.statevector
    }
}

/// Source of [`SeedArtifacts`]; the filesystem in production.
pub trait TrajectoryProbe {
    /// Inspect the output of `seed` in the ensemble at `layout`.
    fn probe(&self, layout: &EnsembleLayout, basename: &str, seed: u64) -> SeedArtifacts;
}

impl<T: TrajectoryProbe + ?Sized> TrajectoryProbe for &T {
    fn probe(&self, layout: &EnsembleLayout, basename: &str, seed: u64) -> SeedArtifacts {
        (**self).probe(layout, basename, seed)
    }
}

/// Probe reading the real output tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl TrajectoryProbe for FsProbe {
    fn probe(&self, layout: &EnsembleLayout, basename: &str, seed: u64) -> SeedArtifacts {
        let trajectory = layout.trajectory(basename, seed);
        let statevector = layout.statevector(basename, seed);

        let has_trajectory = trajectory.is_file();
        let compressed = [&trajectory, &statevector].iter().any(|path| {
            let mut name = path.as_os_str().to_owned();
            name.push(format!(".{COMPRESSED_EXT}"));
            Path::new(&name).is_file()
        });

        SeedArtifacts {
            trajectory: has_trajectory,
            statevector: statevector.is_file(),
            compressed,
            final_time: has_trajectory.then(|| read_final_time(&trajectory)),
        }
    }
}

/// Final time recorded in a trajectory file.
///
/// # Errors
///
/// Returns a description when the file cannot be read, contains no data
/// line, or the first column is not a number.
pub fn read_final_time(path: &Path) -> Result<f64, String> {
    let line = last_data_line(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?
        .ok_or_else(|| format!("{} contains no data lines", path.display()))?;

    let first = line.split_whitespace().next().unwrap_or_default();
    first
        .parse::<f64>()
        .map_err(|_| format!("last line of {} does not start with a time: '{line}'", path.display()))
}

fn last_data_line(path: &Path) -> std::io::Result<Option<String>> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let offset = len.saturating_sub(TAIL_BYTES);
    file.seek(SeekFrom::Start(offset))?;

    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    let text = String::from_utf8_lossy(&buf);

    // A tail read may start in the middle of a line.
    let skip = usize::from(offset > 0);
    Ok(text
        .lines()
        .skip(skip)
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .last()
        .map(ToString::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_final_time_skips_comments() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("run.out.1");
        std::fs::write(&path, "# header\n0 1.0 2.0\n0.5 1.1 2.1\n1.0 1.2 2.2\n# done\n\n").unwrap();
        assert_eq!(read_final_time(&path).unwrap(), 1.0);
    }

    #[test]
    fn test_final_time_errors() {
        let temp = TempDir::new().unwrap();
        let empty = temp.path().join("empty");
        std::fs::write(&empty, "# only a header\n").unwrap();
        assert!(read_final_time(&empty).unwrap_err().contains("no data lines"));

        let garbage = temp.path().join("garbage");
        std::fs::write(&garbage, "abc def\n").unwrap();
        assert!(read_final_time(&garbage).is_err());
    }

    #[test]
    fn test_final_time_of_long_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("long");
        let mut content = String::new();
        for i in 0..20_000 {
            content.push_str(&format!("{}.0 0.123456789 0.987654321\n", i));
        }
        std::fs::write(&path, content).unwrap();
        assert_eq!(read_final_time(&path).unwrap(), 19_999.0);
    }

    #[test]
    fn test_fs_probe_detects_compressed_only() {
        let temp = TempDir::new().unwrap();
        let layout = EnsembleLayout::new(temp.path());
        std::fs::create_dir_all(layout.traj_dir()).unwrap();
        std::fs::write(layout.traj_dir().join("run.out.3.bz2"), b"BZh").unwrap();

        let artifacts = FsProbe.probe(&layout, "run", 3);
        assert!(artifacts.compressed);
        assert!(!artifacts.trajectory);
        assert!(artifacts.final_time.is_none());
        assert!(!artifacts.is_absent());
    }

    #[test]
    fn test_fs_probe_reads_pair() {
        let temp = TempDir::new().unwrap();
        let layout = EnsembleLayout::new(temp.path());
        std::fs::create_dir_all(layout.traj_dir()).unwrap();
        std::fs::write(layout.trajectory("run", 1), "0 0\n2.5 0\n").unwrap();
        std::fs::write(layout.statevector("run", 1), "sv").unwrap();

        let artifacts = FsProbe.probe(&layout, "run", 1);
        assert!(artifacts.has_pair());
        assert_eq!(artifacts.final_time, Some(Ok(2.5)));
    }
}
