//! Dataset acquisition and batching. Datasets are fetched into a root directory once, then read
//! from disk by every later run.

mod cifar;
mod fetch;
mod loader;
mod mnist;

pub use self::fetch::*;
pub use self::loader::*;
use crate::error::{BenchError, Result};
use crate::geometry::{ImageGeometry, Square};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The datasets the benchmark trains on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DatasetKind {
    Mnist,
    Cifar10,
}

impl DatasetKind {
    pub fn name(self) -> &'static str {
        match self {
            DatasetKind::Mnist => "MNIST",
            DatasetKind::Cifar10 => "CIFAR10",
        }
    }

    pub fn geometry(self) -> ImageGeometry {
        match self {
            DatasetKind::Mnist => ImageGeometry::new(28, 1),
            DatasetKind::Cifar10 => ImageGeometry::new(32, 3),
        }
    }

    fn is_present(self, root: &Path, split: Split) -> bool {
        match self {
            DatasetKind::Mnist => mnist::is_present(root, split),
            DatasetKind::Cifar10 => cifar::is_present(root, split),
        }
    }

    fn download(self, root: &Path, split: Split, fetcher: &dyn Fetcher) -> Result<()> {
        match self {
            DatasetKind::Mnist => mnist::download(root, split, fetcher),
            DatasetKind::Cifar10 => cifar::download(root, fetcher),
        }
    }

    fn load(self, root: &Path, split: Split) -> Result<ImageSet> {
        match self {
            DatasetKind::Mnist => mnist::load(root, split),
            DatasetKind::Cifar10 => cifar::load(root, split),
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Test,
}

/// Decoded `u8` images in CHW order, one after the other, with their class labels.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageSet {
    geometry: ImageGeometry,
    pixels: Vec<u8>,
    labels: Vec<u8>,
}

impl ImageSet {
    /// Fails with a shape error unless `pixels` holds exactly one image per label.
    pub fn new(geometry: ImageGeometry, pixels: Vec<u8>, labels: Vec<u8>) -> Result<ImageSet> {
        if pixels.len() != labels.len() * geometry.num_elems() {
            return Err(ndarray::ShapeError::from_kind(ndarray::ErrorKind::IncompatibleShape).into());
        }
        Ok(ImageSet {
            geometry,
            pixels,
            labels,
        })
    }

    pub fn geometry(&self) -> &ImageGeometry {
        &self.geometry
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// The raw pixels and the label of sample `idx`.
    pub fn sample(&self, idx: usize) -> (&[u8], usize) {
        let n = self.geometry.num_elems();
        (
            &self.pixels[idx * n..(idx + 1) * n],
            usize::from(self.labels[idx]),
        )
    }
}

/// Where datasets live on disk and how missing ones are fetched.
#[derive(Clone)]
pub struct DataSource {
    pub root: PathBuf,
    pub fetcher: Arc<dyn Fetcher>,
}

impl DataSource {
    pub fn new<P: Into<PathBuf>>(root: P, fetcher: Arc<dyn Fetcher>) -> DataSource {
        DataSource {
            root: root.into(),
            fetcher,
        }
    }

    pub fn prepare(&self, kind: DatasetKind, split: Split) -> Result<()> {
        prepare(&self.root, kind, split, self.fetcher.as_ref())
    }

    pub fn acquire(&self, kind: DatasetKind, split: Split, download: bool) -> Result<ImageSet> {
        acquire(&self.root, kind, split, download, self.fetcher.as_ref())
    }
}

/// Downloads `split` of `kind` into `root` unless it is already there.
pub fn prepare(root: &Path, kind: DatasetKind, split: Split, fetcher: &dyn Fetcher) -> Result<()> {
    if kind.is_present(root, split) {
        debug!("{} {:?} split found under {}", kind, split, root.display());
        return Ok(());
    }
    info!("{} {:?} split not found, downloading into {}", kind, split, root.display());
    kind.download(root, split, fetcher)
}

/// Reads `split` of `kind` from `root`, first downloading it when it is absent and `download` is
/// set. Data already on disk is never fetched again.
pub fn acquire(
    root: &Path,
    kind: DatasetKind,
    split: Split,
    download: bool,
    fetcher: &dyn Fetcher,
) -> Result<ImageSet> {
    if download {
        prepare(root, kind, split, fetcher)?;
    } else if !kind.is_present(root, split) {
        return Err(BenchError::data_unavailable(
            kind,
            format!("not found under {} and downloading is off", root.display()),
        ));
    }
    let set = kind.load(root, split)?;
    debug!("Loaded {} {:?} split with {} samples", kind, split, set.len());
    Ok(set)
}

/// Writes `bytes` next to `path` and moves it into place, so that an interrupted write is never
/// mistaken for a complete file.
fn write_atomically(path: &Path, bytes: &[u8], dataset: DatasetKind) -> Result<()> {
    let partial = path.with_extension("part");
    fs::write(&partial, bytes)
        .and_then(|_| fs::rename(&partial, path))
        .map_err(|e| BenchError::data_unavailable(dataset, format!("{}: {}", path.display(), e)))
}

fn read(path: &Path, dataset: DatasetKind) -> Result<Vec<u8>> {
    fs::read(path)
        .map_err(|e| BenchError::data_unavailable(dataset, format!("{}: {}", path.display(), e)))
}

fn create_dir(path: &Path, dataset: DatasetKind) -> Result<()> {
    fs::create_dir_all(path)
        .map_err(|e| BenchError::data_unavailable(dataset, format!("{}: {}", path.display(), e)))
}
