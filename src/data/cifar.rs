use super::*;
use flate2::read::GzDecoder;
use tar::Archive;

const ARCHIVE_URL: &str = "https://www.cs.toronto.edu/~kriz/cifar-10-binary.tar.gz";
const BATCHES_DIR: &str = "cifar-10-batches-bin";
const TRAIN_BATCHES: [&str; 5] = [
    "data_batch_1.bin",
    "data_batch_2.bin",
    "data_batch_3.bin",
    "data_batch_4.bin",
    "data_batch_5.bin",
];
const TEST_BATCHES: [&str; 1] = ["test_batch.bin"];
/// One label byte followed by a 32x32x3 image
pub(super) const RECORD_LEN: usize = 1 + 32 * 32 * 3;

fn batches(split: Split) -> &'static [&'static str] {
    match split {
        Split::Train => &TRAIN_BATCHES,
        Split::Test => &TEST_BATCHES,
    }
}

pub(super) fn is_present(root: &Path, split: Split) -> bool {
    let dir = root.join(BATCHES_DIR);
    batches(split).iter().all(|f| dir.join(f).is_file())
}

/// Fetches the single archive holding both splits and unpacks it into `root`.
pub(super) fn download(root: &Path, fetcher: &dyn Fetcher) -> Result<()> {
    let compressed = fetcher.fetch(ARCHIVE_URL)?;
    create_dir(root, DatasetKind::Cifar10)?;
    Archive::new(GzDecoder::new(&compressed[..]))
        .unpack(root)
        .map_err(|e| BenchError::data_unavailable(DatasetKind::Cifar10, format!("unpacking archive: {}", e)))
}

pub(super) fn load(root: &Path, split: Split) -> Result<ImageSet> {
    let dir = root.join(BATCHES_DIR);
    let mut pixels = Vec::new();
    let mut labels = Vec::new();
    for batch in batches(split) {
        let bytes = read(&dir.join(batch), DatasetKind::Cifar10)?;
        parse_records(&bytes, &mut pixels, &mut labels).map_err(|reason| {
            BenchError::data_unavailable(DatasetKind::Cifar10, format!("{}: {}", batch, reason))
        })?;
    }
    ImageSet::new(DatasetKind::Cifar10.geometry(), pixels, labels)
}

/// Appends the CHW pixels and labels of every record in a batch file.
pub(super) fn parse_records(
    bytes: &[u8],
    pixels: &mut Vec<u8>,
    labels: &mut Vec<u8>,
) -> std::result::Result<(), String> {
    if bytes.len() % RECORD_LEN != 0 {
        return Err(format!(
            "{} bytes is not a whole number of {}-byte records",
            bytes.len(),
            RECORD_LEN
        ));
    }
    for record in bytes.chunks(RECORD_LEN) {
        if record[0] > 9 {
            return Err(format!("label {} out of range", record[0]));
        }
        labels.push(record[0]);
        pixels.extend_from_slice(&record[1..]);
    }
    Ok(())
}
