use super::*;
use byteorder::{BigEndian, ReadBytesExt};
use flate2::read::GzDecoder;
use std::io::{Cursor, Read};

const MIRROR: &str = "https://ossci-datasets.s3.amazonaws.com/mnist";
const IMAGES_MAGIC: u32 = 2051;
const LABELS_MAGIC: u32 = 2049;

fn raw_dir(root: &Path) -> PathBuf {
    root.join("MNIST").join("raw")
}

fn files(split: Split) -> [&'static str; 2] {
    match split {
        Split::Train => ["train-images-idx3-ubyte", "train-labels-idx1-ubyte"],
        Split::Test => ["t10k-images-idx3-ubyte", "t10k-labels-idx1-ubyte"],
    }
}

pub(super) fn is_present(root: &Path, split: Split) -> bool {
    let dir = raw_dir(root);
    files(split).iter().all(|f| dir.join(f).is_file())
}

/// Fetches the gzipped IDX files of `split` that are missing and stores them decompressed.
pub(super) fn download(root: &Path, split: Split, fetcher: &dyn Fetcher) -> Result<()> {
    let dir = raw_dir(root);
    for file in files(split).iter() {
        let path = dir.join(file);
        if path.is_file() {
            continue;
        }
        let compressed = fetcher.fetch(&format!("{}/{}.gz", MIRROR, file))?;
        let mut bytes = Vec::new();
        GzDecoder::new(&compressed[..])
            .read_to_end(&mut bytes)
            .map_err(|e| BenchError::data_unavailable(DatasetKind::Mnist, format!("{}.gz: {}", file, e)))?;
        create_dir(&dir, DatasetKind::Mnist)?;
        write_atomically(&path, &bytes, DatasetKind::Mnist)?;
    }
    Ok(())
}

pub(super) fn load(root: &Path, split: Split) -> Result<ImageSet> {
    let dir = raw_dir(root);
    let [images_file, labels_file] = files(split);
    let (side, pixels) = parse_images(&read(&dir.join(images_file), DatasetKind::Mnist)?)?;
    let labels = parse_labels(&read(&dir.join(labels_file), DatasetKind::Mnist)?)?;

    let geometry = DatasetKind::Mnist.geometry();
    if side != geometry.side() {
        return Err(malformed(format!("expected {0}x{0} images, found {1}x{1}", geometry.side(), side)));
    }
    if pixels.len() != labels.len() * geometry.num_elems() {
        return Err(malformed(format!(
            "{} holds {} images but {} has {} labels",
            images_file,
            pixels.len() / geometry.num_elems(),
            labels_file,
            labels.len()
        )));
    }
    ImageSet::new(geometry, pixels, labels)
}

fn malformed<R: ToString>(reason: R) -> BenchError {
    BenchError::data_unavailable(DatasetKind::Mnist, reason)
}

fn header(reader: &mut Cursor<&[u8]>, magic: u32, len: usize) -> Result<Vec<u32>> {
    let mut fields = Vec::with_capacity(len);
    for _ in 0..len {
        fields.push(
            reader
                .read_u32::<BigEndian>()
                .map_err(|_| malformed("truncated IDX header"))?,
        );
    }
    if fields[0] != magic {
        return Err(malformed(format!("bad IDX magic {}, expected {}", fields[0], magic)));
    }
    Ok(fields)
}

fn body(reader: Cursor<&[u8]>, expected_len: usize) -> Result<Vec<u8>> {
    let offset = reader.position() as usize;
    let data = &reader.into_inner()[offset..];
    if data.len() != expected_len {
        return Err(malformed(format!(
            "expected {} bytes of IDX data, found {}",
            expected_len,
            data.len()
        )));
    }
    Ok(data.to_vec())
}

/// Parses an IDX3 image file into the image side and the concatenated pixels.
pub(super) fn parse_images(bytes: &[u8]) -> Result<(usize, Vec<u8>)> {
    let mut reader = Cursor::new(bytes);
    let fields = header(&mut reader, IMAGES_MAGIC, 4)?;
    let (count, rows, cols) = (fields[1] as usize, fields[2] as usize, fields[3] as usize);
    if rows != cols {
        return Err(malformed(format!("non-square {}x{} images", rows, cols)));
    }
    let len = count
        .checked_mul(rows)
        .and_then(|n| n.checked_mul(cols))
        .ok_or_else(|| malformed("IDX dimensions overflow"))?;
    Ok((rows, body(reader, len)?))
}

/// Parses an IDX1 label file.
pub(super) fn parse_labels(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut reader = Cursor::new(bytes);
    let fields = header(&mut reader, LABELS_MAGIC, 2)?;
    let labels = body(reader, fields[1] as usize)?;
    if let Some(label) = labels.iter().find(|&&l| l > 9) {
        return Err(malformed(format!("label {} out of range", label)));
    }
    Ok(labels)
}
