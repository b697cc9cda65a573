use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A downloadable public dataset archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetInfo {
    pub name: &'static str,
    pub url: &'static str,
    /// Lower-case hex SHA-256 of the archive.
    pub sha256: &'static str,
    pub filename: &'static str,
}

pub static DATASETS: &[DatasetInfo] = &[
    DatasetInfo {
        name: "tennis_shot",
        url: "https://prod-dcd-datasets-public-files-eu-west-1.s3.eu-west-1.amazonaws.com/75m8vz7jr2/4/files/Tennis_Shot_Dataset.zip?download=1",
        sha256: "4a1ff9fe9b9d8e2b8dbb7626d3e4c59cf1b7aa90d108d234ca970d52f7e1a49b",
        filename: "tennis_shot_dataset.zip",
    },
    DatasetInfo {
        name: "tracknet",
        url: "https://www.csie.ntu.edu.tw/~cyy/TrackNet/TrackNet-2017.zip",
        sha256: "03b8da0f6659b6cdaefb9738db1f8fd12725832c3805c829c793b4d7ae9e1fd5",
        filename: "tracknet_dataset.zip",
    },
];

pub fn find_dataset(name: &str) -> Result<&'static DatasetInfo> {
    DATASETS
        .iter()
        .find(|d| d.name == name)
        .ok_or_else(|| Error::UnknownDataset(name.to_string()))
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }

        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

fn discard(tmp: &Path) {
    if let Err(err) = std::fs::remove_file(tmp) {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %tmp.display(), error = %err, "could not remove temp file");
        }
    }
}

/// Moves a downloaded `tmp` file to `dest` if its digest matches; otherwise
/// removes it and fails with [`Error::Integrity`].
pub fn verify_and_commit(tmp: &Path, dest: &Path, name: &str, expected: &str) -> Result<()> {
    let actual = sha256_file(tmp)?;

    if actual != expected {
        discard(tmp);

        return Err(Error::Integrity {
            name: name.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }

    std::fs::rename(tmp, dest)?;

    Ok(())
}

fn is_present(dest: &Path, expected: &str) -> Result<bool> {
    Ok(dest.is_file() && sha256_file(dest)? == expected)
}

pub struct Fetcher {
    client: reqwest::blocking::Client,
}

impl Fetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("shotzone/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(600))
            .build()?;

        Ok(Self { client })
    }

    /// Downloads one dataset to `dest`, unless a verified copy is already there.
    pub fn fetch(&self, info: &DatasetInfo, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if is_present(dest, info.sha256)? {
            tracing::info!("{}: already downloaded", info.name);
            return Ok(());
        }

        tracing::info!(url = info.url, "downloading {}", info.name);

        let tmp = dest.with_extension("tmp");
        let written = match self.download(info.url, &tmp) {
            Ok(n) => n,
            Err(err) => {
                discard(&tmp);
                return Err(err);
            }
        };

        tracing::debug!(bytes = written, "{}: download complete", info.name);

        verify_and_commit(&tmp, dest, info.name, info.sha256)
    }

    fn download(&self, url: &str, tmp: &Path) -> Result<u64> {
        let mut resp = self.client.get(url).send()?.error_for_status()?;
        let mut file = std::io::BufWriter::new(std::fs::File::create(tmp)?);
        let n = resp.copy_to(&mut file)?;
        file.flush()?;

        Ok(n)
    }

    /// Fetches every registered dataset into `out_dir`, returning their paths.
    pub fn fetch_all(&self, out_dir: &Path) -> Result<Vec<PathBuf>> {
        DATASETS
            .iter()
            .map(|info| {
                let dest = out_dir.join(info.filename);
                self.fetch(info, &dest).map(|_| dest)
            })
            .collect()
    }
}
