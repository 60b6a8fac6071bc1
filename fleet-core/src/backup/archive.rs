//! Archive naming, inspection and tar/gzip plumbing.
//!
//! File names carry the subject and a local wall-clock timestamp:
//! - `traefik_acme_{YYYYMMDD_HHMMSS}.tar.gz` for the certificate store
//! - `{tenant}_db_{YYYYMMDD_HHMMSS}.sql.gz` for tenant data
//!
//! Anything else in the archive directory is not an archive.

use crate::error::{FleetError, Result};
use crate::types::TenantId;
use chrono::NaiveDateTime;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tar::{Archive as TarArchive, Builder};

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

static CERT_STORE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^traefik_acme_(\d{8}_\d{6})\.tar\.gz$").expect("valid regex")
});

static TENANT_DATA_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+)_db_(\d{8}_\d{6})\.sql\.gz$").expect("valid regex")
});

/// What an archive holds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArchiveSubject {
    EdgeCertStore,
    TenantData(TenantId),
}

impl ArchiveSubject {
    /// Metric and log label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EdgeCertStore => "cert_store",
            Self::TenantData(_) => "tenant_data",
        }
    }

    /// File name for an archive of this subject taken at `at`.
    pub fn file_name(&self, at: NaiveDateTime) -> String {
        let stamp = at.format(TIMESTAMP_FORMAT);
        match self {
            Self::EdgeCertStore => format!("traefik_acme_{}.tar.gz", stamp),
            Self::TenantData(id) => format!("{}_db_{}.sql.gz", id, stamp),
        }
    }
}

impl std::fmt::Display for ArchiveSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EdgeCertStore => f.write_str("edge certificate store"),
            Self::TenantData(id) => write!(f, "tenant {}", id),
        }
    }
}

/// Parse an archive file name back into subject and creation time.
pub fn parse_file_name(name: &str) -> Option<(ArchiveSubject, NaiveDateTime)> {
    if let Some(caps) = CERT_STORE_NAME.captures(name) {
        let at = NaiveDateTime::parse_from_str(&caps[1], TIMESTAMP_FORMAT).ok()?;
        return Some((ArchiveSubject::EdgeCertStore, at));
    }
    let caps = TENANT_DATA_NAME.captures(name)?;
    let id = TenantId::parse(&caps[1]).ok()?;
    let at = NaiveDateTime::parse_from_str(&caps[2], TIMESTAMP_FORMAT).ok()?;
    Some((ArchiveSubject::TenantData(id), at))
}

/// Subject and timestamp of the file at `path`, or `UnknownArchiveType`.
pub fn classify(path: &Path) -> Result<(ArchiveSubject, NaiveDateTime)> {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(parse_file_name)
        .ok_or_else(|| FleetError::UnknownArchiveType { file: path.display().to_string() })
}

/// One archive file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub subject: ArchiveSubject,
    /// Local wall-clock time encoded in the file name.
    pub created_at: NaiveDateTime,
    pub path: PathBuf,
    pub size: u64,
    /// Whether the file exists and can be opened for reading.
    pub readable: bool,
}

impl Archive {
    /// Inspect `path`. Returns `None` when its name is not an archive name.
    pub fn inspect(path: &Path) -> Option<Self> {
        let (subject, created_at) = classify(path).ok()?;
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let readable = File::open(path).is_ok();
        Some(Self { subject, created_at, path: path.to_path_buf(), size, readable })
    }

    pub fn file_name(&self) -> String {
        self.path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
    }
}

/// Write `src` as a gzipped tar into `sink`, entries relative to `src`.
pub fn pack_dir<W: io::Write>(src: &Path, sink: W) -> io::Result<W> {
    let mut builder = Builder::new(GzEncoder::new(sink, Compression::default()));
    builder.follow_symlinks(false);
    builder.append_dir_all(".", src)?;
    builder.into_inner()?.finish()
}

/// Extract a gzipped tar archive into `dest`.
pub fn unpack_into(archive: &Path, dest: &Path) -> io::Result<()> {
    let mut tar = TarArchive::new(GzDecoder::new(File::open(archive)?));
    tar.set_preserve_permissions(false);
    tar.set_unpack_xattrs(false);
    tar.unpack(dest)
}

/// Decode the whole archive, returning the number of uncompressed bytes.
pub fn verify_stream(archive: &Path, subject: &ArchiveSubject) -> io::Result<u64> {
    let decoder = GzDecoder::new(File::open(archive)?);
    match subject {
        ArchiveSubject::EdgeCertStore => {
            let mut tar = TarArchive::new(decoder);
            let mut total = 0;
            for entry in tar.entries()? {
                let mut entry = entry?;
                total += io::copy(&mut entry, &mut io::sink())?;
            }
            Ok(total)
        }
        ArchiveSubject::TenantData(_) => {
            let mut decoder = decoder;
            io::copy(&mut decoder, &mut io::sink())
        }
    }
}

/// Set `mode` on `path`.
#[cfg(unix)]
pub fn restrict(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
pub fn restrict(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Owner-only permissions over an extracted tree: 0700 for directories, 0600 for files.
pub fn restrict_tree(root: &Path) -> io::Result<()> {
    restrict(root, 0o700)?;
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            restrict_tree(&entry.path())?;
        } else if file_type.is_file() {
            restrict(&entry.path(), 0o600)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(3, 4, 5).unwrap()
    }

    #[test]
    fn test_file_names_parse_back() {
        let cert = ArchiveSubject::EdgeCertStore.file_name(at(2024, 5, 1));
        assert_eq!(cert, "traefik_acme_20240501_030405.tar.gz");
        assert_eq!(parse_file_name(&cert), Some((ArchiveSubject::EdgeCertStore, at(2024, 5, 1))));

        let id = TenantId::parse("my_db_shop").unwrap();
        let data = ArchiveSubject::TenantData(id.clone()).file_name(at(2024, 5, 2));
        assert_eq!(data, "my_db_shop_db_20240502_030405.sql.gz");
        assert_eq!(parse_file_name(&data), Some((ArchiveSubject::TenantData(id), at(2024, 5, 2))));
    }

    #[test]
    fn test_foreign_names_are_not_archives() {
        for name in [
            "notes.txt",
            "traefik_acme_2024.tar.gz",
            "acme_db_20240501_030405.tar.gz",
            "_db_20240501_030405.sql.gz",
            "acme_db_20241301_030405.sql.gz",
        ] {
            assert_eq!(parse_file_name(name), None, "{name}");
        }
        assert!(matches!(
            classify(Path::new("/backups/random.bin")),
            Err(FleetError::UnknownArchiveType { .. })
        ));
    }

    #[test]
    fn test_pack_and_unpack_tree() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("acme");
        std::fs::create_dir_all(src.join("certs")).unwrap();
        std::fs::write(src.join("acme.json"), b"{\"le\":{}}").unwrap();
        std::fs::write(src.join("certs/site.pem"), b"PEM").unwrap();

        let out = dir.path().join("traefik_acme_20240501_030405.tar.gz");
        pack_dir(&src, File::create(&out).unwrap()).unwrap();

        let dest = dir.path().join("restored");
        std::fs::create_dir_all(&dest).unwrap();
        unpack_into(&out, &dest).unwrap();
        restrict_tree(&dest).unwrap();

        assert_eq!(std::fs::read(dest.join("acme.json")).unwrap(), b"{\"le\":{}}");
        assert_eq!(std::fs::read(dest.join("certs/site.pem")).unwrap(), b"PEM");
        assert!(verify_stream(&out, &ArchiveSubject::EdgeCertStore).unwrap() > 0);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(dest.join("acme.json")).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_corrupt_archive_fails_verification() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("acme_db_20240501_030405.sql.gz");
        std::fs::write(&path, b"definitely not gzip").unwrap();

        let archive = Archive::inspect(&path).unwrap();
        assert!(archive.readable);
        assert!(verify_stream(&path, &archive.subject).is_err());
    }
}
