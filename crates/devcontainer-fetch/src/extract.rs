//! Unpacking a fetched Feature's `feature.tgz` into a plain directory.
//!
//! A `LocalPath` Feature's `content_dir` already *is* the Feature's root:
//! `devcontainer-feature.json` sits right there. Every other identifier
//! form downloads a gzipped tarball into that same directory instead, so
//! anything that needs to read the Feature's metadata or install scripts
//! has to unpack it first. `feature_root` hides that distinction behind one
//! call: it returns `content_dir` unchanged when the descriptor is already
//! present, otherwise it extracts `feature.tgz` into an `extracted/`
//! subdirectory (once) and returns that.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use devcontainer_types::{CoreError, CoreResult};
use flate2::read::GzDecoder;
use tar::Archive;

const TARBALL_NAME: &str = "feature.tgz";
const EXTRACTED_DIR: &str = "extracted";
const DESCRIPTOR_NAME: &str = "devcontainer-feature.json";

/// Returns the directory containing `devcontainer-feature.json` for a
/// fetched Feature, extracting `content_dir/feature.tgz` on first use.
///
/// Idempotent: a second call against an already-extracted `content_dir`
/// just returns the existing `extracted/` directory without re-unpacking.
pub fn feature_root(content_dir: &Path) -> CoreResult<PathBuf> {
    if content_dir.join(DESCRIPTOR_NAME).is_file() {
        return Ok(content_dir.to_path_buf());
    }

    let extracted = content_dir.join(EXTRACTED_DIR);
    if extracted.join(DESCRIPTOR_NAME).is_file() {
        return Ok(extracted);
    }

    let tarball = content_dir.join(TARBALL_NAME);
    unpack_tarball(&tarball, &extracted)?;
    Ok(extracted)
}

fn unpack_tarball(tarball: &Path, dest: &Path) -> CoreResult<()> {
    let bytes = std::fs::read(tarball).map_err(|e| {
        CoreError::fetch_failure(&tarball.display().to_string(), format!("reading tarball: {e}"))
    })?;

    std::fs::create_dir_all(dest).map_err(|e| {
        CoreError::fetch_failure(
            &tarball.display().to_string(),
            format!("creating extraction dir {}: {e}", dest.display()),
        )
    })?;

    let decoder = GzDecoder::new(bytes.as_slice());
    let mut archive = Archive::new(decoder);
    archive.unpack(dest).map_err(|e| {
        CoreError::fetch_failure(
            &tarball.display().to_string(),
            format!("unpacking tarball into {}: {e}", dest.display()),
        )
    })?;

    Ok(())
}

/// Reads a single named file out of a tarball without extracting the rest,
/// for callers that only need one entry (e.g. probing a descriptor before
/// committing to a full unpack).
pub fn read_tarball_entry(tarball: &Path, entry_name: &str) -> CoreResult<Option<Vec<u8>>> {
    let file = File::open(tarball).map_err(|e| {
        CoreError::fetch_failure(&tarball.display().to_string(), format!("opening tarball: {e}"))
    })?;
    let decoder = GzDecoder::new(file);
    let mut archive = Archive::new(decoder);

    let entries = archive.entries().map_err(|e| {
        CoreError::fetch_failure(&tarball.display().to_string(), format!("reading tarball entries: {e}"))
    })?;

    for entry in entries {
        let mut entry = entry.map_err(|e| {
            CoreError::fetch_failure(&tarball.display().to_string(), format!("reading tarball entry: {e}"))
        })?;
        let path = entry.path().map_err(|e| {
            CoreError::fetch_failure(&tarball.display().to_string(), format!("reading entry path: {e}"))
        })?;
        if path.file_name().and_then(|n| n.to_str()) == Some(entry_name) {
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf).map_err(|e| {
                CoreError::fetch_failure(&tarball.display().to_string(), format!("reading entry bytes: {e}"))
            })?;
            return Ok(Some(buf));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tar::Builder;

    fn write_sample_tarball(path: &Path) {
        let gz = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        let mut builder = Builder::new(gz);

        let descriptor = br#"{"id":"ruby","version":"1.0.0"}"#;
        let mut header = tar::Header::new_gnu();
        header.set_size(descriptor.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, DESCRIPTOR_NAME, descriptor.as_ref())
            .unwrap();

        let install_sh = b"#!/bin/sh\necho installing\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(install_sh.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, "install.sh", install_sh.as_ref())
            .unwrap();

        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn local_path_with_descriptor_already_present_is_returned_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(DESCRIPTOR_NAME), b"{}").unwrap();
        let root = feature_root(tmp.path()).unwrap();
        assert_eq!(root, tmp.path());
    }

    #[test]
    fn tarball_is_extracted_into_extracted_subdir() {
        let tmp = tempfile::tempdir().unwrap();
        write_sample_tarball(&tmp.path().join(TARBALL_NAME));

        let root = feature_root(tmp.path()).unwrap();
        assert_eq!(root, tmp.path().join(EXTRACTED_DIR));
        assert!(root.join(DESCRIPTOR_NAME).is_file());
        assert!(root.join("install.sh").is_file());
    }

    #[test]
    fn extraction_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        write_sample_tarball(&tmp.path().join(TARBALL_NAME));

        let first = feature_root(tmp.path()).unwrap();
        std::fs::remove_file(tmp.path().join(TARBALL_NAME)).unwrap();
        let second = feature_root(tmp.path()).unwrap();
        assert_eq!(first, second);
        assert!(second.join(DESCRIPTOR_NAME).is_file());
    }

    #[test]
    fn read_tarball_entry_finds_named_file_without_extracting() {
        let tmp = tempfile::tempdir().unwrap();
        let tarball = tmp.path().join(TARBALL_NAME);
        write_sample_tarball(&tarball);

        let bytes = read_tarball_entry(&tarball, DESCRIPTOR_NAME).unwrap().unwrap();
        assert!(String::from_utf8(bytes).unwrap().contains("\"id\":\"ruby\""));

        assert!(read_tarball_entry(&tarball, "missing.txt").unwrap().is_none());
    }
}
