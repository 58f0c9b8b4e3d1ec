//! Packaging of local source directories into checksum-keyed zip archives.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use adler::Adler32;
use serde::{Deserialize, Serialize};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::SynthError;

/// A local directory that will be zipped and uploaded next to the template.
/// The template itself only carries the two parameters; their values are
/// filled in at deploy time, once the staged object's location is known.
#[derive(Debug, Clone)]
pub struct AssetSpec {
    /// Name stem of the staged archive; the content checksum is appended.
    pub name: String,
    pub source_dir: PathBuf,
    /// Template parameter receiving the bucket that holds the staged object.
    pub bucket_parameter: String,
    /// Template parameter receiving the staged object's key.
    pub key_parameter: String,
}

/// One staged asset, recorded in `<stack>.assets.json` for the deploy step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetManifestEntry {
    pub bucket_parameter: String,
    pub key_parameter: String,
    /// Object key the deploy step uploads the archive under.
    pub key: String,
    /// File name of the staged archive inside the output directory.
    pub file: String,
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), SynthError> {
    let entries = fs::read_dir(dir).map_err(|source| SynthError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| SynthError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

/// Zip `spec.source_dir` into the output directory. The archive name carries
/// a checksum over relative paths and contents, so identical sources stage to
/// identical keys and the template stays byte-stable across synths.
pub fn stage_asset(spec: &AssetSpec, out_dir: &Path) -> Result<AssetManifestEntry, SynthError> {
    if !spec.source_dir.is_dir() {
        return Err(SynthError::Asset {
            path: spec.source_dir.clone(),
            reason: "not a directory".to_string(),
        });
    }
    let mut files = Vec::new();
    collect_files(&spec.source_dir, &mut files)?;
    if files.is_empty() {
        return Err(SynthError::Asset {
            path: spec.source_dir.clone(),
            reason: "directory contains no files".to_string(),
        });
    }
    files.sort();

    let mut hasher = Adler32::new();
    let mut contents = Vec::with_capacity(files.len());
    for path in &files {
        let relative = path
            .strip_prefix(&spec.source_dir)
            .map_err(|_| SynthError::Asset {
                path: path.clone(),
                reason: "file escaped the asset root".to_string(),
            })?;
        let name = relative.to_string_lossy().replace('\\', "/");
        let bytes = fs::read(path).map_err(|source| SynthError::Io {
            path: path.clone(),
            source,
        })?;
        hasher.write_slice(name.as_bytes());
        hasher.write_slice(&bytes);
        contents.push((name, bytes));
    }
    let checksum = hasher.checksum();
    let file_name = format!("{}_{checksum:08x}.zip", spec.name);

    let zip_path = out_dir.join(&file_name);
    let file = File::create(&zip_path).map_err(|source| SynthError::Io {
        path: zip_path.clone(),
        source,
    })?;
    let mut writer = ZipWriter::new(file);
    // fixed timestamps keep rebuilt archives byte-identical
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());
    for (name, bytes) in &contents {
        writer
            .start_file(name.as_str(), options)
            .map_err(|e| SynthError::Asset {
                path: zip_path.clone(),
                reason: e.to_string(),
            })?;
        writer.write_all(bytes).map_err(|source| SynthError::Io {
            path: zip_path.clone(),
            source,
        })?;
    }
    writer.finish().map_err(|e| SynthError::Asset {
        path: zip_path.clone(),
        reason: e.to_string(),
    })?;

    Ok(AssetManifestEntry {
        bucket_parameter: spec.bucket_parameter.clone(),
        key_parameter: spec.key_parameter.clone(),
        key: file_name.clone(),
        file: file_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(source_dir: &Path) -> AssetSpec {
        AssetSpec {
            name: "get-item".to_string(),
            source_dir: source_dir.to_path_buf(),
            bucket_parameter: "ArtifactBucketLambdaGetOneItem".to_string(),
            key_parameter: "ArtifactKeyLambdaGetOneItem".to_string(),
        }
    }

    #[test]
    fn staging_the_same_source_twice_yields_the_same_key() {
        let source = tempfile::tempdir().unwrap();
        fs::write(source.path().join("get-item.js"), "exports.handler = 1;").unwrap();
        fs::create_dir(source.path().join("lib")).unwrap();
        fs::write(source.path().join("lib").join("db.js"), "module.exports = {};").unwrap();

        let out_a = tempfile::tempdir().unwrap();
        let out_b = tempfile::tempdir().unwrap();
        let a = stage_asset(&spec(source.path()), out_a.path()).unwrap();
        let b = stage_asset(&spec(source.path()), out_b.path()).unwrap();
        assert_eq!(a, b);
        assert!(out_a.path().join(&a.file).is_file());
    }

    #[test]
    fn changed_contents_change_the_key() {
        let source = tempfile::tempdir().unwrap();
        let entry = source.path().join("get-item.js");
        let out = tempfile::tempdir().unwrap();

        fs::write(&entry, "exports.handler = 1;").unwrap();
        let before = stage_asset(&spec(source.path()), out.path()).unwrap();
        fs::write(&entry, "exports.handler = 2;").unwrap();
        let after = stage_asset(&spec(source.path()), out.path()).unwrap();
        assert_ne!(before.key, after.key);
    }

    #[test]
    fn missing_and_empty_directories_are_rejected() {
        let out = tempfile::tempdir().unwrap();
        let missing = spec(Path::new("does/not/exist"));
        assert!(matches!(
            stage_asset(&missing, out.path()),
            Err(SynthError::Asset { .. })
        ));

        let empty = tempfile::tempdir().unwrap();
        assert!(matches!(
            stage_asset(&spec(empty.path()), out.path()),
            Err(SynthError::Asset { .. })
        ));
    }
}
