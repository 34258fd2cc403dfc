use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::checksum::HashAlgorithm;
use crate::error::{Error, Result};

/// One named digest attached to a manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hash {
    /// The checksum algorithm.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex digest.
    pub value: String,
}

/// One line of a Manifest file: `TYPE FILENAME SIZE [ALG VALUE]...`.
///
/// See [GLEP 74](https://www.gentoo.org/glep/glep-0074.html).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Entry type tag (`DIST`, `AUX`, `EBUILD`, `MISC`).
    pub kind: String,
    /// The tracked filename.
    pub filename: String,
    /// File size in bytes.
    pub size: i64,
    /// Named digests, unique per algorithm.
    pub hashes: Vec<Hash>,
}

impl ManifestEntry {
    /// Create an entry from its fields.
    pub fn new(kind: &str, filename: &str, size: i64, hashes: Vec<Hash>) -> ManifestEntry {
        ManifestEntry {
            kind: kind.to_string(),
            filename: filename.to_string(),
            size,
            hashes,
        }
    }

    /// Parse a single manifest line.
    ///
    /// Fails if fewer than 3 whitespace-separated fields are present, if the
    /// size is not a non-negative integer, if the hash tail has odd length or
    /// if a hash name is not a supported algorithm.
    pub fn parse(line: &str) -> Result<ManifestEntry> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            return Err(Error::InvalidManifestEntry(format!(
                "not enough fields in '{line}'"
            )));
        }

        let size: i64 = fields[2]
            .parse()
            .map_err(|_| Error::InvalidManifestEntry(format!("invalid size '{}'", fields[2])))?;
        if size < 0 {
            return Err(Error::InvalidManifestEntry(format!(
                "negative size '{}'",
                fields[2]
            )));
        }

        let tail = &fields[3..];
        if tail.len() % 2 != 0 {
            return Err(Error::InvalidManifestEntry(format!(
                "odd number of hash fields in '{line}'"
            )));
        }

        let mut hashes = Vec::with_capacity(tail.len() / 2);
        for pair in tail.chunks(2) {
            hashes.push(Hash {
                algorithm: HashAlgorithm::from_str(pair[0])?,
                value: pair[1].to_string(),
            });
        }

        Ok(ManifestEntry {
            kind: fields[0].to_string(),
            filename: fields[1].to_string(),
            size,
            hashes,
        })
    }

    /// Set the digest for `algorithm`, replacing any existing value.
    pub fn add_hash(&mut self, algorithm: HashAlgorithm, value: &str) {
        for hash in &mut self.hashes {
            if hash.algorithm == algorithm {
                hash.value = value.to_string();
                return;
            }
        }
        self.hashes.push(Hash {
            algorithm,
            value: value.to_string(),
        });
    }

    /// Look up the digest stored for `algorithm`.
    pub fn get_hash(&self, algorithm: HashAlgorithm) -> Option<&str> {
        self.hashes
            .iter()
            .find(|h| h.algorithm == algorithm)
            .map(|h| h.value.as_str())
    }
}

impl fmt::Display for ManifestEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.kind, self.filename, self.size)?;
        for hash in &self.hashes {
            write!(f, " {} {}", hash.algorithm, hash.value)?;
        }
        Ok(())
    }
}

/// An in-memory Manifest: an ordered list of entries.
///
/// Canonical on-disk order is ascending `(kind, filename)`; callers are
/// expected to [`sort`](Manifest::sort) before serializing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    /// The entries, in file order.
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Parse manifest text. Blank lines and `#` comment lines are skipped;
    /// any other malformed line aborts the whole parse.
    pub fn parse(content: &str) -> Result<Manifest> {
        let mut entries = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            entries.push(ManifestEntry::parse(line)?);
        }
        Ok(Manifest { entries })
    }

    /// Read and parse the manifest at `path`. A missing file yields an empty
    /// manifest, not an error.
    pub fn load(path: &Path) -> Result<Manifest> {
        match fs::read_to_string(path) {
            Ok(content) => Manifest::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Manifest::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Sort entries by `(kind, filename)`, byte-wise ascending. The sort is
    /// stable.
    pub fn sort(&mut self) {
        self.entries
            .sort_by(|a, b| (&a.kind, &a.filename).cmp(&(&b.kind, &b.filename)));
    }

    /// Find the entry tracking `filename`, if any.
    pub fn get(&self, filename: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.filename == filename)
    }

    /// Replace the first entry whose filename matches, or append. Filenames
    /// are unique across the whole manifest, so the type tag is not part of
    /// the match key.
    pub fn add_or_replace(&mut self, entry: ManifestEntry) {
        for existing in &mut self.entries {
            if existing.filename == entry.filename {
                *existing = entry;
                return;
            }
        }
        self.entries.push(entry);
    }

    /// Delete every entry tracking `filename`.
    pub fn remove(&mut self, filename: &str) {
        self.entries.retain(|e| e.filename != filename);
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}

/// Load-or-create the manifest at `path`, upsert `entry`, sort and rewrite
/// the whole file.
///
/// This is a plain read-modify-write: there is no locking and no atomic
/// replace, so concurrent invocations against the same path race. Callers
/// serialize access to a given manifest.
pub fn upsert_manifest(path: &Path, entry: ManifestEntry) -> Result<()> {
    let mut manifest = Manifest::load(path)?;
    manifest.add_or_replace(entry);
    manifest.sort();
    fs::write(path, manifest.to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry() {
        let entry = ManifestEntry::new(
            "DIST",
            "foo.tar.gz",
            12345,
            vec![Hash {
                algorithm: HashAlgorithm::Sha512,
                value: "abc".to_string(),
            }],
        );
        assert_eq!(entry.kind, "DIST");
        assert_eq!(entry.filename, "foo.tar.gz");
        assert_eq!(entry.size, 12345);
        assert_eq!(entry.get_hash(HashAlgorithm::Sha512), Some("abc"));
    }

    #[test]
    fn parse_entry_errors() {
        for line in [
            "",
            "DIST filename",
            "DIST filename invalid",
            "DIST filename -1",
            "DIST filename 123 SHA512",
            "DIST filename 123 CRC32 abcd",
        ] {
            assert!(ManifestEntry::parse(line).is_err(), "accepted {line:?}");
        }
    }

    #[test]
    fn parse_entry_valid() {
        let entry =
            ManifestEntry::parse("DIST example.tar.gz 12345 BLAKE2B 1234 SHA512 5678").unwrap();
        assert_eq!(entry.kind, "DIST");
        assert_eq!(entry.filename, "example.tar.gz");
        assert_eq!(entry.size, 12345);
        assert_eq!(entry.hashes.len(), 2);
        assert_eq!(entry.get_hash(HashAlgorithm::Blake2b), Some("1234"));
        assert_eq!(entry.get_hash(HashAlgorithm::Sha512), Some("5678"));
    }

    #[test]
    fn add_hash_replaces() {
        let mut entry = ManifestEntry::new("DIST", "f", 1, Vec::new());
        entry.add_hash(HashAlgorithm::Sha1, "old");
        entry.add_hash(HashAlgorithm::Sha1, "new");
        assert_eq!(entry.hashes.len(), 1);
        assert_eq!(entry.get_hash(HashAlgorithm::Sha1), Some("new"));
    }

    #[test]
    fn entry_display() {
        let mut entry = ManifestEntry::new("DIST", "example.tar.gz", 12345, Vec::new());
        entry.add_hash(HashAlgorithm::Blake2b, "1234");
        entry.add_hash(HashAlgorithm::Sha512, "5678");
        let manifest = Manifest {
            entries: vec![entry],
        };
        assert_eq!(
            manifest.to_string(),
            "DIST example.tar.gz 12345 BLAKE2B 1234 SHA512 5678\n"
        );
    }

    #[test]
    fn parse_skips_comments_and_blanks() {
        let content = "\
# This is a comment
DIST example.tar.gz 12345 BLAKE2B 1234

# Another comment
DIST other.tar.gz 67890 SHA512 5678
";
        let manifest = Manifest::parse(content).unwrap();
        assert_eq!(manifest.entries.len(), 2);
        assert_eq!(manifest.entries[0].filename, "example.tar.gz");
        assert_eq!(manifest.entries[1].filename, "other.tar.gz");
    }

    #[test]
    fn parse_strict_on_bad_line() {
        let content = "DIST ok.tar.gz 1 SHA512 aa\nDIST broken\n";
        assert!(Manifest::parse(content).is_err());
    }

    #[test]
    fn add_or_replace_keeps_filenames_unique() {
        let mut manifest = Manifest::default();
        manifest.add_or_replace(ManifestEntry::new("DIST", "file1", 100, Vec::new()));
        assert_eq!(manifest.entries.len(), 1);

        manifest.add_or_replace(ManifestEntry::new("DIST", "file1", 200, Vec::new()));
        assert_eq!(manifest.entries.len(), 1);
        assert_eq!(manifest.entries[0].size, 200);

        manifest.add_or_replace(ManifestEntry::new("DIST", "file2", 300, Vec::new()));
        assert_eq!(manifest.entries.len(), 2);
    }

    #[test]
    fn remove_by_filename() {
        let mut manifest = Manifest::default();
        manifest.add_or_replace(ManifestEntry::new("DIST", "file1", 100, Vec::new()));
        manifest.add_or_replace(ManifestEntry::new("DIST", "file2", 200, Vec::new()));

        manifest.remove("file3");
        assert_eq!(manifest.entries.len(), 2);

        manifest.remove("file1");
        assert_eq!(manifest.entries.len(), 1);
        assert_eq!(manifest.entries[0].filename, "file2");
    }

    #[test]
    fn sort_by_kind_then_filename() {
        let mut manifest = Manifest {
            entries: vec![
                ManifestEntry::new("EBUILD", "b", 0, Vec::new()),
                ManifestEntry::new("DIST", "a", 0, Vec::new()),
                ManifestEntry::new("AUX", "c", 0, Vec::new()),
                ManifestEntry::new("DIST", "d", 0, Vec::new()),
            ],
        };
        manifest.sort();
        let order: Vec<(&str, &str)> = manifest
            .entries
            .iter()
            .map(|e| (e.kind.as_str(), e.filename.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![("AUX", "c"), ("DIST", "a"), ("DIST", "d"), ("EBUILD", "b")]
        );
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::load(&dir.path().join("Manifest")).unwrap();
        assert!(manifest.entries.is_empty());
    }

    #[test]
    fn upsert_creates_updates_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Manifest");

        let mut entry = ManifestEntry::new("DIST", "A", 100, Vec::new());
        entry.add_hash(HashAlgorithm::Sha1, "123");
        upsert_manifest(&path, entry).unwrap();
        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.entries.len(), 1);

        let mut updated = ManifestEntry::new("DIST", "A", 200, Vec::new());
        updated.add_hash(HashAlgorithm::Sha1, "999");
        upsert_manifest(&path, updated).unwrap();
        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.entries.len(), 1);
        assert_eq!(manifest.entries[0].size, 200);

        upsert_manifest(&path, ManifestEntry::new("DIST", "B", 300, Vec::new())).unwrap();
        upsert_manifest(&path, ManifestEntry::new("AUX", "Z", 50, Vec::new())).unwrap();

        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.entries.len(), 3);
        assert_eq!(manifest.entries[0].kind, "AUX");
        assert_eq!(manifest.entries[0].filename, "Z");
        assert_eq!(manifest.entries[1].filename, "A");
        assert_eq!(manifest.entries[2].filename, "B");
    }
}
