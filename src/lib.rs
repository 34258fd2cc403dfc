//! Gentoo overlay Manifest maintenance: ebuild parsing, checksum manifests
//! and distfile reconciliation.
//!
//! Ebuild files are bash scripts that require a full shell interpreter to
//! evaluate. This crate parses the declarative subset that matters for
//! keeping [Manifest] files up to date — plain `KEY=VALUE` assignments and
//! the `SRC_URI` download block — and pairs it with a streaming
//! multi-algorithm checksum pipeline and a reconciliation engine that
//! verifies, fixes and prunes Manifest entries.
//!
//! [Manifest]: https://www.gentoo.org/glep/glep-0074.html
//!
//! # Examples
//!
//! Extract the declared downloads from an ebuild:
//!
//! ```
//! use portage_manifest::{Ebuild, ParseMode};
//!
//! let input = "\
//! DESCRIPTION=\"Example package\"
//! SRC_URI=\"https://example.com/files/${P}.tar.gz\"
//! ";
//! let ebuild = Ebuild::from_content("example-1.0.ebuild", input, ParseMode::Full);
//! assert_eq!(ebuild.src_uri.len(), 1);
//! assert_eq!(ebuild.src_uri[0].filename, "example-1.0.tar.gz");
//! ```
//!
//! Parse and canonicalize a Manifest:
//!
//! ```
//! use portage_manifest::Manifest;
//!
//! let mut manifest = Manifest::parse(
//!     "DIST example-1.0.tar.gz 12345 BLAKE2B 1234 SHA512 5678\n"
//! ).unwrap();
//! manifest.sort();
//! assert_eq!(manifest.entries.len(), 1);
//! ```

mod checksum;
mod ebuild;
mod error;
mod fetch;
mod manifest;
mod reconcile;
mod vars;

// Re-export public types
pub use checksum::{ChecksumResult, HashAlgorithm};
pub use ebuild::{package_vars, Ebuild, ParseMode, UriEntry};
pub use error::{Error, Result};
pub use fetch::fetch_and_hash;
pub use manifest::{upsert_manifest, Hash, Manifest, ManifestEntry};
pub use reconcile::{clean, resolve_manifest_path, upsert_from_url, verify, VerifySummary, DIST};
pub use vars::resolve;
