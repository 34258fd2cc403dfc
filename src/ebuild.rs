use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use winnow::ascii::digit1;
use winnow::combinator::{alt, opt, repeat};
use winnow::prelude::*;
use winnow::token::one_of;

use crate::error::Result;
use crate::vars::{is_identifier, resolve};

/// A single download declared in `SRC_URI`.
///
/// The filename defaults to the URL's final path segment unless the ebuild
/// renamed it with `-> target`. After resolution the filename is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriEntry {
    /// The download URL, with variables resolved.
    pub url: String,
    /// The local filename, with variables resolved.
    pub filename: String,
}

/// How deeply to parse an ebuild.
///
/// The modes are strictly ordered: each level populates everything the
/// previous one does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParseMode {
    /// Only the variables implied by the filename (`P`, `PN`, `PV`).
    NameOnly,
    /// Additionally the `KEY=VALUE` assignments in the file body.
    Variables,
    /// Additionally the `SRC_URI` download entries.
    Full,
}

impl fmt::Display for ParseMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseMode::NameOnly => f.write_str("NameOnly"),
            ParseMode::Variables => f.write_str("Variables"),
            ParseMode::Full => f.write_str("Full"),
        }
    }
}

/// A parsed ebuild.
///
/// Ebuilds are bash scripts; evaluating one faithfully needs a shell. This
/// parser covers the declarative subset that matters for Manifest upkeep:
/// plain variable assignments and the `SRC_URI` block. Created fresh per
/// parse call and not mutated afterwards; [`Display`](fmt::Display)
/// re-serializes the parsed structure to canonical text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ebuild {
    /// Path the ebuild was parsed from.
    pub path: PathBuf,
    /// Accumulated variables, including filename-derived `P`, `PN`, `PV`.
    pub vars: BTreeMap<String, String>,
    /// Declared downloads, populated in [`ParseMode::Full`].
    pub src_uri: Vec<UriEntry>,
    /// The depth this ebuild was parsed at.
    pub mode: ParseMode,
}

impl Ebuild {
    /// Parse the ebuild at `path`. The file is only read for modes beyond
    /// [`ParseMode::NameOnly`].
    pub fn parse(path: impl Into<PathBuf>, mode: ParseMode) -> Result<Ebuild> {
        let path = path.into();
        if mode == ParseMode::NameOnly {
            return Ok(Ebuild::from_content(path, "", mode));
        }
        let content = fs::read_to_string(&path)?;
        Ok(Ebuild::from_content(path, &content, mode))
    }

    /// Parse ebuild text directly. `path` still supplies the filename the
    /// `P`/`PN`/`PV` variables derive from.
    pub fn from_content(path: impl Into<PathBuf>, content: &str, mode: ParseMode) -> Ebuild {
        let path = path.into();
        let mut ebuild = Ebuild {
            vars: BTreeMap::new(),
            src_uri: Vec::new(),
            mode,
            path,
        };

        if let Some(name) = ebuild.path.file_name().and_then(|n| n.to_str()) {
            if let Some(vars) = package_vars(name) {
                ebuild.vars.extend(vars);
            }
        }

        if mode >= ParseMode::Variables {
            ebuild.parse_body(content);
        }
        if mode >= ParseMode::Full {
            ebuild.src_uri = extract_uris(content, &ebuild.vars);
        }

        ebuild
    }

    /// Line-oriented scan for `KEY=VALUE` assignments.
    fn parse_body(&mut self, content: &str) {
        let mut lines = content.lines();
        while let Some(raw) = lines.next() {
            let line = raw.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            let value = if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
                value[1..value.len() - 1].to_string()
            } else if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
                value[1..value.len() - 1].to_string()
            } else if value.matches('"').count() % 2 != 0 || value.matches('\'').count() % 2 != 0 {
                // Unbalanced quotes: only the double-quoted multi-line form
                // is recognized; anything else is not an assignment.
                let Some(first) = value.strip_prefix('"') else {
                    continue;
                };
                let mut buf = first.to_string();
                let mut closed = false;
                for next in lines.by_ref() {
                    buf.push('\n');
                    if next.trim().ends_with('"') {
                        if let Some(idx) = next.rfind('"') {
                            buf.push_str(&next[..idx]);
                        }
                        closed = true;
                        break;
                    }
                    buf.push_str(next);
                }
                if !closed {
                    // Ran out of input before the closing quote: malformed,
                    // drop the assignment.
                    continue;
                }
                buf
            } else {
                value.to_string()
            };

            // Later assignments may reference earlier ones.
            let value = resolve(&value, &self.vars);
            if is_identifier(key) {
                self.vars.insert(key.to_string(), value);
            }
        }
    }
}

impl fmt::Display for Ebuild {
    /// Canonical re-serialization: retained variables as `KEY="value"` in
    /// ascending key order, then a structurally regenerated `SRC_URI` block.
    ///
    /// `P`, `PN` and `PV` are implicit from the filename and never emitted;
    /// the raw `SRC_URI` variable is dropped when entries were extracted.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let emit_uris = self.mode == ParseMode::Full && !self.src_uri.is_empty();
        for (key, value) in &self.vars {
            if matches!(key.as_str(), "P" | "PN" | "PV") {
                continue;
            }
            if key == "SRC_URI" && emit_uris {
                continue;
            }
            writeln!(f, "{key}=\"{value}\"")?;
        }
        if emit_uris {
            writeln!(f, "SRC_URI=\"")?;
            for entry in &self.src_uri {
                if entry.filename.is_empty() || entry.filename == basename(&entry.url) {
                    writeln!(f, "\t{}", entry.url)?;
                } else {
                    writeln!(f, "\t{} -> {}", entry.url, entry.filename)?;
                }
            }
            writeln!(f, "\"")?;
        }
        Ok(())
    }
}

/// Derive `P`, `PN` and `PV` from an ebuild filename.
///
/// The filename must match `NAME-VERSION.ebuild`, where VERSION is
/// `\d+(\.\d+)*([a-z]|_p\d+|_rc\d+|_beta\d+|_alpha\d+)?(-r\d+)?`. The split
/// point is the rightmost hyphen whose remainder fully matches the version
/// grammar, so hyphenated package names parse correctly. `None` means the
/// file is not a package definition, which callers treat distinctly from a
/// definition with no variables.
///
/// # Examples
///
/// ```
/// use portage_manifest::package_vars;
///
/// let vars = package_vars("ollama-bin-0.10.1.ebuild").unwrap();
/// assert_eq!(vars["PN"], "ollama-bin");
/// assert_eq!(vars["PV"], "0.10.1");
/// assert_eq!(vars["P"], "ollama-bin-0.10.1");
/// assert!(package_vars("invalid.txt").is_none());
/// ```
pub fn package_vars(filename: &str) -> Option<BTreeMap<String, String>> {
    let base = Path::new(filename).file_name()?.to_str()?;
    let stem = base.strip_suffix(".ebuild")?;
    for (idx, _) in stem.rmatch_indices('-') {
        if idx == 0 {
            continue;
        }
        let name = &stem[..idx];
        let version = &stem[idx + 1..];
        if parse_version.parse(version).is_ok() {
            let mut vars = BTreeMap::new();
            vars.insert("P".to_string(), format!("{name}-{version}"));
            vars.insert("PN".to_string(), name.to_string());
            vars.insert("PV".to_string(), version.to_string());
            return Some(vars);
        }
    }
    None
}

/// Winnow parser for the full version grammar; succeeds only on a complete
/// match.
fn parse_version(input: &mut &str) -> ModalResult<()> {
    digit1.void().parse_next(input)?;
    repeat::<_, _, (), _, _>(0.., ('.', digit1)).parse_next(input)?;
    opt(alt((
        ("_alpha", digit1).void(),
        ("_beta", digit1).void(),
        ("_rc", digit1).void(),
        ("_p", digit1).void(),
        one_of('a'..='z').void(),
    )))
    .void()
    .parse_next(input)?;
    opt(("-r", digit1)).void().parse_next(input)?;
    Ok(())
}

/// Extract the last path segment of a URL. Trailing slashes are ignored, so
/// `https://x/dir/` yields `dir`, never an empty name.
fn basename(url: &str) -> &str {
    let trimmed = url.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Extract `SRC_URI` download entries from ebuild text.
///
/// Inline `#` comments are stripped first. The first `SRC_URI="..."` block
/// (double-quote form, falling back to single quotes) is tokenized on
/// whitespace; a token containing `://` starts an entry, and `-> target`
/// renames it. URL and filename are both resolved against `vars`. No block
/// yields an empty list, not an error.
fn extract_uris(content: &str, vars: &BTreeMap<String, String>) -> Vec<UriEntry> {
    let cleaned: String = content
        .lines()
        .map(|line| line.split('#').next().unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n");

    let Some(body) =
        find_src_uri_block(&cleaned, '"').or_else(|| find_src_uri_block(&cleaned, '\''))
    else {
        return Vec::new();
    };

    let tokens: Vec<&str> = body.split_whitespace().collect();
    let mut uris = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        if !token.contains("://") {
            i += 1;
            continue;
        }
        let mut filename = basename(token);
        if i + 2 < tokens.len() && tokens[i + 1] == "->" {
            filename = tokens[i + 2];
            i += 3;
        } else {
            i += 1;
        }
        uris.push(UriEntry {
            url: resolve(token, vars),
            filename: resolve(filename, vars),
        });
    }
    uris
}

/// Find the body of the first `SRC_URI = <quote>...<quote>` occurrence.
/// Whitespace (including newlines) is allowed around `=`, and the body may
/// span lines.
fn find_src_uri_block(content: &str, quote: char) -> Option<&str> {
    let mut search = 0;
    while let Some(pos) = content[search..].find("SRC_URI") {
        let at = search + pos;
        search = at + "SRC_URI".len();
        let rest = content[search..].trim_start();
        let Some(rest) = rest.strip_prefix('=') else {
            continue;
        };
        let rest = rest.trim_start();
        let Some(body) = rest.strip_prefix(quote) else {
            continue;
        };
        if let Some(end) = body.find(quote) {
            return Some(&body[..end]);
        }
    }
    None
}
