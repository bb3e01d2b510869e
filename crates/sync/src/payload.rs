//! The approved book list (ABL) document.
//!
//! Two shapes are accepted for each version: the compact form
//!
//! ```json
//! { "edition": 2, "commit_hash": "4d6ee4f", "declared_books": [{ "uuid": "..", "slug": "..", "style": ".." }] }
//! ```
//!
//! and the published form, where the hash is called `commit_sha` and the
//! books live under `commit_metadata.books`. The document itself is either a
//! bare list of entries or an object with an `approved_books` list. Fields
//! not listed here are ignored. Entries are decoded individually (see
//! [`RawEntry`]).

use crate::error::{ErrorKind, Result};
use derive_more::Display;
use exn::ResultExt;
use serde::Deserialize;

/// A book as declared by the approved book list.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct DeclaredBook {
    pub uuid: String,
    pub slug: String,
    pub style: String,
}
impl DeclaredBook {
    pub fn new(uuid: impl Into<String>, slug: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            slug: slug.into(),
            style: style.into(),
        }
    }
}

/// One approved version of a repository: a commit and the books it should
/// contain, all tagged with the same edition.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(try_from = "RawVersion")]
pub struct DeclaredVersion {
    pub edition: u32,
    pub commit_hash: String,
    pub books: Vec<DeclaredBook>,
}

#[derive(Deserialize)]
struct RawVersion {
    edition: u32,
    #[serde(alias = "commit_sha")]
    commit_hash: String,
    declared_books: Option<Vec<DeclaredBook>>,
    commit_metadata: Option<RawCommitMetadata>,
}

#[derive(Deserialize)]
struct RawCommitMetadata {
    books: Vec<DeclaredBook>,
}

impl TryFrom<RawVersion> for DeclaredVersion {
    type Error = String;
    fn try_from(raw: RawVersion) -> std::result::Result<Self, Self::Error> {
        if raw.commit_hash.trim().is_empty() {
            return Err("commit hash must not be empty".to_string());
        }
        let books = match (raw.declared_books, raw.commit_metadata) {
            (Some(books), _) => books,
            (None, Some(metadata)) => metadata.books,
            (None, None) => {
                return Err(format!("version {} declares no books", raw.commit_hash));
            },
        };
        Ok(Self {
            edition: raw.edition,
            commit_hash: raw.commit_hash,
            books,
        })
    }
}

/// One approved repository and every version of it that has been approved.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct ApprovedEntry {
    /// Either `owner/name` or a bare `name` (see [`RepositoryName::parse`]).
    pub repository_name: String,
    pub versions: Vec<DeclaredVersion>,
}

/// One element of the approved book list, not yet decoded.
///
/// Entries are decoded one at a time by the caller so that a malformed entry
/// fails on its own instead of taking the whole list down with it.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct RawEntry(serde_json::Value);

impl RawEntry {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// The declared repository name, if the entry has one, for reporting.
    pub fn repository_name(&self) -> Option<&str> {
        self.0.get("repository_name").and_then(serde_json::Value::as_str)
    }

    /// A name for the entry in reports and logs, even when it is malformed.
    pub fn label(&self) -> &str {
        self.repository_name().unwrap_or("<unnamed>")
    }

    pub fn decode(&self) -> Result<ApprovedEntry> {
        ApprovedEntry::deserialize(&self.0)
            .or_raise(|| ErrorKind::InvalidEntry(format!("cannot decode '{}'", self.label())))
    }
}

impl From<serde_json::Value> for RawEntry {
    fn from(value: serde_json::Value) -> Self {
        Self::new(value)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Wrapped { approved_books: Vec<RawEntry> },
    Bare(Vec<RawEntry>),
}

/// Parse the outer approved book list document.
///
/// Only the list itself must be well formed here; each entry is checked by
/// [`RawEntry::decode`].
pub fn parse(json: impl AsRef<[u8]>) -> Result<Vec<RawEntry>> {
    let document: Document = serde_json::from_slice(json.as_ref()).or_raise(|| ErrorKind::Payload)?;
    Ok(match document {
        Document::Wrapped { approved_books } => approved_books,
        Document::Bare(entries) => entries,
    })
}

/// A fully-qualified repository identity.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
#[display("{owner}/{name}")]
pub struct RepositoryName {
    pub owner: String,
    pub name: String,
}
impl RepositoryName {
    /// Split `owner/name`, or pair a bare `name` with `default_owner`.
    pub fn parse(repository_name: &str, default_owner: &str) -> Result<Self> {
        let mut segments = repository_name.split('/');
        let (owner, name) = match (segments.next(), segments.next(), segments.next()) {
            (Some(name), None, None) => (default_owner, name),
            (Some(owner), Some(name), None) => (owner, name),
            _ => exn::bail!(ErrorKind::InvalidEntry(format!("too many segments in '{repository_name}'"))),
        };
        if owner.trim().is_empty() || name.trim().is_empty() {
            exn::bail!(ErrorKind::InvalidEntry(format!("empty segment in '{repository_name}'")));
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_compact_shape() {
        let json = r#"[{
            "repository_name": "openstax/biology",
            "versions": [{
                "edition": 1,
                "commit_hash": "abc",
                "declared_books": [{ "uuid": "u1", "slug": "biology", "style": "print" }]
            }]
        }]"#;
        let entries = parse(json).unwrap();
        assert_eq!(entries.len(), 1);
        let entry = entries[0].decode().unwrap();
        assert_eq!(entry.versions[0].commit_hash, "abc");
        assert_eq!(entry.versions[0].books, vec![DeclaredBook::new("u1", "biology", "print")]);
    }

    #[test]
    fn test_parse_published_shape() {
        let json = r#"{
            "api_version": 2,
            "approved_books": [{
                "repository_name": "osbooks-college-physics-bundle",
                "platforms": ["REX"],
                "versions": [{
                    "min_code_version": "20210101.00000000",
                    "edition": 2,
                    "commit_sha": "4d6ee4f",
                    "commit_metadata": {
                        "committed_at": "2023-11-14T22:13:20+00:00",
                        "books": [
                            { "uuid": "u1", "slug": "college-physics", "style": "physics", "licenses": [] },
                            { "uuid": "u2", "slug": "college-physics-ap-courses", "style": "ap-physics" }
                        ]
                    }
                }]
            }]
        }"#;
        let entry = parse(json).unwrap()[0].decode().unwrap();
        let version = &entry.versions[0];
        assert_eq!(version.edition, 2);
        assert_eq!(version.commit_hash, "4d6ee4f");
        assert_eq!(version.books.len(), 2);
        assert_eq!(version.books[1].style, "ap-physics");
    }

    #[rstest]
    #[case(r#"{"approved_books": 7}"#)]
    #[case(r#"{"books": []}"#)]
    #[case("not json")]
    fn test_parse_invalid_document(#[case] json: &str) {
        let err = parse(json).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Payload));
    }

    #[rstest]
    #[case::no_books(r#"{"repository_name": "x", "versions": [{"edition": 1, "commit_hash": "abc"}]}"#, "x")]
    #[case::empty_hash(r#"{"repository_name": "x", "versions": [{"edition": 1, "commit_hash": "", "declared_books": []}]}"#, "x")]
    #[case::no_versions(r#"{"repository_name": "x"}"#, "x")]
    #[case::bad_edition(r#"{"repository_name": "x", "versions": [{"edition": "2e", "commit_sha": "abc", "declared_books": []}]}"#, "x")]
    #[case::not_an_object("1", "<unnamed>")]
    fn test_decode_invalid_entry(#[case] entry: &str, #[case] label: &str) {
        let json = format!(r#"{{"approved_books": [{entry}]}}"#);
        let entries = parse(json).unwrap();
        assert_eq!(entries[0].label(), label);
        let err = entries[0].decode().unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidEntry(_)));
    }

    #[test]
    fn test_malformed_entry_does_not_hide_its_neighbours() {
        let json = r#"{"approved_books": [
            {"repository_name": "osbooks-biology", "versions": [{"edition": 1, "commit_sha": "abc", "commit_metadata": {"books": []}}]},
            {"repository_name": "osbooks-physics", "versions": [{"edition": 1, "commit_sha": "def"}]}
        ]}"#;
        let entries = parse(json).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].decode().unwrap().repository_name, "osbooks-biology");
        assert!(entries[1].decode().is_err());
    }

    #[rstest]
    #[case("openstax/biology", "openstax", "biology")]
    #[case("cnx-user-books/biology", "cnx-user-books", "biology")]
    #[case("biology", "openstax", "biology")]
    fn test_repository_name(#[case] input: &str, #[case] owner: &str, #[case] name: &str) {
        let parsed = RepositoryName::parse(input, "openstax").unwrap();
        assert_eq!(parsed.owner, owner);
        assert_eq!(parsed.name, name);
        assert_eq!(parsed.to_string(), format!("{owner}/{name}"));
    }

    #[rstest]
    #[case("a/b/c")]
    #[case("/biology")]
    #[case("openstax/")]
    #[case("")]
    fn test_repository_name_invalid(#[case] input: &str) {
        let err = RepositoryName::parse(input, "openstax").unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidEntry(_)));
    }
}
