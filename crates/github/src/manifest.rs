//! Book manifest (`META-INF/books.xml`) parsing.
//!
//! The manifest is a tiny XML document:
//!
//! ```xml
//! <container xmlns="https://openstax.org/namespaces/book-container" version="1">
//!     <book slug="biology-2e" style="biology" href="../collections/biology-2e.collection.xml" />
//! </container>
//! ```
//!
//! It is read with the same HTML5 parser used elsewhere for markup. Self-closing
//! `<book />` tags are not special in HTML, so consecutive books end up nested
//! inside each other; selecting every `book` element regardless of depth
//! still yields them in document order.

use crate::error::{ErrorKind, Result};
use crate::models::CanonicalBook;
use scraper::{Html, Selector};
use std::sync::LazyLock;

static BOOK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("book").unwrap());

/// Parse the books declared by a manifest, in document order.
pub fn parse(manifest: &str) -> Result<Vec<CanonicalBook>> {
    let document = Html::parse_fragment(manifest);
    document
        .select(&BOOK_SELECTOR)
        .enumerate()
        .map(|(position, element)| {
            let element = element.value();
            let slug = element.attr("slug").filter(|s| !s.is_empty());
            let style = element.attr("style").filter(|s| !s.is_empty());
            match (slug, style) {
                (Some(slug), Some(style)) => Ok(CanonicalBook {
                    slug: slug.to_string(),
                    style: style.to_string(),
                    href: element.attr("href").map(str::to_string),
                }),
                _ => exn::bail!(ErrorKind::InvalidManifest(format!(
                    "book #{} is missing its slug or style",
                    position + 1
                ))),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container xmlns="https://openstax.org/namespaces/book-container" version="1">
    <book slug="college-physics" style="physics" href="../collections/college-physics.collection.xml" />
    <book slug="college-physics-ap-courses" style="ap-physics" href="../collections/college-physics-ap-courses.collection.xml" />
</container>
"#;

    #[test]
    fn test_parse_books_in_order() {
        let books = parse(MANIFEST).unwrap();
        assert_eq!(books.len(), 2);
        assert_eq!(books[0].slug, "college-physics");
        assert_eq!(books[0].style, "physics");
        assert_eq!(books[0].href.as_deref(), Some("../collections/college-physics.collection.xml"));
        assert_eq!(books[1].slug, "college-physics-ap-courses");
        assert_eq!(books[1].style, "ap-physics");
    }

    #[test]
    fn test_parse_explicitly_closed_books() {
        let manifest = r#"<container><book slug="a" style="x"></book><book slug="b" style="y"></book></container>"#;
        let books = parse(manifest).unwrap();
        assert_eq!(books, vec![CanonicalBook::new("a", "x"), CanonicalBook::new("b", "y")]);
    }

    #[test]
    fn test_parse_empty_container() {
        assert!(parse(r#"<container version="1"></container>"#).unwrap().is_empty());
    }

    #[rstest]
    #[case(r#"<container><book style="x" /></container>"#)]
    #[case(r#"<container><book slug="a" /></container>"#)]
    #[case(r#"<container><book slug="" style="x" /></container>"#)]
    fn test_parse_incomplete_book(#[case] manifest: &str) {
        let err = parse(manifest).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidManifest(_)));
    }
}
