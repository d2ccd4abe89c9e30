//! Integration tests for pagedxml

use std::rc::Rc;

use pagedxml::mime::{self, Base64Encoder, StreamFilter};
use pagedxml::{
    BinaryEncoding, CryptoDelegate, Document, Element, ExportMode, ExportOptions, PageStore,
    ParseStatus, Placement, SaveOptions, TextEncoding, XmlError, UNLIMITED_DEPTH,
};
use tempfile::TempDir;

const CATALOG: &str = "<catalog>\
    <book id=\"1\" price=\"12\"><title>Alpha</title></book>\
    <book id=\"2\" price=\"30\"><title>Beta</title></book>\
    <pen id=\"3\" price=\"2\"/>\
    </catalog>";

fn compact(doc: &Document) -> String {
    doc.to_text(ExportOptions::compact()).unwrap()
}

#[test]
fn test_parse_and_reexport() {
    let doc = Document::parse_str(r#"<root><a x="1">hi<!--c--></a></root>"#);
    assert_eq!(doc.status(), ParseStatus::NoHeader);

    let root = doc.root().unwrap();
    assert_eq!(root.name(), "root");
    let a = root.child(0).unwrap();
    assert_eq!(a.attribute("x"), Some("1"));
    assert_eq!(a.contents().len(), 1);
    assert_eq!(a.content_text(0), Some("hi"));
    assert_eq!(a.comments().len(), 1);
    assert_eq!(a.comments()[0].text, "c");

    let text = doc.to_text(ExportOptions::default()).unwrap();
    let reparsed = Document::parse_str(&text);
    assert_eq!(reparsed.status(), ParseStatus::Ok);
    let a2 = reparsed.root().unwrap().child(0).unwrap();
    assert!(a.structural_eq(a2));
}

#[test]
fn test_formatted_export_is_idempotent() {
    let doc = Document::parse_str(CATALOG);
    let first = doc.to_text(ExportOptions::default()).unwrap();
    let second = Document::parse_str(&first)
        .to_text(ExportOptions::default())
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_fatal_parse_keeps_partial_tree() {
    let doc = Document::parse_str("<root><a>");
    assert!(doc.status().is_fatal());
    assert_eq!(doc.root().unwrap().name(), "root");
    doc.check_integrity().unwrap();
}

#[test]
fn test_binary_document_roundtrip() {
    let mut doc = Document::parse_str(CATALOG);
    doc.header_mut().add_comment("generated", Placement::BeforeBody);
    doc.root_mut()
        .unwrap()
        .add_binary_content(vec![0u8, 1, 2, 0xFF]);

    let bytes = doc.to_binary().unwrap();
    let decoded = Document::from_binary(&bytes).unwrap();
    assert!(decoded.structural_eq(&doc));

    let root = decoded.root().unwrap();
    let last = root.contents().last().unwrap();
    assert!(last.is_binary());
    assert_eq!(last.as_bytes().unwrap().as_slice(), &[0, 1, 2, 0xFF]);

    assert!(matches!(
        Document::from_binary(&bytes[..bytes.len() - 1]),
        Err(XmlError::Binary(_))
    ));
}

#[test]
fn test_paging_is_transparent() {
    let dir = TempDir::new().unwrap();
    let pages = dir.path().join("pages");

    let mut doc = Document::parse_str(CATALOG);
    doc.set_page_store(PageStore::in_dir(&pages)).unwrap();
    let before = compact(&doc);

    assert!(doc.unload(&[0]).unwrap());
    assert!(doc.unload(&[1, 0]).unwrap());
    assert!(pages.join("0.xmltmp").exists());
    assert!(pages.join("1-0.xmltmp").exists());
    assert!(doc.root().unwrap().is_paged_out(0));
    assert_eq!(doc.root().unwrap().paged_out_count(), 2);

    assert_eq!(compact(&doc), before);

    assert!(doc.reload(&[0]).unwrap());
    assert!(!pages.join("0.xmltmp").exists());
    assert!(!doc.reload(&[0]).unwrap());

    drop(doc);
    assert!(!pages.join("1-0.xmltmp").exists());
    assert!(pages.exists());
}

#[test]
fn test_missing_page_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let mut doc = Document::parse_str(CATALOG);
    doc.set_page_store(PageStore::in_dir(dir.path())).unwrap();
    doc.unload(&[2]).unwrap();

    std::fs::remove_file(dir.path().join("2.xmltmp")).unwrap();
    assert!(matches!(doc.reload(&[2]), Err(XmlError::PageMissing(_))));
    assert!(doc.root().unwrap().is_paged_out(2));
}

#[test]
fn test_private_page_store_is_removed() {
    let mut doc = Document::parse_str(CATALOG);
    doc.unload(&[1]).unwrap();
    let page = match &doc.root().unwrap().children()[1] {
        pagedxml::Child::PagedOut(handle) => handle.path().to_path_buf(),
        other => panic!("expected a paged-out child, got {other:?}"),
    };
    let directory = page.parent().unwrap().to_path_buf();
    assert!(page.exists());

    drop(doc);
    assert!(!page.exists());
    assert!(!directory.exists());
}

#[test]
fn test_query_terms_are_anded() {
    let mut doc = Document::parse_str(CATALOG);
    doc.unload(&[0]).unwrap();

    let names: Vec<_> = doc
        .select(r#"? == "book" price < 20"#, 0)
        .unwrap()
        .iter()
        .map(|e| e.attribute("id").unwrap_or_default().to_string())
        .collect();
    assert_eq!(names, vec!["1"]);

    let titles = doc.select(r#"! == "catalog/book/title""#, UNLIMITED_DEPTH).unwrap();
    assert_eq!(titles.len(), 2);
    assert_eq!(titles[1].text(), "Beta");

    assert!(doc.select(r#"? == "title""#, 0).unwrap().is_empty());
    assert_eq!(doc.select("", 0).unwrap().len(), 3);
    assert!(matches!(doc.select("price <", 0), Err(XmlError::Query { .. })));
    assert!(doc.select("price < abc", 0).unwrap().is_empty());
    assert!(doc.select("price >= 1x", 0).unwrap().is_empty());
}

#[test]
fn test_deep_input_is_fatal_not_a_crash() {
    let levels = 5000;
    let text = format!("{}{}", "<a>".repeat(levels), "</a>".repeat(levels));
    let mut doc = Document::parse_str(&text);
    assert_eq!(
        doc.status(),
        ParseStatus::Fatal {
            position: 3 * pagedxml::MAX_NESTING_DEPTH
        }
    );
    doc.check_integrity().unwrap();

    let exported = compact(&doc);
    assert!(exported.contains("<a><a/></a>"));
    assert_eq!(
        doc.select(r#"? == "a""#, UNLIMITED_DEPTH).unwrap().len(),
        pagedxml::MAX_NESTING_DEPTH
    );
    assert!(doc.to_binary().is_ok());
}

struct Rot(u8);

impl CryptoDelegate for Rot {
    fn encrypt(&self, plain: &[u8]) -> pagedxml::Result<Vec<u8>> {
        Ok(plain.iter().map(|b| b.wrapping_add(self.0)).collect())
    }

    fn decrypt(&self, cipher: &[u8]) -> pagedxml::Result<Vec<u8>> {
        Ok(cipher.iter().map(|b| b.wrapping_sub(self.0)).collect())
    }
}

#[test]
fn test_save_and_load_variants() {
    let dir = TempDir::new().unwrap();
    let doc = Document::parse_str(CATALOG);

    let wide = dir.path().join("wide.xml");
    doc.save_with(
        &wide,
        SaveOptions::default()
            .encoding(TextEncoding::Utf16Be)
            .mode(ExportMode::Compact),
    )
    .unwrap();
    let raw = std::fs::read(&wide).unwrap();
    assert_eq!(&raw[..2], &[0xFE, 0xFF]);
    let loaded = Document::load(&wide).unwrap();
    assert!(loaded.header().text.contains("UTF-16"));
    assert!(loaded.root().unwrap().structural_eq(doc.root().unwrap()));

    let secret = dir.path().join("secret.xml");
    let mut encrypted = doc.duplicate().unwrap();
    encrypted.set_crypto(Box::new(Rot(7)));
    encrypted
        .save_with(&secret, SaveOptions::default().mode(ExportMode::Compact))
        .unwrap();
    let delegate: Box<dyn CryptoDelegate> = Box::new(Rot(7));
    let loaded = Document::load_with(&secret, &Default::default(), Some(delegate)).unwrap();
    assert!(loaded.has_crypto());
    assert_eq!(compact(&loaded), compact(&doc));
}

#[test]
fn test_borrowed_children() {
    let shared = Rc::new(Element::new("shared"));
    let mut root = Element::new("root");
    root.add_element(Element::new("own"));
    root.borrow_element(Rc::clone(&shared));

    let mut doc = Document::with_root(root);
    assert!(matches!(doc.unload(&[1]), Err(XmlError::NotOwned(1))));
    assert_eq!(
        compact(&doc),
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><root><own/><shared/></root>"
    );

    let released = doc.root_mut().unwrap().release_borrowed_elements();
    assert_eq!(released.len(), 1);
    assert_eq!(Rc::strong_count(&shared), 2);
    assert_eq!(doc.root().unwrap().child_count(), 1);
}

#[test]
fn test_binary_attribute_codecs() {
    let bytes: Vec<u8> = (0u8..=255).collect();
    let mut element = Element::new("blob");
    element.set_binary_attribute("b64", &bytes, BinaryEncoding::Base64);
    element.set_binary_attribute("qp", &bytes, BinaryEncoding::QuotedPrintable);

    for encoding in [BinaryEncoding::Base64, BinaryEncoding::QuotedPrintable] {
        let name = match encoding {
            BinaryEncoding::Base64 => "b64",
            BinaryEncoding::QuotedPrintable => "qp",
        };
        let decoded = element.binary_attribute(name, encoding).unwrap();
        assert_eq!(decoded.as_slice(), bytes.as_slice());
    }
}

#[test]
fn test_base64_stream_matches_one_shot() {
    let data: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 251) as u8).collect();
    let mut encoder = Base64Encoder::new();
    let mut out = Vec::new();
    for chunk in data.chunks(17) {
        encoder.filter(chunk, &mut out);
    }
    encoder.finish(&mut out);
    assert_eq!(String::from_utf8(out).unwrap(), mime::encode_base64(&data));
}
