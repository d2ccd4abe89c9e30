//! XML Document - header, root element and per-document services
//!
//! Besides the tree a document owns:
//! - the page store its children are paged out to
//! - an LRU cache of compiled queries
//! - an optional crypto delegate applied to whole saved/loaded images

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::element::Element;
use super::header::Header;
use crate::core::encoding::{convert_from_utf8, convert_to_utf8, with_declared_encoding, TextEncoding};
use crate::error::{Result, XmlError};
use crate::export::{ExportOptions, Exporter, SaveOptions};
use crate::paging::PageStore;
use crate::parser::{parse_document, ParseOptions, ParseStatus};
use crate::query::{self, QueryCache};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Whole-image transform applied on save and undone on load
pub trait CryptoDelegate {
    fn encrypt(&self, plain: &[u8]) -> Result<Vec<u8>>;
    fn decrypt(&self, cipher: &[u8]) -> Result<Vec<u8>>;
}

/// Any delegate error surfaces as [`XmlError::Crypto`]
fn delegate_failure(step: &str, path: &Path, error: XmlError) -> XmlError {
    match error {
        XmlError::Crypto(_) => error,
        other => XmlError::Crypto(format!("{step} {}: {other}", path.display())),
    }
}

/// An XML document
pub struct Document {
    header: Header,
    root: Option<Element>,
    path: Option<PathBuf>,
    status: ParseStatus,
    crypto: Option<Box<dyn CryptoDelegate>>,
    queries: QueryCache,
    // Dropped after `root` so page handles can remove their files first
    pages: PageStore,
}

impl Document {
    /// Empty document with the default header and no root
    pub fn new() -> Self {
        Document {
            header: Header::default(),
            root: None,
            path: None,
            status: ParseStatus::Ok,
            crypto: None,
            queries: QueryCache::default(),
            pages: PageStore::private(),
        }
    }

    pub fn with_root(root: Element) -> Self {
        Document {
            root: Some(root),
            ..Document::new()
        }
    }

    /// Parse a UTF-8 document image with default options
    pub fn parse(input: &[u8]) -> Self {
        Self::parse_with(input, &ParseOptions::default())
    }

    pub fn parse_str(input: &str) -> Self {
        Self::parse(input.as_bytes())
    }

    /// Parse a UTF-8 document image; a leading byte order mark is skipped
    ///
    /// Never fails: check [`Document::status`] for the outcome.
    pub fn parse_with(input: &[u8], options: &ParseOptions) -> Self {
        let input = input.strip_prefix(UTF8_BOM).unwrap_or(input);
        let parsed = parse_document(input, options);
        Document {
            header: parsed.header,
            root: parsed.root,
            status: parsed.status,
            ..Document::new()
        }
    }

    /// Read and parse a file with default options and no crypto delegate
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with(path, &ParseOptions::default(), None)
    }

    /// Read a file, undo the crypto delegate, convert UTF-16 to UTF-8 and
    /// parse
    ///
    /// The delegate stays attached for later saves.
    pub fn load_with(
        path: impl AsRef<Path>,
        options: &ParseOptions,
        crypto: Option<Box<dyn CryptoDelegate>>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let mut bytes = fs::read(path)?;
        if let Some(delegate) = &crypto {
            bytes = delegate
                .decrypt(&bytes)
                .map_err(|e| delegate_failure("decrypt", path, e))?;
        }
        let text = convert_to_utf8(bytes)?;

        let mut document = Self::parse_with(&text, options);
        document.path = Some(path.to_path_buf());
        document.crypto = crypto;
        log::debug!(
            "loaded {} ({} bytes, status {:?})",
            path.display(),
            text.len(),
            document.status
        );
        Ok(document)
    }

    // ========== Accessors ==========

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    pub fn set_header(&mut self, header: Header) -> Header {
        std::mem::replace(&mut self.header, header)
    }

    pub fn root(&self) -> Option<&Element> {
        self.root.as_ref()
    }

    pub fn root_mut(&mut self) -> Option<&mut Element> {
        self.root.as_mut()
    }

    /// Install a new root, returning the old one fully resident
    pub fn set_root(&mut self, root: Element) -> Result<Option<Element>> {
        let old = self.take_root()?;
        self.root = Some(root);
        Ok(old)
    }

    /// Detach the root
    ///
    /// Its paged-out descendants are reloaded first, since their page files
    /// belong to this document's store.
    pub fn take_root(&mut self) -> Result<Option<Element>> {
        if let Some(root) = &mut self.root {
            root.reload_all()?;
        }
        Ok(self.root.take())
    }

    pub fn status(&self) -> ParseStatus {
        self.status
    }

    /// File the document was loaded from
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = Some(path.into());
    }

    pub fn set_crypto(&mut self, delegate: Box<dyn CryptoDelegate>) {
        self.crypto = Some(delegate);
    }

    pub fn clear_crypto(&mut self) -> Option<Box<dyn CryptoDelegate>> {
        self.crypto.take()
    }

    pub fn has_crypto(&self) -> bool {
        self.crypto.is_some()
    }

    pub fn page_store(&self) -> &PageStore {
        &self.pages
    }

    /// Switch page stores; everything paged out is reloaded first
    pub fn set_page_store(&mut self, store: PageStore) -> Result<()> {
        if let Some(root) = &mut self.root {
            root.reload_all()?;
        }
        self.pages = store;
        Ok(())
    }

    pub fn query_cache(&self) -> &QueryCache {
        &self.queries
    }

    // ========== Export / save ==========

    /// Write header, header comments and root to `out`
    pub fn export<W: Write>(&self, out: &mut W, options: ExportOptions) -> Result<()> {
        Exporter::new(options).export_document(self, out)
    }

    pub fn to_text(&self, options: ExportOptions) -> Result<String> {
        let mut out = Vec::new();
        self.export(&mut out, options)?;
        String::from_utf8(out).map_err(|e| XmlError::Encoding(e.to_string()))
    }

    /// Save to the path the document was loaded from
    pub fn save(&self) -> Result<()> {
        match &self.path {
            Some(path) => self.save_with(path, SaveOptions::default()),
            None => Err(XmlError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "document has no file path",
            ))),
        }
    }

    pub fn save_as(&self, path: impl AsRef<Path>) -> Result<()> {
        self.save_with(path, SaveOptions::default())
    }

    /// Save with an explicit encoding and layout
    ///
    /// Plain UTF-8 output streams straight to the file. UTF-16 or encrypted
    /// output is rendered in memory first.
    pub fn save_with(&self, path: impl AsRef<Path>, options: SaveOptions) -> Result<()> {
        let path = path.as_ref();
        let exporter = Exporter::new(ExportOptions::default().mode(options.mode));
        let header = if options.encoding.is_wide() || self.header.text.contains("encoding=") {
            with_declared_encoding(&self.header.text, options.encoding)
        } else {
            self.header.text.clone()
        };

        if self.crypto.is_none() && options.encoding == TextEncoding::Utf8 {
            let mut out = BufWriter::new(File::create(path)?);
            exporter.write_document(&mut out, self, &header)?;
            out.flush()?;
        } else {
            let mut rendered = Vec::new();
            exporter.write_document(&mut rendered, self, &header)?;
            let mut bytes = if options.encoding.is_wide() {
                let text = String::from_utf8(rendered)
                    .map_err(|e| XmlError::Encoding(e.to_string()))?;
                convert_from_utf8(&text, options.encoding, true)
            } else {
                rendered
            };
            if let Some(delegate) = &self.crypto {
                bytes = delegate
                    .encrypt(&bytes)
                    .map_err(|e| delegate_failure("encrypt", path, e))?;
            }
            fs::write(path, bytes)?;
        }

        log::debug!(
            "saved {} as {}{}",
            path.display(),
            options.encoding.label(),
            if self.crypto.is_some() { " (encrypted)" } else { "" }
        );
        Ok(())
    }

    // ========== Paging ==========

    /// Page out the element at `locator` (child indices from the root)
    pub fn unload(&mut self, locator: &[usize]) -> Result<bool> {
        let Some((&index, parent)) = locator.split_last() else {
            return Err(XmlError::PageUnavailable(
                "the root element cannot be paged out".into(),
            ));
        };
        let Document { root, pages, .. } = self;
        let root = root.as_mut().ok_or(XmlError::out_of_range(locator[0], 0))?;
        descend(root, parent)?.unload(index, pages, parent)
    }

    /// Bring the element at `locator` back from its page file
    pub fn reload(&mut self, locator: &[usize]) -> Result<bool> {
        let Some((&index, parent)) = locator.split_last() else {
            return Ok(false);
        };
        let root = self
            .root
            .as_mut()
            .ok_or(XmlError::out_of_range(locator[0], 0))?;
        descend(root, parent)?.reload(index)
    }

    /// Element at `locator` for mutation, reloading the path to it
    pub fn element_mut(&mut self, locator: &[usize]) -> Result<&mut Element> {
        let root = self
            .root
            .as_mut()
            .ok_or(XmlError::out_of_range(locator.first().copied().unwrap_or(0), 0))?;
        descend(root, locator)
    }

    // ========== Query ==========

    /// Elements below the root matching `expr`, in pre-order
    ///
    /// Compiled expressions are cached per document.
    pub fn select(&mut self, expr: &str, depth: usize) -> Result<Vec<&Element>> {
        let compiled = self.queries.compile(expr)?;
        let Some(root) = self.root.as_mut() else {
            return Ok(Vec::new());
        };
        root.reload_to_depth(depth)?;
        Ok(query::select(root, &compiled, depth))
    }

    // ========== Whole-document operations ==========

    /// Deep copy of header and tree; the copy has its own page store and no
    /// crypto delegate
    pub fn duplicate(&self) -> Result<Document> {
        let root = match &self.root {
            Some(root) => Some(root.duplicate()?),
            None => None,
        };
        Ok(Document {
            header: self.header.clone(),
            root,
            path: self.path.clone(),
            status: self.status,
            ..Document::new()
        })
    }

    /// Same header text, header comments and root structure
    pub fn structural_eq(&self, other: &Document) -> bool {
        self.header == other.header
            && match (&self.root, &other.root) {
                (Some(a), Some(b)) => a.structural_eq(b),
                (None, None) => true,
                _ => false,
            }
    }

    pub fn check_integrity(&self) -> Result<()> {
        match &self.root {
            Some(root) => root.check_integrity(),
            None => Ok(()),
        }
    }

    pub fn memory_usage(&self) -> usize {
        std::mem::size_of::<Document>()
            + self.header.text.capacity()
            + self
                .header
                .comments
                .iter()
                .map(|c| c.text.capacity())
                .sum::<usize>()
            + self.root.as_ref().map_or(0, Element::memory_usage)
    }
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("header", &self.header)
            .field("root", &self.root)
            .field("path", &self.path)
            .field("status", &self.status)
            .field("crypto", &self.crypto.is_some())
            .field("pages", &self.pages)
            .finish()
    }
}

fn descend<'a>(root: &'a mut Element, locator: &[usize]) -> Result<&'a mut Element> {
    let mut current = root;
    for &index in locator {
        current = current.child_mut(index)?;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Placement;
    use crate::export::ExportMode;

    /// XOR "cipher" for exercising the delegate path
    struct Xor(u8);

    impl CryptoDelegate for Xor {
        fn encrypt(&self, plain: &[u8]) -> Result<Vec<u8>> {
            Ok(plain.iter().map(|b| b ^ self.0).collect())
        }

        fn decrypt(&self, cipher: &[u8]) -> Result<Vec<u8>> {
            self.encrypt(cipher)
        }
    }

    const SAMPLE: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
        <!--top-->\n\
        <catalog>\n  <book id=\"1\" lang=\"en\">Rust &amp; You</book>\n  \
        <book id=\"2\" lang=\"de\">\n    <title>Zwei</title>\n  </book>\n</catalog>\n";

    #[test]
    fn test_new_document() {
        let doc = Document::new();
        assert_eq!(doc.header().text, crate::dom::DEFAULT_HEADER);
        assert!(doc.root().is_none());
        assert_eq!(doc.status(), ParseStatus::Ok);
        assert_eq!(
            doc.to_text(ExportOptions::default()).unwrap(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"
        );
    }

    #[test]
    fn test_parse_and_export_is_stable() {
        let doc = Document::parse_str(SAMPLE);
        assert_eq!(doc.status(), ParseStatus::Ok);
        assert_eq!(doc.header().comments.len(), 1);
        let once = doc.to_text(ExportOptions::default()).unwrap();
        assert_eq!(once, SAMPLE);
        let again = Document::parse_str(&once);
        assert!(again.structural_eq(&doc));
    }

    #[test]
    fn test_bom_is_skipped() {
        let mut input = UTF8_BOM.to_vec();
        input.extend_from_slice(b"<?xml version=\"1.0\"?><r/>");
        let doc = Document::parse(&input);
        assert_eq!(doc.status(), ParseStatus::Ok);
        assert_eq!(doc.root().unwrap().name(), "r");
    }

    #[test]
    fn test_save_load_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.xml");
        let doc = Document::parse_str(SAMPLE);
        doc.save_as(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), SAMPLE);

        let loaded = Document::load(&path).unwrap();
        assert!(loaded.structural_eq(&doc));
        assert_eq!(loaded.path(), Some(path.as_path()));
        loaded.save().unwrap();
    }

    #[test]
    fn test_save_load_utf16() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.xml");
        let doc = Document::parse_str(SAMPLE);
        let options = SaveOptions::default().encoding(TextEncoding::Utf16Le);
        doc.save_with(&path, options).unwrap();

        let raw = fs::read(&path).unwrap();
        assert_eq!(&raw[..2], &[0xFF, 0xFE]);

        let loaded = Document::load(&path).unwrap();
        assert_eq!(loaded.header().text, "xml version=\"1.0\" encoding=\"UTF-16\"");
        assert!(loaded.root().unwrap().structural_eq(doc.root().unwrap()));
    }

    #[test]
    fn test_encrypted_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret.xml");
        let mut doc = Document::parse_str(SAMPLE);
        doc.set_crypto(Box::new(Xor(0x5A)));
        doc.save_as(&path).unwrap();

        let raw = fs::read(&path).unwrap();
        assert!(!raw.starts_with(b"<?xml"));

        let loaded =
            Document::load_with(&path, &ParseOptions::default(), Some(Box::new(Xor(0x5A))))
                .unwrap();
        assert!(loaded.has_crypto());
        assert!(loaded.structural_eq(&doc));
    }

    /// Delegate that rejects every image
    struct Broken;

    impl CryptoDelegate for Broken {
        fn encrypt(&self, _plain: &[u8]) -> Result<Vec<u8>> {
            Err(std::io::Error::other("no key").into())
        }

        fn decrypt(&self, _cipher: &[u8]) -> Result<Vec<u8>> {
            Err(XmlError::Crypto("bad padding".into()))
        }
    }

    #[test]
    fn test_delegate_failures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret.xml");
        let mut doc = Document::parse_str(SAMPLE);
        doc.set_crypto(Box::new(Broken));
        match doc.save_as(&path) {
            Err(XmlError::Crypto(message)) => assert!(message.contains("no key")),
            other => panic!("expected a crypto error, got {other:?}"),
        }
        assert!(!path.exists());

        fs::write(&path, SAMPLE).unwrap();
        match Document::load_with(&path, &ParseOptions::default(), Some(Box::new(Broken))) {
            Err(XmlError::Crypto(message)) => assert_eq!(message, "bad padding"),
            other => panic!("expected a crypto error, got {other:?}"),
        }
    }

    #[test]
    fn test_compact_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("compact.xml");
        let mut doc = Document::with_root(Element::new("r"));
        doc.root_mut().unwrap().add_element(Element::new("a"));
        doc.header_mut().add_comment("end", Placement::AfterBody);
        doc.save_with(&path, SaveOptions::default().mode(ExportMode::Compact))
            .unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><r><a/></r><!--end-->"
        );
    }

    #[test]
    fn test_unload_reload_by_locator() {
        let mut doc = Document::parse_str(SAMPLE);
        let original = doc.duplicate().unwrap();

        assert!(doc.unload(&[1, 0]).unwrap());
        assert!(doc.root().unwrap().child(1).unwrap().is_paged_out(0));
        assert!(doc.structural_eq(&original));
        assert!(doc.check_integrity().is_ok());

        assert!(doc.reload(&[1, 0]).unwrap());
        assert!(!doc.reload(&[1, 0]).unwrap());
        assert!(doc.structural_eq(&original));
        assert!(doc.unload(&[]).is_err());
    }

    #[test]
    fn test_take_root_reloads_pages() {
        let mut doc = Document::parse_str(SAMPLE);
        doc.unload(&[0]).unwrap();
        let root = doc.take_root().unwrap().unwrap();
        drop(doc);
        assert!(!root.is_paged_out(0));
        assert_eq!(root.child(0).unwrap().attribute("id"), Some("1"));
    }

    #[test]
    fn test_select_uses_cache_and_reloads() {
        let mut doc = Document::parse_str(SAMPLE);
        doc.unload(&[1]).unwrap();
        let found = doc
            .select(r#"? == "book" lang == "DE""#, crate::query::UNLIMITED_DEPTH)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].attribute("id"), Some("2"));

        let titles = doc.select(r#"! == "catalog/book/title""#, 5).unwrap();
        assert_eq!(titles.len(), 1);
        doc.select(r#"? == "book" lang == "DE""#, 0).unwrap();
        assert_eq!(doc.query_cache().len(), 2);
        assert!(doc.select("bad ==", 0).is_err());
    }

    #[test]
    fn test_element_mut_by_locator() {
        let mut doc = Document::parse_str(SAMPLE);
        doc.element_mut(&[1, 0]).unwrap().add_content("!");
        let title = doc.root().unwrap().child(1).unwrap().child(0).unwrap();
        assert_eq!(title.text(), "Zwei!");
        assert!(doc.element_mut(&[9]).is_err());
    }
}
