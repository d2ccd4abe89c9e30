//! On-disk paging of child subtrees
//!
//! `Element::unload` writes a child subtree to a page file as compact text
//! and replaces the slot with a [`PageHandle`]. `Element::reload` parses the
//! file back and deletes it. A handle owns its file: dropping a paged-out
//! slot removes the file too.
//!
//! Page files are named after the locator of the paged child, e.g. child 2
//! of child 0 of the root is `0-2.xmltmp`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::dom::{Child, Element};
use crate::error::{Result, XmlError};
use crate::export::Exporter;
use crate::parser::{parse_fragment, ParseOptions, ParseStatus};

/// File extension of page files
pub const PAGE_EXTENSION: &str = "xmltmp";

/// Page file name for a locator
pub fn page_file_name(locator: &[usize]) -> String {
    let mut name = locator
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join("-");
    name.push('.');
    name.push_str(PAGE_EXTENSION);
    name
}

#[derive(Debug)]
enum Location {
    /// Created on first use, removed with the store
    Private(Option<TempDir>),
    Directory(PathBuf),
}

/// Where page files are written
#[derive(Debug)]
pub struct PageStore {
    location: Location,
}

impl PageStore {
    /// A private temporary directory, created when the first page is written
    pub fn private() -> Self {
        PageStore {
            location: Location::Private(None),
        }
    }

    /// Page files go to `dir`, which is created if missing and never removed
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        PageStore {
            location: Location::Directory(dir.into()),
        }
    }

    /// The page directory, creating it if needed
    pub fn directory(&mut self) -> Result<&Path> {
        match &mut self.location {
            Location::Private(slot) => {
                if slot.is_none() {
                    let dir = tempfile::Builder::new()
                        .prefix("pagedxml-")
                        .tempdir()
                        .map_err(|e| XmlError::PageUnavailable(e.to_string()))?;
                    log::debug!("created page directory {}", dir.path().display());
                    *slot = Some(dir);
                }
                match slot {
                    Some(dir) => Ok(dir.path()),
                    None => Err(XmlError::PageUnavailable("no page directory".into())),
                }
            }
            Location::Directory(path) => {
                fs::create_dir_all(&*path)?;
                Ok(path)
            }
        }
    }

    /// Path of the page file for `locator`
    pub fn page_path(&mut self, locator: &[usize]) -> Result<PathBuf> {
        Ok(self.directory()?.join(page_file_name(locator)))
    }
}

impl Default for PageStore {
    fn default() -> Self {
        PageStore::private()
    }
}

/// A paged-out subtree; owns its page file
#[derive(Debug)]
pub struct PageHandle {
    path: PathBuf,
}

impl PageHandle {
    pub(crate) fn new(path: PathBuf) -> Self {
        PageHandle { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the page file into a fresh subtree; the file is left in place
    pub fn load(&self) -> Result<Element> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(XmlError::PageMissing(self.path.clone()))
            }
            Err(e) => return Err(e.into()),
        };

        let (root, status) = parse_fragment(&bytes, &ParseOptions::default());
        if let ParseStatus::Fatal { position } = status {
            return Err(XmlError::Parse {
                message: format!("corrupt page file {}", self.path.display()),
                position,
            });
        }
        root.ok_or_else(|| XmlError::Parse {
            message: format!("page file {} holds no element", self.path.display()),
            position: 0,
        })
    }
}

impl Drop for PageHandle {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => log::trace!("removed page file {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => log::warn!("could not remove page file {}: {e}", self.path.display()),
        }
    }
}

/// Whether `reloaded` is what `original` becomes after export and reparse
///
/// Contents are compared as the text each insertion position exports to:
/// reload merges neighbouring runs and yields binary payloads as Base64.
fn reads_back_as(original: &Element, reloaded: &Element) -> bool {
    let same_attributes = original.attributes().len() == reloaded.attributes().len()
        && original
            .attributes()
            .iter()
            .zip(reloaded.attributes())
            .all(|(a, b)| a.same_as(b));
    if original.name() != reloaded.name()
        || !same_attributes
        || original.comments() != reloaded.comments()
        || original.cdata() != reloaded.cdata()
        || original.child_count() != reloaded.child_count()
        || exported_runs(original) != exported_runs(reloaded)
    {
        return false;
    }
    (0..original.child_count()).all(|i| match (original.resolve_child(i), reloaded.child(i)) {
        (Ok(a), Some(b)) => reads_back_as(&a, b),
        _ => false,
    })
}

/// Non-empty content text per insertion position, neighbours joined
fn exported_runs(element: &Element) -> Vec<(usize, String)> {
    let mut contents: Vec<_> = element.contents().iter().collect();
    contents.sort_by_key(|c| c.position);

    let mut runs: Vec<(usize, String)> = Vec::new();
    for content in contents {
        let text = content.export_text();
        if text.is_empty() {
            continue;
        }
        match runs.last_mut() {
            Some((position, run)) if *position == content.position => run.push_str(&text),
            _ => runs.push((content.position, text.into_owned())),
        }
    }
    runs
}

impl Element {
    /// Write child `index` to a page file and drop it from memory
    ///
    /// `locator` is the path of `self` from the root; it names the file.
    /// Returns `Ok(false)` without doing anything if the child is already
    /// paged out or its page file already exists. A borrowed child cannot be
    /// paged out. A child whose page file would not parse back into the same
    /// subtree is refused with [`XmlError::NotPageable`] and stays resident.
    pub fn unload(&mut self, index: usize, store: &mut PageStore, locator: &[usize]) -> Result<bool> {
        let len = self.child_count();
        match self.children().get(index) {
            None => return Err(XmlError::out_of_range(index, len)),
            Some(Child::PagedOut(_)) => return Ok(false),
            Some(Child::Borrowed(_)) => return Err(XmlError::NotOwned(index)),
            Some(Child::Owned(_)) => {}
        }

        let mut key = locator.to_vec();
        key.push(index);
        let path = store.page_path(&key)?;
        if path.exists() {
            log::warn!(
                "page file {} already exists; child {index} stays resident",
                path.display()
            );
            return Ok(false);
        }

        let Child::Owned(child) = &mut self.children_mut()[index] else {
            return Ok(false);
        };
        child.reload_all()?;
        let bytes = Exporter::compact().to_vec(child)?;
        if let Err(e) = fs::write(&path, &bytes) {
            let _ = fs::remove_file(&path);
            return Err(e.into());
        }

        let (reloaded, status) = parse_fragment(&bytes, &ParseOptions::default());
        let intact = !status.is_fatal()
            && reloaded.is_some_and(|reloaded| reads_back_as(child, &reloaded));
        if !intact {
            if let Err(e) = fs::remove_file(&path) {
                log::warn!("could not remove page file {}: {e}", path.display());
            }
            log::warn!("child {index} ({:?}) does not read back from text", child.name());
            return Err(XmlError::NotPageable {
                index,
                message: format!("<{}> does not survive a text round trip", child.name()),
            });
        }
        log::trace!("paged out {} bytes to {}", bytes.len(), path.display());

        self.children_mut()[index] = Child::PagedOut(PageHandle::new(path));
        Ok(true)
    }

    /// Bring child `index` back from its page file
    ///
    /// Returns `Ok(false)` if it is already resident. On failure the slot
    /// stays paged out.
    pub fn reload(&mut self, index: usize) -> Result<bool> {
        let len = self.child_count();
        let slot = self
            .children_mut()
            .get_mut(index)
            .ok_or_else(|| XmlError::out_of_range(index, len))?;
        let Child::PagedOut(handle) = slot else {
            return Ok(false);
        };
        let element = handle.load()?;
        log::trace!("reloaded child {index} from {}", handle.path().display());
        // Dropping the handle deletes the page file
        *slot = Child::Owned(Box::new(element));
        Ok(true)
    }

    /// Reload every paged-out descendant; returns how many slots were reloaded
    pub fn reload_all(&mut self) -> Result<usize> {
        self.reload_to_depth(usize::MAX)
    }

    /// Reload paged-out descendants down to `depth` levels below the
    /// children (0 reloads only the children)
    pub fn reload_to_depth(&mut self, depth: usize) -> Result<usize> {
        let mut count = 0;
        let mut pending: Vec<(&mut Element, usize)> = vec![(self, depth)];
        while let Some((element, depth)) = pending.pop() {
            for index in 0..element.child_count() {
                if element.reload(index)? {
                    count += 1;
                }
            }
            if depth == 0 {
                continue;
            }
            for child in element.children_mut() {
                if let Child::Owned(child) = child {
                    pending.push((&mut **child, depth - 1));
                }
            }
        }
        Ok(count)
    }

    /// Number of paged-out slots in this subtree (resident part only)
    pub fn paged_out_count(&self) -> usize {
        let mut count = 0;
        let mut pending: Vec<&Element> = vec![self];
        while let Some(element) = pending.pop() {
            for child in element.children() {
                match child {
                    Child::PagedOut(_) => count += 1,
                    Child::Owned(e) => pending.push(e),
                    Child::Borrowed(e) => pending.push(e),
                }
            }
        }
        count
    }
}
