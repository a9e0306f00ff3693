//! Document store seams.
//!
//! The bank only needs to list folders, read files and write files back.
//! [`LocalFolderStore`] maps those onto a directory tree; [`MemoryStore`]
//! keeps everything in memory for tests and dry runs. A remote drive client
//! implements the same two traits.

use crate::error::{IndicatorBankError, Result};
use crate::export::workbook_to_bytes;
use crate::normalize::has_workbook_extension;
use crate::workbook::Workbook;
use log::{debug, info, warn};
use serde::Serialize;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DocumentKind {
    Folder,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentEntry {
    pub id: String,
    pub name: String,
    pub kind: DocumentKind,
}

impl DocumentEntry {
    pub fn is_folder(&self) -> bool {
        self.kind == DocumentKind::Folder
    }
}

pub trait DocumentSource {
    fn list_documents(&self, folder: &str) -> Result<Vec<DocumentEntry>>;

    fn read_bytes(&self, id: &str) -> Result<Vec<u8>>;

    fn read_workbook(&self, id: &str) -> Result<Workbook> {
        Workbook::from_xlsx_bytes(&self.read_bytes(id)?)
    }

    fn find_file(&self, folder: &str, name: &str) -> Result<Option<DocumentEntry>> {
        Ok(self
            .list_documents(folder)?
            .into_iter()
            .find(|d| !d.is_folder() && d.name == name))
    }
}

pub trait DocumentSink {
    /// Overwrites `target_id` when given, otherwise creates `name` in `folder`.
    /// Returns the id of the written document.
    fn create_or_replace(
        &self,
        bytes: &[u8],
        target_id: Option<&str>,
        name: &str,
        folder: &str,
    ) -> Result<String>;
}

/// Subfolder of `parent` named `preferred` (case-insensitive), otherwise the
/// last subfolder by name.
pub fn select_folder<S: DocumentSource + ?Sized>(
    source: &S,
    parent: &str,
    preferred: &str,
) -> Result<DocumentEntry> {
    let mut folders: Vec<DocumentEntry> = source
        .list_documents(parent)?
        .into_iter()
        .filter(|d| d.is_folder())
        .collect();

    if folders.is_empty() {
        return Err(IndicatorBankError::NoFolders(parent.to_string()));
    }

    let preferred = preferred.to_lowercase();
    if let Some(pos) = folders
        .iter()
        .position(|f| f.name.to_lowercase() == preferred)
    {
        return Ok(folders.swap_remove(pos));
    }

    folders.sort_by(|a, b| a.name.cmp(&b.name));
    let chosen = folders.pop().ok_or_else(|| IndicatorBankError::NoFolders(parent.to_string()))?;
    debug!(
        "No folder named '{}' under {}, using '{}'",
        preferred, parent, chosen.name
    );
    Ok(chosen)
}

/// Workbooks under `root/<area>/<year>/`. Areas without a folder for `year`
/// are skipped.
pub fn discover_fichas<S: DocumentSource + ?Sized>(
    source: &S,
    root: &str,
    year: i32,
) -> Result<Vec<DocumentEntry>> {
    let year_name = year.to_string();
    let mut fichas = Vec::new();

    for area in source.list_documents(root)?.into_iter().filter(|d| d.is_folder()) {
        let year_folder = source
            .list_documents(&area.id)?
            .into_iter()
            .find(|d| d.is_folder() && d.name == year_name);

        let Some(year_folder) = year_folder else {
            warn!("Area '{}' has no folder for {}", area.name, year_name);
            continue;
        };

        let files: Vec<DocumentEntry> = source
            .list_documents(&year_folder.id)?
            .into_iter()
            .filter(|d| !d.is_folder() && has_workbook_extension(&d.name))
            .collect();
        info!("Area '{}': {} fichas", area.name, files.len());
        fichas.extend(files);
    }

    Ok(fichas)
}

/// Directory-backed store. Ids are `/`-separated paths relative to the root.
#[derive(Debug, Clone)]
pub struct LocalFolderStore {
    root: PathBuf,
}

impl LocalFolderStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, id: &str) -> PathBuf {
        id.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }
}

fn join_id(folder: &str, name: &str) -> String {
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", folder.trim_end_matches('/'), name)
    }
}

impl DocumentSource for LocalFolderStore {
    fn list_documents(&self, folder: &str) -> Result<Vec<DocumentEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(self.resolve(folder))? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let kind = if entry.file_type()?.is_dir() {
                DocumentKind::Folder
            } else {
                DocumentKind::File
            };
            entries.push(DocumentEntry {
                id: join_id(folder, &name),
                name,
                kind,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read_bytes(&self, id: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.resolve(id))?)
    }
}

impl DocumentSink for LocalFolderStore {
    fn create_or_replace(
        &self,
        bytes: &[u8],
        target_id: Option<&str>,
        name: &str,
        folder: &str,
    ) -> Result<String> {
        let id = match target_id {
            Some(id) => id.to_string(),
            None => join_id(folder, name),
        };
        let path = self.resolve(&id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(id)
    }
}

#[derive(Debug, Clone)]
enum StoredContent {
    Folder,
    Bytes(Vec<u8>),
    Workbook(Workbook),
}

#[derive(Debug, Clone)]
struct StoredDocument {
    id: String,
    name: String,
    parent: String,
    content: StoredContent,
}

/// In-memory store. Ids are `parent/name`; folders need not be declared
/// before files are added to them.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RefCell<Vec<StoredDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, parent: &str, name: &str, content: StoredContent) -> String {
        let mut documents = self.documents.borrow_mut();
        let base = join_id(parent, name);
        let mut id = base.clone();
        let mut n = 1;
        while documents.iter().any(|d| d.id == id) {
            n += 1;
            id = format!("{}#{}", base, n);
        }
        documents.push(StoredDocument {
            id: id.clone(),
            name: name.to_string(),
            parent: parent.to_string(),
            content,
        });
        id
    }

    pub fn add_folder(&mut self, parent: &str, name: &str) -> String {
        let id = join_id(parent, name);
        if self.documents.borrow().iter().any(|d| d.id == id) {
            return id;
        }
        self.insert(parent, name, StoredContent::Folder)
    }

    pub fn add_file(&mut self, folder: &str, name: &str, bytes: Vec<u8>) -> String {
        self.insert(folder, name, StoredContent::Bytes(bytes))
    }

    pub fn add_workbook(&mut self, folder: &str, name: &str, workbook: &Workbook) -> String {
        self.insert(folder, name, StoredContent::Workbook(workbook.clone()))
    }

    pub fn file_names(&self, folder: &str) -> Vec<String> {
        self.documents
            .borrow()
            .iter()
            .filter(|d| d.parent == folder && !matches!(d.content, StoredContent::Folder))
            .map(|d| d.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.documents.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.borrow().is_empty()
    }

    fn stored(&self, id: &str) -> Result<StoredContent> {
        self.documents
            .borrow()
            .iter()
            .find(|d| d.id == id)
            .map(|d| d.content.clone())
            .ok_or_else(|| IndicatorBankError::DocumentNotFound(id.to_string()))
    }
}

impl DocumentSource for MemoryStore {
    fn list_documents(&self, folder: &str) -> Result<Vec<DocumentEntry>> {
        let documents = self.documents.borrow();
        let mut entries: Vec<DocumentEntry> = documents
            .iter()
            .filter(|d| d.parent == folder)
            .map(|d| DocumentEntry {
                id: d.id.clone(),
                name: d.name.clone(),
                kind: match d.content {
                    StoredContent::Folder => DocumentKind::Folder,
                    _ => DocumentKind::File,
                },
            })
            .collect();

        // an undeclared folder still exists if something lives under it
        for d in documents.iter() {
            if let Some(rest) = d.parent.strip_prefix(folder) {
                let child = rest.trim_start_matches('/').split('/').next().unwrap_or("");
                let child_id = join_id(folder, child);
                if !child.is_empty()
                    && (folder.is_empty() || rest.starts_with('/'))
                    && !entries.iter().any(|e| e.id == child_id)
                {
                    entries.push(DocumentEntry {
                        id: child_id,
                        name: child.to_string(),
                        kind: DocumentKind::Folder,
                    });
                }
            }
        }

        Ok(entries)
    }

    fn read_bytes(&self, id: &str) -> Result<Vec<u8>> {
        match self.stored(id)? {
            StoredContent::Bytes(bytes) => Ok(bytes),
            StoredContent::Workbook(workbook) => workbook_to_bytes(&workbook),
            StoredContent::Folder => Err(IndicatorBankError::Source(format!(
                "'{}' is a folder",
                id
            ))),
        }
    }

    fn read_workbook(&self, id: &str) -> Result<Workbook> {
        match self.stored(id)? {
            StoredContent::Workbook(workbook) => Ok(workbook),
            StoredContent::Bytes(bytes) => Workbook::from_xlsx_bytes(&bytes),
            StoredContent::Folder => Err(IndicatorBankError::Source(format!(
                "'{}' is a folder",
                id
            ))),
        }
    }
}

impl DocumentSink for MemoryStore {
    fn create_or_replace(
        &self,
        bytes: &[u8],
        target_id: Option<&str>,
        name: &str,
        folder: &str,
    ) -> Result<String> {
        if let Some(id) = target_id {
            let mut documents = self.documents.borrow_mut();
            if let Some(doc) = documents.iter_mut().find(|d| d.id == id) {
                doc.content = StoredContent::Bytes(bytes.to_vec());
                return Ok(id.to_string());
            }
        }
        Ok(self.insert(folder, name, StoredContent::Bytes(bytes.to_vec())))
    }
}
