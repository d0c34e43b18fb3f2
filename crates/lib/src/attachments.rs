//! Attachment slots: the files currently marked "attached" for the next message.
//!
//! A slot holds either a local file (uploaded as multipart bytes) or a backend file reference
//! (a filename the server already has, sent by name). Slots survive a send and are cleared when
//! another chat is loaded.

/// Maximum number of attachment slots.
pub const MAX_ATTACHMENTS: usize = 5;

/// A file read from local disk (or any other byte source) on the client side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl LocalFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachedFile {
    Local(LocalFile),
    /// Filename previously produced by a scrape or upload on the backend.
    BackendRef(String),
}

impl AttachedFile {
    pub fn name(&self) -> &str {
        match self {
            AttachedFile::Local(f) => &f.name,
            AttachedFile::BackendRef(name) => name,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("at most {0} attachments are allowed")]
pub struct SlotsFull(pub usize);

/// Ordered, bounded list of attachments.
#[derive(Debug, Clone, Default)]
pub struct AttachmentSlots {
    slots: Vec<AttachedFile>,
}

impl AttachmentSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a file. A file with the same name replaces the existing slot in place.
    pub fn attach(&mut self, file: AttachedFile) -> Result<(), SlotsFull> {
        if let Some(existing) = self.slots.iter_mut().find(|s| s.name() == file.name()) {
            *existing = file;
            return Ok(());
        }
        if self.slots.len() >= MAX_ATTACHMENTS {
            return Err(SlotsFull(MAX_ATTACHMENTS));
        }
        self.slots.push(file);
        Ok(())
    }

    /// Remove the slot with the given name; returns whether one was removed.
    pub fn detach(&mut self, name: &str) -> bool {
        let before = self.slots.len();
        self.slots.retain(|s| s.name() != name);
        self.slots.len() != before
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// No free slot left; only a same-name replace would still succeed.
    pub fn is_full(&self) -> bool {
        self.slots.len() >= MAX_ATTACHMENTS
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttachedFile> {
        self.slots.iter()
    }

    pub fn local_files(&self) -> Vec<LocalFile> {
        self.slots
            .iter()
            .filter_map(|s| match s {
                AttachedFile::Local(f) => Some(f.clone()),
                AttachedFile::BackendRef(_) => None,
            })
            .collect()
    }

    pub fn backend_refs(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter_map(|s| match s {
                AttachedFile::BackendRef(name) => Some(name.clone()),
                AttachedFile::Local(_) => None,
            })
            .collect()
    }
}
