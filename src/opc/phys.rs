//! Physical access to a ZIP-based OPC package.
//!
//! Reading loads the whole archive into memory; packages this engine handles
//! are small template and output documents, and the in-memory model is what
//! the assembly passes mutate. Writing serializes all members with Deflate
//! compression.

use crate::opc::error::{OpcError, Result};
use crate::opc::packuri::PackUri;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Reader over the members of a ZIP-based package.
#[derive(Debug)]
pub struct PhysReader {
    /// Member name -> decompressed content
    members: HashMap<String, Vec<u8>>,
}

impl PhysReader {
    /// Open a package file and decompress all members.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(OpcError::PackageNotFound(path.display().to_string()));
        }
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Read a package from an in-memory ZIP archive.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;
        let mut members = HashMap::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let mut content = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut content)?;
            members.insert(file.name().to_string(), content);
        }

        Ok(Self { members })
    }

    /// Get the content of a member by its PackUri, if present.
    pub fn blob_for(&self, pack_uri: &PackUri) -> Option<&[u8]> {
        self.members.get(pack_uri.membername()).map(Vec::as_slice)
    }

    /// Iterate over all (membername, content) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.members
            .iter()
            .map(|(name, blob)| (name.as_str(), blob.as_slice()))
    }

    /// Number of members in the package.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if the package has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Writer that serializes package members to an in-memory ZIP archive.
pub struct PhysWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
}

impl PhysWriter {
    /// Create a new package writer that writes to memory.
    pub fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
        }
    }

    /// Write one member with Deflate compression.
    pub fn write(&mut self, pack_uri: &PackUri, blob: &[u8]) -> Result<()> {
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.zip.start_file(pack_uri.membername(), options)?;
        self.zip.write_all(blob)?;
        Ok(())
    }

    /// Finish writing and return the archive bytes.
    pub fn finish(self) -> Result<Vec<u8>> {
        Ok(self.zip.finish()?.into_inner())
    }
}

impl Default for PhysWriter {
    fn default() -> Self {
        Self::new()
    }
}
