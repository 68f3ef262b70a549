//! EDRM batch manifest parser
//!
//! A manifest describes a batch of documents:
//!
//! ```text
//! <Root>
//!   <Batch>
//!     <Documents>
//!       <Document DocID="..." DocType="Message">
//!         <Tags><Tag TagName="#To" TagValue="..."/></Tags>
//!         <Files>
//!           <File FileType="Native">
//!             <ExternalFile FilePath="native_000" FileName="1.eml"/>
//!           </File>
//!         </Files>
//!       </Document>
//!     </Documents>
//!   </Batch>
//! </Root>
//! ```
//!
//! The whole file is decoded into typed records in one pass. Any decode
//! failure rejects the manifest as a unit.

use super::source::PipelineError;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const MESSAGE_DOC_TYPE: &str = "Message";
const NATIVE_FILE_TYPE: &str = "Native";

#[derive(Debug, Default, Deserialize)]
struct Manifest {
    #[serde(rename = "Batch", default)]
    batch: Batch,
}

#[derive(Debug, Default, Deserialize)]
struct Batch {
    #[serde(rename = "Documents", default)]
    documents: Documents,
}

#[derive(Debug, Default, Deserialize)]
struct Documents {
    #[serde(rename = "Document", default)]
    items: Vec<DocumentEntry>,
}

#[derive(Debug, Deserialize)]
struct DocumentEntry {
    #[serde(rename = "@DocID", default)]
    doc_id: Option<String>,
    #[serde(rename = "@DocType")]
    doc_type: String,
    #[serde(rename = "Tags", default)]
    tags: Tags,
    #[serde(rename = "Files", default)]
    files: Files,
}

#[derive(Debug, Default, Deserialize)]
struct Tags {
    #[serde(rename = "Tag", default)]
    items: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    #[serde(rename = "@TagName")]
    name: String,
    #[serde(rename = "@TagValue", default)]
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct Files {
    #[serde(rename = "File", default)]
    items: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    #[serde(rename = "@FileType")]
    file_type: String,
    #[serde(rename = "ExternalFile", default)]
    external: Option<ExternalFile>,
}

#[derive(Debug, Deserialize)]
struct ExternalFile {
    #[serde(rename = "@FilePath", default)]
    path: String,
    #[serde(rename = "@FileName")]
    name: String,
}

/// A native message file referenced by a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeFile {
    /// `FilePath/FileName` as declared in the manifest (used in the audit trail)
    pub display_path: String,
    /// Location on disk inside the extraction directory
    pub path: PathBuf,
}

/// An email document recovered from a manifest
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmailDocument {
    pub doc_id: Option<String>,
    /// "To" recipients in order of appearance, repeats kept
    pub to: Vec<String>,
    /// "CC" recipients in order of appearance, repeats kept
    pub cc: Vec<String>,
    pub native_files: Vec<NativeFile>,
    /// Sum of word counts over the native files, filled in by the engine
    pub words_count: u64,
}

fn address_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"[^;<>'"\s]+@[^;<>'"\s]+\.[^;<>'"\s]{2,}"#).expect("address pattern is valid")
    })
}

/// Extract every address-like substring from free text, lower-cased.
pub fn parse_addresses(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    address_pattern()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Parse a manifest file into the Message documents it describes.
///
/// Native file paths are resolved against `extraction_dir`.
pub fn parse_manifest(
    extraction_dir: &Path,
    manifest_path: &Path,
) -> Result<Vec<EmailDocument>, PipelineError> {
    let xml = std::fs::read_to_string(manifest_path)
        .map_err(|e| PipelineError::malformed_manifest(manifest_path, e))?;
    parse_manifest_str(extraction_dir, &xml)
        .map_err(|reason| PipelineError::malformed_manifest(manifest_path, reason))
}

fn parse_manifest_str(extraction_dir: &Path, xml: &str) -> Result<Vec<EmailDocument>, String> {
    let manifest: Manifest = quick_xml::de::from_str(xml).map_err(|e| e.to_string())?;

    let mut documents = Vec::new();
    for entry in manifest.batch.documents.items {
        if entry.doc_type != MESSAGE_DOC_TYPE {
            continue;
        }

        let mut document = EmailDocument {
            doc_id: entry.doc_id,
            ..Default::default()
        };

        for tag in &entry.tags.items {
            match tag.name.trim_start_matches('#') {
                "To" => document.to.extend(parse_addresses(&tag.value)),
                "CC" => document.cc.extend(parse_addresses(&tag.value)),
                _ => {}
            }
        }

        for file in entry.files.items {
            if file.file_type != NATIVE_FILE_TYPE {
                continue;
            }
            let external = file.external.ok_or_else(|| {
                format!(
                    "native file of document {} has no ExternalFile",
                    document.doc_id.as_deref().unwrap_or("?")
                )
            })?;
            document.native_files.push(NativeFile {
                display_path: format!("{}/{}", external.path, external.name),
                path: extraction_dir.join(&external.path).join(&external.name),
            });
        }

        documents.push(document);
    }

    Ok(documents)
}
