//! Integration tests for mailtally
//!
//! These tests build small EDRM corpora on disk and run the full
//! extract → parse → count → aggregate pipeline over them.

use mailtally::{
    config::PipelineConfig,
    import::{discover_archives, ArchiveJob, ImportCoordinator},
};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracing_subscriber::fmt::MakeWriter;
use zip::write::SimpleFileOptions;

/// One `<Document DocType="Message">` entry
struct Doc<'a> {
    to: &'a str,
    cc: &'a str,
    native: Option<&'a str>,
}

fn manifest_xml(docs: &[Doc]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<Root><Batch><Documents>\n");
    for (i, doc) in docs.iter().enumerate() {
        xml.push_str(&format!("<Document DocID=\"{}\" DocType=\"Message\">\n<Tags>\n", i));
        xml.push_str(&format!("<Tag TagName=\"#To\" TagValue=\"{}\"/>\n", doc.to));
        xml.push_str(&format!("<Tag TagName=\"#CC\" TagValue=\"{}\"/>\n", doc.cc));
        xml.push_str("</Tags>\n<Files>\n");
        if let Some(name) = doc.native {
            xml.push_str(&format!(
                "<File FileType=\"Native\"><ExternalFile FilePath=\"native_000\" FileName=\"{}\"/></File>\n",
                name
            ));
        }
        xml.push_str("</Files>\n</Document>\n");
    }
    xml.push_str("</Documents></Batch></Root>\n");
    xml
}

fn eml(body: &str) -> String {
    format!("From: sender@example.com\r\nSubject: test\r\n\r\n{}", body)
}

fn write_archive(path: &Path, entries: &[(&str, String)]) {
    let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
    for (name, contents) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

struct Corpus {
    _temp_dir: TempDir,
    config: PipelineConfig,
}

impl Corpus {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("corpus")).unwrap();
        let config = PipelineConfig {
            email_root: root.join("corpus"),
            unzip_dir: root.join("unzip"),
            audit_path: root.join("audit.csv"),
            state_path: root.join("state.json"),
            ..PipelineConfig::default()
        };
        Self {
            _temp_dir: temp_dir,
            config,
        }
    }

    fn archive_path(&self, name: &str) -> PathBuf {
        self.config.email_root.join(name)
    }

    fn add_archive(&self, name: &str, entries: &[(&str, String)]) {
        write_archive(&self.archive_path(name), entries);
    }

    fn jobs(&self) -> Vec<ArchiveJob> {
        discover_archives(&self.config.email_root, &self.config.archive_suffix).unwrap()
    }

    fn coordinator(&self) -> ImportCoordinator {
        ImportCoordinator::new(self.config.clone()).with_quiet(true)
    }

    fn audit_lines(&self) -> Vec<String> {
        std::fs::read_to_string(&self.config.audit_path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

/// Captures formatted log output for assertions
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Three archives with overlapping recipients
fn build_three_archive_corpus(corpus: &Corpus) {
    corpus.add_archive(
        "a_xml.zip",
        &[
            (
                "a.xml",
                manifest_xml(&[
                    Doc { to: "alice@corp.com; bob@corp.com", cc: "carol@corp.com", native: Some("1.eml") },
                    Doc { to: "bob@corp.com", cc: "", native: Some("2.eml") },
                ]),
            ),
            ("native_000/1.eml", eml("one two three")),
            ("native_000/2.eml", eml("four five")),
        ],
    );
    corpus.add_archive(
        "b_xml.zip",
        &[
            (
                "b.xml",
                manifest_xml(&[Doc { to: "carol@corp.com", cc: "alice@corp.com", native: Some("3.eml") }]),
            ),
            ("native_000/3.eml", eml("six")),
        ],
    );
    corpus.add_archive(
        "c_xml.zip",
        &[
            (
                "c.xml",
                manifest_xml(&[Doc { to: "dave@corp.com", cc: "bob@corp.com; bob@corp.com", native: Some("4.eml") }]),
            ),
            ("native_000/4.eml", eml("")),
        ],
    );
}

#[test]
fn test_end_to_end_with_corrupt_archive() {
    let corpus = Corpus::new();
    corpus.add_archive(
        "a_xml.zip",
        &[
            ("manifest.xml", manifest_xml(&[Doc { to: "x@y.com", cc: "", native: Some("1.eml") }])),
            ("native_000/1.eml", eml("hello world")),
        ],
    );
    std::fs::write(corpus.archive_path("b_xml.zip"), b"PK\x03\x04 definitely not a zip").unwrap();

    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();

    let mut coordinator = corpus.coordinator();
    let jobs = corpus.jobs();
    let state = tracing::subscriber::with_default(subscriber, || coordinator.run(&jobs).unwrap());

    assert_eq!(state.files_count, 1);
    assert_eq!(state.words_count, 3);
    assert_eq!(state.average(), 3.0);
    assert_eq!(state.top_sorted_emails, vec![("x@y.com".to_string(), 1.0)]);
    assert_eq!(state.completed_archives, vec!["a_xml"]);

    assert_eq!(coordinator.stats().archives_failed, 1);
    assert!(logs.contents().contains("Exception (b_xml)"));

    // Clean completion leaves no checkpoint and no scratch state behind
    assert!(!corpus.config.state_path.exists());
    assert!(!corpus.config.unzip_dir.join("a_xml").exists());
    assert!(!corpus.config.unzip_dir.join("b_xml").exists());

    assert_eq!(
        corpus.audit_lines(),
        vec!["File path,Words count,Email To,Email CC", "native_000/1.eml,3,x@y.com,"]
    );
}

#[test]
fn test_weighted_ranking_across_documents() {
    let corpus = Corpus::new();
    corpus.add_archive(
        "a_xml.zip",
        &[(
            "a.xml",
            manifest_xml(&[
                Doc { to: "A@Example.com", cc: "b@example.com", native: None },
                Doc { to: "a@example.com", cc: "a@example.com", native: None },
            ]),
        )],
    );

    let state = corpus.coordinator().run(&corpus.jobs()).unwrap();

    assert_eq!(state.top_emails.get("a@example.com"), Some(2.5));
    assert_eq!(state.top_emails.get("b@example.com"), Some(0.5));
    assert_eq!(
        state.top_sorted_emails,
        vec![("a@example.com".to_string(), 2.5), ("b@example.com".to_string(), 0.5)]
    );
    // No native files: totals stay at their floors
    assert_eq!(state.files_count, 0);
    assert_eq!(state.reported_words(), 1);
    assert_eq!(state.average(), 1.0);
}

#[test]
fn test_malformed_manifest_is_contained() {
    let corpus = Corpus::new();
    corpus.add_archive(
        "a_xml.zip",
        &[
            ("good.xml", manifest_xml(&[Doc { to: "x@y.com", cc: "", native: Some("1.eml") }])),
            (
                "nested/bad.xml",
                "<Root><Batch><Documents><Document DocType=\"Message\">".to_string(),
            ),
            ("native_000/1.eml", eml("a b c")),
        ],
    );

    let mut coordinator = corpus.coordinator();
    let state = coordinator.run(&corpus.jobs()).unwrap();

    assert_eq!(coordinator.stats().manifests_failed, 1);
    assert_eq!(state.files_count, 1);
    assert_eq!(state.words_count, 4);
    assert_eq!(state.completed_archives, vec!["a_xml"]);
}

#[test]
fn test_unreadable_message_skips_file_but_keeps_recipients() {
    let corpus = Corpus::new();
    corpus.add_archive(
        "a_xml.zip",
        &[
            (
                "a.xml",
                manifest_xml(&[
                    Doc { to: "x@y.com", cc: "", native: Some("missing.eml") },
                    Doc { to: "z@y.com", cc: "", native: Some("1.eml") },
                ]),
            ),
            ("native_000/1.eml", eml("hello")),
        ],
    );

    let mut coordinator = corpus.coordinator();
    let state = coordinator.run(&corpus.jobs()).unwrap();

    assert_eq!(coordinator.stats().messages_failed, 1);
    assert_eq!(state.files_count, 1);
    assert_eq!(state.words_count, 2);
    assert_eq!(state.top_emails.get("x@y.com"), Some(1.0));
    assert_eq!(corpus.audit_lines().len(), 2);
}

#[test]
fn test_resume_matches_uninterrupted_run() {
    // Uninterrupted reference run
    let reference = Corpus::new();
    build_three_archive_corpus(&reference);
    let full = reference.coordinator().run(&reference.jobs()).unwrap();

    assert_eq!(full.completed_archives, vec!["a_xml", "b_xml", "c_xml"]);
    assert_eq!(full.files_count, 4);
    assert_eq!(full.words_count, 4 + 3 + 2 + 1);
    assert_eq!(full.top_emails.get("bob@corp.com"), Some(3.0));

    // Same corpus, interrupted after the first archive while the second
    // was half extracted
    let corpus = Corpus::new();
    build_three_archive_corpus(&corpus);
    let jobs = corpus.jobs();

    let first_only = Corpus::new();
    build_three_archive_corpus(&first_only);
    let checkpoint = first_only.coordinator().run(&first_only.jobs()[..1]).unwrap();
    checkpoint.save(&corpus.config.state_path).unwrap();

    let stale = corpus.config.unzip_dir.join("b_xml");
    std::fs::create_dir_all(&stale).unwrap();
    std::fs::write(stale.join("leftover.xml"), "<Root><Batch>").unwrap();

    let mut coordinator = corpus.coordinator();
    let resumed = coordinator.run(&jobs).unwrap();

    assert_eq!(coordinator.stats().archives_skipped, 1);
    assert_eq!(coordinator.stats().archives_processed, 2);
    assert_eq!(coordinator.stats().manifests_failed, 0);

    assert_eq!(resumed.words_count, full.words_count);
    assert_eq!(resumed.files_count, full.files_count);
    assert_eq!(resumed.top_emails, full.top_emails);
    assert_eq!(resumed.top_sorted_emails, full.top_sorted_emails);
    assert_eq!(resumed.completed_archives, full.completed_archives);
    assert!(!corpus.config.state_path.exists());
    assert!(!stale.exists());

    // The resumed run appends rows for the remaining archives only
    let lines = corpus.audit_lines();
    assert_eq!(lines[0], "File path,Words count,Email To,Email CC");
    assert_eq!(lines.len(), 3);
}

#[test]
fn test_separate_runs_resume_from_saved_checkpoint() {
    let corpus = Corpus::new();
    build_three_archive_corpus(&corpus);
    let jobs = corpus.jobs();
    assert_eq!(jobs.len(), 3);

    let first = corpus.coordinator().run(&jobs[..1]).unwrap();
    assert_eq!(first.completed_archives, vec!["a_xml"]);
    first.save(&corpus.config.state_path).unwrap();

    let mut coordinator = corpus.coordinator();
    let state = coordinator.run(&jobs).unwrap();
    assert_eq!(coordinator.stats().archives_skipped, 1);

    assert_eq!(state.completed_archives, vec!["a_xml", "b_xml", "c_xml"]);
    assert_eq!(state.top_emails.get("carol@corp.com"), Some(1.5));
    assert_eq!(state.top_emails.get("alice@corp.com"), Some(1.5));

    // Resuming a fully completed checkpoint changes nothing
    state.save(&corpus.config.state_path).unwrap();
    let mut coordinator = corpus.coordinator();
    let again = coordinator.run(&jobs).unwrap();
    assert_eq!(coordinator.stats().archives_skipped, 3);
    assert_eq!(again.words_count, state.words_count);
    assert_eq!(again.top_emails, state.top_emails);
}

#[test]
fn test_resume_discards_audit_rows_of_interrupted_archive() {
    let corpus = Corpus::new();
    build_three_archive_corpus(&corpus);
    let jobs = corpus.jobs();

    // First archive committed; the process dies while the second archive's
    // rows have already reached the audit file
    let first = corpus.coordinator().run(&jobs[..1]).unwrap();
    assert!(first.audit_len.is_some());
    first.save(&corpus.config.state_path).unwrap();
    let mut audit = std::fs::OpenOptions::new()
        .append(true)
        .open(&corpus.config.audit_path)
        .unwrap();
    audit.write_all(b"native_000/3.eml,2,carol@corp.com,alice@corp.com\n").unwrap();
    drop(audit);

    let state = corpus.coordinator().run(&jobs).unwrap();
    assert_eq!(state.files_count, 4);

    let lines = corpus.audit_lines();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0], "File path,Words count,Email To,Email CC");
    let redone = lines.iter().filter(|l| l.starts_with("native_000/3.eml,")).count();
    assert_eq!(redone, 1);
    assert_eq!(lines[4], "native_000/4.eml,1,dave@corp.com,bob@corp.com;bob@corp.com");
}

#[test]
fn test_message_without_headers_counts_its_text() {
    let corpus = Corpus::new();
    corpus.add_archive(
        "a_xml.zip",
        &[
            ("manifest.xml", manifest_xml(&[Doc { to: "x@y.com", cc: "", native: Some("1.eml") }])),
            ("native_000/1.eml", "hello world".to_string()),
        ],
    );

    let state = corpus.coordinator().run(&corpus.jobs()).unwrap();
    assert_eq!(state.files_count, 1);
    assert_eq!(state.words_count, 3);
    assert_eq!(state.average(), 3.0);
}
