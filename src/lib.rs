//! mailtally: resumable statistics over EDRM email archive corpora
//!
//! Walks a directory of `*_xml.zip` archives one at a time and for every
//! archive:
//! - extracts it into scratch storage,
//! - decodes its batch manifest into typed email documents,
//! - counts the words of each referenced native message,
//! - accumulates a weighted recipient ranking (To = 1.0, CC = 0.5),
//! - checkpoints the aggregate so an interrupted run resumes where it left off.

pub mod config;
pub mod import;
pub mod util;

pub use config::Config;
