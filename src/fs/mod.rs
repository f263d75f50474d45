//! Local filesystem side of bundle synchronization: ignore rules, content
//! canonicalization and the lazy bundle file scanner.

pub mod content;
pub mod ignore;
pub mod scanner;

pub use ignore::{collect_ignore_rules, IgnoreRuleSet};
pub use scanner::{scan_bundle_files, FileDescriptor, ScanOptions};
