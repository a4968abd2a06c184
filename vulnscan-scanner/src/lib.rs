pub mod crawler;
pub mod detect;
pub mod dispatch;
pub mod error;
pub mod finding;
pub mod form;
pub mod http;
pub mod payloads;
pub mod portscan;
pub mod progress;
pub mod result;

pub use crawler::Crawler;
pub use detect::{Detector, SqliDetector, XssDetector};
pub use dispatch::{StopHandle, run_concurrent};
pub use error::ScanError;
pub use finding::{Finding, FindingType, Severity};
pub use form::{Field, Form, HttpMethod};
pub use payloads::PayloadCorpus;
pub use portscan::{PortRecord, scan_ports};
pub use progress::{ProgressEvent, ProgressUnit, Sinks};
pub use result::{CrawlOutcome, CrawlResult};
