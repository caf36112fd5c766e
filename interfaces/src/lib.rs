pub mod defs;
pub mod scanner;

pub use defs::{ScanError, ScanKind, ScanRequest, ScanVerdict, Scanner};
pub use scanner::ProcessScanner;
