//! Keyboard matrix scanning

mod scanner;

pub use scanner::{MatrixScanner, ScannerConfig};
