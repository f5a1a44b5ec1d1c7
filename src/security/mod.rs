pub mod audit;
pub mod encryption;

pub use audit::{SECURITY_TARGET, SecurityAuditor, SecurityEvent, SecurityEventType, SecuritySeverity};
pub use encryption::{DataEncryption, EncryptionError};
