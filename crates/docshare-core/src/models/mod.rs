pub mod file_record;
pub mod principal;
pub mod share_token;

pub use file_record::{FileRecord, FileRecordResponse};
pub use principal::{Principal, Role};
pub use share_token::{ShareToken, ShareTokenResponse, TokenState};
