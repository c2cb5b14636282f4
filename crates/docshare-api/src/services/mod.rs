pub mod cleanup;
pub mod files;
pub mod links;

pub use cleanup::RetainedBlobSweeper;
pub use files::{paginate, FileService, Page, PathListing, ShareGrant, SharedFile};
pub use links::{LinkIssuer, LinkOutcome};
