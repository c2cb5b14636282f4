//! Reference defaults shared by configuration and the share policy.

/// Default lifetime of a share token, in hours.
pub const DEFAULT_SHARE_TTL_HOURS: i64 = 24;

/// Default number of redemptions a share token allows.
pub const DEFAULT_SHARE_MAX_USES: u32 = 3;

/// Upper bound on a share token's lifetime, in hours (30 days).
pub const MAX_SHARE_TTL_HOURS: i64 = 720;

/// Upper bound on a share token's redemption count.
pub const MAX_SHARE_USES: u32 = 100;

/// Upload size ceiling in MiB.
pub const MAX_FILE_SIZE_MB: usize = 10;

/// Extensions accepted for upload.
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png", "doc", "docx"];

/// Lifetime of links returned by the batch download-links operation.
pub const DOWNLOAD_LINK_TTL_SECS: u64 = 3600;

/// Lifetime of links returned by the path listing with `include_links`.
pub const LISTING_LINK_TTL_SECS: u64 = 7200;

/// Interval between sweeps of blobs kept for deleted files
pub const RETAINED_SWEEP_INTERVAL_SECS: u64 = 900;

/// Category assigned when the uploader does not pick one.
pub const DEFAULT_CATEGORY: &str = "general";

/// Default page sizes for owner and administrative listings.
pub const USER_LISTING_PAGE_SIZE: usize = 20;
pub const ADMIN_LISTING_PAGE_SIZE: usize = 15;

/// Listing page sizes are clamped to this value.
pub const MAX_PAGE_SIZE: usize = 100;
