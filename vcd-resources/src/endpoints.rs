//! vCD API paths and connection defaults.

use std::time::Duration;

/// Session login (legacy API, used by every vCD release).
pub const SESSIONS: &str = "api/sessions";

/// NSX-T manager registrations (cloud API).
pub const NSXT_MANAGERS: &str = "cloudapi/1.0.0/nsxTResources";

/// API version sent in the `Accept` header when none is configured.
pub const DEFAULT_API_VERSION: &str = "32.0";

/// Organization used for login when none is configured.
pub const DEFAULT_ORG: &str = "System";

/// Per-request timeout when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size used when walking cloud API collections.
pub const PAGE_SIZE: u32 = 128;
