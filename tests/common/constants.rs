//! Shared constants for end-to-end tests
//!
//! This module contains all constants used across the test suite.
//! When fixture data changes (buyers, products, orders), update only this file.

// ============================================================================
// Test Buyers and Sessions
// ============================================================================

/// Buyer who placed the seeded order
pub const BUYER_1_ID: &str = "buyer-1";

/// Marketplace session token for buyer 1 (seeded in the buyers database)
pub const BUYER_1_SESSION_TOKEN: &str = "session-token-buyer-1";

/// Buyer with a valid session but no orders
pub const BUYER_2_ID: &str = "buyer-2";

/// Marketplace session token for buyer 2
pub const BUYER_2_SESSION_TOKEN: &str = "session-token-buyer-2";

// ============================================================================
// Test Catalog IDs
// ============================================================================

/// Digital product "Font Pack Vol. 1"
pub const PRODUCT_FONT_PACK_ID: &str = "product-font-pack";

/// Physical product "Tote Bag" (never gets a download grant)
pub const PRODUCT_TOTE_BAG_ID: &str = "product-tote-bag";

/// Completed order placed by buyer 1
pub const ORDER_1_ID: &str = "order-1";

/// Line item of order 1 for the font pack
pub const LINE_ITEM_FONT_PACK_ID: &str = "line-item-font-pack";

/// Line item of order 1 for the tote bag
pub const LINE_ITEM_TOTE_BAG_ID: &str = "line-item-tote-bag";

// ============================================================================
// Test Catalog Metadata
// ============================================================================

/// Font pack product name
pub const PRODUCT_FONT_PACK_NAME: &str = "Font Pack Vol. 1";

/// Where the font pack archive actually lives
pub const PRODUCT_FONT_PACK_LOCATOR: &str = "https://cdn.example/font-pack-vol-1.zip";

/// Downloads allowed per font pack purchase
pub const PRODUCT_FONT_PACK_DOWNLOAD_LIMIT: u32 = 3;

/// Days the font pack stays downloadable after purchase
pub const PRODUCT_FONT_PACK_ACCESS_WINDOW_DAYS: u32 = 30;

// ============================================================================
// Test Server Configuration
// ============================================================================

/// Secret the completion hook expects in its header
pub const HOOK_SECRET: &str = "test-hook-secret";

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;
