//! Read path: staked positions, their owners, and P2P matched orders

pub mod matched_orders;
pub mod owner_resolver;
pub mod stake_scanner;

pub use matched_orders::MatchedOrderScanner;
pub use owner_resolver::OwnerResolver;
pub use stake_scanner::{CollectionScan, ScanSettings, StakeScanner};
