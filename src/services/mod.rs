pub mod allocator;
pub mod blocklist;
pub mod inbound;
pub mod ledger;
pub mod quota;
pub mod subdomain;

pub use allocator::AliasAllocator;
pub use inbound::{Delivery, MailRouter, Recipient};
pub use ledger::DeletionLedger;
pub use quota::{QuotaGuard, UserLease};
pub use subdomain::SubdomainManager;
