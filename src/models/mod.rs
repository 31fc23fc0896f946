pub mod address;
pub mod domain;
pub mod subdomain;
pub mod tombstone;
pub mod user;

pub use address::{
    AddressUpdate, AliasTarget, Counter, Counters, NewRelayAddress, Page, RelayAddress, TargetRef,
};
pub use domain::RelayDomain;
pub use subdomain::{NewRelaySubdomain, RelaySubdomain, SubdomainDetail, SubdomainTotals};
pub use tombstone::DeletedRelayAddress;
pub use user::UserRecord;
