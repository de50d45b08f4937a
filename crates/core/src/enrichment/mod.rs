//! External collaborators used by the enrichment pipeline.
//!
//! Every capability the pipeline calls is expressed as an object-safe async
//! trait so the runner can hold `Arc<dyn ...>` handles and tests can swap in
//! the mocks from [`crate::testing`]:
//! - Reachability validation (`ReachabilityChecker`)
//! - Screenshot and social link discovery (`VisualDiscoverer`)
//! - Content extraction (`ContentExtractor`)
//! - Pricing detection (`PricingExtractor`)
//! - Narrative generation (`NarrativeGenerator`)
//! - Item persistence and name lookup (`ItemPersister`, `NameResolver`)

mod error;
mod http;
mod traits;
mod types;

pub use error::{CapabilityError, PersistError, ResolveError};
pub use http::{HttpReachabilityChecker, RemoteCapabilityClient, DNS_CHAIN};
pub use traits::{
    Capabilities, ContentExtractor, ItemPersister, NameResolver, NarrativeGenerator,
    PricingExtractor, ReachabilityChecker, VisualDiscoverer,
};
pub use types::{
    ContentExtraction, Narrative, PricingInfo, PricingType, ReachabilityReport, VisualDiscovery,
};
