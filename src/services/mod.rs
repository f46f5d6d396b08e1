pub mod collaborators;
pub use collaborators::{
    DeriveError, DerivedTemplate, DiscoveryError, ExtractionOutcome, ProductExtractor,
    SiteCandidate, SiteDiscovery, TemplateDeriver,
};

pub mod discovery;
pub use discovery::{DiscoveryReport, TemplateDiscoveryWorker};

pub mod extraction;
pub use extraction::{ExtractionReport, ProductExtractionWorker};

pub mod import;
pub use import::{ImportSummary, import_catalog, import_file};

pub mod ledger;
pub use ledger::{PairDecision, RescanPolicy};

pub mod supervisor;
pub use supervisor::{Supervisor, Worker};
