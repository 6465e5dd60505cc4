pub mod company;
pub mod error;
pub mod params;
pub mod query;
pub mod response;

pub use company::{CapBracket, CompanyRecord, Provenance};
pub use error::{ArgusError, Result};
pub use params::ValidatorParams;
pub use query::{AnalysisType, MinerUid, Query, QueryStrategy};
pub use response::{clamp01, MinerResponse, ValidationResult};
