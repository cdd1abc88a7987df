pub mod config;
pub mod error;
pub mod export;
pub mod form;
pub mod progress;
pub mod session;

pub use config::{AffiliationMode, Credentials, Endpoints};
pub use error::PortalError;
pub use export::{ExportFormat, Report, Table};
pub use progress::{CurriculumComponent, Integralizacao, Progress, Status};
pub use session::{LoginOutcome, Session, SigaaPortal, SigaaPortalBuilder};
