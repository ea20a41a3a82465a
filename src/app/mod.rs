// Application layer - Use case interactors

pub mod container;
pub mod inspect_interactor;
pub mod session;
pub mod trim_interactor;

// Re-export interactors
pub use container::{AppContainer, DefaultAppContainer};
pub use inspect_interactor::{InspectInteractor, InspectRequest, ReportFormat};
pub use session::TrimSession;
pub use trim_interactor::{ExportPlan, OutputPolicy, TrimInteractor};
