pub mod config;
pub mod conversation;
pub mod directory;
pub mod error;
pub mod onboarding;
pub mod state;
pub mod transport;
pub mod upload;

// Re-export main types for convenience
pub use config::Config;
pub use conversation::{ConversationOptions, ConversationStore, DocumentRef};
pub use directory::{format_age, format_size, DirectoryStatus, DocumentDescriptor, DocumentDirectory};
pub use error::{ChatError, TransportError, ValidationError};
pub use onboarding::{CompanyProfile, ProfileStore};
pub use state::{ChatMessage, ChatRole, Citation};
pub use transport::{
    AskRequest, AskResponse, Backend, HealthStatus, HttpBackend, ProgressSink, RemoteDocument,
    TransportSettings, UploadReceipt,
};
pub use upload::{DocumentKind, UploadCoordinator, UploadFile, UploadPhase, UploadTask};
