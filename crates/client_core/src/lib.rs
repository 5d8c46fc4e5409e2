pub mod authority;
pub mod catalog;
pub mod debounce;
pub mod dispatch;
pub mod error;
pub mod plan;
pub mod query;
pub mod session;

pub use authority::{HttpAuthority, LoginGrant, RemoteAuthority};
pub use catalog::{HttpCatalog, RemoteCatalog};
pub use dispatch::{CredentialSlot, RequestDispatcher};
pub use error::{AuthError, CatalogError, DispatchError};
pub use plan::{SearchMode, SortMode, PAGE_SIZE};
pub use query::{QueryController, QueryStatus, QueryView};
pub use session::{SessionManager, SessionPhase, SessionState};
