// Service exports
pub mod document;
pub mod identity;
pub mod memory;
pub mod postgres;
pub mod stores;

pub use document::{CasError, Document, DocumentStore, MockDocumentStore, Query, StoreError};
pub use identity::{
    Identity, IdentityError, IdentityProvider, JwtVerifier, MockIdentityProvider, Role,
    StaticIdentity,
};
pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use stores::{
    DocumentMatchStore, DocumentProviderStore, DocumentRequestStore, MatchFilter, MatchStore,
    ProviderFilter, ProviderStore, RequestFilter, RequestStore,
};
