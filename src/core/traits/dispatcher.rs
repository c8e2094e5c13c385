//! Operation dispatcher trait
//!
//! The batch processor hands every operation to a dispatcher and treats the
//! response as opaque apart from its status code. Transaction scopes group the
//! operations of one changeset.

use crate::core::batch::{BatchError, Headers};
use async_trait::async_trait;
use bytes::Bytes;
use url::Url;
use uuid::Uuid;

/// Handle of one open transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionScope {
    id: Uuid,
}

impl TransactionScope {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Default for TransactionScope {
    fn default() -> Self {
        Self::new()
    }
}

/// Request handed to the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRequest {
    pub method: String,
    /// Absolute URI, already resolved against the service root
    pub url: Url,
    pub headers: Headers,
    pub body: Bytes,
}

/// Response returned by the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

impl OperationResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body<B: Into<Bytes>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes individual operations
///
/// `Err` is reserved for dispatcher infrastructure failures. A request that
/// fails on its own merits (not found, bad body, conflict) is an `Ok` response
/// with a non-2xx status.
#[async_trait]
pub trait OperationDispatcher: Send + Sync {
    /// Open a transaction scope for one changeset
    async fn begin(&self) -> Result<TransactionScope, BatchError>;

    /// Execute one operation, inside `scope` when given
    async fn dispatch(
        &self,
        request: &OperationRequest,
        scope: Option<&TransactionScope>,
    ) -> Result<OperationResponse, BatchError>;

    /// Make every write of the scope visible
    async fn commit(&self, scope: TransactionScope) -> Result<(), BatchError>;

    /// Discard every write of the scope
    async fn rollback(&self, scope: TransactionScope) -> Result<(), BatchError>;
}
