pub mod box_api;
pub mod box_auth;

use crate::{errors::SkillError, types::MetadataRecord};
use async_trait::async_trait;
use bytes::Bytes;
use dyn_clone::DynClone;
use futures::stream::BoxStream;
use std::fmt::Debug;

pub use box_api::{BoxClient, BoxConnector};
pub use box_auth::{BoxAppAuth, BoxAuthenticator};

/// A stream of file content chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes, SkillError>>;

/// An opened read stream for a file's current content.
pub struct FileContent {
    /// The size advertised by the platform, when it sends one.
    pub content_length: Option<u64>,
    pub stream: ByteStream,
}

/// A storage platform client acting on behalf of a single user.
#[async_trait]
pub trait StorageClient: Send + Sync + Debug {
    /// Opens a byte stream over the file's current content.
    async fn open_read_stream(&self, file_id: &str) -> Result<FileContent, SkillError>;

    /// Creates a metadata instance on the file under the global scope.
    ///
    /// Returns the record as stored by the platform.
    async fn create_metadata(
        &self,
        file_id: &str,
        template_key: &str,
        record: &MetadataRecord,
    ) -> Result<MetadataRecord, SkillError>;

    /// Reads the metadata instance stored under the global scope.
    async fn get_metadata(
        &self,
        file_id: &str,
        template_key: &str,
    ) -> Result<MetadataRecord, SkillError>;
}

/// Produces storage clients authenticated as a given user.
#[async_trait]
pub trait StorageConnector: Send + Sync + Debug + DynClone {
    async fn connect_as_user(&self, user_id: &str) -> Result<Box<dyn StorageClient>, SkillError>;
}

dyn_clone::clone_trait_object!(StorageConnector);
