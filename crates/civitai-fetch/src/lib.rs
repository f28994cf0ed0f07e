pub mod api;
pub mod descriptor;
pub mod downloader;
pub mod error;
pub mod local;
pub mod page;
pub mod pipeline;
pub mod publish;
pub mod record;
pub mod select;
pub mod types;

pub use api::{Api, CivitaiClient, DEFAULT_HOST};
pub use descriptor::ModelDescriptor;
pub use downloader::{DownloadOutcome, Downloader};
pub use error::{FetchError, PublishError};
pub use local::LocalState;
pub use pipeline::{MirrorOptions, MirrorReport, Pipeline};
pub use publish::{HfUploader, PublishReport, PublishTarget, RepoKind, Uploader};
pub use record::LocalArtifactRecord;
pub use types::ModelMetadata;
