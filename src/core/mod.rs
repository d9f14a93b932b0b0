//! Core registry modules

pub mod coordinate;
pub mod manifest;
pub mod packaging;
pub mod protocol;
pub mod publish;
pub mod service;

// Re-export main types for convenience
pub use coordinate::{ModuleAddress, ModuleCoordinate, StorageKey};
pub use manifest::{
    find_module_roots, load_manifest, ManifestOverrides, ModuleManifest, ModuleMetadata,
    MANIFEST_FILE_NAME,
};
pub use packaging::{archive_module, archive_module_with, calculate_checksum, ArchiveOptions};
pub use protocol::{DiscoveryDocument, RegistryProtocol};
pub use publish::{DownloadDescriptor, PublishOptions, PublishPipeline};
pub use service::{with_timeout, RegistryService, ServiceConfig, ServiceError};
