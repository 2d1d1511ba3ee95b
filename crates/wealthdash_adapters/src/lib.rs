pub mod broker;
pub mod configuration;
pub mod credentials;
pub mod exporter;
pub mod network;
pub mod telemetry;

// Re-exports for convenience
pub use broker::KiteConnectBroker;
pub use credentials::JsonCredentialStore;
pub use exporter::CsvWorkbookExporter;
