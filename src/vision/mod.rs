pub mod azure;

pub use azure::AzureVisionAnalyzer;
