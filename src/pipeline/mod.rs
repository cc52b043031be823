pub mod media;
pub mod detection;
pub mod extraction;
pub mod classification;
pub mod processor; // Scan orchestrator: route → detect/classify → encode → persist
