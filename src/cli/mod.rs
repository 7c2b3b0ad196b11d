pub mod doctor;
pub mod export;
pub mod import;
pub mod stats;
