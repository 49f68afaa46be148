pub mod allocation;
pub mod asset;
pub mod contract;
pub mod portfolio;
pub mod report;
