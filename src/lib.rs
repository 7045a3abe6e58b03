pub mod aggregate;
pub mod cli;
pub mod compare;
pub mod db;
pub mod error;
pub mod hierarchy;
pub mod history;
pub mod insights;
pub mod model;
pub mod notify;
pub mod parsers;
pub mod report;
pub mod risk;
pub mod store;
