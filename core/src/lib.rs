pub mod calories;
pub mod catalog;
pub mod coalescer;
pub mod db;
pub mod matcher;
pub mod models;
pub mod nutrition;
pub mod scheduler;
pub mod service;
pub mod units;
