pub mod audit;
pub mod feed;
pub mod notifier;
