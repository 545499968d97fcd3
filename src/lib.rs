pub mod audit;
pub mod auction;
pub mod bidder_number;
pub mod bidding;
pub mod database;
pub mod error;
pub mod handlers;
pub mod membership;
pub mod notification;
pub mod query;
pub mod reports;
pub mod scheduler;
pub mod totals;
