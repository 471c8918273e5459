//! Terminal dashboards over OpenAlex research collaboration exports.

pub mod aggregate;
pub mod app;
pub mod braille;
pub mod charts;
pub mod config;
pub mod data;
pub mod error;
pub mod filter;
pub mod hash;
pub mod map;
pub mod ui;
pub mod view;
