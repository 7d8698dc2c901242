//! Linkboard - multi-provider OAuth connection manager
//!
//! Connects HubSpot, Notion and Airtable accounts through a backend that
//! owns the OAuth integrations, keeps the issued credentials in a durable
//! local store and gates a dashboard on whether any provider is connected.

pub mod config;
pub mod connector;
pub mod display;
pub mod logging;
pub mod notification;
pub mod provider;
pub mod registry;
pub mod session;
pub mod shell;
pub mod store;
pub mod window;
