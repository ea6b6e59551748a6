pub mod admin;
pub mod api_errors;
pub mod notifier;
pub mod provider_client;
pub mod webhook;
