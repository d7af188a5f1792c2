//! Handle command implementation.

use super::pretty;
use capi_endpoint::{
    ArticleHandler, Endpoint, EndpointConfig, EndpointResponse, IncomingRequest, MemoryStore,
};
use std::path::Path;

/// Runs a message through a local endpoint backed by an in-memory store.
pub fn process(
    config_path: &Path,
    message_path: &Path,
    base_url: &str,
) -> Result<EndpointResponse, Box<dyn std::error::Error>> {
    let config = EndpointConfig::from_file(config_path)?;
    let handler = ArticleHandler::from_config(&config);

    let mut endpoint = Endpoint::new(config, MemoryStore::new(base_url));
    endpoint.register(handler)?;

    let body = std::fs::read(message_path)?;
    Ok(endpoint.handle(&IncomingRequest::post_body(body)))
}

/// Runs the handle command.
pub fn run(
    config_path: &Path,
    message_path: &Path,
    base_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let response = process(config_path, message_path, base_url)?;
    println!("HTTP {} ({})", response.status, response.content_type);
    println!("{}", pretty(&response.body));
    Ok(())
}
