//! Send command implementation.

use super::load_request;
use capi_client::{
    ClientConfig, HttpTransport, MessageTransport, RemoteEndpoint, ReqwestClient,
};
use capi_protocol::{ErrorEntry, Message};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Runs the send command.
pub fn run(
    payloads: &Path,
    endpoint: &RemoteEndpoint,
    timeout: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut request = load_request(payloads)?;

    let config = ClientConfig::new().with_request_timeout(Duration::from_secs(timeout));
    let transport = HttpTransport::new(ReqwestClient::new(&config)?);

    println!("Sending {} payload(s) to {}", request.len(), endpoint.uri);
    let result = transport.send(&mut request, endpoint);
    if let Some(raw) = request.sent_raw() {
        debug!(bytes = raw.len(), "request body sent");
    }
    let reply = match result {
        Ok(reply) => reply,
        Err(err) if err.is_retryable() => {
            return Err(format!("{err} (the request may be sent again)").into());
        }
        Err(err) => return Err(err.into()),
    };

    let mut check = Message::respond();
    let authentic = reply.valid(endpoint.api_key(), endpoint.api_secret(), &mut check);

    print_reply(&reply);
    println!();
    if authentic {
        println!("✓ Reply signature verified");
    } else {
        println!("✗ Reply signature did not verify");
    }

    if reply.success() {
        Ok(())
    } else {
        Err("Endpoint reported errors".into())
    }
}

fn print_errors(indent: &str, errors: &[ErrorEntry]) {
    for error in errors {
        match error.information() {
            Some(information) => println!(
                "{indent}error 0x{:02X}: {} ({information})",
                error.code(),
                error.description()
            ),
            None => println!("{indent}error 0x{:02X}: {}", error.code(), error.description()),
        }
    }
}

fn print_reply(reply: &Message) {
    let status = reply
        .status()
        .map_or_else(|| "none".to_string(), |status| status.to_string());
    println!("Status: {status}, success: {}", reply.success());
    print_errors("  ", reply.errors());

    for entry in reply.entries() {
        let status = entry
            .status()
            .map_or_else(|| "none".to_string(), |status| status.to_string());
        println!(
            "  {}: status {status}, success: {}",
            entry.identifier(),
            entry.success()
        );
        print_errors("    ", entry.errors());
        if let Some(payload) = entry.as_payload() {
            if !payload.data().is_empty() {
                println!("    data: {}", Value::Object(payload.data().clone()));
            }
        }
    }
}
