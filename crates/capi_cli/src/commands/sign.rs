//! Sign command implementation.

use super::load_request;
use std::path::Path;

/// Builds a request from a payload file and returns the signed JSON.
pub fn build(
    payloads: &Path,
    key: &str,
    secret: &str,
) -> Result<String, Box<dyn std::error::Error>> {
    let request = load_request(payloads)?;
    let wire = request.to_wire(key, secret)?;
    Ok(String::from_utf8(wire)?)
}

/// Runs the sign command.
pub fn run(
    payloads: &Path,
    key: &str,
    secret: &str,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = build(payloads, key, secret)?;
    match output {
        Some(path) => {
            std::fs::write(path, &json)?;
            println!("Signed message written to {:?}", path);
        }
        None => println!("{json}"),
    }
    Ok(())
}
