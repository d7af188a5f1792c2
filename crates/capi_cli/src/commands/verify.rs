//! Verify command implementation.

use capi_protocol::Message;
use std::path::Path;

/// Checks a signed message file against a key and secret.
///
/// Returns the errors the check produced; empty when the message is
/// authentic.
pub fn check(
    path: &Path,
    key: &str,
    secret: &str,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path)?;
    let message = Message::from_wire(&bytes)?;

    let mut response = Message::respond();
    message.valid(key, secret, &mut response);
    Ok(response
        .errors()
        .iter()
        .map(|error| format!("0x{:02X}: {}", error.code(), error.description()))
        .collect())
}

/// Runs the verify command.
pub fn run(path: &Path, key: &str, secret: &str) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying message at {:?}", path);

    let errors = check(path, key, secret)?;
    if errors.is_empty() {
        println!("✓ Message verified");
        Ok(())
    } else {
        for error in &errors {
            println!("  {error}");
        }
        println!("✗ Message verification failed");
        Err("Verification failed".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capi_protocol::{Action, Module, Payload};

    fn signed_file(key: &str, secret: &str) -> tempfile::NamedTempFile {
        let mut request = Message::request();
        request
            .add_payload(Payload::new("art-1", Module::Articles, Action::Delete))
            .unwrap();
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), request.to_wire(key, secret).unwrap()).unwrap();
        file
    }

    #[test]
    fn authentic_message_passes() {
        let file = signed_file("key", "secret");
        assert!(check(file.path(), "key", "secret").unwrap().is_empty());
        assert!(run(file.path(), "key", "secret").is_ok());
    }

    #[test]
    fn wrong_credentials_are_listed() {
        let file = signed_file("key", "secret");
        let errors = check(file.path(), "other", "wrong").unwrap();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("0x04"));
        assert!(errors[1].starts_with("0x05"));
        assert!(run(file.path(), "other", "wrong").is_err());
    }

    #[test]
    fn unreadable_message_is_an_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"{").unwrap();
        assert!(check(file.path(), "key", "secret").is_err());
    }
}
