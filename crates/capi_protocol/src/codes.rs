//! Error code registry.
//!
//! Codes are a flat mapping shared with existing peers and must not be
//! renumbered. Codes marked as local additions are not produced by older
//! endpoints.

use crate::error::ErrorKind;

/// Uncaught or fatal failure at the endpoint.
pub const INTERNAL: u16 = 0x00;
/// Payload module is not handled by this endpoint.
pub const UNKNOWN_MODULE: u16 = 0x01;
/// Payload action is not handled by this endpoint.
pub const UNKNOWN_ACTION: u16 = 0x02;
/// Request used a method other than POST.
pub const BAD_METHOD: u16 = 0x03;
/// Carried API key did not match.
pub const KEY_MISMATCH: u16 = 0x04;
/// Digest did not validate.
pub const DIGEST_MISMATCH: u16 = 0x05;
/// A required endpoint setting is not defined.
pub const NOT_CONFIGURED: u16 = 0x06;
/// Master data was sent to an endpoint that is master locally.
pub const UNEXPECTED_MASTER_DATA: u16 = 0x07;
/// Action is recognized but not implemented (local addition).
pub const NOT_IMPLEMENTED: u16 = 0x08;
/// Message carried no payloads.
pub const NO_PAYLOADS: u16 = 0x09;
/// Message carried more payloads than the endpoint accepts (local addition).
pub const TOO_MANY_PAYLOADS: u16 = 0x0A;
/// A required data field was missing (local addition).
pub const DATA_FIELD_MISSING: u16 = 0x10;
/// No unique slug could be assigned.
pub const SLUG_UNAVAILABLE: u16 = 0x11;
/// Article could not be added.
pub const ARTICLE_CREATE_FAILED: u16 = 0x12;
/// Image could not be inserted for an article.
pub const IMAGE_CREATE_FAILED: u16 = 0x14;
/// Image could not be assigned to an article.
pub const IMAGE_ASSIGN_FAILED: u16 = 0x15;
/// Article reference already exists.
pub const REFERENCE_EXISTS: u16 = 0x1A;
/// No article carries the reference.
pub const REFERENCE_NOT_FOUND: u16 = 0x1C;
/// No article has the master id.
pub const ARTICLE_NOT_FOUND: u16 = 0x1D;
/// Master id and reference point at different articles.
pub const REFERENCE_MISMATCH: u16 = 0x1E;
/// Master data was not passed.
pub const MASTER_DATA_MISSING: u16 = 0x1F;
/// A required master data key was missing.
pub const MASTER_KEY_MISSING: u16 = 0x20;
/// No record matched a master key.
pub const MASTER_RECORD_NOT_FOUND: u16 = 0x21;
/// Records exist but are not associated as expected.
pub const SYNC_MISMATCH: u16 = 0x22;
/// Article could not be updated.
pub const ARTICLE_UPDATE_FAILED: u16 = 0x23;
/// Image could not be updated.
pub const IMAGE_UPDATE_FAILED: u16 = 0x24;
/// Article could not be deleted.
pub const ARTICLE_DELETE_FAILED: u16 = 0x25;
/// Image could not be deleted.
pub const IMAGE_DELETE_FAILED: u16 = 0x26;

/// Returns the registered meaning of a code.
pub fn describe(code: u16) -> Option<&'static str> {
    let text = match code {
        INTERNAL => "internal error",
        UNKNOWN_MODULE => "unknown module",
        UNKNOWN_ACTION => "unknown action",
        BAD_METHOD => "bad method; expected POST",
        KEY_MISMATCH => "the message API key was incorrect",
        DIGEST_MISMATCH => "the message digest did not validate",
        NOT_CONFIGURED => "a required endpoint setting is not defined",
        UNEXPECTED_MASTER_DATA => "master data sent to a master endpoint",
        NOT_IMPLEMENTED => "action not implemented",
        NO_PAYLOADS => "no payloads provided",
        TOO_MANY_PAYLOADS => "too many payloads",
        DATA_FIELD_MISSING => "a required data field was missing",
        SLUG_UNAVAILABLE => "could not assign a unique slug",
        ARTICLE_CREATE_FAILED => "could not add article",
        IMAGE_CREATE_FAILED => "could not insert image for article",
        IMAGE_ASSIGN_FAILED => "could not assign image to article",
        REFERENCE_EXISTS => "article reference already exists",
        REFERENCE_NOT_FOUND => "article reference could not be found",
        ARTICLE_NOT_FOUND => "article id could not be found",
        REFERENCE_MISMATCH => "article id and reference did not match",
        MASTER_DATA_MISSING => "master data was not passed",
        MASTER_KEY_MISSING => "a required master data key was missing",
        MASTER_RECORD_NOT_FOUND => "no data was found with a matching master key",
        SYNC_MISMATCH => "a synchronisation issue was detected",
        ARTICLE_UPDATE_FAILED => "could not update article",
        IMAGE_UPDATE_FAILED => "could not update image",
        ARTICLE_DELETE_FAILED => "could not delete article",
        IMAGE_DELETE_FAILED => "could not delete image for article",
        _ => return None,
    };
    Some(text)
}

/// Classifies a code into the failure taxonomy.
///
/// Unregistered codes are treated as internal failures.
pub fn kind(code: u16) -> ErrorKind {
    match code {
        UNKNOWN_MODULE | UNKNOWN_ACTION | NOT_IMPLEMENTED => ErrorKind::Routing,
        BAD_METHOD | NO_PAYLOADS | TOO_MANY_PAYLOADS => ErrorKind::Structural,
        KEY_MISMATCH | DIGEST_MISMATCH => ErrorKind::Authentication,
        REFERENCE_EXISTS => ErrorKind::Conflict,
        DATA_FIELD_MISSING | REFERENCE_NOT_FOUND | ARTICLE_NOT_FOUND | REFERENCE_MISMATCH
        | MASTER_DATA_MISSING | MASTER_KEY_MISSING | MASTER_RECORD_NOT_FOUND | SYNC_MISMATCH => {
            ErrorKind::Validation
        }
        UNEXPECTED_MASTER_DATA | SLUG_UNAVAILABLE | ARTICLE_CREATE_FAILED | IMAGE_CREATE_FAILED
        | IMAGE_ASSIGN_FAILED | ARTICLE_UPDATE_FAILED | IMAGE_UPDATE_FAILED
        | ARTICLE_DELETE_FAILED | IMAGE_DELETE_FAILED => ErrorKind::Effect,
        _ => ErrorKind::Internal,
    }
}
