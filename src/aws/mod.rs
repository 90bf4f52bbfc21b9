//! Minimal AWS clients (S3 GetObject, SQS messaging) over plain HTTPS
//! with SigV4 request signing. Pure-Rust crypto (`hmac`, `sha2`), no
//! vendor SDK.

pub mod sigv4;
pub mod sqs;

pub use sigv4::AwsCredentials;
pub use sqs::SqsQueue;
