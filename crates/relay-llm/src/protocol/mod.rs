//! Vendor wire format types

pub mod anthropic;
pub mod bedrock;
pub mod google;
pub mod openai;
