//! Conversion from vendor formats into internal types

pub mod anthropic;
pub mod bedrock;
pub mod google;
pub mod openai;
