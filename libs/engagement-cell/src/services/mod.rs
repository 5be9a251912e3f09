pub mod contact;
pub mod enquiry;
pub mod sentiment;
pub mod social;
pub mod triage;
