//! Inbound/outbound adapters. The only shipped adapter is the CSV operation
//! script used by the CLI driver; an HTTP layer would slot in beside it.

pub mod csv;
