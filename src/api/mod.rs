//! HTTP API Module
//!
//! Provides a REST API for election commands, queries and notifications.

mod http;

pub use http::{
    AddProposalRequest, AddVoterRequest, CommandResponse, ErrorResponse, HttpServer,
    StatusResponse, VoteRequest, CALLER_HEADER,
};
