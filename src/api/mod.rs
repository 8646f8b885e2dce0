//! HTTP API implementing the [external-dns webhook provider protocol][webhook].
//!
//! Every request and response body uses the media type
//! `application/external.dns.webhook+json;version=1`. Requests to the provider endpoints must
//! come from an IP address inside a [`Config::acl`][`crate::config::Config::acl`] network,
//! otherwise HTTP 403 (Forbidden) is returned.
//!
//! # Provider Endpoints
//!
//! ## `/` (GET)
//!
//!   Negotiation. Returns the configured domain filter:
//!
//!   ```json
//!   { "domainFilter": ["home.example.com"] }
//!   ```
//!
//! ## `/records` (GET)
//!
//!   Returns every record currently in the managed dnsmasq directory:
//!
//!   ```json
//!   [ { "dnsName": "app.home.example.com", "targets": ["192.168.1.10"], "recordType": "A", "recordTTL": 300 } ]
//!   ```
//!
//! ## `/records` (POST)
//!
//!   Applies a change-set of the form:
//!
//!   ```json
//!   { "create": [...], "updateOld": [...], "updateNew": [...], "delete": [...] }
//!   ```
//!
//!   Change-sets are applied one at a time in arrival order; a request waits until its own
//!   change-set has been applied. Returns HTTP 204 (No Content) on success, HTTP 400 (Bad
//!   Request) for invalid records, and HTTP 500 (Internal Server Error) if writing files or
//!   reloading dnsmasq failed. Unlike the other endpoints it is not subject to
//!   [`Config::api_timeout`][`crate::config::Config::api_timeout`], since its change-set is applied
//!   whether or not the client is still waiting.
//!
//! Request bodies may be up to 10 MiB.
//!
//! ## `/adjustendpoints` (POST)
//!
//!   Expects a JSON array of endpoints. Returns the endpoints this provider can manage: `A`,
//!   `TXT` and `CNAME` records that pass validation. Others are dropped.
//!
//! For `GET` requests and `/adjustendpoints`, an `Accept` header that doesn't include the
//! webhook media type is answered with HTTP 406 (Not Acceptable).
//!
//! # Health Endpoint
//!
//! ## `/healthz` (GET)
//!
//!   Served on a separate listener. Returns HTTP 200 (OK) and the body `ok`.
//!
//! [webhook]: https://kubernetes-sigs.github.io/external-dns/latest/docs/tutorials/webhook-provider/

mod api_error;
mod model;
mod routes;
pub mod server;

pub use server::{health_router, new, new_health, router};
