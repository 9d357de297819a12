// Proxy module - authenticating, tunneling HTTP relay for chat completions
//
// Inbound requests from the Excel add-in are checked against the service
// token, then relayed to the chat-completions API. Every upstream request goes
// through a fresh CONNECT tunnel opened on the corporate forward proxy; TLS to
// the upstream host runs inside that tunnel. Responses are streamed back as
// they arrive, and each request leaves exactly one metrics observation.
//
// Module layout:
// - auth: service token gate
// - payload: inbound request parsing and the upstream JSON body
// - tunnel: CONNECT handshake with the forward proxy
// - relay: HTTP/1.1 (optionally TLS) client over the tunnel
// - stream: response body relay and outcome recording
// - sse: passive event-stream accounting for logs
// - handlers: request orchestration and the auxiliary endpoints
// - server: router and listener

mod auth;
mod error;
mod handlers;
mod payload;
mod relay;
mod server;
mod sse;
mod state;
mod stream;
mod tunnel;


pub use server::start_proxy;
