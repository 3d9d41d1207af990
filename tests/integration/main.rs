//! Integration tests: full monitor pipeline against in-memory venues and a
//! local WebSocket execution engine.

mod mock_engine;
mod mock_venue;
mod pipeline;
