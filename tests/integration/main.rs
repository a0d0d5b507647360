//! Integration tests: the full sell loop against in-memory chain and
//! aggregator fakes, on paused tokio time.

mod mock_chain;
mod sell_loop;
