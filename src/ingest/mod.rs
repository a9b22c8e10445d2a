pub mod demo;
pub mod error;
pub mod firebase;
pub mod http;
pub mod normalizer;
pub mod payload;
pub mod poll;
pub mod push;

pub use demo::DemoGenerator;
pub use error::FetchError;
pub use firebase::FirebaseFeed;
pub use http::HttpPollEndpoint;
pub use poll::PollEndpoint;
pub use push::{FeedSubscription, PushFeed};
