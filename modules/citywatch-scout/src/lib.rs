pub mod catalog;
pub mod collector;
pub mod driver;
pub mod extractor;
pub mod geocoder;
pub mod pipeline;
pub mod searcher;
pub mod session;
pub mod taxonomy;
pub mod temporal;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
