pub mod clock;
pub mod extractor;
pub mod jwt;
pub mod phone;
pub mod test_utils;
