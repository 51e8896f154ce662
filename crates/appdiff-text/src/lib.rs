//! Pure text transforms applied to diff tool output.
//!
//! [`normalize`] strips Argo CD bookkeeping noise from raw diff text;
//! [`scrub`] removes the auth token from anything about to be logged or
//! published.

pub mod normalize;
pub mod scrub;
