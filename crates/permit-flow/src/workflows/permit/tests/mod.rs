mod claims;
mod common;
mod payments;
