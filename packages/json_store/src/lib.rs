//! JSON codec for Strata.
//!
//! Register it with a settings context to back `.json` files:
//!
//! ```rust,ignore
//! context.registry().register("json", strata_json_store::JsonCodec);
//! ```

mod codec;

pub use codec::JsonCodec;
