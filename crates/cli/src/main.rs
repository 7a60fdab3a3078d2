//! Command-line entry point for `dailypaper`.
//!
//! All behavior lives in the library half of this crate.

fn main() -> anyhow::Result<()> {
    dailypaper::run()
}
