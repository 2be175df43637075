//! Crate-wide constants: defaults referenced by [`crate::kernel::config`]
//! and the identity rule enforced in [`crate::resolver::facade`].

/// Published API version of this crate's kernel contract.
pub const API_VERSION: &str = "0.1.0";

/// Default per-plugin setup/destroy deadline, in milliseconds
/// (`maxInitializationTime` in spec §6).
pub const DEFAULT_MAX_INITIALIZATION_TIME_MS: u64 = 30_000;

/// Pattern a `PluginName` must match; enforced by
/// [`crate::resolver::facade::validate_plugins`] with a hand-rolled
/// scanner rather than a compiled regex — the grammar is a single
/// lowercase-leading run of `[a-z0-9-]`.
pub const PLUGIN_NAME_PATTERN_HINT: &str = "^[a-z][a-z0-9-]*$";
