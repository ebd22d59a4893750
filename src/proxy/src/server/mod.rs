//! Demo-facing configuration surface. The connection-establishment,
//! authentication, and backend-routing server this module named in the
//! teacher repo are out of scope; only the CLI argument surface survives.

pub mod proxy_cli_args;
