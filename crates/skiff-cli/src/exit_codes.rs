//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

#![allow(dead_code)]

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Configuration error - missing or invalid configuration
pub const CONFIG_ERROR: i32 = 2;

/// Connection error - a cluster could not be reached
pub const CONNECT_ERROR: i32 = 3;

/// Sync error - a reconciliation pass failed partway
pub const SYNC_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;
