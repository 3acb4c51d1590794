//! Shell supervisor tests. These spawn real `sh` children.

#[cfg(unix)]
mod supervisor_test;
