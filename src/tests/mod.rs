//! Internal test suite.

#[cfg(test)]
mod config_test;
#[cfg(test)]
mod middleware_test;
#[cfg(test)]
mod plugin_test;
#[cfg(test)]
mod resolve_test;
#[cfg(test)]
mod stream_test;
