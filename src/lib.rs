//! Triggers an AWS cleanup GitHub Actions workflow, follows its run and renders the report artifact.
//!
//! The pipeline is strictly sequential: [`workflow::dispatcher`] → [`workflow::locator`] →
//! [`workflow::poller`] → [`workflow::resolver`] → [`report`]. See [`workflow::Session`].

pub mod config;
pub mod env;
pub mod error;
pub mod framework;
pub mod github;
pub mod report;
pub mod shutdown;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};

/// A shorthand to define a statically allocated variable using a [`std::sync::LazyLock`].
///
/// # Examples
///
/// ```rust
/// # use cleanup_dispatch::static_lazy_lock;
/// # use std::sync::LazyLock;
/// static_lazy_lock! {
///     pub VAR_1: String = String::from("a static variable");
/// }
/// // ...equals to...
/// pub static VAR_2: LazyLock<String> = LazyLock::new(|| String::from("a static variable"));
/// ```
#[macro_export]
macro_rules! static_lazy_lock {
    ($(#[$meta:meta])* $vis:vis $name:ident: $type:ty = $expr:expr $(;)?) => {
        $(#[$meta])*
        $vis static $name: $crate::__priv_macro_use::LazyLock<$type> =
            $crate::__priv_macro_use::LazyLock::new(|| $expr);
    };
}

#[doc(hidden)]
pub mod __priv_macro_use {
    pub use std::sync::LazyLock;
}
