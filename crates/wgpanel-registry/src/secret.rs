// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wrapper for private and preshared keys.
//!
//! `Debug`, `Display` and `Serialize` print `[REDACTED]`, the buffer is zeroed
//! on drop, and the value is only reachable through [`Secret::expose`].

use std::fmt;

use serde::{Serialize, Serializer};
use zeroize::Zeroize;

pub const REDACTED: &str = "[REDACTED]";

#[derive(Zeroize)]
#[zeroize(drop)]
pub struct Secret<T>
where
	T: Zeroize,
{
	inner: T,
}

pub type SecretString = Secret<String>;

impl<T> Secret<T>
where
	T: Zeroize,
{
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	pub fn expose(&self) -> &T {
		&self.inner
	}
}

impl<T> Clone for Secret<T>
where
	T: Zeroize + Clone,
{
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<T> PartialEq for Secret<T>
where
	T: Zeroize + PartialEq,
{
	fn eq(&self, other: &Self) -> bool {
		self.inner == other.inner
	}
}

impl<T> Eq for Secret<T> where T: Zeroize + Eq {}

impl<T> fmt::Debug for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Secret").field(&REDACTED).finish()
	}
}

impl<T> fmt::Display for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T> Serialize for Secret<T>
where
	T: Zeroize,
{
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(REDACTED)
	}
}

impl From<String> for SecretString {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

impl From<&str> for SecretString {
	fn from(value: &str) -> Self {
		Self::new(value.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn test_expose_returns_value() {
		let key = SecretString::from("yAnz5TF+lXXJte14tji3zlMNq+hd2rYUIgJBgB3fBmk=");
		assert_eq!(key.expose(), "yAnz5TF+lXXJte14tji3zlMNq+hd2rYUIgJBgB3fBmk=");
	}

	#[test]
	fn test_serialize_is_redacted() {
		let key = SecretString::from("psk-value");
		assert_eq!(serde_json::to_string(&key).unwrap(), "\"[REDACTED]\"");
	}

	proptest! {
		#[test]
		fn prop_debug_and_display_never_leak(value in "[A-Za-z0-9+/]{12,44}") {
			let secret = SecretString::new(value.clone());
			let debug = format!("{secret:?}");
			let display = format!("{secret}");
			prop_assert!(!debug.contains(&value));
			prop_assert!(!display.contains(&value));
			prop_assert_eq!(display, REDACTED);
		}
	}
}
