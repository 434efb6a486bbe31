//! Per-principal upload admission control: rolling byte quotas with serialized
//! check-and-consume, built for async upload routes sharing one process.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod admission;
pub mod clock;
pub mod config;
pub mod error;
pub mod obs;
pub mod principal;

pub use admission::{Admission, AdmissionController, Grant, QuotaUsage, Rejection};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AcquirePolicy, QuotaPolicy};
pub use error::{Error, Result};
pub use principal::PrincipalKey;

mod _prelude {
	pub use std::{
		collections::HashMap,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};

	pub use crate::error::{Error, Result};
}

#[cfg(test)] use color_eyre as _;
