// SPDX-License-Identifier: MIT OR Apache-2.0

//! This module is used to simplify importing the most common types.
//!
//! This includes the host service traits, `Status` codes, etc.

pub use crate::boot::{ProtocolDatabase, TimerService};
pub use crate::proto::media::partition::ChildHandleInstaller;
pub use crate::{Handle, ResultExt, Status, StatusExt};
