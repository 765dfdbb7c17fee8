//! Image sizes written as `WxH`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
	pub width: u32,
	pub height: u32,
}

impl Resolution {
	pub const fn new(width: u32, height: u32) -> Self {
		Self { width, height }
	}

	pub fn scaled(&self, factor: f32) -> Self {
		Self {
			width: (self.width as f32 * factor).round() as u32,
			height: (self.height as f32 * factor).round() as u32,
		}
	}
}

impl fmt::Display for Resolution {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}x{}", self.width, self.height)
	}
}

impl FromStr for Resolution {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (w, h) = s
			.trim()
			.split_once(['x', 'X'])
			.ok_or_else(|| format!("'{}' is not WIDTHxHEIGHT", s))?;
		let width: u32 = w.trim().parse().map_err(|_| format!("invalid width '{}'", w))?;
		let height: u32 = h.trim().parse().map_err(|_| format!("invalid height '{}'", h))?;
		if width == 0 || height == 0 {
			return Err(format!("resolution must be non-zero, got {}x{}", width, height));
		}
		if width % 8 != 0 || height % 8 != 0 {
			return Err(format!("{}x{} is not a multiple of 8", width, height));
		}
		Ok(Self { width, height })
	}
}
