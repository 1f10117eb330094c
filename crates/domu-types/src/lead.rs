//! Lead profile definitions.
//!
//! A `LeadProfile` is the read-only snapshot of the person being called and
//! the vehicle they were interested in. It is bound once per session.

use serde::{Deserialize, Serialize};

/// The caller a session is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadProfile {
    /// Caller's full name.
    pub name: String,
    /// Commercial name of the vehicle (e.g. "Domu Sedan X").
    pub vehicle_name: String,
    /// Model descriptor of the vehicle (e.g. "Sedán 2022").
    pub vehicle_model: String,
    /// Price in the smallest currency unit (whole pesos for COP).
    pub price: u64,
}

impl LeadProfile {
    /// The fixed identity used when a caller cannot be resolved.
    pub fn demo() -> Self {
        Self {
            name: "Carlos Pérez".to_string(),
            vehicle_name: "Domu Sedan X".to_string(),
            vehicle_model: "Sedán 2022".to_string(),
            price: 75_000_000,
        }
    }

    /// First word of the caller's name, used for a friendlier address.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or("")
    }
}

impl Default for LeadProfile {
    fn default() -> Self {
        Self::demo()
    }
}

/// Renders a peso amount as millions with one decimal, e.g. `"75.0 millones"`.
pub fn format_price_millions(price: u64) -> String {
    format!("{:.1} millones", price as f64 / 1_000_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_lead_is_the_default() {
        let lead = LeadProfile::default();
        assert_eq!(lead.name, "Carlos Pérez");
        assert_eq!(lead.price, 75_000_000);
        assert_eq!(lead.first_name(), "Carlos");
    }

    #[test]
    fn price_formats_as_millions() {
        assert_eq!(format_price_millions(75_000_000), "75.0 millones");
        assert_eq!(format_price_millions(82_460_000), "82.5 millones");
        assert_eq!(format_price_millions(0), "0.0 millones");
    }
}
